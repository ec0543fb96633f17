//! Blog post routes
//!
//! Public listing and detail pages plus the gated write operations. Gated
//! handlers run behind `require_login`, but still answer 401 if the session
//! references a user record that no longer exists.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::{
    auth::CurrentUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 50;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummary>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub like_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PostDetailResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub image: Option<String>,
    pub author: String,
    pub like_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostForm {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: DashboardUser,
    pub posts: Vec<PostSummary>,
}

#[derive(Debug, Serialize)]
pub struct DashboardUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Paginated list of posts, newest first.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<Json<PostListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;

    let posts = sqlx::query_as::<_, PostSummary>(
        r#"
        SELECT p.id, p.title, p.slug, u.name AS author,
               (SELECT COUNT(*) FROM post_likes pl WHERE pl.post_id = p.id) AS like_count,
               p.created_at
        FROM posts p
        JOIN users u ON u.id = p.user_id
        ORDER BY p.created_at DESC, p.id DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(PostListResponse {
        posts,
        total,
        page,
        limit,
    }))
}

/// Single post looked up by slug.
pub async fn post_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PostDetailResponse>> {
    let post = sqlx::query_as::<_, PostDetailResponse>(
        r#"
        SELECT p.id, p.title, p.slug, p.content, p.image, u.name AS author,
               (SELECT COUNT(*) FROM post_likes pl WHERE pl.post_id = p.id) AS like_count,
               p.created_at, p.updated_at
        FROM posts p
        JOIN users u ON u.id = p.user_id
        WHERE p.slug = $1
        "#,
    )
    .bind(&slug)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(post))
}

/// Create a post for the logged-in user and redirect to its page.
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<CreatePostForm>,
) -> ApiResult<Redirect> {
    let title = form.title.trim();
    let content = form.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::Validation(
            "Title and content are required".to_string(),
        ));
    }

    let slug = unique_slug(&state.pool, title).await?;
    sqlx::query(
        r#"
        INSERT INTO posts (user_id, title, slug, content, image)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user.id)
    .bind(title)
    .bind(&slug)
    .bind(content)
    .bind(&form.image)
    .execute(&state.pool)
    .await?;

    tracing::info!(user_id = %user.id, slug = %slug, "post created");
    Ok(Redirect::to(&format!("/posts/{slug}")))
}

/// Toggle the logged-in user's like on a post.
pub async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<LikeResponse>> {
    let post: Option<(i64,)> = sqlx::query_as("SELECT id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&state.pool)
        .await?;
    if post.is_none() {
        return Err(ApiError::NotFound);
    }

    let removed = sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
        .bind(user.id)
        .bind(post_id)
        .execute(&state.pool)
        .await?
        .rows_affected();

    let liked = if removed == 0 {
        sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2)")
            .bind(user.id)
            .bind(post_id)
            .execute(&state.pool)
            .await?;
        true
    } else {
        false
    };

    let like_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(LikeResponse { liked, like_count }))
}

/// The logged-in user's own posts.
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<DashboardResponse>> {
    let posts = sqlx::query_as::<_, PostSummary>(
        r#"
        SELECT p.id, p.title, p.slug, u.name AS author,
               (SELECT COUNT(*) FROM post_likes pl WHERE pl.post_id = p.id) AS like_count,
               p.created_at
        FROM posts p
        JOIN users u ON u.id = p.user_id
        WHERE p.user_id = $1
        ORDER BY p.created_at DESC, p.id DESC
        "#,
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(DashboardResponse {
        user: DashboardUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
        posts,
    }))
}

// =============================================================================
// Slug generation
// =============================================================================

/// Lowercase-alphanumeric slug with dashes for everything else.
pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

/// Slugify the title, appending `-2`, `-3`, ... when the base is taken.
async fn unique_slug(pool: &PgPool, title: &str) -> ApiResult<String> {
    let base = slugify(title);

    let taken: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM posts WHERE slug = $1 OR slug LIKE $1 || '-%'")
            .bind(&base)
            .fetch_all(pool)
            .await?;

    if !taken.iter().any(|s| s == &base) {
        return Ok(base);
    }
    let mut n: u32 = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.iter().any(|s| s == &candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}
