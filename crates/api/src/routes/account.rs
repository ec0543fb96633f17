//! Login, registration, and logout
//!
//! Form-driven flows: success answers with a redirect so the renderer can
//! follow it, failure with a status the renderer can surface. The `next`
//! query parameter carries the post-login return target planted by the
//! login gate.

use axum::{
    extract::{Extension, Query, State},
    response::Redirect,
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::{hash_password, validate_password_strength, NewUser, SessionHandle, UserDirectory},
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Landing page after login when no return target was carried.
const DEFAULT_AFTER_LOGIN: &str = "/dashboard";

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// Where to send the client after a successful login or registration.
pub(crate) fn post_login_target(next: Option<String>) -> String {
    match next {
        Some(target) if !target.is_empty() => target,
        _ => DEFAULT_AFTER_LOGIN.to_string(),
    }
}

/// Data for the login page renderer; echoes the return target back so the
/// form can carry it through the POST.
pub async fn login_page(Query(query): Query<NextQuery>) -> Json<Value> {
    Json(json!({ "next": post_login_target(query.next) }))
}

pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Redirect> {
    let mut session = session.lock().await;
    if state
        .auth
        .authenticate(&mut session, &form.email, &form.password)
        .await?
    {
        Ok(Redirect::to(&post_login_target(query.next)))
    } else {
        Err(ApiError::InvalidCredentials)
    }
}

/// Create an account and log it in immediately — registration does not
/// require a second login round-trip.
pub async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Query(query): Query<NextQuery>,
    Form(form): Form<RegisterForm>,
) -> ApiResult<Redirect> {
    let name = form.name.trim();
    let email = form.email.trim();
    let phone = form.phone.trim();

    if name.is_empty() || email.is_empty() || phone.is_empty() {
        return Err(ApiError::Validation(
            "Name, email, and phone are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(ApiError::Validation(
            "A valid email address is required".to_string(),
        ));
    }
    validate_password_strength(&form.password).map_err(ApiError::Validation)?;

    let directory = state.auth.directory();
    if directory.find_by_login(email).await?.is_some() {
        return Err(ApiError::Validation(
            "An account with this email already exists".to_string(),
        ));
    }

    let user = directory
        .insert(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            password_hash: hash_password(&form.password)?,
        })
        .await?;
    tracing::info!(user_id = %user.id, "user registered");

    let mut session = session.lock().await;
    state.auth.login_user(&mut session, &user);

    Ok(Redirect::to(&post_login_target(query.next)))
}

/// Clear the session. Safe to call when already logged out.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Redirect {
    let mut session = session.lock().await;
    state.auth.logout(&mut session);
    Redirect::to("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_parameter_wins() {
        assert_eq!(
            post_login_target(Some("/posts/rust-tips".to_string())),
            "/posts/rust-tips"
        );
    }

    #[test]
    fn absent_or_empty_next_falls_back_to_dashboard() {
        assert_eq!(post_login_target(None), "/dashboard");
        assert_eq!(post_login_target(Some(String::new())), "/dashboard");
    }
}
