//! Request middleware for session handling
//!
//! Two stages. `session_layer` wraps the whole router: it resolves the
//! client's cookie to a session, enforces the idle timeout *before* any
//! handler runs, exposes the session and current user through request
//! extensions, and persists the outcome afterwards. `require_login` wraps
//! protected routes and redirects anonymous clients to the login page with
//! a `next` parameter pointing back at where they came from.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{COOKIE, REFERER, SET_COOKIE},
        request::Parts,
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tokio::sync::{Mutex, MutexGuard};

use super::directory::User;
use super::session::{Session, SESSION_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;

/// Shared handle to the request's session, inserted into request
/// extensions by `session_layer`. Handlers and the persistence step see the
/// same underlying state.
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }
}

/// The authenticated user resolved for this request. Present in request
/// extensions only when the session is authenticated and the user record
/// still exists.
///
/// As an extractor it rejects with 401 — gated routes are already behind
/// [`require_login`], so this only fires for a session whose user record
/// has since been deleted.
#[derive(Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

/// Pull the signed session cookie value out of the request, if any.
fn extract_session_cookie(request: &Request) -> Option<String> {
    request
        .headers()
        .get(COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            for cookie in cookies.split(';') {
                let cookie = cookie.trim();
                if let Some(value) = cookie
                    .strip_prefix(SESSION_COOKIE)
                    .and_then(|rest| rest.strip_prefix('='))
                {
                    return Some(value.to_string());
                }
            }
            None
        })
}

fn set_session_cookie(response: &mut Response, value: &str, max_age_secs: Option<i64>) {
    let cookie = match max_age_secs {
        Some(secs) => format!(
            "{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={secs}"
        ),
        None => format!("{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax"),
    };
    if let Ok(header) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, header);
    }
}

fn expire_session_cookie(response: &mut Response) {
    set_session_cookie(response, "", Some(0));
}

/// Router-wide session middleware.
///
/// Runs before every route layer, so by the time any handler (or the login
/// gate) looks at authentication state the timeout has already been
/// enforced. Anonymous sessions are never written back; an authenticated
/// session is upserted on every request because the timeout check advanced
/// its activity timestamp.
pub async fn session_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session_id = extract_session_cookie(&request).and_then(|raw| state.cookies.decode(&raw));

    let loaded = match session_id {
        Some(id) => match state.sessions.load(id).await {
            Ok(session) => session,
            Err(e) => return e.into_response(),
        },
        None => None,
    };
    let was_persisted = loaded.is_some();
    let mut session = loaded.unwrap_or_else(Session::fresh);

    state
        .auth
        .check_session_timeout(&mut session, state.config.session_timeout());

    let current_user = if session.is_authenticated() {
        match state.auth.current_user(&session).await {
            Ok(user) => user,
            Err(e) => return e.into_response(),
        }
    } else {
        None
    };

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());
    if let Some(user) = current_user {
        request.extensions_mut().insert(CurrentUser(user));
    }

    let mut response = next.run(request).await;

    let session = handle.lock().await;
    if session.is_authenticated() {
        if let Err(e) = state.sessions.save(&session).await {
            return e.into_response();
        }
        let max_age = session
            .is_permanent()
            .then_some(state.config.session_timeout_secs);
        set_session_cookie(&mut response, &state.cookies.encode(session.id()), max_age);
    } else if was_persisted {
        // Logged out this request (explicitly or via timeout): drop the
        // stored session and tell the client to forget the cookie.
        if let Err(e) = state.sessions.clear(session.id()).await {
            return e.into_response();
        }
        expire_session_cookie(&mut response);
    }

    response
}

/// Where to send an unauthenticated client that hit a gated route, or
/// `None` when the request may proceed. Kept as a plain function of the
/// authentication state and referrer so the redirect contract is testable
/// on its own.
pub(crate) fn login_redirect(authenticated: bool, referrer: Option<&str>) -> Option<String> {
    if authenticated {
        return None;
    }
    let next = referrer.unwrap_or("/");
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    Some(format!("/login?{query}"))
}

/// Gate middleware for routes that require an authenticated session.
pub async fn require_login(request: Request, next: Next) -> Response {
    let authenticated = match request.extensions().get::<SessionHandle>() {
        Some(handle) => handle.lock().await.is_authenticated(),
        None => false,
    };

    let referrer = request
        .headers()
        .get(REFERER)
        .and_then(|h| h.to_str().ok())
        .map(String::from);

    match login_redirect(authenticated, referrer.as_deref()) {
        None => next.run(request).await,
        Some(target) => Redirect::to(&target).into_response(),
    }
}

#[cfg(test)]
pub(crate) fn test_session_handle(session: Session) -> SessionHandle {
    SessionHandle::new(session)
}
