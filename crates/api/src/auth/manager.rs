//! Session-based authentication manager
//!
//! Owns the Anonymous/Authenticated state machine for one client session.
//! Every operation takes the request's [`Session`] handle explicitly, so the
//! manager carries no ambient per-request state and can be driven directly
//! in tests.

use time::{Duration, OffsetDateTime};

use super::directory::{User, UserDirectory};
use super::password;
use super::session::Session;
use crate::error::ApiResult;

/// Fixed argon2 hash compared against when the login name is unknown, so an
/// unknown login takes about as long as a wrong password.
const UNKNOWN_LOGIN_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

#[derive(Clone)]
pub struct AuthManager<D> {
    directory: D,
}

impl<D: UserDirectory> AuthManager<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    /// The underlying user directory, for callers outside the login flow
    /// (registration inserts through this and then calls [`login_user`]).
    ///
    /// [`login_user`]: AuthManager::login_user
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Check a login name and password; establish the session on success.
    ///
    /// Returns `Ok(false)` for an unknown login or a wrong password, with no
    /// session side effect and no hint as to which of the two it was.
    /// Directory failures propagate — an unreachable store is not an
    /// authentication failure.
    pub async fn authenticate(
        &self,
        session: &mut Session,
        login: &str,
        password: &str,
    ) -> ApiResult<bool> {
        let Some(user) = self.directory.find_by_login(login).await? else {
            let _ = password::verify_password(password, UNKNOWN_LOGIN_HASH);
            tracing::warn!(login = %login, "login failed: unknown login name");
            return Ok(false);
        };

        if !password::verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "login failed: password mismatch");
            return Ok(false);
        }

        self.login_user(session, &user);
        Ok(true)
    }

    /// Unconditionally establish an authenticated session for `user`.
    ///
    /// Also the entry point after a fresh registration, so new users do not
    /// need a second login round-trip.
    pub fn login_user(&self, session: &mut Session, user: &User) {
        session.set_permanent(true);
        session.set_user_id(user.id);
        session.touch(OffsetDateTime::now_utc());
        tracing::info!(user_id = %user.id, "session established");
    }

    /// True iff the session currently carries a user id.
    pub fn is_authenticated(&self, session: &Session) -> bool {
        session.is_authenticated()
    }

    /// Resolve the session's user id against the directory.
    ///
    /// A session whose user id no longer resolves to a record is reported as
    /// anonymous (`Ok(None)`); the dangling id is left in place rather than
    /// cleared. Directory failures propagate.
    pub async fn current_user(&self, session: &Session) -> ApiResult<Option<User>> {
        match session.user_id() {
            Some(user_id) => self.directory.find_by_id(user_id).await,
            None => Ok(None),
        }
    }

    /// Discard all session state. Idempotent.
    pub fn logout(&self, session: &mut Session) {
        session.clear();
    }

    /// Enforce the sliding-expiration policy. Must run once per request,
    /// before anything inspects the session's authentication state.
    ///
    /// A session idle longer than `timeout` is logged out; otherwise the
    /// activity timestamp advances to now, pushing the deadline forward. A
    /// missing `last_active` counts as zero elapsed so the session is not
    /// prematurely killed.
    pub fn check_session_timeout(&self, session: &mut Session, timeout: Duration) {
        if !session.is_authenticated() {
            return;
        }

        let now = OffsetDateTime::now_utc();
        let elapsed = session
            .last_active()
            .map(|last| now - last)
            .unwrap_or(Duration::ZERO);

        if elapsed > timeout {
            tracing::debug!(
                user_id = ?session.user_id(),
                idle_secs = elapsed.whole_seconds(),
                "session idle past timeout, logging out"
            );
            self.logout(session);
        } else {
            session.touch(now);
        }
    }
}
