//! Session state, cookie codec, and the Postgres session store
//!
//! A session is a server-side record addressed by an opaque id; the client
//! only ever holds the id, signed with HMAC-SHA256 so it cannot be forged.
//! Anonymous sessions are never written to the store — a row exists exactly
//! while the session is authenticated.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the signed session id.
pub const SESSION_COOKIE: &str = "inkpress_session";

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-client authentication state for one request.
///
/// Mutations go through methods so the middleware can tell whether the
/// session changed during the request. `user_id` set means authenticated;
/// `last_active` is always stamped alongside it.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    user_id: Option<i64>,
    last_active: Option<OffsetDateTime>,
    permanent: bool,
    dirty: bool,
}

impl Session {
    /// A brand-new anonymous session with a fresh id.
    pub fn fresh() -> Self {
        Self {
            id: SessionId::generate(),
            user_id: None,
            last_active: None,
            permanent: false,
            dirty: false,
        }
    }

    fn from_row(row: SessionRow) -> Self {
        Self {
            id: SessionId(row.id),
            user_id: row.user_id,
            last_active: row.last_active,
            permanent: row.permanent,
            dirty: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn last_active(&self) -> Option<OffsetDateTime> {
        self.last_active
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Whether the session was mutated during this request.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_user_id(&mut self, user_id: i64) {
        self.user_id = Some(user_id);
        self.dirty = true;
    }

    pub fn set_permanent(&mut self, permanent: bool) {
        self.permanent = permanent;
        self.dirty = true;
    }

    /// Refresh the activity timestamp.
    pub fn touch(&mut self, now: OffsetDateTime) {
        self.last_active = Some(now);
        self.dirty = true;
    }

    /// Discard all session state. A no-op on an already-empty session, so
    /// repeated logouts stay observable as "still anonymous".
    pub fn clear(&mut self) {
        if self.user_id.is_none() && self.last_active.is_none() && !self.permanent {
            return;
        }
        self.user_id = None;
        self.last_active = None;
        self.permanent = false;
        self.dirty = true;
    }
}

/// Signs and verifies the session id carried in the client cookie.
///
/// Cookie value format: `<uuid>.<hex hmac-sha256>`. Verification is
/// constant-time via `Mac::verify_slice`; anything malformed or tampered
/// decodes to `None` and the caller treats the client as a fresh visitor.
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: &str) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow::anyhow!("invalid session secret"))?;
        Ok(Self { mac })
    }

    pub fn encode(&self, id: SessionId) -> String {
        let id = id.to_string();
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        let tag = mac.finalize().into_bytes();
        format!("{}.{}", id, hex::encode(tag))
    }

    pub fn decode(&self, raw: &str) -> Option<SessionId> {
        let (id, tag) = raw.split_once('.')?;
        let uuid = Uuid::parse_str(id).ok()?;
        let tag = hex::decode(tag).ok()?;

        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&tag).ok()?;

        Some(SessionId(uuid))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Option<i64>,
    last_active: Option<OffsetDateTime>,
    permanent: bool,
}

/// Postgres-backed session store (`sessions` table).
///
/// Each request does a single read at entry and at most one write at exit;
/// concurrent requests on the same session key are last-write-wins on
/// `last_active`, which is an accepted property of the design.
#[derive(Clone)]
pub struct SessionStore {
    pool: PgPool,
}

impl SessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn load(&self, id: SessionId) -> ApiResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, last_active, permanent
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Session::from_row))
    }

    pub async fn save(&self, session: &Session) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, last_active, permanent)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                last_active = EXCLUDED.last_active,
                permanent = EXCLUDED.permanent
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.user_id())
        .bind(session.last_active())
        .bind(session.is_permanent())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn clear(&self, id: SessionId) -> ApiResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> CookieSigner {
        CookieSigner::new("an-extremely-secret-signing-key-for-tests").unwrap()
    }

    #[test]
    fn cookie_round_trip() {
        let signer = signer();
        let session = Session::fresh();
        let cookie = signer.encode(session.id());
        assert_eq!(signer.decode(&cookie), Some(session.id()));
    }

    #[test]
    fn tampered_cookie_is_rejected() {
        let signer = signer();
        let cookie = signer.encode(Session::fresh().id());

        // Swap the leading character of the uuid portion.
        let mut forged: Vec<char> = cookie.chars().collect();
        forged[0] = if forged[0] == 'a' { 'b' } else { 'a' };
        let forged: String = forged.into_iter().collect();

        assert_eq!(signer.decode(&forged), None);
    }

    #[test]
    fn malformed_cookie_is_rejected() {
        let signer = signer();
        assert_eq!(signer.decode(""), None);
        assert_eq!(signer.decode("no-separator"), None);
        assert_eq!(signer.decode("not-a-uuid.deadbeef"), None);
    }

    #[test]
    fn cookie_signed_with_other_key_is_rejected() {
        let cookie = signer().encode(Session::fresh().id());
        let other = CookieSigner::new("a-completely-different-signing-key!").unwrap();
        assert_eq!(other.decode(&cookie), None);
    }

    #[test]
    fn fresh_session_is_anonymous_and_clean() {
        let session = Session::fresh();
        assert!(!session.is_authenticated());
        assert!(!session.is_dirty());
    }

    #[test]
    fn clear_on_empty_session_is_a_no_op() {
        let mut session = Session::fresh();
        session.clear();
        assert!(!session.is_dirty());
    }

    #[test]
    fn mutation_marks_the_session_dirty() {
        let mut session = Session::fresh();
        session.set_user_id(7);
        assert!(session.is_dirty());
        assert!(session.is_authenticated());

        session.clear();
        assert!(!session.is_authenticated());
        assert_eq!(session.last_active(), None);
        assert!(!session.is_permanent());
    }
}
