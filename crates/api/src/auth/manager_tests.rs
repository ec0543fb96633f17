//! Unit tests for the authentication manager
//!
//! Driven against an in-memory user directory so the full state machine —
//! login, logout, sliding timeout — runs without a database.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::{Duration, OffsetDateTime};

    use crate::auth::directory::{NewUser, User, UserDirectory};
    use crate::auth::manager::AuthManager;
    use crate::auth::password::hash_password;
    use crate::auth::session::Session;
    use crate::error::ApiResult;

    /// In-memory directory standing in for the users table.
    struct MemoryDirectory {
        users: Mutex<Vec<User>>,
    }

    impl MemoryDirectory {
        fn new() -> Self {
            Self {
                users: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UserDirectory for MemoryDirectory {
        async fn find_by_id(&self, id: i64) -> ApiResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned())
        }

        async fn find_by_login(&self, email: &str) -> ApiResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn insert(&self, new_user: NewUser) -> ApiResult<User> {
            let mut users = self.users.lock().unwrap();
            let user = User {
                id: users.len() as i64 + 1,
                name: new_user.name,
                email: new_user.email,
                phone: new_user.phone,
                password_hash: new_user.password_hash,
                created_at: OffsetDateTime::now_utc(),
            };
            users.push(user.clone());
            Ok(user)
        }
    }

    /// Manager seeded with a single registered user.
    async fn seeded_manager() -> (AuthManager<MemoryDirectory>, User) {
        let directory = MemoryDirectory::new();
        let user = directory
            .insert(NewUser {
                name: "Ada".to_string(),
                email: "a@example.com".to_string(),
                phone: "555-0100".to_string(),
                password_hash: hash_password("secret123").unwrap(),
            })
            .await
            .unwrap();
        (AuthManager::new(directory), user)
    }

    const TIMEOUT: Duration = Duration::seconds(1800);

    #[tokio::test]
    async fn authenticate_success_establishes_session() {
        let (auth, user) = seeded_manager().await;
        let mut session = Session::fresh();

        assert!(auth
            .authenticate(&mut session, "a@example.com", "secret123")
            .await
            .unwrap());
        assert!(auth.is_authenticated(&session));
        assert!(session.is_permanent());
        assert!(session.last_active().is_some());

        let current = auth.current_user(&session).await.unwrap().unwrap();
        assert_eq!(current.id, user.id);
        assert_eq!(current.email, "a@example.com");
    }

    #[tokio::test]
    async fn authenticate_unknown_login_fails_without_side_effects() {
        let (auth, _) = seeded_manager().await;
        let mut session = Session::fresh();

        assert!(!auth
            .authenticate(&mut session, "nobody@example.com", "secret123")
            .await
            .unwrap());
        assert!(!auth.is_authenticated(&session));
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn authenticate_wrong_password_fails_without_side_effects() {
        let (auth, _) = seeded_manager().await;
        let mut session = Session::fresh();

        assert!(!auth
            .authenticate(&mut session, "a@example.com", "wrong")
            .await
            .unwrap());
        assert!(!auth.is_authenticated(&session));
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn current_user_is_absent_for_anonymous_sessions() {
        let (auth, _) = seeded_manager().await;
        let session = Session::fresh();
        assert!(auth.current_user(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dangling_user_id_reads_as_anonymous_but_is_not_cleared() {
        let (auth, _) = seeded_manager().await;
        let mut session = Session::fresh();
        session.set_user_id(999);
        session.touch(OffsetDateTime::now_utc());

        // No directory record: absent, not an error.
        assert!(auth.current_user(&session).await.unwrap().is_none());
        // The dangling id stays in place.
        assert_eq!(session.user_id(), Some(999));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (auth, _) = seeded_manager().await;
        let mut session = Session::fresh();
        auth.authenticate(&mut session, "a@example.com", "secret123")
            .await
            .unwrap();

        auth.logout(&mut session);
        assert!(!auth.is_authenticated(&session));
        assert_eq!(session.last_active(), None);
        assert!(!session.is_permanent());

        auth.logout(&mut session);
        assert!(!auth.is_authenticated(&session));
    }

    #[test]
    fn timeout_expires_idle_sessions() {
        let auth = AuthManager::new(MemoryDirectory::new());
        let mut session = Session::fresh();
        session.set_user_id(1);
        session.touch(OffsetDateTime::now_utc() - Duration::seconds(1801));

        auth.check_session_timeout(&mut session, TIMEOUT);
        assert!(!auth.is_authenticated(&session));
    }

    #[test]
    fn timeout_refreshes_active_sessions() {
        let auth = AuthManager::new(MemoryDirectory::new());
        let mut session = Session::fresh();
        let stale = OffsetDateTime::now_utc() - Duration::seconds(1799);
        session.set_user_id(1);
        session.touch(stale);

        auth.check_session_timeout(&mut session, TIMEOUT);
        assert!(auth.is_authenticated(&session));
        assert!(session.last_active().unwrap() > stale);
    }

    #[test]
    fn missing_last_active_counts_as_zero_elapsed() {
        let auth = AuthManager::new(MemoryDirectory::new());
        let mut session = Session::fresh();
        session.set_user_id(1);

        auth.check_session_timeout(&mut session, TIMEOUT);
        assert!(auth.is_authenticated(&session));
        // The baseline is stamped so the next check measures from now.
        assert!(session.last_active().is_some());
    }

    #[test]
    fn timeout_is_a_no_op_for_anonymous_sessions() {
        let auth = AuthManager::new(MemoryDirectory::new());
        let mut session = Session::fresh();

        auth.check_session_timeout(&mut session, TIMEOUT);
        assert!(!session.is_dirty());
        assert_eq!(session.last_active(), None);
    }

    #[test]
    fn sliding_expiration_survives_regular_activity() {
        let auth = AuthManager::new(MemoryDirectory::new());
        let mut session = Session::fresh();
        session.set_user_id(1);
        session.touch(OffsetDateTime::now_utc());

        // Requests spaced just under the timeout never expire, no matter
        // how much total wall-clock time they span.
        for _ in 0..5 {
            session.touch(OffsetDateTime::now_utc() - (TIMEOUT - Duration::seconds(1)));
            auth.check_session_timeout(&mut session, TIMEOUT);
            assert!(auth.is_authenticated(&session));
        }
    }
}
