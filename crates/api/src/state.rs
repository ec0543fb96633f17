//! Application state

use sqlx::PgPool;

use crate::{
    auth::{AuthManager, CookieSigner, PgUserDirectory, SessionStore},
    config::Config,
    email::ContactMailer,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub auth: AuthManager<PgUserDirectory>,
    pub sessions: SessionStore,
    pub cookies: CookieSigner,
    pub mailer: ContactMailer,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let auth = AuthManager::new(PgUserDirectory::new(pool.clone()));
        let sessions = SessionStore::new(pool.clone());
        let cookies = CookieSigner::new(&config.session_secret)?;

        let mailer = ContactMailer::from_env();
        if mailer.is_enabled() {
            tracing::info!("Contact mail delivery enabled");
        } else {
            tracing::warn!("Contact mail delivery not configured (missing RESEND_API_KEY)");
        }

        Ok(Self {
            pool,
            config,
            auth,
            sessions,
            cookies,
            mailer,
        })
    }
}
