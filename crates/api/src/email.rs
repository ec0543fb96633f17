//! Outbound contact mail
//!
//! Contact form submissions are forwarded to the site owner through the
//! Resend HTTP API. Delivery is best-effort: the message row is already
//! stored by the time a send runs, and failures are logged, never surfaced
//! to the visitor.

use serde_json::json;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Clone)]
pub struct ContactMailer {
    api_key: String,
    from: String,
    recipient: String,
    client: reqwest::Client,
}

impl ContactMailer {
    /// Build the mailer from `RESEND_API_KEY`, `MAIL_FROM`, and
    /// `CONTACT_RECIPIENT`. Missing configuration disables sending rather
    /// than failing startup.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("RESEND_API_KEY").unwrap_or_default(),
            from: std::env::var("MAIL_FROM").unwrap_or_default(),
            recipient: std::env::var("CONTACT_RECIPIENT").unwrap_or_default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty() && !self.from.is_empty() && !self.recipient.is_empty()
    }

    /// Forward a contact form submission, with the visitor as reply-to.
    pub async fn send_contact_message(
        &self,
        name: &str,
        reply_to: &str,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        let payload = json!({
            "from": self.from,
            "to": [self.recipient],
            "reply_to": reply_to,
            "subject": format!("{subject} from {name}"),
            "text": body,
        });

        self.client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
