//! Anonymous contact form
//!
//! Submissions are stored first; forwarding the mail is fire-and-forget so
//! a slow or misconfigured mail provider never fails the request.

use axum::{extract::State, Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

pub async fn submit_contact(
    State(state): State<AppState>,
    Form(form): Form<ContactForm>,
) -> ApiResult<Json<Value>> {
    let name = form.name.trim().to_string();
    let email = form.email.trim().to_string();
    let subject = form.subject.trim().to_string();
    let message = form.message.trim().to_string();

    if name.is_empty() || email.is_empty() || subject.is_empty() {
        return Err(ApiError::Validation(
            "Name, email, and subject are required".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO contacts (name, email, subject, message)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&subject)
    .bind(&message)
    .execute(&state.pool)
    .await?;

    if state.mailer.is_enabled() {
        let mailer = state.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_contact_message(&name, &email, &subject, &message)
                .await
            {
                tracing::error!(error = ?e, "Failed to forward contact message");
            }
        });
    }

    Ok(Json(json!({ "message": "Thank you for contacting us!" })))
}
