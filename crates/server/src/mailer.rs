//! Outgoing mail. Delivery runs detached so request latency never depends on SMTP.

use crate::config::SmtpConfig;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;

pub type Mailer = Arc<AsyncSmtpTransport<Tokio1Executor>>;

pub fn build_mailer(smtp: &SmtpConfig) -> Result<Mailer, lettre::transport::smtp::Error> {
    let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
    Ok(Arc::new(
        AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.server)?
            .port(smtp.port)
            .credentials(creds)
            .build(),
    ))
}

/// Link a login follows to choose a new password.
pub fn reset_link(reset_url: &str, reset_token: &str) -> String {
    let separator = if reset_url.contains('?') { '&' } else { '?' };
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("token", reset_token)
        .finish();
    format!("{reset_url}{separator}{query}")
}

fn reset_message(from: &str, to: &str, link: &str) -> Result<Message, String> {
    let text = format!(
        "A password reset was requested for this address.\n\n\
         Follow the link below to choose a new password:\n{link}\n\n\
         If you did not ask for this, ignore this message."
    );
    let html = format!(
        "<p>A password reset was requested for this address.</p>\
         <p><a href=\"{link}\">Choose a new password</a></p>\
         <p>If you did not ask for this, ignore this message.</p>"
    );
    Message::builder()
        .from(from.parse().map_err(|e| format!("from: {e}"))?)
        .to(to.parse().map_err(|e| format!("to: {e}"))?)
        .subject("Reset your password")
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html),
                ),
        )
        .map_err(|e| e.to_string())
}

/// Sends the reset email in the background. Without SMTP configured the link is only logged.
pub fn send_reset_email(
    mailer: Option<Mailer>,
    smtp: Option<&SmtpConfig>,
    to: &str,
    link: String,
) {
    let (Some(mailer), Some(smtp)) = (mailer, smtp) else {
        tracing::warn!(
            name = "mailer.reset.unconfigured",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            to,
            message = "SMTP is not configured, reset email not sent"
        );
        return;
    };
    let message = match reset_message(&smtp.from, to, &link) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(
                name = "mailer.reset.build_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                message = "Failed to build reset email"
            );
            return;
        }
    };
    let to = to.to_string();
    tokio::spawn(async move {
        if let Err(e) = mailer.send(message).await {
            tracing::error!(
                name = "mailer.reset.send_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = ?e,
                to,
                message = "Failed to send reset email"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_appends_token() {
        assert_eq!(
            reset_link("http://localhost/reset", "abc"),
            "http://localhost/reset?token=abc"
        );
        assert_eq!(
            reset_link("http://localhost/reset?lang=en", "a+b"),
            "http://localhost/reset?lang=en&token=a%2Bb"
        );
    }

    #[test]
    fn reset_message_rejects_bad_sender() {
        assert!(reset_message("not an address", "a@b.io", "http://x").is_err());
        assert!(reset_message("noreply@b.io", "a@b.io", "http://x").is_ok());
    }
}
