use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

/// A transactional message ready for the transport. Three kinds exist and
/// each has a constructor below; nothing else ever builds one by hand.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    /// Receipt sent to a commenter right after submission.
    pub fn comment_acknowledgement(to: &str, post_title: &str) -> OutgoingMail {
        OutgoingMail {
            to: to.to_string(),
            reply_to: None,
            subject: format!("Your comment on \"{}\" was received", post_title),
            body: format!(
                "Thanks for commenting on \"{}\". Your comment will appear \
                 once a moderator approves it.",
                post_title
            ),
        }
    }

    /// Moderation prompt sent to the site admin.
    pub fn comment_moderation_alert(admin: &str, post_title: &str, author: &str) -> OutgoingMail {
        OutgoingMail {
            to: admin.to_string(),
            reply_to: None,
            subject: format!("New comment awaiting approval on \"{}\"", post_title),
            body: format!(
                "{} left a comment on \"{}\". It stays hidden until approved.",
                author, post_title
            ),
        }
    }

    /// Contact-form relay; replying goes back to the submitter.
    pub fn contact_message(admin: &str, from_name: &str, from_email: &str, message: &str) -> OutgoingMail {
        OutgoingMail {
            to: admin.to_string(),
            reply_to: Some(from_email.to_string()),
            subject: format!("Contact form message from {}", from_name),
            body: message.to_string(),
        }
    }
}

/// External mail transport. Callers treat delivery as fire-and-forget: a
/// failed send is logged and swallowed, never rolled back into the data
/// mutation that triggered it.
#[axum::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Logs the send error so the caller doesn't have to; the primary mutation
/// is already committed by the time this runs.
pub async fn send_best_effort(mailer: &dyn Mailer, mail: OutgoingMail) {
    if let Err(e) = mailer.send(&mail).await {
        log::error!("Mail to {} failed: {:#}", mail.to, e);
    }
}

/// JSON client for an HTTP mail API endpoint.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

#[derive(Serialize)]
struct MailApiRequest<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: &str, from: &str) -> Result<HttpMailer> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build mail client")?;
        Ok(HttpMailer {
            client,
            endpoint: endpoint.to_string(),
            from: from.to_string(),
        })
    }
}

#[axum::async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let request = MailApiRequest {
            from: &self.from,
            to: &mail.to,
            reply_to: mail.reply_to.as_deref(),
            subject: &mail.subject,
            text: &mail.body,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;
        response
            .error_for_status()
            .with_context(|| format!("Mail API rejected message to {}", mail.to))?;
        Ok(())
    }
}

/// Transport stand-in when no mail API is configured.
pub struct NullMailer;

#[axum::async_trait]
impl Mailer for NullMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        log::info!("Mail transport disabled, dropping \"{}\" to {}", mail.subject, mail.to);
        Ok(())
    }
}
