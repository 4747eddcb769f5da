//! MailerSend REST Client
//!
//! Native REST implementation of the MailerSend email API.
//!
//! One `POST /v1/email` per send, authenticated with a bearer token taken from
//! the sender configuration's Secret. The provider answers `202 Accepted` and
//! reports the message identifier in the `X-Message-Id` header.
//!
//! References:
//! - [MailerSend Email API](https://developers.mailersend.com/api/v1/email.html)

use super::{EmailSender, OutboundEmail, SendError, SendReceipt};
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info_span, warn, Instrument};

/// Response header carrying the identifier of an accepted message
const MESSAGE_ID_HEADER: &str = "x-message-id";

/// MailerSend REST client
pub struct MailerSendClient {
    http_client: Client,
    base_url: String,
}

// ============================================================================
// Request/Response Structures
// ============================================================================

/// Request body of `POST /v1/email`
///
/// Always produced through serde so quotes, backslashes and control
/// characters in subject or body are escaped.
#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: Recipient<'a>,
    to: Vec<Recipient<'a>>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    email: &'a str,
}

impl<'a> From<&'a OutboundEmail> for SendEmailRequest<'a> {
    fn from(email: &'a OutboundEmail) -> Self {
        Self {
            from: Recipient { email: &email.from },
            to: vec![Recipient { email: &email.to }],
            subject: &email.subject,
            html: &email.html,
        }
    }
}

/// Optional JSON body of a 202 response
#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    #[serde(default)]
    message_id: Option<String>,
}

impl std::fmt::Debug for MailerSendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailerSendClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MailerSendClient {
    /// Create a client for the API rooted at `base_url`
    ///
    /// # Errors
    /// Returns [`SendError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SendError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/email", self.base_url)
    }
}

/// Message id from the response header, falling back to the JSON body
fn extract_message_id(headers: &HeaderMap, body: &str) -> Option<String> {
    headers
        .get(MESSAGE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| {
            serde_json::from_str::<SendEmailResponse>(body)
                .ok()
                .and_then(|response| response.message_id)
                .filter(|id| !id.is_empty())
        })
}

#[async_trait]
impl EmailSender for MailerSendClient {
    async fn send(&self, api_token: &str, email: &OutboundEmail) -> Result<SendReceipt, SendError> {
        let span = info_span!("mailersend.send", http.url = %self.endpoint());
        async {
            let start = Instant::now();
            let result = self
                .http_client
                .post(self.endpoint())
                .header(AUTHORIZATION, format!("Bearer {api_token}"))
                .header(CONTENT_TYPE, "application/json")
                .json(&SendEmailRequest::from(email))
                .send()
                .await;
            metrics::observe_send_duration(start.elapsed().as_secs_f64());

            let response = result?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await?;

            if status != StatusCode::ACCEPTED {
                warn!(http.status = status.as_u16(), "Email provider rejected the request");
                return Err(SendError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }

            let message_id =
                extract_message_id(&headers, &body).ok_or(SendError::MissingMessageId)?;
            debug!(message.id = %message_id, "Email accepted by provider");
            Ok(SendReceipt { message_id })
        }
        .instrument(span)
        .await
    }
}
