//! SMS/WhatsApp gateway
//!
//! Sends through the Twilio REST API when credentials are configured.
//! Without them every dispatch succeeds locally with a synthetic `demo_*`
//! sid, so the rest of the service behaves the same in development.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TwilioArgs;
use crate::db::schemas::Channel;
use crate::types::{FarmError, Result};

/// Sender used in demo mode when no number is configured
pub const DEMO_FROM: &str = "+1234567890";

/// Outcome of one dispatch, shaped for the API response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub sid: String,
    pub status: String,
    pub to: String,
    pub from: String,
    pub body: String,
    pub created_at: String,
}

/// Subset of Twilio's message resource
#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
    status: String,
    to: String,
    from: String,
    body: String,
    #[serde(default)]
    date_created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    message: String,
}

struct TwilioAccount {
    account_sid: String,
    auth_token: String,
    api_base: String,
}

pub struct Messenger {
    account: Option<TwilioAccount>,
    from: String,
    http_client: reqwest::Client,
}

impl Messenger {
    pub fn new(config: &TwilioArgs, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FarmError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let account = match (&config.account_sid, &config.auth_token) {
            (Some(sid), Some(token)) if config.is_configured() => Some(TwilioAccount {
                account_sid: sid.clone(),
                auth_token: token.clone(),
                api_base: config.api_base.trim_end_matches('/').to_string(),
            }),
            _ => None,
        };

        Ok(Self {
            account,
            from: config
                .phone_number
                .clone()
                .unwrap_or_else(|| DEMO_FROM.to_string()),
            http_client,
        })
    }

    /// Gateway that never leaves the process
    pub fn demo() -> Self {
        Self {
            account: None,
            from: DEMO_FROM.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.account.is_none()
    }

    /// `twilio` or `demo`
    pub fn mode(&self) -> &'static str {
        if self.is_demo() {
            "demo"
        } else {
            "twilio"
        }
    }

    /// Sender address as it appears on the given channel
    pub fn from_address(&self, channel: Channel) -> String {
        address(channel, &self.from)
    }

    /// Send `body` to `to` over SMS or WhatsApp
    pub async fn send(&self, channel: Channel, to: &str, body: &str) -> Result<SentMessage> {
        if channel == Channel::Email {
            return Err(FarmError::BadRequest(
                "Email delivery is not supported".into(),
            ));
        }

        let to = address(channel, to);
        let from = self.from_address(channel);

        let Some(account) = &self.account else {
            let now = Utc::now();
            debug!(channel = %channel, to = %to, "Demo mode dispatch");
            return Ok(SentMessage {
                sid: format!("demo_{}_{}", channel, now.timestamp_millis()),
                status: "sent".to_string(),
                to,
                from,
                body: body.to_string(),
                created_at: now.to_rfc3339(),
            });
        };

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            account.api_base, account.account_sid
        );

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&account.account_sid, Some(&account.auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<TwilioError>()
                .await
                .map(|e| e.message)
                .unwrap_or_else(|_| format!("gateway returned {}", status));
            warn!(channel = %channel, status = %status, "Message dispatch rejected: {}", message);
            return Err(FarmError::Upstream(message));
        }

        let sent: TwilioMessage = response.json().await?;
        Ok(SentMessage {
            sid: sent.sid,
            status: sent.status,
            to: sent.to,
            from: sent.from,
            body: sent.body,
            created_at: sent
                .date_created
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        })
    }
}

fn address(channel: Channel, number: &str) -> String {
    match channel {
        Channel::Whatsapp => format!("whatsapp:{}", number),
        _ => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_sms() {
        let messenger = Messenger::demo();
        assert!(messenger.is_demo());

        let sent = messenger
            .send(Channel::Sms, "+919876543210", "Rain expected tomorrow")
            .await
            .unwrap();
        assert!(sent.sid.starts_with("demo_sms_"));
        assert_eq!(sent.status, "sent");
        assert_eq!(sent.from, DEMO_FROM);
        assert_eq!(sent.to, "+919876543210");
    }

    #[tokio::test]
    async fn test_demo_whatsapp_prefixes_addresses() {
        let sent = Messenger::demo()
            .send(Channel::Whatsapp, "+15550001111", "hello")
            .await
            .unwrap();
        assert!(sent.sid.starts_with("demo_whatsapp_"));
        assert_eq!(sent.to, "whatsapp:+15550001111");
        assert_eq!(sent.from, "whatsapp:+1234567890");
    }

    #[test]
    fn test_email_has_no_gateway() {
        let err = tokio_test::block_on(Messenger::demo().send(Channel::Email, "a@b.com", "hi"))
            .unwrap_err();
        assert!(matches!(err, FarmError::BadRequest(_)));
    }

    #[test]
    fn test_configured_number_used_in_demo() {
        let config = TwilioArgs {
            account_sid: None,
            auth_token: None,
            phone_number: Some("+15557770000".into()),
            api_base: "https://api.twilio.com".into(),
        };
        let messenger = Messenger::new(&config, Duration::from_secs(5)).unwrap();
        assert!(messenger.is_demo());
        assert_eq!(messenger.from_address(Channel::Sms), "+15557770000");
        assert_eq!(messenger.mode(), "demo");
    }
}
