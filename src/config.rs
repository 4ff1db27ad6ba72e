//! Configuration for farmnet
//!
//! CLI arguments and environment variable handling using clap.
//! A `.env` file in the working directory is loaded before parsing.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Minimum JWT secret length accepted outside dev mode
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// farmnet - Sustainable Farming Network API
#[derive(Parser, Debug, Clone)]
#[command(name = "farmnet")]
#[command(about = "REST API for the Sustainable Farming Network")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Enable development mode (dev JWT secret, in-memory store fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "farmnet")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds (7 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_expiry_seconds: u64,

    /// Directory where advisory images are stored
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Maximum accepted image size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: usize,

    /// Maximum accepted JSON body size in bytes
    #[arg(long, env = "MAX_JSON_BYTES", default_value = "1048576")]
    pub max_json_bytes: usize,

    /// Built single-page app to serve for non-API paths (optional)
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Twilio messaging configuration
    #[command(flatten)]
    pub twilio: TwilioArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Outbound request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,
}

/// Twilio credentials; messaging runs in demo mode without them
#[derive(clap::Args, Debug, Clone)]
pub struct TwilioArgs {
    /// Twilio account SID
    #[arg(long = "twilio-account-sid", env = "TWILIO_ACCOUNT_SID")]
    pub account_sid: Option<String>,

    /// Twilio auth token
    #[arg(long = "twilio-auth-token", env = "TWILIO_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Sender phone number
    #[arg(long = "twilio-phone-number", env = "TWILIO_PHONE_NUMBER")]
    pub phone_number: Option<String>,

    /// Twilio REST API base URL
    #[arg(
        long = "twilio-api-base",
        env = "TWILIO_API_BASE",
        default_value = "https://api.twilio.com"
    )]
    pub api_base: String,
}

impl TwilioArgs {
    /// Both halves of the credential pair are present
    pub fn is_configured(&self) -> bool {
        self.account_sid.as_deref().is_some_and(|s| !s.is_empty())
            && self.auth_token.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match self.jwt_secret.as_deref() {
                None | Some("") => {
                    return Err("JWT_SECRET is required in production mode".to_string());
                }
                Some(secret) if secret.len() < MIN_JWT_SECRET_LEN => {
                    return Err(format!(
                        "JWT_SECRET must be at least {} characters",
                        MIN_JWT_SECRET_LEN
                    ));
                }
                Some(_) => {}
            }
        }

        if self.twilio.account_sid.is_some() != self.twilio.auth_token.is_some() {
            return Err(
                "TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN must be set together".to_string(),
            );
        }

        if self.twilio.is_configured() && self.twilio.phone_number.is_none() {
            return Err("TWILIO_PHONE_NUMBER is required when Twilio is configured".to_string());
        }

        if self.max_upload_bytes == 0 || self.max_json_bytes == 0 {
            return Err("body size limits must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Largest request body the server will buffer
    pub fn max_body_bytes(&self) -> usize {
        // multipart framing adds a little on top of the file itself
        self.max_upload_bytes.max(self.max_json_bytes) + 64 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["farmnet"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--dev-mode"]);
        assert_eq!(args.listen.port(), 5000);
        assert_eq!(args.jwt_expiry_seconds, 7 * 24 * 60 * 60);
        assert_eq!(args.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(args.mongodb_db, "farmnet");
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_production_requires_long_secret() {
        let args = parse(&["--jwt-secret", "short"]);
        assert!(args.validate().unwrap_err().contains("at least 32"));

        let args = parse(&["--jwt-secret", "a-production-secret-with-enough-length"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_twilio_pair_must_be_complete() {
        let args = parse(&["--dev-mode", "--twilio-account-sid", "AC123"]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--dev-mode",
            "--twilio-account-sid",
            "AC123",
            "--twilio-auth-token",
            "tok",
            "--twilio-phone-number",
            "+15550001111",
        ]);
        assert!(args.validate().is_ok());
        assert!(args.twilio.is_configured());
    }
}
