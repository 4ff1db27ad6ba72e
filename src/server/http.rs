//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo. Bodies are buffered (up to the configured
//! limit) before routing, so handlers see a plain `Request<Bytes>`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::routes::{self, error_response};
use crate::services::{Advisor, KeywordAdvisor, Messenger, UploadDir};
use crate::store::Stores;
use crate::types::{FarmError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub stores: Stores,
    pub jwt: JwtValidator,
    /// SMS/WhatsApp gateway (Twilio or demo)
    pub messenger: Messenger,
    /// Answers advisory queries
    pub advisor: Arc<dyn Advisor>,
    pub uploads: UploadDir,
}

impl AppState {
    /// Build state over already-opened stores
    pub fn new(args: Args, stores: Stores) -> Result<Self> {
        let jwt = match args.jwt_secret.clone() {
            Some(secret) if !secret.is_empty() => {
                JwtValidator::new(secret, args.jwt_expiry_seconds)?
            }
            _ if args.dev_mode => {
                warn!("No JWT_SECRET set, using the development secret");
                JwtValidator::new_dev(args.jwt_expiry_seconds)
            }
            _ => {
                return Err(FarmError::Config(
                    "JWT_SECRET is required in production mode".into(),
                ))
            }
        };

        let messenger = Messenger::new(
            &args.twilio,
            Duration::from_millis(args.request_timeout_ms),
        )?;
        let uploads = UploadDir::new(args.upload_dir.clone());

        Ok(Self {
            args,
            stores,
            jwt,
            messenger,
            advisor: Arc::new(KeywordAdvisor),
            uploads,
        })
    }

    /// Swap in a different advisory responder
    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisor = advisor;
        self
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("farmnet listening on {}", state.args.listen);
    info!(
        "Store: {}, messaging: {}",
        state.stores.backend(),
        state.messenger.mode()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - do not use in production");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = uuid::Uuid::new_v4().to_string();

    info!("[{}] {} {} ({})", addr, method, path, request_id);

    let (parts, body) = req.into_parts();
    let mut response = match Limited::new(body, state.args.max_body_bytes()).collect().await {
        Ok(collected) => {
            let req = Request::from_parts(parts, collected.to_bytes());
            routes::dispatch(Arc::clone(&state), req).await
        }
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => error_response(
            &method,
            &path,
            FarmError::PayloadTooLarge("Request body too large".into()),
        ),
        Err(e) => {
            warn!("[{}] Failed to read request body: {}", addr, e);
            error_response(
                &method,
                &path,
                FarmError::BadRequest("Failed to read request body".into()),
            )
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("X-Request-Id", value);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["farmnet"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_dev_mode_falls_back_to_dev_secret() {
        let state = AppState::new(args(&["--dev-mode"]), Stores::memory()).unwrap();
        assert!(state.messenger.is_demo());
        assert_eq!(state.stores.backend(), "memory");
    }

    #[test]
    fn test_production_needs_secret() {
        let err = AppState::new(args(&[]), Stores::memory()).err().unwrap();
        assert!(matches!(err, FarmError::Config(_)));

        let err = AppState::new(args(&["--jwt-secret", "too-short"]), Stores::memory())
            .err()
            .unwrap();
        assert!(matches!(err, FarmError::Config(_)));
    }
}
