//! Bearer-token guards
//!
//! Resolve the calling farmer from `Authorization: Bearer <jwt>`.

use bson::oid::ObjectId;
use bytes::Bytes;
use hyper::Request;
use crate::auth::bearer_token;
use crate::db::schemas::FarmerDoc;
use crate::server::AppState;
use crate::types::{FarmError, Result};

const NO_TOKEN: &str = "No token provided, authorization denied";
const INVALID_TOKEN: &str = "Token is not valid";
const DEACTIVATED: &str = "Account is deactivated";

fn bearer(req: &Request<Bytes>) -> Option<&str> {
    let header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    bearer_token(header)
}

/// Farmer for a token that is known to be present
async fn resolve(token: &str, state: &AppState) -> Result<FarmerDoc> {
    let claims = state.jwt.verify_token(token)?;

    let id = ObjectId::parse_str(&claims.id)
        .map_err(|_| FarmError::Unauthorized(INVALID_TOKEN.into()))?;

    let farmer = state
        .stores
        .farmers
        .find_by_id(&id)
        .await?
        .ok_or_else(|| FarmError::Unauthorized(INVALID_TOKEN.into()))?;

    if !farmer.is_active {
        return Err(FarmError::Unauthorized(DEACTIVATED.into()));
    }

    Ok(farmer)
}

/// Require a valid token for an active farmer
pub async fn authenticate(req: &Request<Bytes>, state: &AppState) -> Result<FarmerDoc> {
    let token = bearer(req).ok_or_else(|| FarmError::Unauthorized(NO_TOKEN.into()))?;
    resolve(token, state).await
}

/// Like `authenticate`, but a missing or bad token just means anonymous
pub async fn authenticate_optional(
    req: &Request<Bytes>,
    state: &AppState,
) -> Result<Option<FarmerDoc>> {
    let Some(token) = bearer(req) else {
        return Ok(None);
    };
    match resolve(token, state).await {
        Ok(farmer) => Ok(Some(farmer)),
        Err(FarmError::Unauthorized(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
