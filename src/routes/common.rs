//! Shared request/response plumbing for the route handlers

use std::collections::HashMap;

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::types::{FarmError, Result};

pub type HttpResponse = Response<Full<Bytes>>;

/// Upper bound on any `limit` query parameter
pub const MAX_PAGE_SIZE: u64 = 100;

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", ALLOW_METHODS)
        .header("Access-Control-Allow-Headers", ALLOW_HEADERS)
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub fn ok<T: Serialize>(body: &T) -> Result<HttpResponse> {
    Ok(json_response(StatusCode::OK, body))
}

pub fn created<T: Serialize>(body: &T) -> Result<HttpResponse> {
    Ok(json_response(StatusCode::CREATED, body))
}

/// Raw bytes with a fixed content type (uploads, static files)
pub fn bytes_response(content_type: &str, data: Bytes, cache_control: &str) -> HttpResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Access-Control-Allow-Origin", "*")
        .header("Cache-Control", cache_control)
        .body(Full::new(data))
        .unwrap()
}

pub fn cors_preflight() -> HttpResponse {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", ALLOW_METHODS)
        .header("Access-Control-Allow-Headers", ALLOW_HEADERS)
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Render an error; server-side failures are logged with their detail
pub fn error_response(method: &Method, path: &str, err: FarmError) -> HttpResponse {
    if err.is_server_error() {
        error!(method = %method, path = %path, "Request failed: {}", err);
    } else if matches!(err, FarmError::Unauthorized(_) | FarmError::Forbidden(_)) {
        warn!(method = %method, path = %path, "Request rejected: {}", err);
    }

    let (status, body) = err.into_status_code_and_body();
    json_response(status, &body)
}

/// `/api/x` itself or anything below it, but not `/api/xy`
pub fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn route_not_found() -> FarmError {
    FarmError::NotFound("Route not found".into())
}

/// Turn a handler result into the response, rendering errors in place
pub fn render(req: &Request<Bytes>, result: Result<HttpResponse>) -> HttpResponse {
    result.unwrap_or_else(|err| error_response(req.method(), req.uri().path(), err))
}

/// Path segments after `prefix`, empty ones dropped
pub fn segments<'a>(path: &'a str, prefix: &str) -> Vec<&'a str> {
    path.strip_prefix(prefix)
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse the request body as a JSON object. An empty body is `{}`.
pub fn json_body(req: &Request<Bytes>, max_bytes: usize) -> Result<Value> {
    let body = req.body();
    if body.len() > max_bytes {
        return Err(FarmError::PayloadTooLarge("Request body too large".into()));
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }

    match serde_json::from_slice::<Value>(body)? {
        value @ Value::Object(_) => Ok(value),
        _ => Err(FarmError::BadRequest("Invalid JSON".into())),
    }
}

/// Query string as a map; a repeated key keeps its last value
pub fn query_params(req: &Request<Bytes>) -> HashMap<String, String> {
    let query = req.uri().query().unwrap_or("");
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

/// Non-empty, trimmed query parameter
pub fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Positive integer query parameter, `default` when missing or unusable
pub fn positive_param(params: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    param(params, key)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// `page`/`limit` paging window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u64,
}

impl Page {
    pub fn from_query(params: &HashMap<String, String>, default_limit: u64) -> Self {
        Self {
            page: positive_param(params, "page", 1),
            limit: positive_param(params, "limit", default_limit).min(MAX_PAGE_SIZE),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn limit_i64(&self) -> i64 {
        self.limit as i64
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        Pagination {
            current_page: self.page,
            total_pages: total.div_ceil(self.limit),
            total_items: total,
            items_per_page: self.limit,
        }
    }
}

/// Path id; a malformed id cannot name an existing document
pub fn parse_id(raw: &str, not_found: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| FarmError::NotFound(not_found.into()))
}

/// Hex id of a stored document
pub fn hex_id(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}
