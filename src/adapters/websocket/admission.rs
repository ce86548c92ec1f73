//! Handshake admission.
//!
//! Every upgrade request passes four gates in order:
//! 1. Origin allow-list (requests without an `Origin` header pass)
//! 2. IP ban list
//! 3. Per-IP rate limit, failing closed when the limiter is unavailable
//! 4. Session token from `?token=` or the `X-Session-Token` header

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::ports::{
    HandshakeAuthorizer, IpBanList, RateLimitKey, RateLimitPolicy, RateLimitResult, RateLimiter,
};

pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

/// Why a handshake was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionRejection {
    ForbiddenOrigin,
    Banned,
    RateLimited { retry_after_secs: u32 },
    Unauthorized,
    /// A backing store could not answer.
    Unavailable,
}

impl AdmissionRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ForbiddenOrigin | Self::Banned => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::ForbiddenOrigin => "FORBIDDEN_ORIGIN",
            Self::Banned => "BANNED",
            Self::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Unavailable => "SERVICE_UNAVAILABLE",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::ForbiddenOrigin => "Forbidden origin",
            Self::Banned => "Forbidden",
            Self::RateLimited { .. } => "Too many requests",
            Self::Unauthorized => "Unauthorized",
            Self::Unavailable => "Service unavailable",
        }
    }
}

impl IntoResponse for AdmissionRejection {
    fn into_response(self) -> Response {
        let mut response = (
            self.status(),
            Json(serde_json::json!({
                "error": self.message(),
                "code": self.code(),
            })),
        )
            .into_response();

        if let Self::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(retry_after_secs));
        }
        response
    }
}

/// Resolve the client address, preferring proxy headers.
///
/// Order of precedence:
/// 1. CF-Connecting-IP
/// 2. X-Forwarded-For (first entry)
/// 3. X-Real-IP
/// 4. The socket peer address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header("CF-Connecting-IP") {
        return Some(ip.to_string());
    }
    if let Some(first) = header("X-Forwarded-For").and_then(|v| v.split(',').next()) {
        let first = first.trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }
    if let Some(ip) = header("X-Real-IP") {
        return Some(ip.to_string());
    }
    peer.map(|addr| addr.ip().to_string())
}

/// Pick the session token from the query string, then the header.
pub fn session_token<'a>(query_token: Option<&'a str>, headers: &'a HeaderMap) -> Option<&'a str> {
    query_token.filter(|t| !t.is_empty()).or_else(|| {
        headers
            .get(SESSION_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|t| !t.is_empty())
    })
}

pub struct HandshakeAdmission {
    allowed_origins: Vec<String>,
    bans: Arc<dyn IpBanList>,
    limiter: Arc<dyn RateLimiter>,
    policy: RateLimitPolicy,
    authorizer: Arc<dyn HandshakeAuthorizer>,
}

impl HandshakeAdmission {
    pub fn new(
        allowed_origins: Vec<String>,
        bans: Arc<dyn IpBanList>,
        limiter: Arc<dyn RateLimiter>,
        policy: RateLimitPolicy,
        authorizer: Arc<dyn HandshakeAuthorizer>,
    ) -> Self {
        let allowed_origins = allowed_origins
            .into_iter()
            .map(|o| normalize_origin(&o))
            .filter(|o| !o.is_empty())
            .collect();
        Self {
            allowed_origins,
            bans,
            limiter,
            policy,
            authorizer,
        }
    }

    fn origin_allowed(&self, headers: &HeaderMap) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        match headers.get("Origin").and_then(|h| h.to_str().ok()) {
            None => true,
            Some(origin) => {
                let origin = normalize_origin(origin);
                self.allowed_origins.iter().any(|allowed| *allowed == origin)
            }
        }
    }

    /// Run all gates. Returns the resolved client address on success.
    pub async fn admit(
        &self,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        query_token: Option<&str>,
    ) -> Result<String, AdmissionRejection> {
        if !self.origin_allowed(headers) {
            tracing::warn!(origin = ?headers.get("Origin"), "forbidden origin");
            return Err(AdmissionRejection::ForbiddenOrigin);
        }

        let ip = client_ip(headers, peer).unwrap_or_else(|| "unknown".to_string());

        match self.bans.is_banned(&ip).await {
            Ok(Some(reason)) => {
                tracing::info!(ip = %ip, reason = %reason, "banned address refused");
                return Err(AdmissionRejection::Banned);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(ip = %ip, error = %e, "ban list unavailable");
                return Err(AdmissionRejection::Unavailable);
            }
        }

        match self.limiter.check(&RateLimitKey::ip(&ip), self.policy).await {
            Ok(RateLimitResult::Allowed(_)) => {}
            Ok(RateLimitResult::Denied(denied)) => {
                tracing::info!(ip = %ip, limit = denied.limit, "handshake rate limited");
                return Err(AdmissionRejection::RateLimited {
                    retry_after_secs: denied.retry_after_secs,
                });
            }
            Err(e) => {
                tracing::error!(ip = %ip, error = %e, "rate limiter unavailable, refusing handshake");
                return Err(AdmissionRejection::Unavailable);
            }
        }

        match session_token(query_token, headers) {
            Some(token) if self.authorizer.is_authorized(token) => Ok(ip),
            _ => {
                tracing::info!(ip = %ip, "handshake without valid session token");
                Err(AdmissionRejection::Unauthorized)
            }
        }
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}
