//! Origin checks for the WebSocket upgrade.
//!
//! Browsers do not apply CORS to WebSockets, so a page on any site could
//! connect to the local notification channel and rewrite the commit policy.
//! Upgrades carrying an `Origin` header are only accepted from loopback
//! origins or ones listed explicitly. Non-browser clients send no `Origin`
//! and are let through.

use axum::http::{HeaderMap, StatusCode};

pub const LOOPBACK_ORIGINS: &[&str] = &[
    "http://localhost",
    "https://localhost",
    "http://127.0.0.1",
    "https://127.0.0.1",
    "http://[::1]",
    "https://[::1]",
];

fn matches(origin: &str, allowed: &str) -> bool {
    if origin == allowed {
        return true;
    }
    // "http://localhost:3000" matches "http://localhost"
    origin
        .strip_prefix(allowed)
        .and_then(|rest| rest.strip_prefix(':'))
        .is_some_and(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
}

pub fn check_origin(headers: &HeaderMap, extra_allowed: &[String]) -> Result<(), StatusCode> {
    let Some(origin) = headers.get("origin") else {
        return Ok(());
    };
    let origin = origin.to_str().map_err(|_| StatusCode::FORBIDDEN)?;

    let allowed = LOOPBACK_ORIGINS.iter().any(|a| matches(origin, a))
        || extra_allowed.iter().any(|a| matches(origin, a));
    if allowed {
        Ok(())
    } else {
        tracing::warn!(%origin, "rejected websocket upgrade from foreign origin");
        Err(StatusCode::FORBIDDEN)
    }
}
