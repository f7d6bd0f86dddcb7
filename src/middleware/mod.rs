use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::convert::Infallible;
use std::sync::Arc;

/// Resolved caller identity, as consumed by the reservation core. The core
/// never authenticates; this extractor is the only place credentials are
/// inspected.
#[derive(Debug, Clone)]
pub struct Requester {
    pub is_admin: bool,
}

/// Split a `Basic` authorization header value into (user, password).
pub fn parse_basic(auth_header: &str) -> Option<(String, String)> {
    let encoded = auth_header.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let mut parts = credentials.splitn(2, ':');
    let user = parts.next()?;
    let password = parts.next()?;
    Some((user.to_string(), password.to_string()))
}

// Basic Auth extractor. Missing or wrong credentials resolve to a plain
// requester instead of rejecting; admin-only routes decide what to do.
impl FromRequestParts<Arc<crate::AppState>> for Requester {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let credentials = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic);

        let is_admin = match credentials {
            Some((user, password)) => {
                user == state.config.admin.email && password == state.config.admin.password
            }
            None => false,
        };

        Ok(Requester { is_admin })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_basic_credentials() {
        // "ops@example.com:hunter2"
        let header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode("ops@example.com:hunter2")
        );
        let (user, password) = parse_basic(&header).unwrap();
        assert_eq!(user, "ops@example.com");
        assert_eq!(password, "hunter2");
    }

    #[test]
    fn password_may_contain_colons() {
        let header = format!("Basic {}", general_purpose::STANDARD.encode("u:p:q"));
        let (user, password) = parse_basic(&header).unwrap();
        assert_eq!(user, "u");
        assert_eq!(password, "p:q");
    }

    #[test]
    fn rejects_non_basic_schemes_and_garbage() {
        assert!(parse_basic("Bearer abc").is_none());
        assert!(parse_basic("Basic not-base64!!!").is_none());
        assert!(parse_basic("").is_none());
    }
}
