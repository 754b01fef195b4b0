use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use std::convert::Infallible;

/// Best-effort client address taken from proxy headers.
///
/// The first `x-forwarded-for` hop wins, then `x-real-ip`. Requests that carry
/// neither resolve to `ClientIp(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let ip = forwarded.or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        });

        ClientIp(ip)
    }

    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn first_forwarded_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("190.129.10.4, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(
            ClientIp::from_headers(&headers),
            ClientIp(Some("190.129.10.4".into()))
        );
    }

    #[test]
    fn falls_back_to_real_ip_then_none() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(ClientIp::from_headers(&headers).into_inner(), Some("10.0.0.9".into()));
        assert_eq!(ClientIp::from_headers(&HeaderMap::new()), ClientIp(None));
    }
}
