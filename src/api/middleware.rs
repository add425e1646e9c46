use crate::api::AppState;
use crate::domain::message::ClientMeta;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, HeaderValue, Request, header, request::Parts},
};
use ipnetwork::IpNetwork;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Keeps an incoming `x-request-id` if the client sent one, otherwise generates a UUID.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        let existing = request.headers().get("x-request-id").filter(|v| !v.is_empty() && v.len() <= 128).cloned();

        let value = existing.or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok())?;
        Some(RequestId::new(value))
    }
}

/// Resolves the real client address behind trusted reverse proxies.
#[derive(Clone, Debug)]
pub struct ClientIpResolver {
    trusted_proxies: Vec<IpNetwork>,
}

impl ClientIpResolver {
    #[must_use]
    pub const fn new(trusted_proxies: Vec<IpNetwork>) -> Self {
        Self { trusted_proxies }
    }

    /// Walks `X-Forwarded-For` right to left and returns the first untrusted hop.
    /// Headers from untrusted peers are ignored.
    #[must_use]
    pub fn identify_client_ip(&self, headers: &HeaderMap, peer_addr: IpAddr) -> IpAddr {
        if !self.is_trusted(&peer_addr) {
            return peer_addr;
        }

        let xff = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());

        if let Some(xff_val) = xff
            && let Some(real_ip) =
                xff_val.rsplit(',').filter_map(|s| s.trim().parse::<IpAddr>().ok()).find(|ip| !self.is_trusted(ip))
        {
            return real_ip;
        }

        peer_addr
    }

    fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(*ip))
    }
}

/// Origin address and user agent of the caller, recorded alongside new messages.
#[derive(Debug)]
pub struct RequestMeta(pub ClientMeta);

impl FromRequestParts<AppState> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let origin = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| state.ip_resolver.identify_client_ip(&parts.headers, addr.ip()).to_string());

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .map(ToString::to_string);

        Ok(Self(ClientMeta { origin, user_agent }))
    }
}
