//! The HTTP primitive the client drives.
//!
//! A [`Transport`] performs one blocking exchange and reports exactly one
//! [`TransportOutcome`]. The client runs it off the async executor with
//! `smol::unblock`, so implementations are free to block.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dalclient_config::ResponseFormat;

use crate::client::ClientError;
use crate::params::Params;

/// Reason reported when no HTTP exchange happened at all.
pub const REASON_TRANSPORT_ERROR: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request as the client describes it. GET parameters go in the query
/// string, POST parameters form-encoded, both in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: Params,
    pub format: ResponseFormat,
    /// Send and keep session cookies.
    pub with_credentials: bool,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, format: ResponseFormat) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            params: Params::new(),
            format,
            with_credentials: true,
        }
    }

    pub fn post(url: impl Into<String>, params: Params, format: ResponseFormat) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            params,
            format,
            with_credentials: true,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// 2xx with its body.
    Success { status: u16, body: String },
    /// Anything else. `status` is 0 when the server was never reached.
    Failure { status: u16, reason: String, body: String },
}

impl TransportOutcome {
    pub fn status(&self) -> u16 {
        match self {
            TransportOutcome::Success { status, .. } | TransportOutcome::Failure { status, .. } => {
                *status
            }
        }
    }

    pub fn body(&self) -> &str {
        match self {
            TransportOutcome::Success { body, .. } | TransportOutcome::Failure { body, .. } => body,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransportOutcome::Success { .. })
    }

    /// A failure that never reached the server.
    pub fn unreachable() -> Self {
        TransportOutcome::Failure {
            status: 0,
            reason: REASON_TRANSPORT_ERROR.to_string(),
            body: String::new(),
        }
    }
}

pub trait Transport: Send + Sync {
    fn perform(&self, request: &HttpRequest) -> TransportOutcome;
}

/// Called with the request just before it is handed to the transport.
pub type BeforeDispatch = Arc<dyn Fn(&mut HttpRequest) + Send + Sync>;

/// Called with the request and its outcome once the exchange is over.
pub type AfterDispatch = Arc<dyn Fn(&HttpRequest, &TransportOutcome) + Send + Sync>;

/// Blocking reqwest transport with a cookie store for the DAL session.
/// No request timeout is set.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::blocking::Client,
    anonymous: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, ClientError> {
        let http = Self::builder(user_agent)
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let anonymous = Self::builder(user_agent)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { http, anonymous })
    }

    fn builder(user_agent: &str) -> reqwest::blocking::ClientBuilder {
        reqwest::blocking::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(None::<Duration>)
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl Transport for ReqwestTransport {
    fn perform(&self, request: &HttpRequest) -> TransportOutcome {
        let http = if request.with_credentials { &self.http } else { &self.anonymous };
        let pairs = request.params.to_pairs();

        let builder = match request.method {
            HttpMethod::Get if pairs.is_empty() => http.get(&request.url),
            HttpMethod::Get => http.get(&request.url).query(&pairs),
            HttpMethod::Post => http.post(&request.url).form(&pairs),
        };

        let response = match builder
            .header(reqwest::header::ACCEPT, request.format.accept())
            .send()
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("{} {} failed: {}", request.method, request.url, e);
                return TransportOutcome::unreachable();
            }
        };

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if status.is_success() {
            TransportOutcome::Success { status: status.as_u16(), body }
        } else {
            TransportOutcome::Failure {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            }
        }
    }
}
