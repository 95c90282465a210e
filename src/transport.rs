//! HTTP plumbing underneath the client.

use std::time::Duration;

use crate::error::TransportError;

/// A fully prepared HTTP POST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// First header value with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Sends a request and hands back the complete response body.
///
/// HTTP status codes are not interpreted: a non-2xx answer still yields its
/// body. Only failures to send the request or read the body are errors.
pub trait Transport: Send + Sync + 'static {
    fn post(&self, request: HttpRequest) -> Result<Vec<u8>, TransportError>;
}

/// Default [`Transport`] backed by `minreq`.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Transport for HttpTransport {
    fn post(&self, request: HttpRequest) -> Result<Vec<u8>, TransportError> {
        let mut req = minreq::post(request.url).with_body(request.body);
        for (name, value) in request.headers {
            req = req.with_header(name, value);
        }
        if let Some(timeout) = self.timeout {
            // minreq only takes whole seconds; never round down to "no time".
            req = req.with_timeout(timeout.as_secs().max(1));
        }

        Ok(req.send()?.into_bytes())
    }
}
