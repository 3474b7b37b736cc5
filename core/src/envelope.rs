//! Shipfunk request envelope and response unwrapping.
//!
//! # Design
//! Every Shipfunk call is a form POST to
//! `<endpoint>/<operation>/true/<request_type>/json[/<order_id>]`. The `true`
//! segment asks for real HTTP status codes. The body is a single field,
//! `sf_<operation>`, holding the JSON text of `{"query": ...}`. The API key
//! travels verbatim in `Authorization`.
//!
//! Replies wrap the payload in `{"response": ...}`; anything else is an error
//! envelope (`{"Error": {"Code": .., "Message": ..}}`).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::requests::require;
use crate::transport::Transport;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Third URL segment: how Shipfunk should read the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestType {
    Json,
    Rest,
}

impl RequestType {
    fn as_str(self) -> &'static str {
        match self {
            RequestType::Json => "json",
            RequestType::Rest => "rest",
        }
    }
}

#[derive(Serialize)]
struct Query<'a, T> {
    query: &'a T,
}

/// Base URL and API key shared by both clients.
#[derive(Clone)]
pub(crate) struct Endpoint {
    base: Url,
    api_key: String,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("base", &self.base.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Endpoint {
    pub(crate) fn new(base: &str, api_key: &str) -> Result<Self, ApiError> {
        require(api_key, "API key")?;
        let base = base.trim();
        require(base, "endpoint")?;
        let url = Url::parse(base)
            .map_err(|e| ApiError::validation(format!("invalid endpoint {base}: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(ApiError::validation(format!("invalid endpoint {base}")));
        }
        Ok(Self {
            base: url,
            api_key: api_key.to_string(),
        })
    }

    pub(crate) fn base(&self) -> &str {
        self.base.as_str()
    }

    fn url(
        &self,
        operation: &str,
        request_type: RequestType,
        order_id: Option<&str>,
    ) -> Result<String, ApiError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::validation(format!("invalid endpoint {}", self.base)))?;
            segments
                .pop_if_empty()
                .extend([operation, "true", request_type.as_str(), "json"]);
            if let Some(order_id) = order_id {
                segments.push(order_id);
            }
        }
        Ok(url.into())
    }

    fn request(&self, operation: &str, url: String, body: String) -> HttpRequest {
        debug!(operation, url = %url, "built Shipfunk request");
        HttpRequest {
            method: HttpMethod::Post,
            path: url,
            headers: vec![
                ("Authorization".to_string(), self.api_key.clone()),
                ("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()),
            ],
            body: Some(body),
        }
    }

    /// POST `{"query": query}` to `operation`.
    pub(crate) fn post<Q: Serialize>(
        &self,
        operation: &str,
        request_type: RequestType,
        order_id: Option<&str>,
        query: &Q,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.url(operation, request_type, order_id)?;
        let json = serde_json::to_string(&Query { query })
            .map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair(&format!("sf_{operation}"), &json)
            .finish();
        Ok(self.request(operation, url, body))
    }

    /// POST to `operation` with an empty body.
    pub(crate) fn post_empty(
        &self,
        operation: &str,
        request_type: RequestType,
        order_id: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.url(operation, request_type, order_id)?;
        Ok(self.request(operation, url, String::new()))
    }
}

/// Unwrap a Shipfunk reply into `T`.
///
/// Non-2xx statuses become `HttpError`, a 2xx reply without `response`
/// becomes `Remote`, and an unreadable body becomes `DeserializationError`.
pub fn parse_response<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    if !response.is_success() {
        warn!(status = response.status, "Shipfunk answered with an error status");
        return Err(ApiError::HttpError {
            status: response.status,
            body: response.body,
        });
    }

    let mut value: Value = serde_json::from_str(&response.body)
        .map_err(|e| ApiError::DeserializationError(e.to_string()))?;

    match value.get_mut("response").map(Value::take) {
        Some(payload) => {
            serde_json::from_value(payload).map_err(|e| ApiError::DeserializationError(e.to_string()))
        }
        None => {
            let err = remote_error(&value);
            warn!(error = %err, "Shipfunk reply has no response payload");
            Err(err)
        }
    }
}

fn remote_error(value: &Value) -> ApiError {
    let error = value.get("Error").unwrap_or(value);
    let code = error.get("Code").and_then(|c| {
        c.as_i64()
            .or_else(|| c.as_str().and_then(|s| s.trim().parse().ok()))
    });
    let message = error
        .get("Message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string());
    ApiError::Remote { code, message }
}

/// Execute `request` and unwrap the reply.
pub(crate) fn exchange<T: Transport, R: DeserializeOwned>(
    transport: &T,
    request: HttpRequest,
) -> Result<R, ApiError> {
    let response = transport.execute(&request)?;
    debug!(status = response.status, url = %request.path, "Shipfunk replied");
    parse_response(response)
}
