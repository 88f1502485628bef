//! Replayable request and buffered response types.

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;
use crate::error::{InvalidInputError, TransportError};

/// Whether a request needs the session's access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Attach the access token; a 401/403 triggers session renewal.
    #[default]
    Session,
    /// Never attach a token and never trigger renewal.
    Exempt,
}

/// An API request that can be sent more than once.
///
/// The body is kept as JSON so the request can be replayed after a session
/// renewal. A replayed request is marked and never replayed again.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    access: Access,
    retried: bool,
}

impl ApiRequest {
    /// A request for `path`, relative to the API base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            access: Access::Session,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| InvalidInputError::Other {
            message: format!("request body is not valid JSON: {}", e),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Mark the request as not needing the session.
    pub fn exempt(mut self) -> Self {
        self.access = Access::Exempt;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Returns true if this is the replay of a request that already failed once.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// The same request, marked as a replay.
    pub(crate) fn into_replay(mut self) -> Self {
        self.retried = true;
        self
    }
}

/// A successful response with its body read into memory.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub(crate) async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<R: DeserializeOwned>(&self) -> Result<R> {
        serde_json::from_slice(&self.body).map_err(|e| {
            TransportError::Decode {
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_query_and_body() {
        let request = ApiRequest::post("/api/rooms")
            .query("hotelId", 7)
            .json(&json!({"number": "101", "beds": 2}))
            .unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.path(), "/api/rooms");
        assert_eq!(request.query_pairs(), &[("hotelId".to_string(), "7".to_string())]);
        assert_eq!(request.body().unwrap()["beds"], 2);
        assert_eq!(request.access(), Access::Session);
        assert!(!request.is_retried());
    }

    #[test]
    fn replay_is_marked() {
        let request = ApiRequest::get("/api/hotels").into_replay();
        assert!(request.is_retried());
        assert_eq!(request.path(), "/api/hotels");
    }

    #[test]
    fn exempt_sets_access() {
        let request = ApiRequest::post("/uploads/logo.png").exempt();
        assert_eq!(request.access(), Access::Exempt);
    }
}
