//! Stateless HTTP request builder and response parser.
//!
//! # Design
//! `ApiClient` holds only the service registry and default headers and
//! carries no mutable state between calls. Descriptors go in through
//! `build_*` and come out as `HttpRequest`; responses go in through
//! `parse*` and come out as typed values. The caller executes the actual
//! HTTP round-trip, keeping this layer deterministic and free of I/O.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::descriptor::{MutationDescriptor, QueryDescriptor};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::services::{Service, ServiceRegistry};

#[derive(Debug, Clone)]
pub struct ApiClient {
    registry: ServiceRegistry,
    default_headers: Vec<(String, String)>,
}

impl ApiClient {
    pub fn new(registry: ServiceRegistry, default_headers: Vec<(String, String)>) -> Self {
        Self {
            registry,
            default_headers,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn build_query(&self, query: &QueryDescriptor, token: Option<&str>) -> HttpRequest {
        self.request(query.service(), HttpMethod::Get, query.path(), None, token)
    }

    /// Builds the request for `mutation`. `body` is sent as JSON when given;
    /// deletes normally pass `None`.
    pub fn build_mutation<B: Serialize + ?Sized>(
        &self,
        mutation: &MutationDescriptor,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.request(mutation.service(), mutation.method(), mutation.path(), body, token))
    }

    pub fn parse<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }

    /// Accepts any 2xx response and ignores its body.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    fn request(
        &self,
        service: Service,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
        token: Option<&str>,
    ) -> HttpRequest {
        let service = self.registry.get(service);
        let mut headers = self.default_headers.clone();
        if body.is_some() && !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        if let Some(token) = token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        HttpRequest {
            method,
            url: format!("{}{path}", service.base_url),
            headers,
            body,
            timeout: service.timeout,
        }
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
pub(crate) fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    match response.status {
        401 => Err(ApiError::Unauthorized),
        404 => Err(ApiError::NotFound),
        status => Err(ApiError::HttpError {
            status,
            body: response.body.clone(),
        }),
    }
}
