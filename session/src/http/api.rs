//! Intercepted API client used by every authenticated call.

use std::sync::Arc;

use log::debug;
use reqwest::{Method, Response};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use super::client::join_url;
use super::RefreshCoordinator;
use crate::error::{http_error, Error, HttpErrorKind};

/// Client for the application API.
///
/// Every request goes through the auth middleware: it carries the current access
/// token and is transparently renewed and replayed once on 401. Non-success
/// statuses that survive that cycle are returned as `HttpErrorKind::Status`.
#[derive(Clone)]
pub struct ApiClient {
    client: ClientWithMiddleware,
    base_url: Url,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(client: ClientWithMiddleware, base_url: Url, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            client,
            base_url,
            coordinator,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Renewal state shared with the auth middleware.
    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        self.coordinator.clone()
    }

    /// Start a request for a path relative to the API origin.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, join_url(&self.base_url, path))
    }

    /// Send a request, turning non-success statuses into errors.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, Error> {
        let response = request.send().await?;
        error_for_status(response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self.send(self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::PUT, path).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::PATCH, path).json(body)).await?;
        Ok(response.json().await?)
    }

    /// DELETE a resource, ignoring any response body.
    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

pub(crate) async fn error_for_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let path = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    debug!("{path} answered {status}: {body}");

    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    Err(http_error(HttpErrorKind::Status(status.as_u16()), &message))
}
