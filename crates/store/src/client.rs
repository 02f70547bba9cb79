//! REST client for the persistence service.
//!
//! Provides the production [`EntityBackend`]: one [`RestResource`] per entity
//! type, all sharing a single connection pool, base URL and credentials.

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE, LINK};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use slicekit_core::{Entity, EntityDescriptor};
use tracing::{debug, instrument};
use url::Url;

use crate::backend::{EntityBackend, Page};
use crate::config::ClientConfig;
use crate::error::SliceError;
use crate::pagination::{TOTAL_COUNT_HEADER, parse_link_header, parse_total_count};
use crate::patch::{MERGE_PATCH_CONTENT_TYPE, Patch};
use crate::query::QueryParams;

/// HTTP client for a JSON REST persistence service.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
}

struct RestClientInner {
    client: reqwest::Client,
    /// Service root, always with a trailing slash
    base_url: Url,
    token: Option<SecretString>,
    app_name: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &self.inner.token.as_ref().map(|_| "[REDACTED]"))
            .field("app_name", &self.inner.app_name)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, SliceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        let mut base_url = config.api_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(RestClientInner {
                client,
                base_url,
                token: config.api_token.clone(),
                app_name: config.app_name.clone(),
            }),
        })
    }

    /// Service root URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The REST resource for entity type `E`.
    #[must_use]
    pub fn resource<E: Entity>(&self) -> RestResource<E> {
        RestResource {
            client: self.clone(),
            _entity: PhantomData,
        }
    }

    /// URL of an entity collection, e.g. `<root>/api/strap-colors`.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::InvalidRequest` if the descriptor path is not a valid URL path.
    pub fn collection_url(&self, descriptor: &EntityDescriptor) -> Result<Url, SliceError> {
        self.inner
            .base_url
            .join(&descriptor.resource_path())
            .map_err(|e| SliceError::InvalidRequest(format!("bad resource path: {e}")))
    }

    /// URL of one record, e.g. `<root>/api/strap-colors/5`.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::InvalidRequest` if the descriptor path is not a valid URL path.
    pub fn item_url(
        &self,
        descriptor: &EntityDescriptor,
        id: impl Display,
    ) -> Result<Url, SliceError> {
        self.inner
            .base_url
            .join(&format!("{}/{id}", descriptor.resource_path()))
            .map_err(|e| SliceError::InvalidRequest(format!("bad resource path: {e}")))
    }

    /// Send a request, turning non-success responses into errors.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SliceError> {
        let request = match &self.inner.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request.header(ACCEPT, "application/json").send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!(%status, error = %err, "Failed to read error response body");
                String::new()
            }
        };
        Err(SliceError::from_response(
            status,
            &headers,
            &body,
            &self.inner.app_name,
        ))
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SliceError> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// The REST resource of one entity type.
pub struct RestResource<E> {
    client: RestClient,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for RestResource<E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for RestResource<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestResource")
            .field("client", &self.client)
            .finish()
    }
}

impl<E: Entity> EntityBackend<E> for RestResource<E> {
    #[instrument(skip(self), fields(entity_type = E::DESCRIPTOR.name))]
    async fn fetch_page(&self, query: &QueryParams) -> Result<Page<E>, SliceError> {
        let mut url = self.client.collection_url(E::DESCRIPTOR)?;
        query.append_to(&mut url);

        let response = self.client.send(self.client.inner.client.get(url)).await?;

        let headers = response.headers();
        let total_items = headers
            .get(TOTAL_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_total_count);
        let links = headers
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(parse_link_header)
            .unwrap_or_default();

        let items: Vec<E> = RestClient::decode(response).await?;
        debug!(count = items.len(), total_items = ?total_items, "Fetched page");

        Ok(Page {
            items,
            total_items,
            links,
        })
    }

    #[instrument(skip(self), fields(entity_type = E::DESCRIPTOR.name, %id))]
    async fn fetch_one(&self, id: E::Id) -> Result<E, SliceError> {
        let url = self.client.item_url(E::DESCRIPTOR, id)?;
        let response = self.client.send(self.client.inner.client.get(url)).await?;
        RestClient::decode(response).await
    }

    #[instrument(skip(self, entity), fields(entity_type = E::DESCRIPTOR.name))]
    async fn create(&self, entity: &E) -> Result<E, SliceError> {
        let url = self.client.collection_url(E::DESCRIPTOR)?;
        let response = self
            .client
            .send(self.client.inner.client.post(url).json(entity))
            .await?;
        RestClient::decode(response).await
    }

    #[instrument(skip(self, entity), fields(entity_type = E::DESCRIPTOR.name, %id))]
    async fn update(&self, id: E::Id, entity: &E) -> Result<E, SliceError> {
        let url = self.client.item_url(E::DESCRIPTOR, id)?;
        let response = self
            .client
            .send(self.client.inner.client.put(url).json(entity))
            .await?;
        RestClient::decode(response).await
    }

    #[instrument(skip(self, patch), fields(entity_type = E::DESCRIPTOR.name, id = %patch.id()))]
    async fn patch(&self, patch: &Patch<E>) -> Result<E, SliceError> {
        let url = self.client.item_url(E::DESCRIPTOR, patch.id())?;
        let body = serde_json::to_vec(&patch.to_body()?)?;
        let response = self
            .client
            .send(
                self.client
                    .inner
                    .client
                    .patch(url)
                    .header(CONTENT_TYPE, MERGE_PATCH_CONTENT_TYPE)
                    .body(body),
            )
            .await?;
        RestClient::decode(response).await
    }

    #[instrument(skip(self), fields(entity_type = E::DESCRIPTOR.name, %id))]
    async fn delete(&self, id: E::Id) -> Result<(), SliceError> {
        let url = self.client.item_url(E::DESCRIPTOR, id)?;
        self.client
            .send(self.client.inner.client.delete(url))
            .await?;
        Ok(())
    }
}

impl<E> RestResource<E> {
    /// The client this resource sends requests through.
    #[must_use]
    pub const fn client(&self) -> &RestClient {
        &self.client
    }
}
