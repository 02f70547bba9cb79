//! Integration tests for slicekit.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p slicekit-integration-tests
//! ```
//!
//! No external service is needed: [`TestService::spawn`] starts an in-process
//! axum server on a random local port that speaks the same REST contract as
//! the production persistence service (paging headers, problem bodies, alert
//! headers, id checks). Records live in [`MemoryBackend`]s that tests can
//! inspect directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, LINK, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use slicekit::error::ID_NOT_FOUND_KEY;
use slicekit::pagination::{DEFAULT_PAGE_SIZE, TOTAL_COUNT_HEADER, link_header};
use slicekit::{
    ClientConfig, ConcurrencyPolicy, EntityBackend, MemoryBackend, Patch, Problem, QueryParams,
    RestClient, RestSlice, SliceError,
};
use slicekit_core::Entity;
use slicekit_core::entities::{Customer, Description, OrderItem, StrapColor};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Alert header prefix used by the test service.
pub const APP_NAME: &str = "slicekitApp";

const ERROR_HEADER: &str = "x-slicekitapp-error";
const PARAMS_HEADER: &str = "x-slicekitapp-params";
const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// A running in-process persistence service.
///
/// The server task is aborted when the service is dropped.
pub struct TestService {
    url: Url,
    pub strap_colors: MemoryBackend<StrapColor>,
    pub descriptions: MemoryBackend<Description>,
    pub customers: MemoryBackend<Customer>,
    pub order_items: MemoryBackend<OrderItem>,
    server: JoinHandle<()>,
}

impl TestService {
    /// Start a service with empty collections and no authentication.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if no local port can be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        Self::start(None).await
    }

    /// Start a service that rejects requests without `Authorization: Bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if no local port can be bound.
    pub async fn spawn_with_token(token: &str) -> std::io::Result<Self> {
        Self::start(Some(Arc::from(token))).await
    }

    async fn start(token: Option<Arc<str>>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = origin(addr)?;

        let strap_colors = MemoryBackend::new();
        let descriptions = MemoryBackend::new();
        let customers = MemoryBackend::new();
        let order_items = MemoryBackend::new();

        let mut app = Router::new()
            .merge(resource_routes(&strap_colors, &url))
            .merge(resource_routes(&descriptions, &url))
            .merge(resource_routes(&customers, &url))
            .merge(resource_routes(&order_items, &url));
        if let Some(token) = token {
            app = app.layer(middleware::from_fn_with_state(token, require_token));
        }

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Test service stopped: {e}");
            }
        });
        tracing::debug!(%addr, "Test service listening");

        Ok(Self {
            url,
            strap_colors,
            descriptions,
            customers,
            order_items,
            server,
        })
    }

    /// Service root URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Client configuration pointing at this service.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url.clone())
    }

    /// A REST client for this service.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::Network` if the HTTP client cannot be built.
    pub fn client(&self) -> Result<RestClient, SliceError> {
        RestClient::new(&self.config())
    }

    /// A fenced REST slice of entity type `E` against this service.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::Network` if the HTTP client cannot be built.
    pub fn slice<E: Entity>(&self) -> Result<RestSlice<E>, SliceError> {
        Ok(RestSlice::from_client(
            &self.client()?,
            ConcurrencyPolicy::Fenced,
        ))
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A URL on which nothing is listening.
///
/// # Errors
///
/// Returns an I/O error if no local port can be bound.
pub async fn unreachable_url() -> std::io::Result<Url> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    origin(addr)
}

fn origin(addr: SocketAddr) -> std::io::Result<Url> {
    Url::parse(&format!("http://{addr}"))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

// ============================================================================
// Routes
// ============================================================================

struct Resource<E: Entity> {
    records: MemoryBackend<E>,
    origin: Url,
}

impl<E: Entity> Clone for Resource<E> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            origin: self.origin.clone(),
        }
    }
}

fn resource_routes<E: Entity>(records: &MemoryBackend<E>, origin: &Url) -> Router {
    let collection = format!("/api/{}", E::DESCRIPTOR.path);
    let item = format!("{collection}/{{id}}");

    Router::new()
        .route(&collection, get(list::<E>).post(create::<E>))
        .route(
            &item,
            get(get_one::<E>)
                .put(update::<E>)
                .patch(partial_update::<E>)
                .delete(delete::<E>),
        )
        .with_state(Resource {
            records: records.clone(),
            origin: origin.clone(),
        })
}

async fn list<E: Entity>(
    State(resource): State<Resource<E>>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ServiceError> {
    let query = QueryParams::from_pairs(pairs);
    let page = resource
        .records
        .fetch_page(&query)
        .await
        .map_err(ServiceError::from_slice::<E>)?;

    let total = page.total_items.unwrap_or(page.items.len() as u64);
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(TOTAL_COUNT_HEADER), HeaderValue::from(total));

    let base = resource
        .origin
        .join(&uri.to_string())
        .map_err(|e| ServiceError::internal(e.to_string()))?;
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);
    let links = link_header(&base, query.page.unwrap_or(0), size, total);
    let value = HeaderValue::from_str(&links).map_err(|e| ServiceError::internal(e.to_string()))?;
    headers.insert(LINK, value);

    Ok((headers, Json(page.items)).into_response())
}

async fn get_one<E: Entity>(
    State(resource): State<Resource<E>>,
    Path(id): Path<i64>,
) -> Result<Json<E>, ServiceError> {
    resource
        .records
        .fetch_one(E::Id::from(id))
        .await
        .map(Json)
        .map_err(ServiceError::from_slice::<E>)
}

async fn create<E: Entity>(
    State(resource): State<Resource<E>>,
    Json(body): Json<Value>,
) -> Result<Response, ServiceError> {
    if body.get("id").is_some_and(|id| !id.is_null()) {
        return Err(ServiceError::bad_request::<E>(
            "idexists",
            format!("A new {} cannot already have an ID", entity_param::<E>()),
        ));
    }

    let entity: E = decode(body)?;
    let saved = resource
        .records
        .create(&entity)
        .await
        .map_err(ServiceError::from_slice::<E>)?;

    let location = format!(
        "/api/{}/{}",
        E::DESCRIPTOR.path,
        saved.id().map(|id| id.to_string()).unwrap_or_default()
    );
    let location =
        HeaderValue::from_str(&location).map_err(|e| ServiceError::internal(e.to_string()))?;
    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(saved)).into_response())
}

async fn update<E: Entity>(
    State(resource): State<Resource<E>>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<E>, ServiceError> {
    let entity: E = decode(body)?;
    let id = check_id::<E>(id, entity.id().map(Into::into))?;

    resource
        .records
        .update(id, &entity)
        .await
        .map(Json)
        .map_err(ServiceError::from_slice::<E>)
}

async fn partial_update<E: Entity>(
    State(resource): State<Resource<E>>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<E>, ServiceError> {
    let Value::Object(mut fields) = body else {
        return Err(ServiceError::bad_request::<E>(
            "http.400",
            "Patch body must be a JSON object".to_string(),
        ));
    };
    let body_id = fields.remove("id").and_then(|id| id.as_i64());
    let id = check_id::<E>(id, body_id)?;

    resource
        .records
        .patch(&Patch::from_fields(id, fields))
        .await
        .map(Json)
        .map_err(ServiceError::from_slice::<E>)
}

async fn delete<E: Entity>(
    State(resource): State<Resource<E>>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    resource
        .records
        .delete(E::Id::from(id))
        .await
        .map_err(ServiceError::from_slice::<E>)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn require_token(State(token): State<Arc<str>>, request: Request, next: Next) -> Response {
    let expected = format!("Bearer {token}");
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str());

    if authorized {
        next.run(request).await
    } else {
        ServiceError {
            status: StatusCode::UNAUTHORIZED,
            problem: Problem {
                title: Some("Unauthorized".to_string()),
                status: Some(StatusCode::UNAUTHORIZED.as_u16()),
                message: Some("error.http.401".to_string()),
                ..Problem::default()
            },
        }
        .into_response()
    }
}

/// Path id checks shared by PUT and PATCH.
fn check_id<E: Entity>(path_id: i64, body_id: Option<i64>) -> Result<E::Id, ServiceError> {
    match body_id {
        None => Err(ServiceError::bad_request::<E>("idnull", "Invalid id".to_string())),
        Some(body_id) if body_id != path_id => {
            Err(ServiceError::bad_request::<E>("idinvalid", "Invalid ID".to_string()))
        }
        Some(_) => Ok(E::Id::from(path_id)),
    }
}

fn decode<E: Entity>(body: Value) -> Result<E, ServiceError> {
    serde_json::from_value(body).map_err(|e| {
        ServiceError::bad_request::<E>("http.400", format!("Malformed {}: {e}", E::DESCRIPTOR.name))
    })
}

/// Entity name as the service reports it in `params`, e.g. `strapColor`.
fn entity_param<E: Entity>() -> String {
    let name = E::DESCRIPTOR.name;
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}

// ============================================================================
// Errors
// ============================================================================

/// A problem response.
#[derive(Debug)]
struct ServiceError {
    status: StatusCode,
    problem: Problem,
}

impl ServiceError {
    fn bad_request<E: Entity>(key: &str, title: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            problem: Problem {
                title: Some(title),
                status: Some(StatusCode::BAD_REQUEST.as_u16()),
                message: Some(format!("error.{key}")),
                params: Some(entity_param::<E>()),
                ..Problem::default()
            },
        }
    }

    fn internal(detail: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            problem: Problem {
                title: Some("Internal Server Error".to_string()),
                status: Some(StatusCode::INTERNAL_SERVER_ERROR.as_u16()),
                detail: Some(detail),
                message: Some("error.http.500".to_string()),
                ..Problem::default()
            },
        }
    }

    fn from_slice<E: Entity>(err: SliceError) -> Self {
        match err {
            SliceError::NotFound(detail) => Self {
                status: StatusCode::NOT_FOUND,
                problem: Problem {
                    title: Some("Not Found".to_string()),
                    status: Some(StatusCode::NOT_FOUND.as_u16()),
                    detail: Some(detail),
                    message: Some("error.http.404".to_string()),
                    params: Some(entity_param::<E>()),
                    ..Problem::default()
                },
            },
            SliceError::ValidationFailed {
                message,
                field_errors,
            } => Self {
                status: StatusCode::BAD_REQUEST,
                problem: Problem {
                    title: Some(message),
                    status: Some(StatusCode::BAD_REQUEST.as_u16()),
                    message: Some("error.validation".to_string()),
                    params: Some(entity_param::<E>()),
                    field_errors,
                    ..Problem::default()
                },
            },
            SliceError::Conflict(title) => Self {
                status: StatusCode::BAD_REQUEST,
                problem: Problem {
                    title: Some(title),
                    status: Some(StatusCode::BAD_REQUEST.as_u16()),
                    message: Some(ID_NOT_FOUND_KEY.to_string()),
                    params: Some(entity_param::<E>()),
                    ..Problem::default()
                },
            },
            SliceError::InvalidRequest(title) => Self::bad_request::<E>("http.400", title),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_CONTENT_TYPE));
        let alerts = [
            (ERROR_HEADER, self.problem.message.as_deref()),
            (PARAMS_HEADER, self.problem.params.as_deref()),
        ];
        for (name, value) in alerts {
            if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }

        let body = serde_json::to_vec(&self.problem).unwrap_or_default();
        (self.status, headers, body).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_param_is_camel_case() {
        assert_eq!(entity_param::<StrapColor>(), "strapColor");
        assert_eq!(entity_param::<OrderItem>(), "orderItem");
    }

    #[test]
    fn test_check_id_rules() {
        assert!(check_id::<StrapColor>(5, Some(5)).is_ok());

        let err = check_id::<StrapColor>(5, None).unwrap_err();
        assert_eq!(err.problem.message.as_deref(), Some("error.idnull"));

        let err = check_id::<StrapColor>(5, Some(6)).unwrap_err();
        assert_eq!(err.problem.message.as_deref(), Some("error.idinvalid"));
    }
}
