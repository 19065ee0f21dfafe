// 🌐 HTTP API - JSON surface over the shopping list (feature "server")
//
// The store sits behind one mutex: every mutation, and the snapshot it saves,
// is serialized through it the same way screen events are dispatched one at a
// time on the device.

use crate::actions;
use crate::catalog::{CatalogItem, CatalogProvider, StaticCatalog, CATEGORIES};
use crate::db::{PurchaseArchive, PurchaseRecord, SqliteArchive};
use crate::entry::{ListEntry, ManualItemForm};
use crate::filter::filter_catalog;
use crate::identity::IdentityKeyBuilder;
use crate::session::SessionToken;
use crate::store::{AddOutcome, ShoppingListStore};
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const ACTOR: &str = "api";

// ============================================================================
// STATE
// ============================================================================

/// Store plus the key builder that feeds it
#[derive(Debug, Default)]
pub struct ListState {
    pub store: ShoppingListStore,
    pub keys: IdentityKeyBuilder,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    list: Arc<Mutex<ListState>>,
    catalog: Arc<StaticCatalog>,
    db: Arc<Mutex<SqliteArchive>>,
}

impl AppState {
    pub fn new(store: ShoppingListStore, catalog: StaticCatalog, db: SqliteArchive) -> Self {
        AppState {
            list: Arc::new(Mutex::new(ListState {
                store,
                keys: IdentityKeyBuilder::new(),
            })),
            catalog: Arc::new(catalog),
            db: Arc::new(Mutex::new(db)),
        }
    }
}

// A panic while holding the lock leaves the data usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// RESPONSES
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

#[derive(Serialize)]
struct ListResponse {
    items: Vec<ListEntry>,
    count: usize,
    estimated_total: f64,
}

impl ListResponse {
    fn from_store(store: &ShoppingListStore) -> Self {
        Self {
            items: store.shopping_list().to_vec(),
            count: store.len(),
            estimated_total: store.estimated_total(),
        }
    }
}

#[derive(Serialize)]
struct AddResponse {
    entry: ListEntry,
    merged: bool,
}

#[derive(Serialize)]
struct RemoveResponse {
    removed: bool,
}

#[derive(Serialize)]
struct PurchaseResponse {
    purchased: Option<ListEntry>,
    archived: bool,
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub query: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddFromCatalog {
    pub catalog_id: String,
    pub unit: Option<String>,
    pub quantity: Option<String>,
}

// Raw token from `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

// ============================================================================
// LIST ACCESS
// ============================================================================

/// Run a list mutation with the list and the database locked, off the async workers
///
/// Lock order is list then db, everywhere. The snapshot a mutation saves is
/// written before the next mutation can start.
async fn with_list<T, F>(state: &AppState, f: F) -> Result<T, Response>
where
    F: FnOnce(&mut ListState, &SqliteArchive) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let list = state.list.clone();
    let db = state.db.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let mut list = lock(&list);
        let db = lock(&db);
        f(&mut *list, &*db)
    })
    .await;

    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::warn!("failed to save shopping list: {:#}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save shopping list"))
        }
        Err(e) => {
            tracing::warn!("list task failed: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update shopping list"))
        }
    }
}

fn added_response(entry: ListEntry, outcome: AddOutcome) -> Response {
    let merged = matches!(outcome, AddOutcome::Merged { .. });
    (StatusCode::CREATED, Json(ApiResponse::ok(AddResponse { entry, merged }))).into_response()
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/catalog?query=&category= - Search the catalog
async fn search_catalog(
    State(state): State<AppState>,
    Query(params): Query<CatalogQuery>,
) -> impl IntoResponse {
    let items: Vec<CatalogItem> = filter_catalog(
        state.catalog.items(),
        &params.query,
        params.category.as_deref(),
    )
    .into_iter()
    .cloned()
    .collect();

    Json(ApiResponse::ok(items))
}

/// GET /api/catalog/recommended - Home screen recommendations
async fn recommended(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.catalog.recommended().to_vec()))
}

/// GET /api/categories - Categories for the manual form
async fn categories() -> impl IntoResponse {
    Json(ApiResponse::ok(CATEGORIES.to_vec()))
}

/// GET /api/list - Pending list
async fn get_list(State(state): State<AppState>) -> impl IntoResponse {
    let list = lock(&state.list);
    Json(ApiResponse::ok(ListResponse::from_store(&list.store)))
}

/// POST /api/list/catalog - Add a catalog product
async fn add_from_catalog(
    State(state): State<AppState>,
    Json(body): Json<AddFromCatalog>,
) -> Response {
    let Some(item) = state.catalog.find(&body.catalog_id).cloned() else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Unknown catalog item: {}", body.catalog_id),
        );
    };

    let added = with_list(&state, move |list, db| {
        let ListState { store, keys } = list;
        let entry = ListEntry::from_catalog(&item, body.unit.as_deref(), body.quantity.as_deref(), keys);
        let outcome = actions::add_entry(db.connection(), store, entry.clone(), ACTOR)?;
        Ok((entry, outcome))
    })
    .await;

    match added {
        Ok((entry, outcome)) => added_response(entry, outcome),
        Err(response) => response,
    }
}

/// POST /api/list/manual - Add an item typed in by hand
async fn add_manual(State(state): State<AppState>, Json(form): Json<ManualItemForm>) -> Response {
    let validated = match form.validate() {
        Ok(validated) => validated,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let added = with_list(&state, move |list, db| {
        let ListState { store, keys } = list;
        let entry = ListEntry::from_form(&validated, keys);
        let outcome = actions::add_entry(db.connection(), store, entry.clone(), ACTOR)?;
        Ok((entry, outcome))
    })
    .await;

    match added {
        Ok((entry, outcome)) => added_response(entry, outcome),
        Err(response) => response,
    }
}

/// DELETE /api/list/:id - Remove an entry (absent id is not an error)
async fn remove_entry(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let removed = with_list(&state, move |list, db| {
        actions::remove_entry(db.connection(), &mut list.store, &id, ACTOR)
    })
    .await;

    match removed {
        Ok(removed) => Json(ApiResponse::ok(RemoveResponse { removed: removed.is_some() })).into_response(),
        Err(response) => response,
    }
}

/// POST /api/list/:id/purchase - Move an entry to the purchase history
///
/// With a bearer token the purchase is also archived for that user.
async fn purchase_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let token = bearer_token(&headers);
    let purchased = with_list(&state, move |list, db| {
        let Some(entry) = actions::purchase_entry(db.connection(), &mut list.store, &id, ACTOR)? else {
            return Ok((None, false));
        };
        let archived = actions::archive_purchase(db, token.as_deref(), &entry, Utc::now()).is_archived();
        Ok((Some(entry), archived))
    })
    .await;

    match purchased {
        Ok((purchased, archived)) => {
            Json(ApiResponse::ok(PurchaseResponse { purchased, archived })).into_response()
        }
        Err(response) => response,
    }
}

/// GET /api/recent - Recently purchased, newest first
async fn recent(State(state): State<AppState>) -> impl IntoResponse {
    let list = lock(&state.list);
    Json(ApiResponse::ok(list.store.recently_purchased().to_vec()))
}

/// POST /api/recent/:id/buy-again - Put a purchased entry back on the list
async fn buy_again(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let lookup_id = id.clone();
    let readded = with_list(&state, move |list, db| {
        actions::buy_again(db.connection(), &mut list.store, &lookup_id, ACTOR)
    })
    .await;

    match readded {
        Ok(Some((entry, outcome))) => added_response(entry, outcome),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("Not in purchase history: {}", id)),
        Err(response) => response,
    }
}

/// GET /api/purchases - Archived purchases of the signed-in user
async fn purchases(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = bearer_token(&headers);
    let user_id = match SessionToken::from_optional(token.as_deref()).and_then(|t| t.user_id()) {
        Ok(user_id) => user_id,
        Err(e) => return error_response(StatusCode::UNAUTHORIZED, e.to_string()),
    };

    let db = state.db.clone();
    let fetched = tokio::task::spawn_blocking(move || {
        let archive = lock(&db);
        archive.fetch_purchases(&user_id)
    })
    .await;

    match fetched {
        Ok(Ok(records)) => (StatusCode::OK, Json(ApiResponse::<Vec<PurchaseRecord>>::ok(records))).into_response(),
        Ok(Err(e)) => {
            tracing::warn!("purchase fetch failed: {:?}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            tracing::warn!("purchase fetch task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load purchases")
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/catalog", get(search_catalog))
        .route("/catalog/recommended", get(recommended))
        .route("/categories", get(categories))
        .route("/list", get(get_list))
        .route("/list/catalog", post(add_from_catalog))
        .route("/list/manual", post(add_manual))
        .route("/list/:id", delete(remove_entry))
        .route("/list/:id/purchase", post(purchase_entry))
        .route("/recent", get(recent))
        .route("/recent/:id/buy-again", post(buy_again))
        .route("/purchases", get(purchases))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::load_snapshot;
    use crate::session::token_for;
    use crate::store::AddPolicy;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rusqlite::Connection;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let db = SqliteArchive::new(Connection::open_in_memory().unwrap()).unwrap();
        AppState::new(ShoppingListStore::new(), StaticCatalog::with_defaults(), db)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(test_state());
        let (status, body) = send(&app, get_req("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_catalog_search() {
        let app = router(test_state());

        let (_, body) = send(&app, get_req("/api/catalog?query=app")).await;
        let names: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Apple"]);

        let (_, body) = send(&app, get_req("/api/catalog?category=Meat%20%26%20Fish")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_purchase_flow() {
        let state = test_state();
        let app = router(state.clone());

        let (status, body) = send(
            &app,
            json_req("POST", "/api/list/catalog", json!({"catalog_id": "1", "quantity": "2"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["entry"]["id"], "1-lb-2");

        let purchase = Request::builder()
            .method("POST")
            .uri("/api/list/1-lb-2/purchase")
            .header(AUTHORIZATION, format!("Bearer {}", token_for("alex")))
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(&app, purchase).await;
        assert_eq!(body["data"]["purchased"]["name"], "Apple");
        assert_eq!(body["data"]["archived"], true);

        let (_, body) = send(&app, get_req("/api/list")).await;
        assert_eq!(body["data"]["count"], 0);

        let (_, body) = send(&app, get_req("/api/recent")).await;
        assert_eq!(body["data"][0]["id"], "1-lb-2");

        let history = Request::builder()
            .uri("/api/purchases")
            .header(AUTHORIZATION, format!("Bearer {}", token_for("alex")))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, history).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["entry"]["name"], "Apple");
    }

    #[tokio::test]
    async fn test_unknown_catalog_item() {
        let app = router(test_state());
        let (status, body) = send(
            &app,
            json_req("POST", "/api/list/catalog", json!({"catalog_id": "999"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_manual_form_validation() {
        let app = router(test_state());

        let (status, body) = send(
            &app,
            json_req("POST", "/api/list/manual", json!({"name": "Rice"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please choose a category");

        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/api/list/manual",
                json!({"name": "Rice", "category": "Pantry", "unit": "kg", "quantity": "2"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["entry"]["unit"], "kg");
        assert_eq!(body["data"]["entry"]["price"], 0.0);
    }

    #[tokio::test]
    async fn test_remove_absent_is_ok() {
        let app = router(test_state());
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/list/missing")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["removed"], false);
    }

    #[tokio::test]
    async fn test_purchases_requires_login() {
        let app = router(test_state());
        let (status, body) = send(&app, get_req("/api/purchases")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Not logged in");
    }

    #[tokio::test]
    async fn test_buy_again() {
        let state = test_state();
        let app = router(state.clone());

        send(&app, json_req("POST", "/api/list/catalog", json!({"catalog_id": "8"}))).await;
        send(&app, json_req("POST", "/api/list/8-loaf-1/purchase", json!({}))).await;

        let (status, _) = send(&app, json_req("POST", "/api/recent/8-loaf-1/buy-again", json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let list = lock(&state.list);
        assert_eq!(list.store.len(), 1);
        assert_eq!(list.store.recently_purchased().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_adds_save_latest_snapshot() {
        let state = test_state();
        let app = router(state.clone());

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let app = app.clone();
                tokio::spawn(async move {
                    let request = json_req(
                        "POST",
                        "/api/list/manual",
                        json!({"name": format!("Item {}", i), "category": "Pantry"}),
                    );
                    app.oneshot(request).await.unwrap().status()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::CREATED);
        }

        let in_memory = lock(&state.list).store.shopping_list().to_vec();
        let db = lock(&state.db);
        let saved = load_snapshot(db.connection(), AddPolicy::Append).unwrap();

        assert_eq!(in_memory.len(), 40);
        assert_eq!(saved.shopping_list(), in_memory.as_slice());
    }

    #[tokio::test]
    async fn test_purchase_with_malformed_token_still_purchases() {
        let state = test_state();
        let app = router(state.clone());
        send(&app, json_req("POST", "/api/list/catalog", json!({"catalog_id": "8"}))).await;

        let purchase = Request::builder()
            .method("POST")
            .uri("/api/list/8-loaf-1/purchase")
            .header(AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, purchase).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["purchased"]["id"], "8-loaf-1");
        assert_eq!(body["data"]["archived"], false);
        assert_eq!(lock(&state.list).store.recently_purchased().len(), 1);
    }
}
