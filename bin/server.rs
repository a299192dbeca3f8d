// Company Registry - Web Server
// JSON API over the company store with Axum

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use company_registry::{
    import_from_file, init_logging, Company, CompanySearch, ImportOptions, ImportResult, Page,
    RecordStore, RegistryConfig, SearchConfig, SqliteStore, StoreError, Suggestion,
    SuggestionAggregator,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info, Level};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    search: SearchConfig,
    import: ImportOptions,
}

impl AppState {
    fn store(&self) -> MutexGuard<'_, SqliteStore> {
        // A panicked request cannot leave the connection half-written: upserts are transactional
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(error.into()),
        }
    }
}

fn store_failure(context: &str, e: StoreError) -> Response {
    error!(error = %e, "{}", context);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::failed(format!("{}: {}", context, e))),
    )
        .into_response()
}

#[derive(Deserialize)]
struct PageParams {
    page: Option<usize>,
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    page: Option<usize>,
}

#[derive(Deserialize)]
struct ImportRequest {
    path: String,
}

#[derive(Serialize)]
struct SuggestionsResponse {
    suggestions: Vec<Suggestion>,
}

#[derive(Serialize)]
struct StatsResponse {
    companies_count: usize,
}

#[derive(Serialize)]
struct ClearResponse {
    deleted: usize,
    message: &'static str,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/companies - Paginated list of all companies
async fn list_companies(State(state): State<AppState>, Query(params): Query<PageParams>) -> Response {
    let store = state.store();

    match CompanySearch::new(&*store, state.search).list(params.page.unwrap_or(1), None) {
        Ok(page) => (StatusCode::OK, Json(ApiResponse::ok(page))).into_response(),
        Err(e) => store_failure("Error listing companies", e),
    }
}

/// GET /api/companies/search - Paginated search on name, city or CoC number
async fn search_companies(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let store = state.store();
    let search = CompanySearch::new(&*store, state.search);

    let result: Result<Page<Company>, StoreError> =
        search.search(params.q.as_deref(), params.page.unwrap_or(1), None);

    match result {
        Ok(page) => (StatusCode::OK, Json(ApiResponse::ok(page))).into_response(),
        Err(e) => store_failure("Error searching companies", e),
    }
}

/// GET /api/companies/autocomplete - Typed suggestions for a partial query
async fn autocomplete(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let store = state.store();

    match SuggestionAggregator::new(&*store, state.search).suggest(params.q.as_deref()) {
        Ok(suggestions) => (StatusCode::OK, Json(SuggestionsResponse { suggestions })).into_response(),
        Err(e) => store_failure("Error building suggestions", e),
    }
}

/// GET /api/admin/stats - Number of stored companies
async fn admin_stats(State(state): State<AppState>) -> Response {
    match state.store().count_all() {
        Ok(companies_count) => {
            (StatusCode::OK, Json(ApiResponse::ok(StatsResponse { companies_count }))).into_response()
        }
        Err(e) => store_failure("Error counting companies", e),
    }
}

/// POST /api/admin/import - Import a CSV file already on the server's disk
async fn admin_import(State(state): State<AppState>, Json(request): Json<ImportRequest>) -> Response {
    let path = request.path.clone();

    // File IO and SQLite writes block; keep them off the async workers
    let joined = tokio::task::spawn_blocking(move || {
        let store = state.store();
        import_from_file(&*store, &path, state.import)
    })
    .await;

    let result: ImportResult = match joined {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "import task failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::failed(format!("Import task failed: {}", e))),
            )
                .into_response();
        }
    };

    if result.is_success() {
        info!(path = %request.path, "{}", result.success_message());
        (StatusCode::OK, Json(ApiResponse::ok(result))).into_response()
    } else {
        let message = result.error_message().unwrap_or_default();
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse {
                success: false,
                data: result,
                error: Some(message),
            }),
        )
            .into_response()
    }
}

/// POST /api/admin/clear - Delete every company
async fn admin_clear(State(state): State<AppState>) -> Response {
    match state.store().delete_all() {
        Ok(deleted) => (
            StatusCode::OK,
            Json(ApiResponse::ok(ClearResponse {
                deleted,
                message: "All company data has been cleared.",
            })),
        )
            .into_response(),
        Err(e) => store_failure("Error clearing companies", e),
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/companies", get(list_companies))
        .route("/companies/search", get(search_companies))
        .route("/companies/autocomplete", get(autocomplete))
        .route("/admin/stats", get(admin_stats))
        .route("/admin/import", post(admin_import))
        .route("/admin/clear", post(admin_clear))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use anyhow::Context;

    init_logging(Level::INFO)?;

    let config = RegistryConfig::load().context("Failed to load configuration")?;

    let store = SqliteStore::open(&config.database_path, config.import.created_at_policy)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        search: config.search,
        import: config.import.options(),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind_address))?;

    info!(address = %config.server.bind_address, "server running");

    axum::serve(listener, router(state))
        .await
        .context("Server failed")?;

    Ok(())
}
