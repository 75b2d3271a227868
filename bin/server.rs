// Playzone POS - API Server
// REST API with Axum over the shared venue state

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use playzone::reports::{daily_report, local_date, DailyReport};
use playzone::{
    ActiveSession, AppConfig, Bill, BillingConfig, Car, CarKind, CarStatus, CompletedTransaction,
    Expense, ExpenseDraft, MenuItem, MenuItemDraft, OrderItem, PaymentMethod, PosError,
    SessionError, SqliteStore, StoreError, Venue, PLAY_ZONES,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    venue: Arc<Mutex<Venue<SqliteStore>>>,
    config: Arc<AppConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Error with its HTTP status, rendered in the response wrapper
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

fn status_for(e: &PosError) -> StatusCode {
    match e {
        PosError::Validation(_) => StatusCode::BAD_REQUEST,
        PosError::NotFound { .. } => StatusCode::NOT_FOUND,
        PosError::Session(SessionError::UnknownSession(_)) => StatusCode::NOT_FOUND,
        PosError::Session(
            SessionError::ZoneOccupied(_)
            | SessionError::CarNotReady { .. }
            | SessionError::CarInUse(_),
        ) => StatusCode::CONFLICT,
        PosError::Session(_) => StatusCode::BAD_REQUEST,
        PosError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        PosError::Store(StoreError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
        PosError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        PosError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
        PosError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PosError> for ApiError {
    fn from(e: PosError) -> Self {
        let status = status_for(&e);
        let message = match e.hint() {
            Some(hint) => format!("{} ({})", e, hint),
            None => e.to_string(),
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", message);
        }
        ApiError::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

fn lock_venue(state: &AppState) -> Result<MutexGuard<'_, Venue<SqliteStore>>, ApiError> {
    state
        .venue
        .lock()
        .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "venue state poisoned"))
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Serialize)]
struct ZoneResponse {
    zone: &'static str,
    available: bool,
    session_id: Option<String>,
}

#[derive(Serialize)]
struct SessionResponse {
    #[serde(flatten)]
    session: ActiveSession,
    bill: Bill,
}

#[derive(Deserialize)]
struct StartSessionRequest {
    zone: String,
    car_ids: Vec<String>,
}

#[derive(Deserialize)]
struct AddOrderRequest {
    items: Vec<OrderItem>,
}

#[derive(Deserialize)]
struct CheckoutRequest {
    payment_method: PaymentMethod,
}

#[derive(Deserialize)]
struct CarRequest {
    id: String,
    name: String,
    kind: CarKind,
    purchase_price: i64,
    purchase_date: NaiveDate,
    lifespan_months: u32,
    #[serde(default)]
    is_new: bool,
}

#[derive(Deserialize)]
struct CarStatusRequest {
    status: CarStatus,
}

#[derive(Deserialize, Default)]
struct CarQuery {
    #[serde(default)]
    ready: bool,
    search: Option<String>,
}

#[derive(Deserialize, Default)]
struct DailyQuery {
    date: Option<NaiveDate>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/zones - Zones and their occupant
async fn get_zones(State(state): State<AppState>) -> ApiResult<Vec<ZoneResponse>> {
    let venue = lock_venue(&state)?;
    let zones = PLAY_ZONES
        .into_iter()
        .map(|zone| {
            let session_id = venue
                .active_sessions()
                .iter()
                .find(|s| s.zone == zone)
                .map(|s| s.id.clone());
            ZoneResponse {
                zone,
                available: session_id.is_none(),
                session_id,
            }
        })
        .collect();
    ok(zones)
}

/// GET /api/sessions - Active sessions with their running bill
async fn get_sessions(State(state): State<AppState>) -> ApiResult<Vec<SessionResponse>> {
    let venue = lock_venue(&state)?;
    let now = Utc::now();
    let sessions = venue
        .active_sessions()
        .iter()
        .map(|session| SessionResponse {
            session: session.clone(),
            bill: session.bill(now, venue.billing_config(), venue.menu()),
        })
        .collect();
    ok(sessions)
}

/// POST /api/sessions - Start a session
async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ActiveSession>>), ApiError> {
    let mut venue = lock_venue(&state)?;
    let session = venue.start_session(&req.zone, &req.car_ids, Utc::now())?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(session))))
}

/// POST /api/sessions/:id/orders - Append order lines
async fn add_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddOrderRequest>,
) -> ApiResult<ActiveSession> {
    let mut venue = lock_venue(&state)?;
    ok(venue.add_order(&id, req.items)?)
}

/// GET /api/sessions/:id/bill - Running bill as of now
async fn get_bill(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Bill> {
    let venue = lock_venue(&state)?;
    ok(venue.running_bill(&id, Utc::now())?)
}

/// POST /api/sessions/:id/checkout - Close the session
async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<CompletedTransaction> {
    let mut venue = lock_venue(&state)?;
    ok(venue.checkout(&id, req.payment_method, Utc::now())?)
}

/// GET /api/cars?ready=true&search=term
async fn get_cars(State(state): State<AppState>, Query(q): Query<CarQuery>) -> ApiResult<Vec<Car>> {
    let venue = lock_venue(&state)?;
    let cars: Vec<Car> = match (&q.search, q.ready) {
        (Some(term), _) => venue.search_ready_cars(term).into_iter().cloned().collect(),
        (None, true) => venue.ready_cars().into_iter().cloned().collect(),
        (None, false) => venue.cars().to_vec(),
    };
    ok(cars)
}

/// PUT /api/cars - Create (is_new) or edit a car
async fn save_car(State(state): State<AppState>, Json(req): Json<CarRequest>) -> ApiResult<Car> {
    let car = Car::new(
        &req.id,
        &req.name,
        req.kind,
        req.purchase_price,
        req.purchase_date,
        req.lifespan_months,
    );
    let mut venue = lock_venue(&state)?;
    ok(venue.save_car(car, req.is_new)?)
}

/// PUT /api/cars/:id/status - Manual status override
async fn set_car_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CarStatusRequest>,
) -> ApiResult<CarStatus> {
    let mut venue = lock_venue(&state)?;
    venue.set_car_status(&id, req.status)?;
    ok(req.status)
}

/// DELETE /api/cars/:id
async fn delete_car(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    let mut venue = lock_venue(&state)?;
    venue.delete_car(&id)?;
    ok(id)
}

/// GET /api/menu
async fn get_menu(State(state): State<AppState>) -> ApiResult<Vec<MenuItem>> {
    let venue = lock_venue(&state)?;
    ok(venue.menu().to_vec())
}

/// POST /api/menu
async fn add_menu_item(
    State(state): State<AppState>,
    Json(draft): Json<MenuItemDraft>,
) -> ApiResult<MenuItem> {
    let mut venue = lock_venue(&state)?;
    ok(venue.save_menu_item(None, draft)?)
}

/// PUT /api/menu/:id
async fn update_menu_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(draft): Json<MenuItemDraft>,
) -> ApiResult<MenuItem> {
    let mut venue = lock_venue(&state)?;
    ok(venue.save_menu_item(Some(id), draft)?)
}

/// DELETE /api/menu/:id
async fn delete_menu_item(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<i64> {
    let mut venue = lock_venue(&state)?;
    venue.delete_menu_item(id)?;
    ok(id)
}

/// GET /api/expenses
async fn get_expenses(State(state): State<AppState>) -> ApiResult<Vec<Expense>> {
    let venue = lock_venue(&state)?;
    ok(venue.expenses().to_vec())
}

/// POST /api/expenses
async fn add_expense(
    State(state): State<AppState>,
    Json(draft): Json<ExpenseDraft>,
) -> ApiResult<Expense> {
    let mut venue = lock_venue(&state)?;
    ok(venue.save_expense(None, draft)?)
}

/// PUT /api/expenses/:id
async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<ExpenseDraft>,
) -> ApiResult<Expense> {
    let mut venue = lock_venue(&state)?;
    ok(venue.save_expense(Some(&id), draft)?)
}

/// DELETE /api/expenses/:id
async fn delete_expense(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    let mut venue = lock_venue(&state)?;
    venue.delete_expense(&id)?;
    ok(id)
}

/// GET /api/config
async fn get_config(State(state): State<AppState>) -> ApiResult<BillingConfig> {
    let venue = lock_venue(&state)?;
    ok(*venue.billing_config())
}

/// PUT /api/config
async fn save_config(
    State(state): State<AppState>,
    Json(config): Json<BillingConfig>,
) -> ApiResult<BillingConfig> {
    let mut venue = lock_venue(&state)?;
    venue.save_billing_config(config)?;
    ok(config)
}

/// GET /api/reports/daily?date=YYYY-MM-DD (default: today at the venue)
async fn get_daily_report(
    State(state): State<AppState>,
    Query(q): Query<DailyQuery>,
) -> ApiResult<DailyReport> {
    let offset = state.config.offset();
    let date = q.date.unwrap_or_else(|| local_date(Utc::now(), offset));
    let venue = lock_venue(&state)?;
    ok(daily_report(venue.transactions(), date, offset))
}

/// GET /api/transactions - Completed transactions, newest first
async fn get_transactions(State(state): State<AppState>) -> ApiResult<Vec<CompletedTransaction>> {
    let venue = lock_venue(&state)?;
    ok(venue.transactions().to_vec())
}

/// Require `Authorization: Bearer <key>` when an operator key is configured
async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.config.api_key.as_deref() else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided == Some(expected) {
        next.run(req).await
    } else {
        log::warn!("Rejected request to {} without a valid API key", req.uri().path());
        ApiError::new(StatusCode::UNAUTHORIZED, "missing or invalid API key").into_response()
    }
}

fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/zones", get(get_zones))
        .route("/sessions", get(get_sessions).post(start_session))
        .route("/sessions/:id/orders", post(add_order))
        .route("/sessions/:id/bill", get(get_bill))
        .route("/sessions/:id/checkout", post(checkout))
        .route("/cars", get(get_cars).put(save_car))
        .route("/cars/:id", delete(delete_car))
        .route("/cars/:id/status", put(set_car_status))
        .route("/menu", get(get_menu).post(add_menu_item))
        .route("/menu/:id", put(update_menu_item).delete(delete_menu_item))
        .route("/expenses", get(get_expenses).post(add_expense))
        .route("/expenses/:id", put(update_expense).delete(delete_expense))
        .route("/config", get(get_config).put(save_config))
        .route("/reports/daily", get(get_daily_report))
        .route("/transactions", get(get_transactions))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    println!("🌐 Playzone POS - API Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = AppConfig::from_env();

    let venue = match SqliteStore::open(&config.db_path)
        .map_err(PosError::from)
        .and_then(|store| Venue::load(store.with_actor("api")))
    {
        Ok(venue) => venue,
        Err(e) => {
            eprintln!("❌ Could not open {}: {}", config.db_path.display(), e);
            if let Some(hint) = e.hint() {
                eprintln!("   {}", hint);
            }
            eprintln!("   Run: playzone init");
            std::process::exit(1);
        }
    };
    println!("✓ Database opened: {}", config.db_path.display());
    println!(
        "✓ {} cars, {} menu items, {} active sessions",
        venue.cars().len(),
        venue.menu().len(),
        venue.active_sessions().len()
    );
    if config.api_key.is_none() {
        println!("⚠️  PLAYZONE_API_KEY not set: API is open to anyone who can reach it");
    }

    let bind = config.bind.clone();
    let state = AppState {
        venue: Arc::new(Mutex::new(venue)),
        config: Arc::new(config),
    };
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("❌ Failed to bind to {}: {}", bind, e);
            std::process::exit(1);
        }
    };

    println!("\n🚀 Server running on http://{}", bind);
    println!("   API: http://{}/api/sessions", bind);
    println!("\n   Press Ctrl+C to stop\n");

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("❌ Server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use playzone::seed_defaults;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state(api_key: Option<&str>) -> AppState {
        let mut store = SqliteStore::open_in_memory().unwrap();
        seed_defaults(&mut store).unwrap();
        let config = AppConfig {
            api_key: api_key.map(str::to_string),
            ..AppConfig::default()
        };
        AppState {
            venue: Arc::new(Mutex::new(Venue::load(store).unwrap())),
            config: Arc::new(config),
        }
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        let body = match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&PosError::Validation(vec![])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SessionError::ZoneOccupied("Track 1".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&StoreError::Unavailable("x".into()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&StoreError::Unauthorized("x".into()).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&PosError::not_found("car", "R9")),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let app = build_router(test_state(None));

        let (status, body) = call(
            &app,
            "POST",
            "/api/sessions",
            Some(json!({ "zone": "Track 1", "car_ids": ["R1", "R2"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/sessions/{}/orders", id),
            Some(json!({ "items": [{ "menu_item_id": 2, "quantity": 2 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, bill) = call(&app, "GET", &format!("/api/sessions/{}/bill", id), None).await;
        assert_eq!(bill["data"]["order_cost"], 44_000);

        let (status, body) = call(
            &app,
            "POST",
            "/api/sessions",
            Some(json!({ "zone": "Track 1", "car_ids": ["R3"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/sessions/{}/checkout", id),
            Some(json!({ "payment_method": "EWallet" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["payment_method"], "EWallet");

        let (_, zones) = call(&app, "GET", "/api/zones", None).await;
        assert_eq!(zones["data"][0]["available"], true);
    }

    #[tokio::test]
    async fn test_api_key_required_except_health() {
        let app = build_router(test_state(Some("secret")));

        let (status, _) = call(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", "/api/cars", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let request = HttpRequest::builder()
            .uri("/api/cars?ready=true")
            .header(header::AUTHORIZATION, "Bearer secret")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validation_is_bad_request() {
        let app = build_router(test_state(None));
        let (status, body) = call(
            &app,
            "POST",
            "/api/menu",
            Some(json!({ "name": "", "price": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("name"));
    }
}
