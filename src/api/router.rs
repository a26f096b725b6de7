//! HTTP routing configuration with rate limiting, CORS and the error boundary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode, header},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
};
use governor::{Quota, RateLimiter};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span, info_span, warn};

use crate::app::AppState;
use crate::domain::AppError;
use crate::infra::config::{AppConfig, RateLimitConfig};

use super::error::{error_boundary, panic_to_error};
use super::handlers::{
    agent_query_handler, entity_history_handler, get_entity_handler, health_check_handler,
    list_entities_handler, liveness_handler, metrics_handler, nearby_entities_handler,
    not_found_handler, readiness_handler,
};
use super::middleware::{
    API_KEY_HEADER, REQUEST_ID_HEADER, RequestId, auth_middleware, request_id_middleware,
};
use super::query::{enforce_query_rules, entity_list_rules, history_rules, nearby_rules};

/// Agent request bodies above this size are rejected with 413.
pub const MAX_AGENT_BODY_BYTES: usize = 16 * 1024;

/// Router-level settings that do not belong in [`AppState`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub request_timeout: Duration,
    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimitConfig>,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            rate_limit: None,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl From<&AppConfig> for RouterConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            rate_limit: config.rate_limit.clone(),
            cors_allowed_origins: config.cors_allowed_origins.clone(),
        }
    }
}

type KeyedLimiter = governor::RateLimiter<
    IpAddr,
    governor::state::keyed::DashMapStateStore<IpAddr>,
    governor::clock::DefaultClock,
>;

/// Shared rate limiter state (keyed by client IP to prevent global DoS)
pub struct RateLimitState {
    api_limiter: KeyedLimiter,
    health_limiter: KeyedLimiter,
    config: RateLimitConfig,
}

fn quota(rps: u32, burst: u32) -> Quota {
    let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rps);
    Quota::per_second(rps).allow_burst(burst)
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            api_limiter: RateLimiter::dashmap(quota(config.general_rps, config.general_burst)),
            health_limiter: RateLimiter::dashmap(quota(config.health_rps, config.health_burst)),
            config,
        }
    }
}

/// Extract client IP from request (X-Forwarded-For, X-Real-IP, or ConnectInfo).
/// Falls back to 0.0.0.0 when unknown; unknown clients share one bucket.
fn client_ip_from_request<B>(request: &Request<B>) -> IpAddr {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    };
    if let Some(ip) = header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip")) {
        return ip;
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn rate_limited(limit: u32, limiter: &KeyedLimiter, ip: IpAddr) -> Option<Response<Body>> {
    let not_until = limiter.check_key(&ip).err()?;
    let wait_time = not_until.wait_time_from(governor::clock::Clock::now(
        &governor::clock::DefaultClock::default(),
    ));
    let retry_after = wait_time.as_secs().max(1);

    let mut response =
        AppError::operational(429, "Rate limit exceeded. Please slow down your requests.")
            .into_response();
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    Some(response)
}

/// Rate limit middleware for API endpoints (per-IP to prevent global DoS)
async fn rate_limit_api_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let limit = rate_limit.config.general_rps;
    let client_ip = client_ip_from_request(&request);
    if let Some(response) = rate_limited(limit, &rate_limit.api_limiter, client_ip) {
        return response;
    }
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("X-RateLimit-Limit", HeaderValue::from(limit));
    response
}

/// Rate limit middleware for health endpoints (per-IP to prevent global DoS)
async fn rate_limit_health_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = client_ip_from_request(&request);
    match rate_limited(
        rate_limit.config.health_rps,
        &rate_limit.health_limiter,
        client_ip,
    ) {
        Some(response) => response,
        None => next.run(request).await,
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}

fn api_routes(app_state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let entity_routes = Router::new()
        .route(
            "/",
            get(list_entities_handler).route_layer(middleware::from_fn_with_state(
                Arc::new(entity_list_rules()),
                enforce_query_rules,
            )),
        )
        .route("/{id}", get(get_entity_handler))
        .route(
            "/{id}/history",
            get(entity_history_handler).route_layer(middleware::from_fn_with_state(
                Arc::new(history_rules()),
                enforce_query_rules,
            )),
        );

    let geo_routes = Router::new().route(
        "/nearby",
        get(nearby_entities_handler).route_layer(middleware::from_fn_with_state(
                Arc::new(nearby_rules()),
                enforce_query_rules,
            )),
    );

    let agent_routes = Router::new()
        .route("/{agent}/query", post(agent_query_handler))
        .layer(DefaultBodyLimit::max(MAX_AGENT_BODY_BYTES))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(app_state),
            auth_middleware,
        ));

    Router::new()
        .nest("/entities", entity_routes)
        .nest("/geo", geo_routes)
        .nest("/agents", agent_routes)
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check_handler))
        .route("/live", get(liveness_handler))
        .route("/ready", get(readiness_handler))
}

/// Request span tagged with the id assigned by [`request_id_middleware`].
fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.as_str())
        .unwrap_or_default();
    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        %request_id,
    )
}

/// Builds the full router.
///
/// Layer order, outermost first: error boundary, request id, trace,
/// timeout, CORS, panic catcher, then per-group rate limits and auth.
pub fn build_router(app_state: Arc<AppState>, config: &RouterConfig) -> Router {
    let environment = app_state.environment;

    let mut api = api_routes(&app_state);
    let mut health = health_routes();
    if let Some(rate_limit) = config.rate_limit.clone() {
        let rate_limit_state = Arc::new(RateLimitState::new(rate_limit));
        api = api.layer(middleware::from_fn_with_state(
            Arc::clone(&rate_limit_state),
            rate_limit_api_middleware,
        ));
        health = health.layer(middleware::from_fn_with_state(
            rate_limit_state,
            rate_limit_health_middleware,
        ));
    }

    let middleware = ServiceBuilder::new()
        .layer(middleware::from_fn_with_state(environment, error_boundary))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(CatchPanicLayer::custom(panic_to_error));

    Router::new()
        .nest("/api", api)
        .nest("/health", health)
        .route("/metrics", get(metrics_handler))
        .fallback(not_found_handler)
        .layer(middleware)
        .with_state(app_state)
}

/// Create router without rate limiting
pub fn create_router(app_state: Arc<AppState>) -> Router {
    build_router(app_state, &RouterConfig::default())
}

/// Create router with rate limiting enabled
pub fn create_router_with_rate_limit(app_state: Arc<AppState>, config: RateLimitConfig) -> Router {
    build_router(
        app_state,
        &RouterConfig {
            rate_limit: Some(config),
            ..RouterConfig::default()
        },
    )
}
