//! Forwarding proxy (`kore proxy`).
//!
//! Exposes the REST API the dispatcher talks to under `/kore-extension/` and
//! relays each call to the course service, injecting the acting user.

mod forward;

use crate::config::ProxyConfig;
use crate::model::{Route, Verb};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Path prefix of every proxied route.
pub const PREFIX: &str = "/kore-extension";

pub struct ProxyState {
    client: reqwest::Client,
    /// Course service base, always ending in `/`
    upstream: url::Url,
    user: String,
}

impl ProxyState {
    pub fn new(config: &ProxyConfig) -> Result<Self, String> {
        let upstream = format!("{}/", config.upstream_url());
        let upstream = url::Url::parse(&upstream).map_err(|e| format!("Invalid upstream URL: {e}"))?;
        match upstream.scheme() {
            "http" | "https" => {}
            scheme => return Err(format!("Scheme \"{scheme}\" is not allowed; use http or https")),
        }
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Self {
            client,
            upstream,
            user: config.user.clone(),
        })
    }
}

fn method_filter(verb: Verb) -> MethodFilter {
    match verb {
        Verb::Get => MethodFilter::GET,
        Verb::Post => MethodFilter::POST,
        Verb::Put => MethodFilter::PUT,
        Verb::Patch => MethodFilter::PATCH,
        Verb::Delete => MethodFilter::DELETE,
    }
}

/// One route accepting `verbs`, each relayed upstream unchanged in method.
fn relay_route(route: Route, verbs: &[Verb]) -> MethodRouter<Arc<ProxyState>> {
    let mut router = MethodRouter::new();
    for &verb in verbs {
        router = router.on(
            method_filter(verb),
            move |State(state): State<Arc<ProxyState>>, body: Bytes| async move {
                forward::relay(&state, verb, route, body).await
            },
        );
    }
    router
}

/// Routes and the methods they accept.
const ROUTE_TABLE: &[(Route, &[Verb])] = &[
    (Route::Grades, &[Verb::Post]),
    (
        Route::Courses,
        &[Verb::Get, Verb::Post, Verb::Put, Verb::Patch, Verb::Delete],
    ),
    (Route::CoursesActive, &[Verb::Get]),
    (Route::CoursesCurrent, &[Verb::Get]),
    (Route::Assignments, &[Verb::Get, Verb::Post]),
    (Route::Problems, &[Verb::Get, Verb::Post]),
    (Route::Config, &[Verb::Get]),
    (Route::Title, &[Verb::Get]),
];

pub fn build_router(state: Arc<ProxyState>) -> Router {
    let allowed_origins = [
        axum::http::HeaderValue::from_static("http://localhost"),
        axum::http::HeaderValue::from_static("http://127.0.0.1"),
    ];
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins.to_vec())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let mut router = Router::new();
    for &(route, verbs) in ROUTE_TABLE {
        router = router.route(&format!("{PREFIX}/{route}"), relay_route(route, verbs));
    }
    router
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C.
pub async fn start_server(config: &ProxyConfig) -> Result<(), String> {
    let state = Arc::new(ProxyState::new(config)?);
    let upstream = state.upstream.clone();
    let app = build_router(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("Failed to bind {bind_addr}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {e}"))?;
    tracing::info!(%addr, %upstream, user = %config.user, "proxy listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .map_err(|e| format!("Proxy server error: {e}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
