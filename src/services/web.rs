//! Axum-based HTTP server for the layout monitor and driver.
//!
//! Every route is a `POST` taking a form-encoded body and answering in plain
//! text. Any other method gets 501, like a request the server cannot serve.
//!
//! Monitor:
//! - `/monitor/trains`, `/monitor/train-state`, `/monitor/train-peripherals`
//! - `/monitor/track-outputs`, `/monitor/points`, `/monitor/signals`
//! - `/monitor/point-aspects`, `/monitor/signal-aspects`, `/monitor/segments`
//!
//! Driver:
//! - `/driver/session`, `/driver/session/end`
//! - `/driver/grab-train`, `/driver/release-train`
//! - `/driver/set-speed`, `/driver/emergency-stop`, `/driver/set-peripheral`
//! - `/driver/set-point`, `/driver/set-signal`, `/driver/set-track-output`

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::State,
    handler::Handler,
    http::StatusCode,
    response::IntoResponse,
    routing::{post, MethodRouter},
    Form, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::WebConfig;

use super::api::{
    AccessoryParams, GrabParams, PeripheralParams, PointParams, SessionParams, SignalParams,
    SpeedParams, TrackOutputParams, TrainParams,
};
use super::http_handler::{ApiResult, LayoutApiHandler};
use super::shared::LayoutProvider;

type Shared<P> = State<Arc<LayoutApiHandler<P>>>;

/// Form fields, or all-missing if the body is absent or unreadable.
fn params<T: Default>(form: Option<Form<T>>) -> T {
    form.map(|Form(p)| p).unwrap_or_default()
}

// ============================================================================
// Monitor Handlers
// ============================================================================

async fn trains<P: LayoutProvider + 'static>(State(h): Shared<P>) -> ApiResult {
    h.trains()
}

async fn train_state<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<TrainParams>>,
) -> ApiResult {
    h.train_state(params(form).train.as_deref())
}

async fn train_peripherals<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<TrainParams>>,
) -> ApiResult {
    h.train_peripherals(params(form).train.as_deref())
}

async fn track_outputs<P: LayoutProvider + 'static>(State(h): Shared<P>) -> ApiResult {
    h.track_outputs()
}

async fn points<P: LayoutProvider + 'static>(State(h): Shared<P>) -> ApiResult {
    h.points()
}

async fn signals<P: LayoutProvider + 'static>(State(h): Shared<P>) -> ApiResult {
    h.signals()
}

async fn point_aspects<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<PointParams>>,
) -> ApiResult {
    h.point_aspects(params(form).point.as_deref())
}

async fn signal_aspects<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<SignalParams>>,
) -> ApiResult {
    h.signal_aspects(params(form).signal.as_deref())
}

async fn segments<P: LayoutProvider + 'static>(State(h): Shared<P>) -> ApiResult {
    h.segments()
}

// ============================================================================
// Driver Handlers
// ============================================================================

async fn open_session<P: LayoutProvider + 'static>(State(h): Shared<P>) -> ApiResult {
    h.open_session()
}

async fn end_session<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<SessionParams>>,
) -> ApiResult {
    h.end_session(params(form).session.as_deref())
}

async fn grab_train<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<GrabParams>>,
) -> ApiResult {
    let p = params(form);
    h.grab_train(p.session.as_deref(), p.train.as_deref())
}

async fn release_train<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<GrabParams>>,
) -> ApiResult {
    let p = params(form);
    h.release_train(p.session.as_deref(), p.train.as_deref())
}

async fn set_speed<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<SpeedParams>>,
) -> ApiResult {
    let p = params(form);
    h.set_speed(
        p.session.as_deref(),
        p.train.as_deref(),
        p.speed.as_deref(),
        p.direction.as_deref(),
    )
}

async fn emergency_stop<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<GrabParams>>,
) -> ApiResult {
    let p = params(form);
    h.emergency_stop(p.session.as_deref(), p.train.as_deref())
}

async fn set_peripheral<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<PeripheralParams>>,
) -> ApiResult {
    let p = params(form);
    h.set_peripheral(
        p.session.as_deref(),
        p.train.as_deref(),
        p.peripheral.as_deref(),
        p.state.as_deref(),
    )
}

async fn set_point<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<AccessoryParams>>,
) -> ApiResult {
    let p = params(form);
    h.set_point(p.session.as_deref(), p.id.as_deref(), p.aspect.as_deref())
}

async fn set_signal<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<AccessoryParams>>,
) -> ApiResult {
    let p = params(form);
    h.set_signal(p.session.as_deref(), p.id.as_deref(), p.aspect.as_deref())
}

async fn set_track_output<P: LayoutProvider + 'static>(
    State(h): Shared<P>,
    form: Option<Form<TrackOutputParams>>,
) -> ApiResult {
    let p = params(form);
    h.set_track_output(p.session.as_deref(), p.id.as_deref(), p.state.as_deref())
}

/// Any method other than POST on a known route
async fn wrong_method() -> impl IntoResponse {
    (StatusCode::NOT_IMPLEMENTED, "only POST is supported")
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

fn on_post<H, T, S>(handler: H) -> MethodRouter<S>
where
    H: Handler<T, S>,
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    post(handler).fallback(wrong_method)
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            cors_permissive: true,
        }
    }
}

impl WebServerConfig {
    /// Create a new config with the given address
    pub fn new(addr: impl Into<SocketAddr>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set whether CORS should be permissive
    pub fn cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Create from shared WebConfig
    ///
    /// # Errors
    ///
    /// Fails if `bind_address` is not an IP address.
    pub fn from_config(config: &WebConfig) -> Result<Self, std::net::AddrParseError> {
        let ip: IpAddr = config.bind_address.as_str().parse()?;
        Ok(Self {
            addr: SocketAddr::new(ip, config.port),
            cors_permissive: config.cors_permissive,
        })
    }
}

/// Build the Axum router with all routes
pub fn build_router<P: LayoutProvider + 'static>(provider: P, config: &WebServerConfig) -> Router {
    let handler = Arc::new(LayoutApiHandler::new(provider));

    let mut router = Router::new()
        // Monitor
        .route("/monitor/trains", on_post(trains::<P>))
        .route("/monitor/train-state", on_post(train_state::<P>))
        .route("/monitor/train-peripherals", on_post(train_peripherals::<P>))
        .route("/monitor/track-outputs", on_post(track_outputs::<P>))
        .route("/monitor/points", on_post(points::<P>))
        .route("/monitor/signals", on_post(signals::<P>))
        .route("/monitor/point-aspects", on_post(point_aspects::<P>))
        .route("/monitor/signal-aspects", on_post(signal_aspects::<P>))
        .route("/monitor/segments", on_post(segments::<P>))
        // Driver
        .route("/driver/session", on_post(open_session::<P>))
        .route("/driver/session/end", on_post(end_session::<P>))
        .route("/driver/grab-train", on_post(grab_train::<P>))
        .route("/driver/release-train", on_post(release_train::<P>))
        .route("/driver/set-speed", on_post(set_speed::<P>))
        .route("/driver/emergency-stop", on_post(emergency_stop::<P>))
        .route("/driver/set-peripheral", on_post(set_peripheral::<P>))
        .route("/driver/set-point", on_post(set_point::<P>))
        .route("/driver/set-signal", on_post(set_signal::<P>))
        .route("/driver/set-track-output", on_post(set_track_output::<P>))
        // Fallback
        .fallback(not_found)
        .with_state(handler);

    // Add CORS if requested
    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Serve the layout until `shutdown` resolves.
///
/// # Example
///
/// ```ignore
/// let shared = Arc::new(SharedLayout::new(layout));
/// run_server_with_state(shared, WebServerConfig::default(), async {
///     let _ = tokio::signal::ctrl_c().await;
/// })
/// .await?;
/// ```
pub async fn run_server_with_state<P, F>(
    provider: P,
    config: WebServerConfig,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    P: LayoutProvider + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(provider, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "web server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
