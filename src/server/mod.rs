//! Runtime assembly and lifecycle.
//!
//! [`Server::start`] initializes every configured camera, starts one
//! capture loop per camera that came up, and wires the frame buses into a
//! [`Switchboard`]. [`Server::serve`] exposes it over HTTP until the
//! shutdown token fires, then stops the capture loops.

mod http;

pub use http::router;

use crate::bus::{FrameBus, Switchboard};
use crate::capture::{
    Camera, CameraDriver, CameraInfo, CaptureLoop, CaptureSettings, CaptureWorker, ConfigError,
    FileConfig,
};
use crate::metrics::{MetricsError, MetricsRegistry};
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Errors that can occur while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("no cameras were configured")]
    NoCameras,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to bind to address: {0}")]
    Bind(#[source] io::Error),
    #[error("failed to start capture loop: {0}")]
    Spawn(#[source] io::Error),
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
    #[error("server error: {0}")]
    Server(String),
}

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub cameras: Arc<[CameraInfo]>,
    pub switchboard: Arc<Switchboard>,
    pub metrics: Arc<MetricsRegistry>,
    pub shutdown: CancellationToken,
}

/// Running cameras plus everything needed to serve them.
pub struct Server {
    state: AppState,
    workers: Vec<CaptureWorker>,
    shutdown_grace: Duration,
}

impl Server {
    /// Initializes the configured cameras and starts capturing.
    ///
    /// Cameras that fail to open or configure are logged and left out; the
    /// remaining ones are indexed in configuration order. Fails only when no
    /// camera could be started.
    pub fn start(config: &FileConfig, driver: &dyn CameraDriver) -> Result<Self, ServerError> {
        config.validate()?;
        let metrics = Arc::new(MetricsRegistry::new()?);
        let settings = CaptureSettings::from(&config.server);

        let mut cameras = Vec::with_capacity(config.cameras.len());
        for descriptor in &config.cameras {
            match Camera::initialize(cameras.len(), descriptor, driver) {
                Ok(camera) => cameras.push(camera),
                Err(e) => tracing::error!(
                    camera = %descriptor.name,
                    device = %descriptor.device,
                    error = %e,
                    "could not initialize camera, skipping"
                ),
            }
        }

        let infos: Vec<CameraInfo> = cameras.iter().map(Camera::info).collect();
        let buses: Vec<FrameBus> = cameras.iter().map(|_| FrameBus::new()).collect();
        let switchboard = Switchboard::new(buses.clone()).ok_or(ServerError::NoCameras)?;

        let mut workers = Vec::with_capacity(cameras.len());
        for (camera, bus) in cameras.into_iter().zip(buses) {
            let capture = CaptureLoop::new(camera, bus, settings, Arc::clone(&metrics));
            workers.push(capture.spawn().map_err(ServerError::Spawn)?);
        }

        tracing::info!(
            cameras = workers.len(),
            configured = config.cameras.len(),
            "camera capture started"
        );

        Ok(Self {
            state: AppState {
                cameras: infos.into(),
                switchboard: Arc::new(switchboard),
                metrics,
                shutdown: CancellationToken::new(),
            },
            workers,
            shutdown_grace: config.server.shutdown_grace(),
        })
    }

    /// Handler state: cameras, switchboard, metrics and shutdown token.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Cameras that started, indexed by id.
    pub fn cameras(&self) -> &[CameraInfo] {
        &self.state.cameras
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Serves HTTP on `listener` until the shutdown token is cancelled, then
    /// stops capture.
    ///
    /// Open streams end when the token fires. If connections have not
    /// drained within the shutdown grace period they are dropped.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr().map_err(ServerError::Bind)?;
        let token = self.shutdown_token();
        let app = router(self.state()).into_make_service_with_connect_info::<SocketAddr>();

        let mut http = tokio::spawn(
            axum::serve(listener, app)
                .with_graceful_shutdown(token.clone().cancelled_owned())
                .into_future(),
        );
        tracing::info!(addr = %addr, "listening");

        let served = tokio::select! {
            result = &mut http => result,
            _ = token.cancelled() => {
                match tokio::time::timeout(self.shutdown_grace, &mut http).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!("http connections did not drain in time");
                        http.abort();
                        Ok(Ok(()))
                    }
                }
            }
        };

        self.shutdown().await;

        match served {
            Ok(Ok(())) => {
                tracing::info!("http server shutdown");
                Ok(())
            }
            Ok(Err(e)) => Err(ServerError::Server(e.to_string())),
            Err(e) => Err(ServerError::Server(e.to_string())),
        }
    }

    /// Ends open streams and stops every capture loop, waiting at most the
    /// shutdown grace period overall.
    pub async fn shutdown(self) {
        self.state.shutdown.cancel();

        let grace = self.shutdown_grace;
        let workers = self.workers;
        if let Err(e) = tokio::task::spawn_blocking(move || stop_workers(workers, grace)).await {
            tracing::error!(error = %e, "capture shutdown task failed");
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("cameras", &self.state.cameras.len())
            .field("workers", &self.workers.len())
            .finish()
    }
}

/// Signals all loops first so they wind down in parallel, then waits for
/// each against a shared deadline. Returns how many stopped in time.
fn stop_workers(workers: Vec<CaptureWorker>, grace: Duration) -> usize {
    for worker in &workers {
        tracing::debug!(camera = %worker.name(), "stopping capture loop");
        worker.signal_stop();
    }

    let total = workers.len();
    let deadline = Instant::now() + grace;
    let stopped = workers
        .into_iter()
        .map(|worker| worker.wait_stopped(deadline.saturating_duration_since(Instant::now())))
        .filter(|&ok| ok)
        .count();

    if stopped == total {
        tracing::info!(cameras = total, "all cameras stopped");
    } else {
        tracing::warn!(
            stopped,
            stuck = total - stopped,
            "some capture loops did not stop within the grace period"
        );
    }
    stopped
}
