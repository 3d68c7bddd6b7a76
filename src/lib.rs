//! CamJam Library
//!
//! A multi-camera motion-JPEG streaming server. Every configured camera is
//! captured continuously; HTTP clients receive the currently selected
//! camera as a `multipart/x-mixed-replace` stream and the selection can be
//! switched at runtime for all viewers at once.
//!
//! # Architecture
//!
//! Each camera owns a capture loop. Frames flow one way:
//!
//! ```text
//! device → capture loop → convert → frame bus ─┐
//!                                              ├→ stream session → client
//!                          camera selector ────┘
//! ```
//!
//! - **capture**: opens devices, negotiates format, runs one loop per camera
//! - **convert**: turns raw YUYV into JPEG, passes MJPEG through
//! - **bus**: per-camera latest-frame slot plus the shared selection
//! - **stream**: per-client multipart writer that follows the selection
//! - **server**: startup, HTTP routes and shutdown
//!
//! # Example
//!
//! ```no_run
//! use camjam::{capture::SystemDriver, FileConfig, Server};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FileConfig::from_toml_str(
//!     r#"
//!     [[cameras]]
//!     name = "bench"
//!     device = "stub://bench"
//!     format = "YUYV"
//!     width = 640
//!     height = 480
//!     "#,
//! )?;
//!
//! let server = Server::start(&config, &SystemDriver)?;
//! let listener = tokio::net::TcpListener::bind(config.server.socket_addr()?).await?;
//! server.serve(listener).await?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod bus;
pub mod capture;
pub mod convert;
pub mod metrics;
pub mod server;
pub mod stream;

// Re-export commonly used types at crate root
pub use bus::{CameraSelector, FrameBus, Switchboard};
pub use capture::{CameraDescriptor, CameraDriver, CameraInfo, FileConfig, Frame, PixelFormat};
pub use metrics::MetricsRegistry;
pub use server::{AppState, Server, ServerError};
pub use stream::StreamSession;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
