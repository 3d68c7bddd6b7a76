//! Server and camera configuration.
//!
//! Loaded once at startup from a TOML file. Camera entries become
//! [`CameraDescriptor`]s; the pipeline never looks at the file again.

use super::PixelFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the config file looked up in the default search path.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// One configured camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// Display name.
    pub name: String,
    /// Device identifier, e.g. `/dev/video0` or `stub://demo`.
    pub device: String,
    /// Requested pixel format.
    pub format: PixelFormat,
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
}

/// HTTP server and capture timing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address. A leading `:` binds all interfaces (`:8080`).
    pub address: String,
    /// Minimum time between captured frames; absent or 0 runs free.
    pub interval_ms: Option<u64>,
    /// How long a capture loop waits for the device before logging a timeout.
    pub frame_timeout_ms: u64,
    /// How long shutdown waits for each capture loop to stop.
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            interval_ms: None,
            frame_timeout_ms: 5_000,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl ServerConfig {
    /// Parses the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = match self.address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.address.clone(),
        };
        address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.address.clone()))
    }

    /// Minimum time between captures; `None` when unset or zero.
    pub fn min_interval(&self) -> Option<Duration> {
        self.interval_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// Upper bound on one wait for a frame.
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    /// How long shutdown waits for capture loops and connections.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("no cameras configured")]
    NoCameras,
    #[error("camera {0:?}: invalid frame dimensions")]
    InvalidDimensions(String),
    #[error("camera name {0:?} is used more than once")]
    DuplicateName(String),
    #[error("camera {0:?}: device must not be empty")]
    EmptyDevice(String),
    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),
    #[error("frame timeout must be greater than zero")]
    InvalidTimeout,
    #[error("no config file found (searched {0})")]
    NotFound(String),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cameras: Vec<CameraDescriptor>,
}

impl FileConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Loads `explicit` if given, otherwise the first file found in
    /// [`search_paths`].
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let candidates = search_paths();
        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => {
                tracing::info!(path = %path.display(), "using config file");
                Self::from_file(path)
            }
            None => Err(ConfigError::NotFound(
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        if self.server.frame_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.cameras.is_empty() {
            return Err(ConfigError::NoCameras);
        }
        let mut names = HashSet::with_capacity(self.cameras.len());
        for camera in &self.cameras {
            if !names.insert(camera.name.as_str()) {
                return Err(ConfigError::DuplicateName(camera.name.clone()));
            }
            if camera.device.trim().is_empty() {
                return Err(ConfigError::EmptyDevice(camera.name.clone()));
            }
            if camera.width == 0 || camera.height == 0 {
                return Err(ConfigError::InvalidDimensions(camera.name.clone()));
            }
        }
        Ok(())
    }
}

/// Default config locations, most specific first: working directory,
/// `$HOME/.camjam`, `/etc/camjam`.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".camjam").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/camjam").join(CONFIG_FILE_NAME));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        address = ":9000"
        interval_ms = 40

        [[cameras]]
        name = "front"
        device = "/dev/video0"
        format = "YUYV"
        width = 640
        height = 480

        [[cameras]]
        name = "rear"
        device = "stub://rear"
        format = "MJPG"
        width = 1280
        height = 720
    "#;

    #[test]
    fn test_parse_sample() {
        let config = FileConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[0].format, PixelFormat::Yuyv);
        assert_eq!(config.cameras[1].format, PixelFormat::Mjpeg);
        assert_eq!(
            config.server.socket_addr().unwrap(),
            "0.0.0.0:9000".parse().unwrap()
        );
        assert_eq!(config.server.min_interval(), Some(Duration::from_millis(40)));
        assert_eq!(config.server.frame_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let text = SAMPLE.replace("\"YUYV\"", "\"H264\"");
        let err = FileConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(&err, ConfigError::ParseError(msg) if msg.contains("H264")));
    }

    #[test]
    fn test_no_cameras_rejected() {
        let err = FileConfig::from_toml_str("[server]\naddress = \"127.0.0.1:1\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::NoCameras));
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let text = SAMPLE.replace("width = 640", "width = 0");
        assert!(matches!(
            FileConfig::from_toml_str(&text),
            Err(ConfigError::InvalidDimensions(name)) if name == "front"
        ));
    }

    #[test]
    fn test_zero_interval_runs_free() {
        let server = ServerConfig {
            interval_ms: Some(0),
            ..Default::default()
        };
        assert_eq!(server.min_interval(), None);
    }

    #[test]
    fn test_bad_address() {
        let server = ServerConfig {
            address: "not an address".into(),
            ..Default::default()
        };
        assert!(matches!(
            server.socket_addr(),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_example_file_parses() {
        let config =
            FileConfig::from_toml_str(include_str!("../../config.example.toml")).unwrap();
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[1].format, PixelFormat::Yuyv);
        assert_eq!(config.server.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_duplicate_camera_names_rejected() {
        let text = SAMPLE.replace("name = \"rear\"", "name = \"front\"");
        let err = FileConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(name) if name == "front"));
    }
}
