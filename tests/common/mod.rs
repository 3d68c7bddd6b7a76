//! Shared fixtures for integration tests.
#![allow(dead_code)]

use bytes::Bytes;
use camjam::capture::{
    CameraDescriptor, CameraDriver, CameraError, CameraHandle, NegotiatedFormat, ServerConfig,
};
use camjam::{FileConfig, PixelFormat, Server, ServerError};
use futures::TryStreamExt;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

/// Releases frames from a gated fake camera one at a time.
#[derive(Debug, Clone, Default)]
pub struct Gate(Arc<(Mutex<u64>, Condvar)>);

impl Gate {
    pub fn release(&self, frames: u64) {
        let (pending, ready) = &*self.0;
        *pending.lock().unwrap() += frames;
        ready.notify_all();
    }

    fn wait(&self, timeout: Duration) -> bool {
        let (pending, ready) = &*self.0;
        let guard = pending.lock().unwrap();
        let (mut guard, _) = ready
            .wait_timeout_while(guard, timeout, |pending| *pending == 0)
            .unwrap();
        if *guard == 0 {
            return false;
        }
        *guard -= 1;
        true
    }
}

/// How a fake camera produces frames.
#[derive(Debug, Clone)]
pub enum Mode {
    /// A frame is ready only after [`Gate::release`]; otherwise waits time out.
    Gated(Gate),
    /// A frame every `period`.
    FreeRunning(Duration),
    /// Every wait fails with an I/O error.
    Failing,
}

/// Driver serving fake MJPEG cameras whose frames read `"<device>#<n>"`.
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    cameras: HashMap<String, Mode>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, device: &str, mode: Mode) -> Self {
        self.cameras.insert(device.to_string(), mode);
        self
    }
}

impl CameraDriver for FakeDriver {
    fn open(&self, device: &str) -> Result<Box<dyn CameraHandle>, CameraError> {
        match self.cameras.get(device) {
            Some(mode) => Ok(Box::new(FakeCamera {
                device: device.to_string(),
                mode: mode.clone(),
                format: None,
                streaming: false,
                frames: 0,
            })),
            None => Err(CameraError::DeviceOpenFailed {
                device: device.to_string(),
                reason: "no such device".to_string(),
            }),
        }
    }
}

struct FakeCamera {
    device: String,
    mode: Mode,
    format: Option<NegotiatedFormat>,
    streaming: bool,
    frames: u64,
}

impl CameraHandle for FakeCamera {
    fn negotiate_format(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<NegotiatedFormat, CameraError> {
        let negotiated = NegotiatedFormat {
            format,
            width,
            height,
        };
        self.format = Some(negotiated);
        Ok(negotiated)
    }

    fn set_buffer_depth(&mut self, _depth: u32) -> Result<(), CameraError> {
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), CameraError> {
        self.streaming = true;
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), CameraError> {
        self.streaming = false;
        Ok(())
    }

    fn wait_for_frame(&mut self, timeout: Duration) -> Result<(), CameraError> {
        if !self.streaming {
            return Err(CameraError::NotStreaming);
        }
        match &self.mode {
            Mode::Gated(gate) => {
                if gate.wait(timeout) {
                    Ok(())
                } else {
                    Err(CameraError::Timeout)
                }
            }
            Mode::FreeRunning(period) => {
                std::thread::sleep((*period).min(timeout));
                Ok(())
            }
            Mode::Failing => {
                std::thread::sleep(Duration::from_millis(5));
                Err(CameraError::Io(io::Error::other("device unplugged")))
            }
        }
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, CameraError> {
        self.frames += 1;
        Ok(format!("{}#{}", self.device, self.frames).into_bytes())
    }
}

/// MJPEG descriptors for `devices`, named `cam0`, `cam1`, ...
pub fn config(devices: &[&str], frame_timeout: Duration) -> FileConfig {
    FileConfig {
        server: ServerConfig {
            address: "127.0.0.1:0".to_string(),
            frame_timeout_ms: frame_timeout.as_millis() as u64,
            shutdown_grace_ms: 2_000,
            ..Default::default()
        },
        cameras: devices
            .iter()
            .enumerate()
            .map(|(i, device)| CameraDescriptor {
                name: format!("cam{i}"),
                device: device.to_string(),
                format: PixelFormat::Mjpeg,
                width: 64,
                height: 48,
            })
            .collect(),
    }
}

/// A server listening on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub async fn start(server: Server) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = server.shutdown_token();
        let task = tokio::spawn(server.serve(listener));
        Self {
            addr,
            shutdown,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Reads one multipart part body, skipping delimiter and headers. `None`
/// at end of stream.
pub async fn read_part<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<Bytes> {
    let mut length = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if let Some(value) = line.strip_prefix("Content-Length: ") {
            length = value.parse::<usize>().ok();
        } else if line.is_empty() && length.is_some() {
            break;
        }
    }
    let mut body = vec![0u8; length?];
    reader.read_exact(&mut body).await.ok()?;
    Some(Bytes::from(body))
}

/// Feeds the parts of a streaming response into a channel, so tests can
/// wait on them with timeouts.
pub fn stream_parts(response: reqwest::Response) -> mpsc::UnboundedReceiver<String> {
    let body = Box::pin(response.bytes_stream().map_err(io::Error::other));
    let mut reader = BufReader::new(StreamReader::new(body));
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(part) = read_part(&mut reader).await {
            if tx.send(String::from_utf8_lossy(&part).into_owned()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Waits for the next part, failing the test after `timeout`.
pub async fn next_part(parts: &mut mpsc::UnboundedReceiver<String>, timeout: Duration) -> String {
    tokio::time::timeout(timeout, parts.recv())
        .await
        .expect("timed out waiting for a part")
        .expect("stream ended")
}
