//! Discovery of video device nodes under `/dev`.

use std::io;
use std::path::{Path, PathBuf};

const DEVICE_PREFIXES: [&str; 4] = ["video", "radio", "vbi", "v4l-subdev"];

/// A device node that looks like a V4L device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub path: PathBuf,
    /// Card name reported by the driver, when it could be queried.
    pub card: Option<String>,
}

/// Whether a `/dev` entry name belongs to the V4L family.
pub fn is_v4l_device(name: &str) -> bool {
    DEVICE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Lists V4L device nodes in `/dev`, sorted by path.
pub fn list_devices() -> io::Result<Vec<DeviceInfo>> {
    list_devices_in(Path::new("/dev"))
}

/// Lists V4L device nodes in `dir`, sorted by path.
pub fn list_devices_in(dir: &Path) -> io::Result<Vec<DeviceInfo>> {
    let mut devices = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_v4l_device(name) {
            continue;
        }
        let path = entry.path();
        let card = card_name(&path);
        devices.push(DeviceInfo { path, card });
    }
    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

#[cfg(feature = "v4l2")]
fn card_name(path: &Path) -> Option<String> {
    match v4l::Device::with_path(path).and_then(|device| device.query_caps()) {
        Ok(caps) => Some(caps.card.trim_end_matches('\0').to_string()),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not query device");
            None
        }
    }
}

#[cfg(not(feature = "v4l2"))]
fn card_name(_path: &Path) -> Option<String> {
    None
}
