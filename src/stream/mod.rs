//! Motion-JPEG streaming to HTTP clients.
//!
//! A [`StreamSession`] turns the frames of the active camera into a
//! `multipart/x-mixed-replace` body, one JPEG per part, written through any
//! [`tokio::io::AsyncWrite`].

mod multipart;
mod session;

pub use multipart::{
    part_header, MultipartWriter, BOUNDARY, PART_CONTENT_TYPE, STREAM_CONTENT_TYPE,
};
pub use session::{is_disconnect, SessionEnd, SessionError, SessionSummary, StreamSession};
