//! Frame acquisition: the [`source::FrameSource`] seam, its ffmpeg-backed variants and the
//! [`set::FeedSet`] that gates a cycle on every source.

pub mod device;
pub(crate) mod ffmpeg;
pub mod file;
pub mod set;
pub mod source;

pub use ffmpeg::probe_video_size;
