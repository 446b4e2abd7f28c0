//! Bilingual subtitle acquisition for Bilibili videos.
//! Subtitles come from a video URL, an uploaded media file or pasted raw
//! data, and all three end up as the same numbered segment list.

pub mod config;
pub mod media;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod resolve;
pub mod srt;
pub mod subtitle;
pub mod transport;

pub use config::Config;
pub use pipeline::{acquire, AcquireError, SubtitleSource};
pub use subtitle::SubtitleSegment;
