//! Single entry point routing each input mode to the right engine.

use crate::normalize::{Generator, NormalizeError, Normalizer};
use crate::progress::ProgressSink;
use crate::resolve::{ResolveError, Resolver};
use crate::subtitle::SubtitleSegment;
use crate::transport::Transport;
use thiserror::Error;
use tracing::info;

/// Where the subtitles come from.
#[derive(Debug, Clone)]
pub enum SubtitleSource {
    /// A Bilibili video URL or bare BV id.
    Url(String),
    /// An audio or video file to transcribe.
    Media { bytes: Vec<u8>, mime_type: String },
    /// Raw subtitle data pasted by the user.
    Text(String),
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl AcquireError {
    /// True when the failure was a connectivity problem rather than an
    /// application-level one.
    pub fn is_network_unreachable(&self) -> bool {
        match self {
            Self::Resolve(e) => e.is_network_unreachable(),
            Self::Normalize(e) => e.is_network_unreachable(),
        }
    }
}

/// Run one acquisition from `source` to a finished segment list.
/// A URL is resolved first and its payload then parsed like pasted text.
pub async fn acquire<T, G>(
    resolver: &Resolver<T>,
    normalizer: &Normalizer<G>,
    source: SubtitleSource,
    sink: &dyn ProgressSink,
) -> Result<Vec<SubtitleSegment>, AcquireError>
where
    T: Transport,
    G: Generator,
{
    let segments = match source {
        SubtitleSource::Url(reference) => {
            let raw = resolver.resolve(&reference, sink).await?;
            info!("downloaded {} bytes of subtitle data", raw.len());
            normalizer.normalize_from_text(&raw, sink).await?
        }
        SubtitleSource::Media { bytes, mime_type } => {
            normalizer
                .normalize_from_media(&bytes, &mime_type, sink)
                .await?
        }
        SubtitleSource::Text(raw) => normalizer.normalize_from_text(&raw, sink).await?,
    };
    Ok(segments)
}
