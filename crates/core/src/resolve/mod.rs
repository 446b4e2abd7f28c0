//! Resolution of a Bilibili video reference into a raw subtitle payload.
//! This module wires the metadata lookup, track discovery and download.

pub mod api;

use crate::config::Config;
use crate::progress::{ProgressEvent, ProgressSink, Stage};
use crate::transport::{relayed, Transport, TransportError};
use api::{ApiResponse, PageInfo, PlayerData, Track, ViewData};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use url::Url;

static BVID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"BV[a-zA-Z0-9]+").expect("BV pattern is valid"));

/// Errors that end a resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid Bilibili reference {0:?}: it must contain a BV id (e.g. BV1xx...)")]
    InvalidReference(String),

    #[error("failed to fetch video metadata: {0}")]
    MetadataFetch(#[source] TransportError),

    #[error("video metadata could not be decoded: {0}")]
    MetadataDecode(#[source] serde_json::Error),

    #[error("Bilibili API error {code}: {message}")]
    Upstream { code: i64, message: String },

    #[error("could not find a content id for page {page}")]
    PageNotFound { page: u32 },

    #[error("no subtitles (CC or AI) found for this video, try transcribing the media instead")]
    NoSubtitlesAvailable,

    #[error("subtitle track {id} has no URL")]
    MissingTrackUrl { id: i64 },

    #[error("failed to download subtitle content: {0}")]
    PayloadFetch(#[source] TransportError),
}

impl ResolveError {
    /// True when the failure came from an unreachable host or relay.
    pub fn is_network_unreachable(&self) -> bool {
        match self {
            Self::MetadataFetch(e) | Self::PayloadFetch(e) => e.is_unreachable(),
            _ => false,
        }
    }
}

/// Resolves video references through the Bilibili web API.
pub struct Resolver<T> {
    transport: T,
    api_base: String,
    relay: Option<String>,
    preferred_languages: Vec<String>,
}

impl<T: Transport> Resolver<T> {
    /// Create a resolver that reaches the API through `transport`.
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            api_base: config.bilibili_api_base.trim_end_matches('/').to_string(),
            relay: config.relay_url.clone(),
            preferred_languages: config.preferred_languages.clone(),
        }
    }

    /// Turn `reference` into the raw body of its best subtitle track.
    /// The body is returned untouched; its shape is the normalizer's concern.
    pub async fn resolve(
        &self,
        reference: &str,
        sink: &dyn ProgressSink,
    ) -> Result<String, ResolveError> {
        trace!("resolve reference={}", reference);
        let bvid = extract_bvid(reference)
            .ok_or_else(|| ResolveError::InvalidReference(reference.to_string()))?;
        let page = page_number(reference);

        sink.emit(ProgressEvent::new(
            Stage::FetchingMetadata,
            format!("Fetching video metadata for {bvid} (page {page})..."),
        ));
        let view = self.fetch_view(bvid).await?;
        let aid = view.aid.ok_or_else(|| ResolveError::Upstream {
            code: 0,
            message: "response has no AID".to_string(),
        })?;
        let cid = pick_cid(view.pages.as_deref().unwrap_or_default(), page)?;
        let mut tracks = view.subtitle.map(|s| s.list).unwrap_or_default();
        debug!("view API listed {} track(s)", tracks.len());

        sink.emit(ProgressEvent::new(
            Stage::ListingTracks,
            format!("Video found (AID: {aid}, CID: {cid}). Checking for subtitle tracks..."),
        ));
        if let Some(extra) = self.player_tracks(aid, cid).await {
            merge_tracks(&mut tracks, extra);
        }
        if tracks.is_empty() {
            return Err(ResolveError::NoSubtitlesAvailable);
        }

        let track = select_track(&tracks, &self.preferred_languages)
            .ok_or(ResolveError::NoSubtitlesAvailable)?;
        info!(
            "selected subtitle track {} ({})",
            track.id,
            track.lan_doc.as_deref().unwrap_or(&track.lan)
        );
        if track.subtitle_url.trim().is_empty() {
            return Err(ResolveError::MissingTrackUrl { id: track.id });
        }
        let track_url = normalize_track_url(&track.subtitle_url);

        sink.emit(ProgressEvent::new(
            Stage::DownloadingTrack,
            format!("Found {} subtitle track(s). Downloading...", tracks.len()),
        ));
        self.transport
            .get_text(&relayed(self.relay.as_deref(), &track_url))
            .await
            .map_err(ResolveError::PayloadFetch)
    }

    /// Call the view endpoint and unwrap its envelope.
    async fn fetch_view(&self, bvid: &str) -> Result<ViewData, ResolveError> {
        let target = format!("{}/x/web-interface/view?bvid={}", self.api_base, bvid);
        let body = self
            .transport
            .get_text(&relayed(self.relay.as_deref(), &target))
            .await
            .map_err(ResolveError::MetadataFetch)?;
        let resp: ApiResponse<ViewData> =
            serde_json::from_str(&body).map_err(ResolveError::MetadataDecode)?;
        if resp.code != 0 {
            return Err(ResolveError::Upstream {
                code: resp.code,
                message: resp
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("unknown error code {}", resp.code)),
            });
        }
        resp.data.ok_or_else(|| ResolveError::Upstream {
            code: resp.code,
            message: "response has no video data".to_string(),
        })
    }

    /// Ask the player endpoint for additional tracks.
    /// Any failure is logged and reported as `None`.
    async fn player_tracks(&self, aid: u64, cid: u64) -> Option<Vec<Track>> {
        let target = format!("{}/x/player/v2?cid={}&aid={}", self.api_base, cid, aid);
        let body = match self
            .transport
            .get_text(&relayed(self.relay.as_deref(), &target))
            .await
        {
            Ok(body) => body,
            Err(err) => {
                warn!("player API fetch failed, continuing with view data only: {err}");
                return None;
            }
        };
        match serde_json::from_str::<ApiResponse<PlayerData>>(&body) {
            Ok(resp) => resp.data?.subtitle?.subtitles,
            Err(err) => {
                warn!("player API response could not be decoded: {err}");
                None
            }
        }
    }
}

/// Find the BV identifier inside a URL or free-form reference.
pub fn extract_bvid(reference: &str) -> Option<&str> {
    BVID_RE.find(reference).map(|m| m.as_str())
}

/// Read the `p` query parameter of `reference`, defaulting to page 1.
/// Leading digits are honoured the way browsers parse `?p=2abc`.
pub fn page_number(reference: &str) -> u32 {
    let Ok(url) = Url::parse(reference) else {
        return 1;
    };
    url.query_pairs()
        .find(|(k, _)| k == "p")
        .and_then(|(_, v)| {
            let digits: String = v.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .unwrap_or(1)
}

/// Pick the cid of `page`, falling back to the first listed page.
fn pick_cid(pages: &[PageInfo], page: u32) -> Result<u64, ResolveError> {
    let info = pages
        .iter()
        .find(|p| p.page == Some(page))
        .or_else(|| pages.first())
        .ok_or(ResolveError::PageNotFound { page })?;
    info.cid.ok_or(ResolveError::PageNotFound { page })
}

/// Append tracks from `extra` whose id is not already present.
pub fn merge_tracks(tracks: &mut Vec<Track>, extra: Vec<Track>) {
    for track in extra {
        if !tracks.iter().any(|t| t.id == track.id) {
            tracks.push(track);
        }
    }
}

/// Choose the first track matching each preferred language in turn,
/// otherwise the first track.
pub fn select_track<'a>(tracks: &'a [Track], preferred: &[String]) -> Option<&'a Track> {
    preferred
        .iter()
        .find_map(|lang| tracks.iter().find(|t| &t.lan == lang))
        .or_else(|| tracks.first())
}

/// Upgrade protocol-relative URLs to https.
pub fn normalize_track_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}
