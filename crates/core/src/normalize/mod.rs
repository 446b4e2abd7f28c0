//! Normalization of media or raw subtitle text into bilingual segments.
//! The heavy lifting is delegated to a constrained-generation backend; this
//! module builds the request and validates what comes back.

use crate::config::Config;
use crate::progress::{ProgressEvent, ProgressSink, Stage};
use crate::srt::{canonical_timecode, parse_timecode, ZERO_TIMECODE};
use crate::subtitle::SubtitleSegment;
use crate::transport::TransportError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

pub mod gemini;

/// Maximum number of characters of raw text submitted for parsing.
pub const MAX_TEXT_CHARS: usize = 1_000_000;

/// Sampling temperature used for audio transcription.
pub const MEDIA_TEMPERATURE: f32 = 0.2;

/// One piece of the content sent to the generator.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

/// A constrained-generation call: content, output schema and sampling.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub parts: Vec<Part>,
    pub schema: Value,
    /// `None` keeps the backend's default sampling.
    pub temperature: Option<f32>,
}

/// Credential handed to the generator on every call.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Backend able to answer a `GenerationRequest` with schema-shaped text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run the request and return the response text, if any was produced.
    async fn generate(
        &self,
        credential: &Credential,
        request: GenerationRequest,
    ) -> Result<Option<String>, TransportError>;
}

/// Errors that end a normalization.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("API key is missing, set GEMINI_API_KEY (or API_KEY)")]
    MissingCredential,

    #[error("no response text received from the model")]
    EmptyResponse,

    #[error("model response is not a valid subtitle array: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    #[error("generation request failed: {0}")]
    Generation(#[from] TransportError),
}

impl NormalizeError {
    pub fn is_network_unreachable(&self) -> bool {
        matches!(self, Self::Generation(e) if e.is_unreachable())
    }
}

/// Element of the model's JSON array. Every field is optional so that a
/// partially compliant response still maps onto segments.
#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(rename = "startTime", default)]
    start_time: Option<String>,
    #[serde(rename = "endTime", default)]
    end_time: Option<String>,
    #[serde(default)]
    original: Option<String>,
    #[serde(default)]
    translation: Option<String>,
}

/// Turns media or raw text into segments through a `Generator`.
pub struct Normalizer<G> {
    generator: G,
    credential: Option<Credential>,
    source_language: String,
    target_language: String,
}

impl<G: Generator> Normalizer<G> {
    /// Create a normalizer; the credential is taken from `config` once.
    pub fn new(generator: G, config: &Config) -> Self {
        let credential = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Credential(k.to_string()));
        Self {
            generator,
            credential,
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
        }
    }

    /// Transcribe and translate an audio or video file.
    pub async fn normalize_from_media(
        &self,
        media: &[u8],
        mime_type: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<SubtitleSegment>, NormalizeError> {
        trace!(
            "normalize_from_media bytes={} mime_type={}",
            media.len(),
            mime_type
        );
        let credential = self.credential()?;
        let request = GenerationRequest {
            parts: vec![
                Part::InlineData {
                    mime_type: mime_type.to_string(),
                    data: media.to_vec(),
                },
                Part::Text(self.media_instructions()),
            ],
            schema: subtitle_schema(&self.source_language, &self.target_language),
            temperature: Some(MEDIA_TEMPERATURE),
        };
        sink.emit(ProgressEvent::new(
            Stage::Transcribing,
            format!("Sending {} bytes of {mime_type} to the model...", media.len()),
        ));
        let text = self.generator.generate(credential, request).await?;
        sink.emit(ProgressEvent::new(Stage::ParsingResponse, "Parsing response..."));
        parse_segments(text)
    }

    /// Parse and translate raw subtitle data (CC JSON, XML or a messy
    /// transcript). Input beyond `MAX_TEXT_CHARS` is dropped silently.
    pub async fn normalize_from_text(
        &self,
        raw: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<SubtitleSegment>, NormalizeError> {
        trace!("normalize_from_text chars={}", raw.chars().count());
        let credential = self.credential()?;
        let raw = truncate_chars(raw, MAX_TEXT_CHARS);
        let request = GenerationRequest {
            parts: vec![Part::Text(self.text_instructions(raw))],
            schema: subtitle_schema(&self.source_language, &self.target_language),
            temperature: None,
        };
        sink.emit(ProgressEvent::new(Stage::AnalyzingText, "Analyzing subtitle text..."));
        let text = self.generator.generate(credential, request).await?;
        sink.emit(ProgressEvent::new(Stage::ParsingResponse, "Parsing response..."));
        parse_segments(text)
    }

    fn credential(&self) -> Result<&Credential, NormalizeError> {
        self.credential.as_ref().ok_or(NormalizeError::MissingCredential)
    }

    fn media_instructions(&self) -> String {
        let (src, dst) = (&self.source_language, &self.target_language);
        format!(
            "You extract and translate subtitles for Bilibili videos.\n\
             \n\
             Task:\n\
             1. Transcribe the speech in the attached audio or video (mostly {src}).\n\
             2. Translate every segment into natural {dst}.\n\
             3. Give precise HH:MM:SS,mmm start and end times for every segment.\n\
             4. Produce no segment for stretches without speech.\n\
             5. Keep names and domain terminology exact in the transcription.\n\
             \n\
             Answer only with a JSON array that follows the schema."
        )
    }

    fn text_instructions(&self, raw: &str) -> String {
        let (src, dst) = (&self.source_language, &self.target_language);
        format!(
            "You are a subtitle processing engine. The raw data below comes from Bilibili. \
             It may be a CC subtitle JSON document, an XML danmaku file or an unstructured transcript.\n\
             \n\
             Raw data:\n\
             ```\n\
             {raw}\n\
             ```\n\
             \n\
             Task:\n\
             1. Extract every dialogue line with its timing.\n\
             - CC JSON has a 'body' array of objects with 'from', 'to' and 'content'. \
             'from' and 'to' are seconds with a fraction; write them as HH:MM:SS,mmm \
             (1.5 becomes 00:00:01,500).\n\
             - XML carries the timestamp as the first value of each element's 'p' or 'd' \
             attribute and the line as its text.\n\
             2. Translate the {src} text into {dst}. Existing {dst} lines may guide you \
             but the result must read naturally.\n\
             3. Drop metadata, technical noise and anything that is not dialogue.\n\
             \n\
             Answer only with a JSON array that follows the schema."
        )
    }
}

/// Response schema: an array of segments with four mandatory strings.
pub fn subtitle_schema(source_language: &str, target_language: &str) -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "startTime": {
                    "type": "STRING",
                    "description": "Start time in HH:MM:SS,mmm format (e.g. 00:00:01,500)"
                },
                "endTime": {
                    "type": "STRING",
                    "description": "End time in HH:MM:SS,mmm format (e.g. 00:00:04,000)"
                },
                "original": {
                    "type": "STRING",
                    "description": format!("The original transcription ({source_language})")
                },
                "translation": {
                    "type": "STRING",
                    "description": format!("The {target_language} translation of the segment")
                }
            },
            "required": ["startTime", "endTime", "original", "translation"]
        }
    })
}

/// Validate the model's text and map it onto numbered segments.
/// Missing fields are filled in: zero timestamps and empty text.
fn parse_segments(text: Option<String>) -> Result<Vec<SubtitleSegment>, NormalizeError> {
    let text = text
        .filter(|t| !t.trim().is_empty())
        .ok_or(NormalizeError::EmptyResponse)?;
    debug!("model returned {} bytes", text.len());
    let raw: Vec<RawSegment> =
        serde_json::from_str(&text).map_err(NormalizeError::MalformedResponse)?;
    let segments: Vec<SubtitleSegment> = raw
        .into_iter()
        .zip(1u32..)
        .map(|(item, index)| SubtitleSegment {
            index,
            start_time: timecode_or_zero(item.start_time),
            end_time: timecode_or_zero(item.end_time),
            original: item.original.unwrap_or_default(),
            translation: item.translation.unwrap_or_default(),
        })
        .collect();
    for seg in &segments {
        let start = parse_timecode(&seg.start_time);
        let end = parse_timecode(&seg.end_time);
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                warn!(
                    "segment {} ends before it starts ({} --> {})",
                    seg.index, seg.start_time, seg.end_time
                );
            }
        }
    }
    info!("normalized {} segment(s)", segments.len());
    Ok(segments)
}

fn timecode_or_zero(value: Option<String>) -> String {
    match value {
        Some(t) if !t.trim().is_empty() => canonical_timecode(&t),
        _ => ZERO_TIMECODE.to_string(),
    }
}

/// Keep at most `max` characters of `s` without splitting a code point.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte, _)) => &s[..byte],
        None => s,
    }
}
