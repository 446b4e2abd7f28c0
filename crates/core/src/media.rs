//! Media helpers for uploads that go straight to transcription.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{trace, warn};

/// Size above which uploads are likely to be rejected or slow.
pub const LARGE_MEDIA_BYTES: u64 = 50 * 1024 * 1024;

/// A media file loaded into memory together with its MIME type.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Guess the MIME type of an audio or video file from its extension.
pub fn guess_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "flv" => "video/x-flv",
        "mpeg" | "mpg" => "video/mpeg",
        "3gp" => "video/3gpp",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "flac" => "audio/flac",
        _ => return None,
    };
    Some(mime)
}

/// Read `path` into memory.
/// The MIME type is `mime_override` when given, otherwise it is guessed
/// from the extension. Large files only produce a warning.
pub async fn load_media(path: &Path, mime_override: Option<&str>) -> Result<MediaFile> {
    trace!("load_media path={}", path.display());
    let mime_type = match mime_override {
        Some(m) => m.to_string(),
        None => guess_mime_type(path)
            .ok_or_else(|| {
                anyhow!(
                    "cannot tell the media type of {}, pass it explicitly (e.g. video/mp4)",
                    path.display()
                )
            })?
            .to_string(),
    };
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.len() as u64 > LARGE_MEDIA_BYTES {
        warn!(
            "{} is {} MB, consider extracting the audio track first",
            path.display(),
            bytes.len() / (1024 * 1024)
        );
    }
    Ok(MediaFile { bytes, mime_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn guesses_common_types() {
        assert_eq!(guess_mime_type(Path::new("clip.MP4")), Some("video/mp4"));
        assert_eq!(guess_mime_type(Path::new("talk.mp3")), Some("audio/mpeg"));
        assert_eq!(guess_mime_type(&PathBuf::from("notes.txt")), None);
        assert_eq!(guess_mime_type(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn loads_with_guessed_or_explicit_type() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        fs::write(&path, b"RIFF").unwrap();
        let media = load_media(&path, None).await.unwrap();
        assert_eq!(media.mime_type, "audio/wav");
        assert_eq!(media.bytes, b"RIFF");

        let odd = dir.path().join("capture.bin");
        fs::write(&odd, b"data").unwrap();
        assert!(load_media(&odd, None).await.is_err());
        let media = load_media(&odd, Some("video/mp4")).await.unwrap();
        assert_eq!(media.mime_type, "video/mp4");
    }
}
