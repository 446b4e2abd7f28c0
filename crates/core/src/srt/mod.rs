//! This module is responsible for timecodes and subtitle exports.
//! It turns normalized segments into SRT, plain transcript or JSON text.

use crate::subtitle::SubtitleSegment;
use anyhow::Result;

/// Timestamp used when a segment arrives without one.
pub const ZERO_TIMECODE: &str = "00:00:00,000";

/// Output formats a segment list can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Srt,
    Txt,
    Json,
}

impl ExportFormat {
    /// File extension conventionally used for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }

    /// MIME type to attach when the export is offered for download.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Srt => "application/x-subrip",
            Self::Txt => "text/plain",
            Self::Json => "application/json",
        }
    }

    /// Render `segments` in this format.
    pub fn render(&self, segments: &[SubtitleSegment]) -> Result<String> {
        match self {
            Self::Srt => Ok(to_srt(segments)),
            Self::Txt => Ok(to_transcript(segments)),
            Self::Json => to_json(segments),
        }
    }
}

/// Format segments as bilingual SRT.
/// Each block carries the original line followed by the translation, and
/// blocks are separated by a single blank line.
pub fn to_srt(segments: &[SubtitleSegment]) -> String {
    segments
        .iter()
        .map(|seg| {
            format!(
                "{}\n{} --> {}\n{}\n{}\n",
                seg.index, seg.start_time, seg.end_time, seg.original, seg.translation
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format segments as `[start] original | translation` lines.
pub fn to_transcript(segments: &[SubtitleSegment]) -> String {
    segments
        .iter()
        .map(|seg| format!("[{}] {} | {}", seg.start_time, seg.original, seg.translation))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pretty-printed JSON array of segments.
pub fn to_json(segments: &[SubtitleSegment]) -> Result<String> {
    Ok(serde_json::to_string_pretty(segments)?)
}

/// Parse a timecode into milliseconds.
/// Accepts `HH:MM:SS,mmm` as well as `.` separators, a missing hour field
/// and short fraction digits (`,5` is 500 ms). Hours too large to count
/// in milliseconds are rejected.
pub fn parse_timecode(t: &str) -> Option<u64> {
    let t = t.trim();
    let (clock, frac) = match t.rfind([',', '.']) {
        Some(pos) => (&t[..pos], &t[pos + 1..]),
        None => (t, ""),
    };
    let parts: Vec<&str> = clock.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return None,
    };
    let h: u64 = parse_digits(h)?;
    let m: u64 = parse_digits(m)?;
    let s: u64 = parse_digits(s)?;
    if m >= 60 || s >= 60 {
        return None;
    }
    let ms = match frac.len() {
        0 => 0,
        1..=3 => parse_digits(frac)? * 10u64.pow(3 - frac.len() as u32),
        _ => return None,
    };
    h.checked_mul(60)?
        .checked_add(m)?
        .checked_mul(60)?
        .checked_add(s)?
        .checked_mul(1000)?
        .checked_add(ms)
}

/// Format milliseconds back to `HH:MM:SS,mmm`.
pub fn format_timecode(ms: u64) -> String {
    let h = ms / 3_600_000;
    let m = (ms % 3_600_000) / 60_000;
    let s = (ms % 60_000) / 1000;
    let ms = ms % 1000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Rewrite a timecode into its zero-padded canonical form.
/// Anything that does not parse is returned unchanged.
pub fn canonical_timecode(t: &str) -> String {
    match parse_timecode(t) {
        Some(ms) => format_timecode(ms),
        None => t.to_string(),
    }
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(index: u32, start: &str, end: &str, original: &str, translation: &str) -> SubtitleSegment {
        SubtitleSegment {
            index,
            start_time: start.into(),
            end_time: end.into(),
            original: original.into(),
            translation: translation.into(),
        }
    }

    #[test]
    fn empty_exports_are_empty() {
        assert_eq!(to_srt(&[]), "");
        assert_eq!(to_transcript(&[]), "");
    }

    #[test]
    fn srt_blocks_are_separated_by_blank_line() {
        let segments = vec![
            seg(1, "00:00:01,500", "00:00:04,000", "你好", "Hello"),
            seg(2, "00:00:04,000", "00:00:06,250", "再见", "Goodbye"),
        ];
        let expected = "1\n00:00:01,500 --> 00:00:04,000\n你好\nHello\n\n\
                        2\n00:00:04,000 --> 00:00:06,250\n再见\nGoodbye\n";
        assert_eq!(to_srt(&segments), expected);
    }

    #[test]
    fn transcript_has_one_line_per_segment() {
        let segments = vec![
            seg(1, "00:00:01,500", "00:00:04,000", "你好", "Hello"),
            seg(2, "00:00:04,000", "00:00:06,250", "再见", "Goodbye"),
        ];
        assert_eq!(
            to_transcript(&segments),
            "[00:00:01,500] 你好 | Hello\n[00:00:04,000] 再见 | Goodbye"
        );
    }

    #[test]
    fn json_export_uses_camel_case_times() {
        let out = to_json(&[seg(1, "00:00:01,000", "00:00:02,000", "a", "b")]).unwrap();
        assert!(out.contains("\"startTime\": \"00:00:01,000\""));
        assert!(out.contains("\"index\": 1"));
    }

    #[test]
    fn parses_and_formats_timecodes() {
        assert_eq!(parse_timecode("00:00:01,500"), Some(1500));
        assert_eq!(parse_timecode("1:02:03.4"), Some(3_723_400));
        assert_eq!(parse_timecode("02:03,45"), Some(123_450));
        assert_eq!(parse_timecode("00:00:05"), Some(5000));
        assert_eq!(parse_timecode("abc"), None);
        assert_eq!(parse_timecode("00:61:00,000"), None);
        assert_eq!(format_timecode(3_723_400), "01:02:03,400");
    }

    #[test]
    fn canonical_timecode_keeps_garbage() {
        assert_eq!(canonical_timecode("0:0:1.5"), "00:00:01,500");
        assert_eq!(canonical_timecode("soon"), "soon");
    }

    #[test]
    fn oversized_hours_do_not_parse() {
        let huge = "999999999999999999:00:00,000";
        assert_eq!(parse_timecode(huge), None);
        assert_eq!(canonical_timecode(huge), huge);
        assert_eq!(parse_timecode("6000000000000:00:00,000"), None);
        assert_eq!(parse_timecode("1000:00:00,000"), Some(3_600_000_000));
    }

    #[test]
    fn export_format_metadata() {
        assert_eq!(ExportFormat::Srt.extension(), "srt");
        assert_eq!(ExportFormat::Txt.mime_type(), "text/plain");
        let out = ExportFormat::Txt
            .render(&[seg(1, "00:00:00,000", "00:00:01,000", "a", "b")])
            .unwrap();
        assert_eq!(out, "[00:00:00,000] a | b");
    }
}
