//! Stage-labelled progress events emitted by the acquisition engines.

use std::fmt;
use tracing::info;

/// Pipeline stage an event belongs to.
/// Stages are ordered the way a URL acquisition walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    FetchingMetadata,
    ListingTracks,
    DownloadingTrack,
    Transcribing,
    AnalyzingText,
    ParsingResponse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchingMetadata => "fetching-metadata",
            Self::ListingTracks => "listing-tracks",
            Self::DownloadingTrack => "downloading-track",
            Self::Transcribing => "transcribing",
            Self::AnalyzingText => "analyzing-text",
            Self::ParsingResponse => "parsing-response",
        };
        f.write_str(name)
    }
}

/// A human readable status update tagged with its stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Receiver of progress events.
/// Events are advisory and never influence control flow.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Sink that forwards events to the `tracing` log at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        info!(stage = %event.stage, "{}", event.message);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Collects emitted events so tests can inspect their order.
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingSink {
        pub fn stages(&self) -> Vec<Stage> {
            self.events.lock().unwrap().iter().map(|e| e.stage).collect()
        }
    }

    impl ProgressSink for RecordingSink {
        fn emit(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
