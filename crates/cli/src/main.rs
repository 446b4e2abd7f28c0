//! Binary entry point for the bilingual subtitle fetcher.

use anyhow::{Context, Result};
use bilisub_core::media::load_media;
use bilisub_core::normalize::gemini::GeminiGenerator;
use bilisub_core::normalize::Normalizer;
use bilisub_core::progress::LogProgress;
use bilisub_core::resolve::Resolver;
use bilisub_core::srt::ExportFormat;
use bilisub_core::transport::HttpTransport;
use bilisub_core::{acquire, Config, SubtitleSource};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command line options for the binary.
#[derive(Parser)]
#[command(version, about = "Fetch, transcribe and translate Bilibili subtitles")]
struct Cli {
    /// Enable verbose debug and trace logs.
    #[arg(long, global = true)]
    debug: bool,

    /// Export format written to the output.
    #[arg(long, value_enum, default_value_t = Format::Srt, global = true)]
    format: Format,

    /// File to write the export to instead of stdout.
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    /// Relay every Bilibili request through this URL.
    #[arg(long, global = true, conflicts_with = "no_relay")]
    relay: Option<String>,

    /// Talk to Bilibili directly.
    #[arg(long, global = true)]
    no_relay: bool,

    /// Generative model used for transcription and translation.
    #[arg(long, global = true)]
    model: Option<String>,

    /// HTTP timeout in seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the subtitles of a Bilibili video and translate them.
    Url {
        /// Video URL or bare BV id.
        reference: String,

        /// Print the downloaded subtitle payload without translating it.
        #[arg(long)]
        raw: bool,
    },
    /// Transcribe and translate an audio or video file.
    Media {
        path: PathBuf,

        /// MIME type of the file when it cannot be told from the extension.
        #[arg(long)]
        mime: Option<String>,
    },
    /// Parse and translate raw subtitle data (CC JSON, XML or plain text).
    Text {
        /// File holding the data, or `-` for stdin.
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Srt,
    Txt,
    Json,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Srt => ExportFormat::Srt,
            Format::Txt => ExportFormat::Txt,
            Format::Json => ExportFormat::Json,
        }
    }
}

/// Application entry point which parses CLI args and performs actions.
/// This function initializes logging and delegates to the core library.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.debug {
        EnvFilter::default()
            .add_directive("bilisub=trace".parse()?)
            .add_directive("bilisub_core=trace".parse()?)
            .add_directive("info".parse()?)
    } else {
        EnvFilter::default()
            .add_directive("bilisub=info".parse()?)
            .add_directive("bilisub_core=info".parse()?)
            .add_directive("warn".parse()?)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli)?;
    let transport = HttpTransport::new(config.http_timeout())?;
    let resolver = Resolver::new(transport, &config);

    let source = match cli.command {
        Command::Url { reference, raw: true } => {
            let payload = resolver.resolve(&reference, &LogProgress).await?;
            return write_output(cli.output.as_deref(), &payload).await;
        }
        Command::Url { reference, .. } => SubtitleSource::Url(reference),
        Command::Media { path, mime } => {
            let media = load_media(&path, mime.as_deref()).await?;
            SubtitleSource::Media {
                bytes: media.bytes,
                mime_type: media.mime_type,
            }
        }
        Command::Text { path } => SubtitleSource::Text(read_text(&path).await?),
    };

    let normalizer = Normalizer::new(GeminiGenerator::new(&config)?, &config);
    let segments = match acquire(&resolver, &normalizer, source, &LogProgress).await {
        Ok(segments) => segments,
        Err(err) => {
            if err.is_network_unreachable() {
                error!("network problem, check your connection or try --relay/--no-relay");
            }
            return Err(err.into());
        }
    };
    info!("got {} subtitle segment(s)", segments.len());

    let format = ExportFormat::from(cli.format);
    let content = format.render(&segments)?;
    write_output(cli.output.as_deref(), &content).await
}

/// Layer the command line flags over the environment configuration.
fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(relay) = &cli.relay {
        config.relay_url = Some(relay.clone());
    }
    if cli.no_relay {
        config.relay_url = None;
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(timeout) = cli.timeout.filter(|t| *t > 0) {
        config.http_timeout_secs = timeout;
    }
    Ok(config)
}

/// Read raw subtitle data from a file, or stdin for `-`.
async fn read_text(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Write `content` to `output`, or to stdout when no path is given.
async fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(content.as_bytes()).await?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n").await?;
            }
            stdout.flush().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands_with_global_flags() {
        let cli = Cli::try_parse_from([
            "bilisub",
            "url",
            "https://www.bilibili.com/video/BV1xx",
            "--format",
            "txt",
            "--no-relay",
        ])
        .unwrap();
        assert!(matches!(cli.format, Format::Txt));
        assert!(cli.no_relay);
        assert!(matches!(cli.command, Command::Url { raw: false, .. }));
    }

    #[test]
    fn relay_flags_conflict() {
        assert!(Cli::try_parse_from([
            "bilisub", "--relay", "https://r", "--no-relay", "text", "-"
        ])
        .is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "bilisub", "--no-relay", "--model", "m", "--timeout", "9", "text", "-",
        ])
        .unwrap();
        let config = build_config(&cli).unwrap();
        assert!(config.relay_url.is_none());
        assert_eq!(config.model, "m");
        assert_eq!(config.http_timeout_secs, 9);
    }
}
