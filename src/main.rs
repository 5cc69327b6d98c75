use std::path::PathBuf;
use std::time::{Duration, Instant};
use anyhow::{Context, bail};
use charon::utils::{format_bytes, format_duration, format_speed};
use charon::{FileSource, HttpTransport, Settings, UploadDispatcher};
use clap::Parser;
use tracing::info;

/// Upload one file as multipart/form-data.
#[derive(Parser, Debug)]
#[command(name = "charon", version)]
struct Cli {
    /// TOML file with [upload] and [transport] sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    endpoint: Option<String>,

    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Extra form field, repeatable
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(short, long)]
    debug: bool,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

/// Applies command-line flags on top of the loaded settings.
fn apply_overrides(settings: &mut Settings, cli: Cli) {
    if let Some(endpoint) = cli.endpoint {
        settings.upload.endpoint = endpoint;
    }
    if let Some(file) = cli.file {
        settings.upload.file = FileSource::Path(file);
    }
    for (key, value) in cli.fields {
        settings.upload.fields.insert(key, value);
    }
    if let Some(secs) = cli.timeout {
        settings.transport.timeout = Duration::from_secs(secs);
    }
    settings.upload.debug |= cli.debug;
}

fn default_filter(settings: &Settings) -> &'static str {
    if settings.upload.debug { "charon=debug" } else { "charon=info" }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => Settings::default(),
    };
    apply_overrides(&mut settings, cli);

    // installed after the config is read so its debug flag reaches the filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(&settings).into()),
        )
        .init();

    let transport = HttpTransport::new(&settings.transport)?;
    let started = Instant::now();
    let dispatcher = UploadDispatcher::with_transport(settings.upload, transport)
        .on_load_start(|event| info!(upload_id = %event.upload_id, "upload started"))
        .on_progress(move |event| {
            match event.percentage() {
                Some(percentage) => info!(
                    "{} sent ({:.1}%) at {}",
                    format_bytes(event.loaded),
                    percentage,
                    format_speed(event.loaded, started.elapsed())
                ),
                None => info!("{} sent", format_bytes(event.loaded)),
            }
        })
        .on_load(|event| {
            if let Some(response) = &event.response {
                info!(status = response.status, "server responded: {}", response.text());
            }
        })
        .on_timeout(|_| tracing::warn!("upload timed out"))
        .on_abort(|_| tracing::warn!("upload aborted"));

    let outcome = dispatcher.send_file().await?.wait().await?;
    info!(state = ?outcome.state, "finished in {}", format_duration(started.elapsed()));

    if !outcome.is_success() {
        bail!("upload did not complete successfully ({:?})", outcome.state);
    }
    Ok(())
}
