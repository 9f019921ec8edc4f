use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, Phase, SubmitOutcome, WorkflowController, WorkflowSnapshot};
use shared::{
    domain::{Parameters, PaletteId, Rgb, SubmissionInput},
    protocol::RESULT_RETENTION,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pixelart", about = "Turn images into 2-bit pixel art")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available 4-color palettes.
    Palettes,
    /// Upload an image and wait for the generated pixel art.
    Generate {
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long, default_value_t = PaletteId::default())]
        palette: PaletteId,
        /// Any non-positive or non-numeric value is treated as 1.
        #[arg(long, default_value = "4", allow_hyphen_values = true)]
        pixel_size: String,
        /// Download the result to this path once it is ready.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Overrides the configured service base address.
        #[arg(long)]
        backend_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    match args.command {
        Command::Palettes => {
            for palette in PaletteId::ALL {
                println!("{:<18} {}", palette.as_str(), swatches(palette.colors()));
            }
            Ok(())
        }
        Command::Generate {
            image,
            palette,
            pixel_size,
            output,
            backend_url,
        } => {
            let input = match image {
                Some(path) => Some(read_input(&path).await?),
                None => None,
            };
            let parameters = Parameters::with_pixel_size_entry(palette, &pixel_size);
            generate(input, parameters, output, backend_url).await
        }
    }
}

async fn read_input(path: &Path) -> Result<SubmissionInput> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(SubmissionInput::new(file_name, mime_type.essence_str(), bytes))
}

async fn generate(
    input: Option<SubmissionInput>,
    parameters: Parameters,
    output: Option<PathBuf>,
    backend_url: Option<String>,
) -> Result<()> {
    let mut settings = load_settings();
    if let Some(url) = backend_url {
        settings.backend_url = url;
    }
    let controller = WorkflowController::from_settings(&settings)
        .context("failed to set up generator client")?;
    info!(
        backend = %settings.backend_url,
        timeout_secs = settings.request_timeout_secs,
        "generator client ready"
    );

    let mut updates = controller.watch();
    let renderer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let line = render(&updates.borrow_and_update());
            if let Some(line) = line {
                eprintln!("{line}");
            }
        }
    });

    let outcome = controller.submit(input, parameters).await;
    renderer.abort();

    let snapshot = match outcome {
        SubmitOutcome::Settled(snapshot) => snapshot,
        SubmitOutcome::Ignored => bail!("a submission is already running"),
    };

    match (snapshot.phase, &snapshot.result, &snapshot.error) {
        (Phase::Succeeded, Some(result), _) => {
            println!("{result}");
            eprintln!(
                "Result will be deleted from server after >{} minutes",
                RESULT_RETENTION.as_secs() / 60
            );
            if let Some(path) = output {
                let bytes = controller.fetch_result().await?;
                tokio::fs::write(&path, bytes)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "saved result");
            }
            Ok(())
        }
        (_, _, Some(error)) => {
            warn!(kind = ?error.kind, "submission failed");
            bail!("{}", error.message)
        }
        (phase, _, _) => bail!("submission ended in unexpected state {phase:?}"),
    }
}

/// One status line for the current snapshot, or nothing when there is
/// nothing worth showing.
fn render(snapshot: &WorkflowSnapshot) -> Option<String> {
    match snapshot.phase {
        Phase::Uploading | Phase::Processing if snapshot.progress > 0 => Some(format!(
            "{} [{}] {:>3}%",
            snapshot.phase.label(),
            progress_bar(snapshot.progress),
            snapshot.progress
        )),
        Phase::Failed => snapshot.error.as_ref().map(|error| error.message.clone()),
        _ => None,
    }
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) / 5;
    format!("{}{}", "#".repeat(filled), "-".repeat(20 - filled))
}

fn swatches(colors: [Rgb; 4]) -> String {
    colors
        .iter()
        .map(|Rgb(r, g, b)| format!("\x1b[48;2;{r};{g};{b}m  \x1b[0m #{r:02x}{g:02x}{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
