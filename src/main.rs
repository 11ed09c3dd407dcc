use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use cccd_verify::config;
use cccd_verify::pipeline::extraction::{MockTextRecognizer, TesseractCli, TextRecognizer};
use cccd_verify::pipeline::import::{ImageAsset, RemoteAssetSource};
use cccd_verify::{VerificationConfig, VerificationService};

#[derive(Parser)]
#[command(name = "cccd-verify", version = config::APP_VERSION)]
#[command(about = "Verify a Vietnamese citizen ID card from photos of its sides", long_about = None)]
struct Cli {
    /// Photo of the front side (file path or http(s) URL)
    front: String,

    /// Photo of the back side (file path or http(s) URL)
    back: Option<String>,

    /// Recognition language hint (overrides config)
    #[arg(long)]
    language: Option<String>,

    /// Skip the recognition engine and use this text for every side
    #[arg(long, value_name = "TEXT")]
    mock_text: Option<String>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    cccd_verify::init_tracing();
    let cli = Cli::parse();

    let mut verification_config = match VerificationConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {e}", config::APP_NAME);
            return ExitCode::from(2);
        }
    };
    if let Some(language) = cli.language {
        verification_config.recognition.language = language;
    }

    let recognizer: Arc<dyn TextRecognizer> = match cli.mock_text {
        Some(text) => Arc::new(MockTextRecognizer::new(&text)),
        None => Arc::new(TesseractCli::new()),
    };
    tracing::info!(
        version = config::APP_VERSION,
        engine = recognizer.name(),
        language = %verification_config.recognition.language,
        "Starting verification"
    );

    let service = VerificationService::new(recognizer, &verification_config);
    let result = if is_url(&cli.front) {
        service
            .with_source(Arc::new(RemoteAssetSource::from_config(&verification_config.fetch)))
            .verify_references(&cli.front, cli.back.as_deref())
            .await
    } else {
        let front = read_local(Path::new(&cli.front), "front");
        let back = cli.back.as_deref().and_then(|p| read_local(Path::new(p), "back"));
        service.verify(front, back).await
    };
    let (json, code) = match result {
        Ok(outcome) => (to_json(&outcome, cli.pretty), ExitCode::SUCCESS),
        Err(failure) => (to_json(&failure, cli.pretty), ExitCode::FAILURE),
    };
    match json {
        Ok(json) => {
            println!("{json}");
            code
        }
        Err(e) => {
            eprintln!("{}: could not serialize result: {e}", config::APP_NAME);
            ExitCode::from(2)
        }
    }
}

fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// A side that cannot be read is passed on as missing.
fn read_local(path: &Path, side: &str) -> Option<ImageAsset> {
    match ImageAsset::from_path(path) {
        Ok(asset) => Some(asset),
        Err(e) => {
            tracing::warn!(side, path = %path.display(), error = %e, "Could not read image");
            None
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}
