// demos/optimize.rs
//
// Optimize one artwork file or URL and print the upload response.
//
//   cargo run --example optimize -- <path-or-url> [settings.toml] [output.jpg]
//
// RUST_LOG=artwork_ingest=debug shows every stage transition.

use artwork_ingest::{
    optimize, CancelToken, HttpFetcher, ImageFormat, ImageSettings, IngestError,
    OptimizationConfig, UploadRequest, UploadResponse,
};
use std::env;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(input) = args.first() else {
        eprintln!("usage: optimize <path-or-url> [settings.toml] [output.jpg]");
        return ExitCode::from(2);
    };

    match run(input, args.get(1), args.get(2)) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} ({}): {err}", err.category().as_str(), err.http_status());
            ExitCode::FAILURE
        }
    }
}

fn run(
    input: &str,
    settings_path: Option<&String>,
    output: Option<&String>,
) -> artwork_ingest::Result<String> {
    let settings = match settings_path {
        Some(path) => ImageSettings::from_path(path)?,
        None => ImageSettings::default(),
    };
    let config = OptimizationConfig::try_from(settings)?;

    let bytes = if input.contains("://") {
        let source = UploadRequest::from_url(input).into_source()?;
        source.acquire(
            &HttpFetcher::new(),
            config.max_download_bytes(),
            &CancelToken::new(),
        )?
    } else {
        std::fs::read(input)
            .map_err(|e| IngestError::invalid_request_body(format!("cannot read {input}: {e}")))?
    };
    tracing::info!(bytes = bytes.len(), input, "artwork loaded");

    let result = optimize(bytes, &config)?;
    if let Some(path) = output {
        let named = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension);
        if named != Some(result.format) {
            tracing::warn!(
                path = %path,
                format = %result.format,
                "output extension does not match, expected .{}",
                result.format.extension()
            );
        }
        std::fs::write(path, &result.data).map_err(|e| {
            IngestError::invalid_request_body(format!("cannot write {path}: {e}"))
        })?;
    }

    let response = UploadResponse::from(&result);
    serde_json::to_string_pretty(&response)
        .map_err(|e| IngestError::internal_panic(e.to_string()))
}
