// Copyright 2026 Event Scraper Contributors
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use event_scraper::cli::logging::{self, LogFormat};
use event_scraper::cli::output;
use event_scraper::config::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_RENDER_TIMEOUT_SECS};
use event_scraper::policy::ExtractionPolicy;
use event_scraper::renderer::chromium::CHROMIUM_PATH_ENV;
use event_scraper::{ExtractionError, Outcome, Pipeline, ScraperConfig};

#[derive(Parser)]
#[command(
    name = "event-scraper",
    about = "Extract a normalized event record from an event-listing page",
    version
)]
struct Cli {
    /// Event page URL.
    url: Option<String>,

    /// Never fall back to a headless browser.
    #[arg(long)]
    static_only: bool,

    /// Rendered fetch timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_RENDER_TIMEOUT_SECS)]
    render_timeout: u64,

    /// Static fetch timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout: u64,

    /// Chromium/Chrome binary for the rendered fallback.
    #[arg(long, env = CHROMIUM_PATH_ENV)]
    chromium_path: Option<PathBuf>,

    /// Launch Chromium without its sandbox (some containers need this).
    #[arg(long)]
    no_sandbox: bool,

    /// JSON file with policy overrides, merged over the built-in policy.
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn config(&self) -> Result<ScraperConfig> {
        let policy = match &self.policy {
            Some(path) => ExtractionPolicy::from_file(path)?,
            None => ExtractionPolicy::embedded().context("built-in policy is invalid")?,
        };
        let mut config = ScraperConfig::new(policy).with_chromium_path(self.chromium_path.clone());
        config.http_timeout = Duration::from_secs(self.http_timeout);
        config.render_timeout = Duration::from_secs(self.render_timeout);
        config.render_fallback = !self.static_only;
        config.chromium.no_sandbox = self.no_sandbox;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    let Some(url) = cli.url.clone() else {
        exit_with(Outcome::Failure(ExtractionError::no_url()));
    };

    let outcome = match run(&cli, &url).await {
        Ok(outcome) => outcome,
        Err(e) => Outcome::Failure(ExtractionError {
            error: e.to_string(),
            details: Some(format!("{e:?}")),
            url: Some(url),
        }),
    };
    exit_with(outcome);
}

async fn run(cli: &Cli, url: &str) -> Result<Outcome> {
    let config = cli.config()?;
    let pipeline = Pipeline::from_config(&config)?;
    Ok(pipeline.run(url).await)
}

fn exit_with(outcome: Outcome) -> ! {
    if let Err(e) = output::emit(&outcome) {
        tracing::error!("failed to write result: {e:#}");
        std::process::exit(1);
    }
    std::process::exit(outcome.exit_code());
}
