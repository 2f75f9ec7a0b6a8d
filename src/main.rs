use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::{info, warn};

use accent_analyzer::analysis::AccentAnalyzer;
use accent_analyzer::config::Config;
use accent_analyzer::report::save_report;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accent_analyzer=info,warn".into()),
        )
        .init();

    let matches = Command::new("Accent Analyzer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Detect spoken language and English accent from a public video URL")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("Public video URL to analyze"),
        )
        .arg(
            Arg::new("report-dir")
                .short('o')
                .long("report-dir")
                .value_name("DIR")
                .help("Directory the text report is written into")
                .default_value("./reports"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("serve")
                .long("serve")
                .help("Start the HTTP API instead of running one analysis")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(std::path::Path::new(path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    config.validate()?;

    info!("🚀 Accent Analyzer starting...");

    let serve = matches.get_flag("serve");
    if serve {
        return run_server(config).await;
    }

    let url = matches
        .get_one::<String>("url")
        .ok_or_else(|| anyhow::anyhow!("--url is required unless --serve is given"))?;
    let report_dir = PathBuf::from(matches.get_one::<String>("report-dir").unwrap());

    let analyzer = AccentAnalyzer::new(config).await?;
    let result = analyzer.analyze(url).await;

    info!("🌐 Language: {} ({:.2}%)", result.language, result.language_score);
    info!("🗣️  Accent: {} ({:.2}%)", result.accent, result.confidence);
    println!("{}", result.summary);

    let report_path = save_report(&result, url, &report_dir).await?;
    println!("Report written to {}", report_path.display());

    Ok(())
}

#[cfg(feature = "api")]
async fn run_server(config: Config) -> Result<()> {
    use std::sync::Arc;

    let port = config.server.port;
    let analyzer = Arc::new(AccentAnalyzer::new(config.clone()).await?);
    accent_analyzer::api::start_http_server(analyzer, Arc::new(config), port).await
}

#[cfg(not(feature = "api"))]
async fn run_server(_config: Config) -> Result<()> {
    Err(anyhow::anyhow!(
        "HTTP API not compiled in; rebuild with --features api"
    ))
}
