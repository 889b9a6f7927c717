use anyhow::Result;
use clap::Parser;
use sod_cli::config::Args;
use sod_cli::{render_text, ReqwestExecutor, Shell};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Validates that a log level string is valid
fn validate_log_level(level: &str) -> Result<()> {
    level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .map_err(|_| {
            anyhow::anyhow!(
                "Invalid log level: '{}'. Valid levels: error, warn, info, debug, trace",
                level
            )
        })?;
    Ok(())
}

fn init_logging(args: &Args) {
    // RUST_LOG overrides the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = validate_log_level(&args.log_level) {
        eprintln!("{}", e);
        std::process::exit(2);
    }
    init_logging(&args);

    let executor = ReqwestExecutor::new(args.request_timeout()?)?;
    let mut shell = Shell::new(executor);

    if let Err(e) = shell.configure(args.config_request()).await {
        eprintln!("{}", e);
        std::process::exit(2);
    }
    info!(backend_url = %shell.view().backend_url, files = args.files.len(), "starting uploads");

    tokio::fs::create_dir_all(&args.output_dir).await?;

    let mut reports = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let report = shell.upload(file, &args.output_dir).await?;
        for alert in &report.alerts {
            eprintln!("{}: {}", file.display(), alert);
        }
        if !args.json {
            if let Some(path) = &report.saved_to {
                println!("{} -> {}", file.display(), path.display());
            }
        }
        reports.push(report);
    }
    let failures = reports.iter().filter(|r| r.saved_to.is_none()).count();

    let view = shell.view();
    if args.json {
        let summary = serde_json::json!({ "uploads": reports, "view": view });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_text(&view));
    }

    shell.end_session().await;

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
