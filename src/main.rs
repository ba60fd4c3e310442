//! CLI entry point for the grabber tool.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use grabber_core::config::{Endpoints, HttpSettings};
use grabber_core::convert::convert_all;
use grabber_core::download::{RequestPacer, RetryPolicy, StorageLayout};
use grabber_core::parser::Pmid;
use grabber_core::resolver::{ResolveContext, SourceKind, build_default_resolver_registry};
use grabber_core::{ArticleGrabber, GrabConfig, GrabReport, OutcomeStatus, load_click_through_token};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command, RunArgs};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match &args.command {
        Command::Grab(grab) => run_grab(&args, &grab.run, &grab.sources).await,
        Command::Crossref(run) => run_grab(&args, run, &[SourceKind::Crossref]).await,
        Command::PmcOai(run) => run_grab(&args, run, &[SourceKind::PmcOa]).await,
        Command::Convert(convert) => {
            run_convert(convert.output.as_deref().unwrap_or(&args.work_dir))
        }
        Command::Resolve(resolve) => run_resolve(&args, &resolve.run, &resolve.pmid).await,
    }
}

fn build_config(args: &Args, run: &RunArgs) -> GrabConfig {
    let mut config = GrabConfig::new(&args.work_dir, run.email.clone())
        .with_max_attempts(run.max_attempts)
        .with_request_interval(Duration::from_millis(run.request_interval_ms))
        .with_download_http(HttpSettings {
            connect_timeout_secs: run.connect_timeout,
            read_timeout_secs: run.read_timeout,
        });
    if let Some(wanted) = &run.wanted {
        config = config.with_wanted_path(wanted);
    }
    if let Some(token) = &run.token {
        config = config.with_token_path(token);
    }
    if let Some(output) = &run.output {
        config = config.with_output_root(output);
    }
    if let Some(base) = &run.service_base {
        config = config.with_endpoints(Endpoints::all_at(base));
    }
    config
}

async fn run_grab(args: &Args, run: &RunArgs, sources: &[SourceKind]) -> Result<ExitCode> {
    let config = build_config(args, run).with_source_order(sources.to_vec());
    let grabber = ArticleGrabber::new(config).context("Cannot start grabbing")?;

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(grabber.wanted().len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    };

    let report = grabber
        .run(sources, |outcome| {
            progress.set_message(format!("{} {}", outcome.pmid, outcome.status.label()));
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();

    print_summary(&report);
    Ok(if report.failed_count() > 0 && report.fetched_count() + report.skipped_count() == 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_summary(report: &GrabReport) {
    for outcome in &report.outcomes {
        match &outcome.status {
            OutcomeStatus::Fetched {
                source,
                files,
                warnings,
            } => {
                for file in files {
                    println!("{}\t{source}\t{}", outcome.pmid, file.path.display());
                }
                for warning in warnings {
                    println!("{}\twarning\t{warning}", outcome.pmid);
                }
            }
            OutcomeStatus::SkippedExisting { path } => {
                println!("{}\texisting\t{}", outcome.pmid, path.display());
            }
            OutcomeStatus::Failed { reasons } => {
                println!("{}\tfailed\t{}", outcome.pmid, reasons.join("; "));
            }
        }
    }
    info!(
        total = report.len(),
        fetched = report.fetched_count(),
        full_text = report.full_text_count(),
        skipped = report.skipped_count(),
        failed = report.failed_count(),
        "Grab complete"
    );
}

fn run_convert(output_root: &Path) -> Result<ExitCode> {
    let report = convert_all(&StorageLayout::new(output_root))
        .with_context(|| format!("Cannot convert XML under {}", output_root.display()))?;
    for path in &report.converted {
        println!("{}", path.display());
    }
    for pmid in &report.without_body {
        warn!(%pmid, "No article body; no text written");
    }
    for (pmid, reason) in &report.failed {
        warn!(%pmid, %reason, "Conversion failed");
    }
    Ok(if report.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_resolve(args: &Args, run: &RunArgs, raw_pmid: &str) -> Result<ExitCode> {
    let config = build_config(args, run);
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;
    let pmid = Pmid::parse(raw_pmid).context("PMID must not be empty")?;
    let credential = load_click_through_token(&config.token_path)?;
    let registry = build_default_resolver_registry(
        &config.endpoints,
        &config.resolver_http,
        &config.email,
        &Arc::new(RequestPacer::new(config.request_interval)),
        &RetryPolicy::with_max_attempts(config.max_attempts),
    )?;

    let (source, resources) = registry
        .resolve_first(&pmid, &config.source_order, &ResolveContext::new(credential))
        .await
        .with_context(|| format!("No source has full text for PMID {pmid}"))?;
    for resource in &resources {
        println!("{source}\t{}\t{}", resource.format, resource.url);
    }
    Ok(ExitCode::SUCCESS)
}
