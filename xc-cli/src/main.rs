use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use xc_lib::{key_store, layout, Downloader, Query, RecordingOutcome, XcClient, XcError};

mod cli;

use cli::{Cli, Commands, FilterArgs, KeyAction};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            if e.downcast_ref::<XcError>().is_some_and(XcError::is_auth) {
                error!("check your key with `xc-dl key show`");
            }
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over -v/-q.
fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("warn,xc_lib={level},xc_dl={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose > 0)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Download {
            filters,
            output_dir,
            metadata_only,
            no_skip_existing,
            max_results,
            per_page,
            key,
        } => {
            let query = build_query(&filters)?;
            let client = XcClient::builder(require_key(key.as_deref())?)
                .per_page(per_page)
                .max_results(max_results.map(|n| n as usize))
                .build()?;
            download(&client, &query, &output_dir, metadata_only, !no_skip_existing).await
        }

        Commands::Count { filters, key } => {
            let query = build_query(&filters)?;
            let client = XcClient::new(require_key(key.as_deref())?)?;
            let summary = client
                .summary(&query)
                .await
                .with_context(|| format!("search for '{query}' failed"))?;
            println!("Query: {query}");
            println!(
                "{} recordings from {} species ({} pages of {})",
                summary.num_recordings,
                summary.num_species,
                summary.num_pages,
                xc_lib::api::MIN_PER_PAGE
            );
            Ok(())
        }

        Commands::Info { output_dir } => {
            let inventory = layout::scan_output_dir(&output_dir)?;
            println!("{}", output_dir.display());
            println!(
                "{} files, {:.1} MB, {} species",
                inventory.total_files,
                inventory.total_megabytes(),
                inventory.species_count()
            );
            for folder in &inventory.species_folders {
                println!("  {folder}");
            }
            Ok(())
        }

        Commands::Key { action } => manage_key(action),
    }
}

fn build_query(filters: &FilterArgs) -> Result<Query> {
    let query = filters
        .to_query()
        .context("invalid search filters (see --help)")?;
    info!(%query, "query built");
    Ok(query)
}

fn require_key(explicit: Option<&str>) -> Result<String> {
    key_store::resolve_key(explicit).context(
        "API key required: pass --key, run `xc-dl key set <KEY>`, or set XC_API_KEY (or add to .env)",
    )
}

async fn download(
    client: &XcClient,
    query: &Query,
    output_dir: &Path,
    metadata_only: bool,
    skip_existing: bool,
) -> Result<()> {
    info!("searching for recordings");
    let result = client
        .search_with_progress(query, |page, total| {
            info!("page {page}/{total}");
        })
        .await
        .with_context(|| format!("search for '{query}' failed"))?;

    if result.recordings.is_empty() {
        println!("No recordings found matching the query.");
        return Ok(());
    }
    println!(
        "Found {} recordings ({} total matches)",
        result.recordings.len(),
        result.num_recordings
    );

    let downloader = Downloader::new(output_dir, skip_existing)?.with_http_client(client.http().clone());

    if metadata_only {
        let path = downloader.export_metadata(&result.recordings)?;
        println!("Wrote metadata for {} recordings to {}", result.recordings.len(), path.display());
        return Ok(());
    }

    info!(dir = %downloader.root().display(), "downloading");
    let report = downloader
        .download_recordings_with_progress(&result.recordings, |i, total, outcome| match outcome {
            RecordingOutcome::Saved { path, .. } => info!("[{i}/{total}] saved {}", path.display()),
            RecordingOutcome::Skipped(path) => info!("[{i}/{total}] skipped {}", path.display()),
            RecordingOutcome::Failed(reason) => warn!("[{i}/{total}] failed: {reason}"),
        })
        .await
        .context("failed to write metadata")?;

    let stats = report.stats;
    println!();
    println!("Downloaded: {}", stats.downloaded);
    println!("Skipped:    {}", stats.skipped);
    println!("Failed:     {}", stats.failed);
    if let Some(path) = &report.metadata_path {
        println!("Metadata:   {}", path.display());
    }
    println!("Elapsed:    {}s", report.elapsed().num_seconds());
    Ok(())
}

fn manage_key(action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Set { key } => {
            let path = key_store::save_key(&key)?;
            println!("Saved API key to {}", path.display());
        }
        KeyAction::Show => match key_store::resolve_key(None) {
            Some(key) => {
                let source = if key_store::load_key().is_some() {
                    key_store::key_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                } else {
                    "environment".to_string()
                };
                println!("{} (from {source})", mask(&key));
            }
            None => println!("No API key configured"),
        },
        KeyAction::Clear => {
            if key_store::delete_key()? {
                println!("Removed stored API key");
            } else {
                println!("No stored API key");
            }
        }
    }
    Ok(())
}

/// "abcd…wxyz" style masking for display.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
