//! media-probe - Extract technical metadata from media files.
//!
//! Analyses every path given on the command line and prints one JSON result
//! tree per file, in argument order.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_probe::{Analyzer, Cli, ResultTree};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut analyzer = Analyzer::new(cli.analyzer_config());
    if cli.no_exif {
        analyzer = analyzer.with_exif_reader(None);
    }
    if cli.no_xmp {
        analyzer = analyzer.with_xmp_reader(None);
    }
    let analyzer = Arc::new(analyzer);

    debug!(files = cli.paths.len(), jobs = cli.jobs, "Starting analysis");
    let results = analyze_all(analyzer, cli.paths.clone(), cli.jobs).await;

    let mut ok = true;
    for (path, result) in cli.paths.iter().zip(results) {
        let tree = match result {
            Ok(tree) => tree,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                ok = false;
                continue;
            }
        };

        if tree.fileformat.is_none() || tree.has_errors() {
            ok = false;
        }

        let json = if cli.pretty {
            serde_json::to_string_pretty(&tree)
        } else {
            serde_json::to_string(&tree)
        };
        match json {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("{}: cannot serialize result: {}", path.display(), e);
                ok = false;
            }
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Analyse `paths` on the blocking pool, at most `jobs` at a time.
///
/// Results are returned in the order of `paths`.
async fn analyze_all(
    analyzer: Arc<Analyzer>,
    paths: Vec<PathBuf>,
    jobs: usize,
) -> Vec<Result<ResultTree, String>> {
    let permits = Arc::new(Semaphore::new(jobs));

    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let analyzer = Arc::clone(&analyzer);
            let permits = Arc::clone(&permits);
            tokio::spawn(analyze_one(analyzer, permits, path))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Analysis task panicked: {}", e);
                Err(format!("analysis task failed: {}", e))
            }
        };
        results.push(result);
    }
    results
}

async fn analyze_one(
    analyzer: Arc<Analyzer>,
    permits: Arc<Semaphore>,
    path: PathBuf,
) -> Result<ResultTree, String> {
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| format!("semaphore closed: {}", e))?;
    tokio::task::spawn_blocking(move || analyzer.analyze_path(&path))
        .await
        .map_err(|e| format!("analysis task failed: {}", e))?
        .map_err(|e| e.to_string())
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "media_probe=debug"
    } else {
        "media_probe=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
