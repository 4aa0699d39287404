use anyhow::Context;
use article_search_core::{
    discover_pdf_files, CancellationToken, DocumentIndex, IngestionOptions, IngestionPipeline,
    MatchPolicy, OcrEndpointConfig, OpenSearchStore, RefreshWindow, RestoreOutcome,
    SearchCoordinator, TesseractConfig, TextExtractor, Upload, DEFAULT_SEARCH_SIZE,
};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "article-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenSearch host
    #[arg(long, env = "OPENSEARCH_HOST", default_value = "localhost")]
    opensearch_host: String,

    /// OpenSearch port
    #[arg(long, env = "OPENSEARCH_PORT", default_value_t = 9200)]
    opensearch_port: u16,

    /// OpenSearch scheme (http or https)
    #[arg(long, env = "OPENSEARCH_SCHEME", default_value = "http")]
    opensearch_scheme: String,

    /// Index holding the uploaded articles
    #[arg(long, env = "OPENSEARCH_INDEX", default_value = "articles")]
    index: String,

    /// Refresh interval put back on the index at shutdown
    #[arg(long, default_value = "1s")]
    refresh_interval: String,

    /// Timeout for every request sent to OpenSearch, in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Bulk submission attempts before documents are reported as rejected
    #[arg(long, default_value_t = 3)]
    bulk_attempts: u32,

    /// Files extracted at the same time (defaults to the number of CPUs)
    #[arg(long)]
    max_parallel_extractions: Option<usize>,

    /// OCR engine used when a PDF has no native text
    #[arg(long, value_enum, default_value_t = OcrEngine::Tesseract)]
    ocr: OcrEngine,

    /// HTTP OCR endpoint for `--ocr endpoint`
    #[arg(long, env = "LLM_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// Bearer token for the OCR endpoint
    #[arg(long, env = "LLM_OCR_API_KEY", hide_env_values = true)]
    ocr_api_key: Option<String>,

    #[arg(long, default_value = "tesseract")]
    tesseract_bin: String,

    #[arg(long, default_value = "pdftoppm")]
    pdftoppm_bin: String,

    /// Tesseract language pack
    #[arg(long, default_value = "eng")]
    ocr_language: String,

    /// Rasterisation resolution for OCR
    #[arg(long, default_value_t = 300)]
    ocr_dpi: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OcrEngine {
    Tesseract,
    Endpoint,
    Off,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Literal,
    Fuzzy,
}

impl From<PolicyArg> for MatchPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Literal => MatchPolicy::Literal,
            PolicyArg::Fuzzy => MatchPolicy::Fuzzy,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Upload PDFs: extract their text (OCR when needed) and bulk index them.
    Ingest {
        /// PDF file to upload; repeatable.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Folder searched recursively for PDFs.
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Fuzzy search and print the matching sentences.
    Search {
        /// Search query; an empty query returns nothing.
        #[arg(long, default_value = "")]
        query: String,
        /// Maximum number of documents fetched from the index.
        #[arg(long, default_value_t = DEFAULT_SEARCH_SIZE)]
        size: usize,
        /// How sentences are re-checked against the query.
        #[arg(long, value_enum, default_value_t = PolicyArg::Literal)]
        match_policy: PolicyArg,
        /// Print results as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Check that OpenSearch answers.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            eprintln!("ignoring unreadable .env file: {error}");
        }
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = Arc::new(
        OpenSearchStore::from_parts(
            &cli.opensearch_scheme,
            &cli.opensearch_host,
            cli.opensearch_port,
            &cli.index,
            Duration::from_secs(cli.request_timeout_secs),
        )
        .context("invalid OpenSearch settings")?,
    );
    let refresh = Arc::new(RefreshWindow::new(&cli.refresh_interval));

    info!(
        version = app_version,
        endpoint = store.endpoint(),
        index = store.index_name(),
        started_at = %Utc::now().to_rfc3339(),
        "article-search boot"
    );

    let healthy = match store.ping().await {
        Ok(()) => {
            info!("connected to OpenSearch");
            true
        }
        Err(error) => {
            warn!(error = %error, "OpenSearch unreachable, running degraded");
            false
        }
    };

    let outcome = run(&cli, store.clone(), refresh.clone(), healthy).await;

    match refresh.restore(store.as_ref()).await {
        RestoreOutcome::Failed => error!("refresh interval was left suspended"),
        RestoreOutcome::Restored => info!("refresh interval restored at shutdown"),
        RestoreOutcome::NotSuspended | RestoreOutcome::AlreadyRestored => {}
    }

    outcome
}

async fn run(
    cli: &Cli,
    store: Arc<OpenSearchStore>,
    refresh: Arc<RefreshWindow>,
    healthy: bool,
) -> anyhow::Result<()> {
    match &cli.command {
        Command::Health => {
            let status = if healthy { "ok" } else { "degraded" };
            println!("{}", json!({"status": status, "endpoint": store.endpoint()}));
            if !healthy {
                anyhow::bail!("OpenSearch at {} is unreachable", store.endpoint());
            }
        }
        Command::Ingest { files, folder } => {
            let mut paths = files.clone();
            if let Some(folder) = folder {
                paths.extend(discover_pdf_files(folder));
            }
            if paths.is_empty() {
                anyhow::bail!("nothing to ingest: pass --file or --folder");
            }

            let uploads = read_uploads(&paths).await?;
            let pipeline = IngestionPipeline::new(
                store,
                Arc::new(build_extractor(cli)?),
                refresh,
                ingestion_options(cli),
            );

            let (token, handle) = CancellationToken::new();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing files already started");
                    handle.cancel();
                }
            });

            let report = pipeline
                .ingest(uploads, &token)
                .await
                .context("ingestion failed")?;

            for skipped in &report.skipped {
                warn!(title = %skipped.title, reason = %skipped.reason, "skipped upload");
            }

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "message": report.message(),
                    "request_id": report.request_id,
                    "skipped": report.skipped,
                    "partial": report.partial,
                    "rejected": report.rejected,
                    "cancelled": report.cancelled,
                }))?
            );
        }
        Command::Search {
            query,
            size,
            match_policy,
            json: as_json,
        } => {
            let coordinator = SearchCoordinator::new(store).with_policy((*match_policy).into());
            let excerpts = coordinator
                .search(query, *size)
                .await
                .context("search failed")?;

            if *as_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "query": query,
                        "results": excerpts,
                    }))?
                );
            } else {
                println!("query: {query}");
                if excerpts.is_empty() {
                    println!("no matching sentences");
                }
                for excerpt in excerpts {
                    println!("[{}] {}", excerpt.title, excerpt.highlighted_text);
                }
            }
        }
    }

    Ok(())
}

fn build_extractor(cli: &Cli) -> anyhow::Result<TextExtractor> {
    let extractor = match cli.ocr {
        OcrEngine::Off => TextExtractor::native_only(),
        OcrEngine::Tesseract => TextExtractor::with_tesseract(TesseractConfig {
            tesseract_bin: cli.tesseract_bin.clone(),
            pdftoppm_bin: cli.pdftoppm_bin.clone(),
            language: cli.ocr_language.clone(),
            dpi: cli.ocr_dpi,
        }),
        OcrEngine::Endpoint => {
            let endpoint = cli
                .ocr_endpoint
                .as_deref()
                .map(str::trim)
                .filter(|endpoint| !endpoint.is_empty())
                .context("--ocr endpoint needs --ocr-endpoint or LLM_OCR_ENDPOINT")?;
            TextExtractor::with_ocr_endpoint(OcrEndpointConfig {
                endpoint: endpoint.to_string(),
                api_key: cli
                    .ocr_api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string),
            })
        }
    };

    info!(strategies = ?extractor.strategy_names(), "text extraction chain");
    Ok(extractor)
}

fn ingestion_options(cli: &Cli) -> IngestionOptions {
    let defaults = IngestionOptions::default();
    IngestionOptions {
        max_parallel_extractions: cli
            .max_parallel_extractions
            .unwrap_or(defaults.max_parallel_extractions),
        bulk_timeout: Duration::from_secs(cli.request_timeout_secs),
        bulk_attempts: cli.bulk_attempts,
        ..defaults
    }
}

/// An unreadable file fails the whole upload before anything is indexed.
async fn read_uploads(paths: &[PathBuf]) -> anyhow::Result<Vec<Upload>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("cannot read upload {}", path.display()))?;
        uploads.push(Upload::new(file_name(path)?, bytes));
    }
    Ok(uploads)
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("path has no file name: {}", path.display()))
}
