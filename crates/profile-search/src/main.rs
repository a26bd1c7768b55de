use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use profile_search::config::{
    BackendKind, DEFAULT_BIND, DEFAULT_BULK_BATCH_SIZE, DEFAULT_ELASTICSEARCH_URL,
    DEFAULT_INDEX_NAME,
};
use profile_search::data_processing::{
    self, CleanedProfiles, ProfileRecord, processed, raw,
};
use profile_search::{SearchBackend, ServiceConfig, api, ingest, init_logging};
use tracing::info;
use tracing::level_filters::LevelFilter;

/// Clean a profile dump, index it and serve OR/AND search over HTTP
#[derive(Parser, Debug)]
#[command(name = "profile-search", version)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "PROFILE_SEARCH_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// Search engine serving the index
    #[arg(long, value_enum, env = "PROFILE_SEARCH_BACKEND", default_value_t = BackendKind::Elasticsearch, global = true)]
    backend: BackendKind,

    /// Elasticsearch base URL
    #[arg(long, env = "PROFILE_SEARCH_ES_URL", default_value = DEFAULT_ELASTICSEARCH_URL, global = true)]
    es_url: String,

    /// Index name
    #[arg(long, env = "PROFILE_SEARCH_INDEX", default_value = DEFAULT_INDEX_NAME, global = true)]
    index: String,

    /// Embedded index directory [default: <data dir>/index]
    #[arg(long, env = "PROFILE_SEARCH_INDEX_DIR", global = true)]
    index_dir: Option<PathBuf>,

    /// Keep the embedded index in memory
    #[arg(long, global = true, conflicts_with = "index_dir")]
    in_memory: bool,

    /// Engine request timeout in seconds
    #[arg(long, env = "PROFILE_SEARCH_TIMEOUT_SECS", default_value_t = 30, global = true)]
    timeout_secs: u64,

    /// Documents per bulk request
    #[arg(long, env = "PROFILE_SEARCH_BATCH_SIZE", default_value_t = DEFAULT_BULK_BATCH_SIZE, global = true)]
    batch_size: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean and deduplicate a raw file into JSON lines
    Clean {
        /// Raw profile file [default: <data dir>/300-user-linkedin.txt]
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Write each column's cleaned values to its own text file
    ExportColumns {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Recreate the index and load profiles into it
    Ingest {
        /// Raw profile file, cleaned before indexing
        #[arg(long, conflicts_with = "records")]
        input: Option<PathBuf>,
        /// Already cleaned JSON-lines file
        #[arg(long)]
        records: Option<PathBuf>,
    },
    /// Serve the search API
    Serve {
        #[arg(long, env = "PROFILE_SEARCH_BIND", default_value = DEFAULT_BIND)]
        bind: String,
        #[arg(long, env = "PROFILE_SEARCH_DEFAULT_SIZE", default_value_t = 10)]
        default_size: usize,
        #[arg(long, env = "PROFILE_SEARCH_MAX_SIZE", default_value_t = 100)]
        max_size: usize,
        /// Clean and ingest this raw file before serving
        #[arg(long)]
        ingest: Option<PathBuf>,
    },
}

impl EngineArgs {
    fn config(&self) -> profile_search::config::ServiceConfigBuilder {
        let builder = ServiceConfig::builder()
            .backend(self.backend)
            .url(&self.es_url)
            .index_name(&self.index)
            .timeout(Duration::from_secs(self.timeout_secs))
            .bulk_batch_size(self.batch_size);
        if self.in_memory {
            builder.index_dir(None)
        } else if let Some(dir) = &self.index_dir {
            builder.index_dir(Some(dir.clone()))
        } else {
            builder
        }
    }
}

fn clean(input: Option<&Path>) -> anyhow::Result<(CleanedProfiles, PathBuf)> {
    let input = input.map_or_else(data_processing::default_raw_file, Path::to_path_buf);
    let cleaned = data_processing::clean_profile_file(&input)
        .with_context(|| format!("cleaning {}", input.display()))?;
    Ok((cleaned, input))
}

fn load_records(input: Option<&Path>, records: Option<&Path>) -> anyhow::Result<Vec<ProfileRecord>> {
    match records {
        Some(path) => processed::read_records_jsonl(path)
            .with_context(|| format!("reading {}", path.display())),
        None => Ok(clean(input)?.0.records),
    }
}

async fn run_ingest(config: &ServiceConfig, backend: &SearchBackend, records: &[ProfileRecord]) -> anyhow::Result<()> {
    let report = ingest(backend, records, config.engine.bulk_batch_size).await?;
    info!(indexed = report.indexed, failed = report.failed, index = %config.engine.index, "Profiles indexed");
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.parse::<LevelFilter>()?)?;

    match cli.command {
        Command::Clean { input, output } => {
            let (cleaned, input) = clean(input.as_deref())?;
            cleaned.save(&output, &input.display().to_string())?;
            info!(records = cleaned.records.len(), output = %output.display(), "Cleaned profiles written");
        }
        Command::ExportColumns { input, out_dir } => {
            let input = input.unwrap_or_else(data_processing::default_raw_file);
            let raw_lf = raw::read_raw_profiles(&input)?;
            info!(lines = raw::count_raw_lines(&input)?, "Raw file loaded");
            let written = processed::export_columns(raw_lf, &out_dir)?;
            info!(files = written.len(), out_dir = %out_dir.display(), "Columns exported");
        }
        Command::Ingest { input, records } => {
            let config = cli.engine.config().build()?;
            let records = load_records(input.as_deref(), records.as_deref())?;
            let backend = SearchBackend::from_config(&config.engine)?;
            run_ingest(&config, &backend, &records).await?;
        }
        Command::Serve {
            bind,
            default_size,
            max_size,
            ingest,
        } => {
            let config = cli
                .engine
                .config()
                .bind(bind)
                .default_size(default_size)
                .max_size(max_size)
                .build()?;
            let backend = SearchBackend::from_config(&config.engine)?;
            if let Some(path) = ingest {
                let records = load_records(Some(&path), None)?;
                run_ingest(&config, &backend, &records).await?;
            }
            api::serve(&config, backend).await?;
        }
    }
    Ok(())
}
