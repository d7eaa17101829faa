use anyhow::{Context as AnyhowContext, Result};
use axum::{
    extract::Query,
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use date_range::RangeRequest;
use file_source::FileNoteSource;
use http_api::RunParams;
use notelens_chunker::{assemble, Chunker};
use notelens_insight::{pattern, ChunkAnalyzer, NoteQuery, Pipeline};
use notelens_protocol::{ErrorKind, ReportEnvelope};
use notion::NotionSource;
use openai::OpenAiAnalyzer;
use serde::Serialize;
use server_security::BindPolicy;
use settings::{EnvLookup, ProfileConfig, Settings};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod date_range;
mod file_source;
mod http_api;
mod notion;
mod openai;
mod server_security;
mod settings;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "notelens")]
#[command(about = "Writing-pattern and content reports over timestamped notes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML); environment variables override it
    #[arg(long, global = true, env = "NOTELENS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve reports over HTTP (POST /api/run)
    ServeHttp(ServeArgs),

    /// Produce one report and print its envelope as JSON
    Run(RunArgs),

    /// Print the assembled text of a notes file split into chunks
    Chunk(ChunkArgs),

    /// Print the writing-pattern statistics of a notes file
    Pattern(PatternArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:3000
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Allow binding to non-loopback addresses
    #[arg(long)]
    public: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Profile selecting the note-source credentials
    #[arg(long)]
    profile: Option<String>,

    /// Lookback window in days, today included
    #[arg(long)]
    preset: Option<String>,

    /// First day (YYYY-MM-DD); overrides --preset
    #[arg(long)]
    from: Option<String>,

    /// Last day (YYYY-MM-DD), inclusive
    #[arg(long)]
    to: Option<String>,

    /// Read notes from a JSON file instead of Notion
    #[arg(long)]
    notes_file: Option<PathBuf>,

    /// Chunk bound in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct ChunkArgs {
    /// Notes file (JSON array of {id, created, text, tags?})
    notes_file: PathBuf,

    /// Chunk bound in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct PatternArgs {
    /// Notes file (JSON array of {id, created, text, tags?})
    notes_file: PathBuf,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // stdout carries JSON for every command except the server banner.
    let json_output = !matches!(cli.command, Commands::ServeHttp(_));
    if json_output && !cli.verbose {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut settings = Settings::load(cli.config.as_deref(), &settings::process_env)?;

    match cli.command {
        Commands::ServeHttp(args) => serve_http(args, settings).await?,
        Commands::Run(args) => {
            if let Some(chunk_size) = args.chunk_size {
                settings.chunk_size = chunk_size;
            }
            run_once(args, settings).await?;
        }
        Commands::Chunk(args) => {
            if let Some(chunk_size) = args.chunk_size {
                settings.chunk_size = chunk_size;
            }
            run_chunk(&args, &settings)?;
        }
        Commands::Pattern(args) => run_pattern(&args)?,
    }

    Ok(())
}

/// Settings, pipeline and analyser shared by every report request.
struct ReportService {
    settings: Settings,
    pipeline: Pipeline,
    analyzer: Box<dyn ChunkAnalyzer>,
}

impl ReportService {
    fn new(settings: Settings) -> Result<Self> {
        let analyzer = OpenAiAnalyzer::new(&settings.analysis)?;
        Self::with_analyzer(settings, Box::new(analyzer))
    }

    fn with_analyzer(settings: Settings, analyzer: Box<dyn ChunkAnalyzer>) -> Result<Self> {
        let chunker = Chunker::new(settings.chunker_config()).context("Invalid chunk_size")?;
        let pipeline = Pipeline::new(chunker, settings.request_timeout());
        Ok(Self {
            settings,
            pipeline,
            analyzer,
        })
    }

    fn resolve_range(&self, request: &RangeRequest<'_>) -> Result<NoteQuery, date_range::RangeError> {
        date_range::resolve(
            request,
            Utc::now().date_naive(),
            self.settings.default_period_days,
        )
    }

    /// Run against the Notion profile `profile` (or the default profile).
    async fn run_profile(&self, profile: Option<&str>, query: &NoteQuery) -> ReportEnvelope {
        let source = match self.notion_source(profile, &settings::process_env) {
            Ok(source) => source,
            Err(envelope) => return *envelope,
        };
        self.pipeline
            .run(&source, self.analyzer.as_ref(), query)
            .await
    }

    async fn run_file(&self, path: &Path, query: &NoteQuery) -> Result<ReportEnvelope> {
        let source = FileNoteSource::open(path, self.settings.max_notes)?;
        Ok(self
            .pipeline
            .run(&source, self.analyzer.as_ref(), query)
            .await)
    }

    fn notion_source(
        &self,
        profile: Option<&str>,
        env: EnvLookup<'_>,
    ) -> Result<NotionSource, Box<ReportEnvelope>> {
        let key = profile
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .unwrap_or(&self.settings.default_profile);
        let config = ProfileConfig::resolve(key, &self.settings, env);

        let missing = config.missing_fields();
        if !missing.is_empty() {
            log::warn!(
                "Profile '{key}' is incomplete: missing {}",
                missing.join(", ")
            );
            return Err(Box::new(incomplete_profile_envelope(&config, &missing)));
        }
        let expected_env = config.expected_env();
        let Some(notion) = config.complete() else {
            return Err(Box::new(ReportEnvelope::error(
                ErrorKind::GenericServerError,
                Some(format!("Expected environment variables: {}", expected_env.join(", "))),
            )));
        };

        NotionSource::new(&self.settings, notion).map_err(|err| {
            Box::new(ReportEnvelope::error(
                ErrorKind::GenericServerError,
                Some(format!("{err:#}")),
            ))
        })
    }
}

fn incomplete_profile_envelope(config: &ProfileConfig, missing: &[&str]) -> ReportEnvelope {
    ReportEnvelope::error_with_message(
        ErrorKind::GenericServerError,
        format!(
            "Profile '{}' is missing required settings: {}",
            config.key,
            missing.join(", ")
        ),
        Some(format!(
            "Expected environment variables: {}",
            config.expected_env().join(", ")
        )),
    )
}

async fn run_once(args: RunArgs, settings: Settings) -> Result<()> {
    let service = ReportService::new(settings)?;
    let request = RangeRequest {
        preset: args.preset.as_deref(),
        from: args.from.as_deref(),
        to: args.to.as_deref(),
    };
    let query = service.resolve_range(&request)?;

    let envelope = match &args.notes_file {
        Some(path) => service.run_file(path, &query).await?,
        None => service.run_profile(args.profile.as_deref(), &query).await,
    };
    print_json(&envelope, args.pretty)
}

fn run_chunk(args: &ChunkArgs, settings: &Settings) -> Result<()> {
    let notes = file_source::load_notes(&args.notes_file)?;
    let chunker = Chunker::new(settings.chunker_config()).context("Invalid chunk_size")?;
    let chunks = chunker.chunk_str(&assemble(&notes));
    log::info!(
        "{} notes in {} chunks of at most {} chars",
        notes.len(),
        chunks.len(),
        chunker.config().max_chunk_chars
    );
    print_json(&chunks, args.pretty)
}

fn run_pattern(args: &PatternArgs) -> Result<()> {
    let notes = file_source::load_notes(&args.notes_file)?;
    print_json(&pattern::analyze(&notes), args.pretty)
}

struct HttpState {
    service: ReportService,
}

async fn serve_http(args: ServeArgs, settings: Settings) -> Result<()> {
    let policy = BindPolicy::from_public_flag(args.public);
    let addrs = server_security::resolve_guarded_bind_addrs(&args.bind, policy).await?;
    let state = Arc::new(HttpState {
        service: ReportService::new(settings)?,
    });

    let app: Router = Router::new()
        .route(
            "/api/run",
            post({
                let state = state.clone();
                move |Query(params): Query<RunParams>| http_run(params, state.clone())
            }),
        )
        .route("/health", get(http_health));

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    let local_addr = listener.local_addr()?;
    let base_url = format!("http://{local_addr}");

    print_stdout(&format!("Serving reports: {base_url}/api/run"))?;
    print_stdout(&format!("Health endpoint: {base_url}/health"))?;
    log::info!(
        "Report budget: {}s per request",
        state.service.pipeline.timeout().as_secs()
    );
    if args.public {
        let addrs = addrs
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        print_stdout(&format!(
            "Public bind enabled (--public). Resolved addresses: {addrs}"
        ))?;
    }
    print_stdout(&format!(
        "Try: curl -X POST '{base_url}/api/run?preset=7&profile={}'",
        state.service.settings.default_profile
    ))?;

    axum::serve(listener, app).await?;
    Ok(())
}

async fn http_run(params: RunParams, state: Arc<HttpState>) -> Result<Response, StatusCode> {
    let request = RangeRequest {
        preset: params.preset.as_deref(),
        from: params.from.as_deref(),
        to: params.to.as_deref(),
    };
    let query = match state.service.resolve_range(&request) {
        Ok(query) => query,
        Err(err) => return http_api::bad_request(err.to_string()),
    };

    let envelope = state
        .service
        .run_profile(params.profile.as_deref(), &query)
        .await;
    log::info!("POST /api/run -> {}", envelope.status());
    http_api::build_response(StatusCode::OK, &envelope)
}

async fn http_health() -> Result<Response, StatusCode> {
    let body = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    http_api::build_response(StatusCode::OK, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use notelens_insight::AnalysisError;
    use notelens_protocol::ChunkAnalysis;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct NeverAnalyzer;

    #[async_trait]
    impl ChunkAnalyzer for NeverAnalyzer {
        async fn analyze(&self, _chunk: &str) -> Result<ChunkAnalysis, AnalysisError> {
            Err(AnalysisError::Failed("not expected in this test".into()))
        }
    }

    fn service() -> ReportService {
        ReportService::with_analyzer(Settings::default(), Box::new(NeverAnalyzer)).unwrap()
    }

    #[test]
    fn incomplete_profile_lists_missing_fields_and_env_names() {
        let env: HashMap<&str, &str> = HashMap::from([("GHOST_PROPERTY_NAME", "Body")]);
        let lookup = move |key: &str| env.get(key).map(|v| v.to_string());

        let envelope = match service().notion_source(Some("ghost"), &lookup) {
            Err(envelope) => *envelope,
            Ok(_) => panic!("expected an incomplete profile"),
        };
        match envelope {
            ReportEnvelope::Error {
                kind,
                message,
                detail,
                ..
            } => {
                assert_eq!(kind, ErrorKind::GenericServerError);
                assert_eq!(
                    message,
                    "Profile 'ghost' is missing required settings: notionToken, notionDataSourceId"
                );
                assert!(detail.unwrap().contains("GHOST_NOTION_TOKEN"));
            }
            other => panic!("expected error envelope, got {other:?}"),
        }
    }

    #[test]
    fn complete_profile_builds_a_source() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DIARY_NOTION_TOKEN", "secret"),
            ("DIARY_NOTION_DATA_SOURCE_ID", "ds-1"),
            ("DIARY_PROPERTY_NAME", "Body"),
        ]);
        let lookup = move |key: &str| env.get(key).map(|v| v.to_string());
        assert!(service().notion_source(Some("diary"), &lookup).is_ok());
    }

    #[tokio::test]
    async fn malformed_range_is_rejected_before_running() {
        let state = Arc::new(HttpState { service: service() });
        let params = RunParams {
            from: Some("03/01/2025".to_string()),
            ..RunParams::default()
        };
        let response = http_run(params, state.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let inverted = RunParams {
            from: Some("2025-03-09".to_string()),
            to: Some("2025-03-01".to_string()),
            ..RunParams::default()
        };
        let response = http_run(inverted, state.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Incomplete profiles are report outcomes, not request errors.
        let valid = RunParams {
            preset: Some("7".to_string()),
            profile: Some("notelens-unconfigured-profile".to_string()),
            ..RunParams::default()
        };
        let response = http_run(valid, state).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_notes_file_yields_empty_envelope() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[]").unwrap();
        let query = NoteQuery {
            from: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2025, 1, 7, 23, 59, 59).unwrap(),
        };

        let envelope = service().run_file(file.path(), &query).await.unwrap();
        assert_eq!(envelope, ReportEnvelope::empty());
    }
}
