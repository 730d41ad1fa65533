use std::collections::HashSet;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use eyre::{Result, bail};
use log::{LevelFilter, debug, info, warn};

mod cli;

use cli::{Cli, OutputFormat};
use ytbrief::analysis::{AnalysisResult, parse_analysis};
use ytbrief::config::Config;
use ytbrief::language::LanguageDetector;
use ytbrief::llm::{ChatError, ChatSettings};
use ytbrief::output::{self, Report};
use ytbrief::pipeline::{self, Prepared};
use ytbrief::retrieval::LanguagePreferences;
use ytbrief::transport::HttpTransport;
use ytbrief::youtube::YoutubeSource;

const MODEL_ATTEMPTS: u32 = 3;

/// File logger under the local data dir. `--verbose` lowers the default level
/// to debug; `RUST_LOG` still overrides it.
fn setup_logging(verbose: bool) -> Result<()> {
    let path = log_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;

    env_logger::Builder::new()
        .filter_level(if verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_default_env()
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();

    debug!("Logging to {}", path.display());
    Ok(())
}

fn log_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    path.extend(["ytbrief", "logs", "ytbrief.log"]);
    path
}

fn build_after_help(chat: &ChatSettings) -> String {
    let env_var = chat.api_key_env();
    let key_line = if chat.api_key.is_some() || std::env::var(env_var).is_ok() {
        format!("  \x1b[32m✅\x1b[0m API key    ({env_var} or config)")
    } else {
        format!("  \x1b[31m❌\x1b[0m API key    (set {env_var} or api_key in config, needed for analysis)")
    };

    format!(
        "\nMODEL:\n  {} via {}\n{key_line}\n\nConfig is read from: {}\nLogs are written to: {}",
        chat.model,
        chat.api_url,
        ytbrief::config::config_path().display(),
        log_path().display()
    )
}

/// A missing key or a rejected key fails the same way on every attempt
fn is_permanent_failure(err: &eyre::Report) -> bool {
    err.downcast_ref::<ChatError>().is_some_and(ChatError::is_permanent)
}

/// Run `operation` up to `max_attempts` times, doubling the pause after each
/// failure. An error `is_final` accepts is returned without another attempt.
async fn retry<F, Fut, T>(max_attempts: u32, is_final: impl Fn(&eyre::Report) -> bool, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = Duration::from_millis(500);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) if attempt >= max_attempts || is_final(&e) => return Err(e),
            Err(e) => {
                debug!("Attempt {attempt}/{max_attempts} failed: {e}; retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

/// Ask the model and parse its reply. A reply that fails validation is retried
/// with the same prompt.
async fn analyze(client: &reqwest::Client, chat: &ChatSettings, prepared: &Prepared) -> Result<AnalysisResult> {
    retry(MODEL_ATTEMPTS, is_permanent_failure, || async move {
        let reply = ytbrief::llm::complete(client, chat, &prepared.prompt).await?;
        match parse_analysis(&reply) {
            Ok(analysis) => Ok(analysis),
            Err(e) => {
                if let ytbrief::Error::MalformedResponse { ref raw, .. } = e {
                    warn!("Model reply failed validation: {e}\n--- reply ---\n{raw}");
                }
                Err(e.into())
            }
        }
    })
    .await
}

/// State shared by every video of one run
struct Analyzer {
    source: YoutubeSource<HttpTransport>,
    detector: LanguageDetector,
    prefs: LanguagePreferences,
    client: reqwest::Client,
    chat: ChatSettings,
    lang: Option<String>,
    format: OutputFormat,
    transcript_only: bool,
    verbose: bool,
}

impl Analyzer {
    /// Prepare, analyze and render one video
    async fn process(&self, video_id: &str) -> Result<String> {
        let prepared =
            pipeline::prepare(&self.source, &self.detector, &self.prefs, video_id, self.lang.as_deref()).await?;

        if self.verbose {
            eprintln!(
                "Video: {} ({})\nLanguage: {} ({})\nCaptions: {} strategy, {} lines",
                prepared.title.as_deref().unwrap_or("untitled"),
                prepared.video_id,
                prepared.language,
                prepared
                    .language_signal
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_else(|| "forced".to_string()),
                prepared.transcript.strategy,
                prepared.transcript.lines.len(),
            );
        }

        if self.transcript_only {
            return Ok(output::render_transcript(&prepared.transcript));
        }

        let analysis = analyze(&self.client, &self.chat, &prepared).await?;
        let report = Report {
            video_id: &prepared.video_id,
            title: prepared.title.as_deref(),
            language: &prepared.language,
            direction: output::text_direction(&prepared.language),
            strategy: prepared.transcript.strategy,
            analysis: &analysis,
        };

        Ok(match self.format {
            OutputFormat::Text => output::render_text(&report),
            OutputFormat::Json => output::render_json(&report),
        })
    }
}

/// Process each distinct video named in `inputs`, writing every result as soon
/// as it is ready. A failing video is reported and skipped so earlier results
/// are kept. Returns the number of failures.
async fn process_all<F, Fut, W>(inputs: &[String], mut process: F, out: &mut W) -> Result<usize>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String>>,
    W: Write,
{
    let mut seen = HashSet::new();
    let mut failures = 0;
    let mut written = 0;

    for input in inputs.iter().map(|i| i.trim()).filter(|i| !i.is_empty()) {
        let Some(video_id) = ytbrief::extract_video_id(input) else {
            warn!("Could not extract video ID from: {input}");
            eprintln!("Error: not a YouTube URL or 11-character video ID: {input}");
            failures += 1;
            continue;
        };
        if !seen.insert(video_id.clone()) {
            debug!("Skipping duplicate video {video_id}");
            continue;
        }

        match process(video_id.clone()).await {
            Ok(rendered) => {
                if written > 0 {
                    writeln!(out)?;
                }
                writeln!(out, "{rendered}")?;
                out.flush()?;
                written += 1;
            }
            Err(e) => {
                warn!("Failed to process {video_id}: {e:?}");
                eprintln!("Error: {video_id}: {e}");
                failures += 1;
            }
        }
    }

    info!("Processed {written} video(s), {failures} failed");
    Ok(failures)
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let mut chat = config.chat_settings();
    if let Some(ref model) = cli.model {
        chat.model = model.clone();
    }
    if let Some(ref api_url) = cli.api_url {
        chat.api_url = api_url.clone();
    }
    if let Some(secs) = cli.timeout {
        chat.timeout = Duration::from_secs(secs);
    }

    let format = cli.format.unwrap_or(match config.default_format.as_deref() {
        Some("json") => OutputFormat::Json,
        _ => OutputFormat::Text,
    });

    if cli.verbose {
        let config_path = ytbrief::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!("Model: {} ({})", chat.model, chat.api_url);
    }

    let inputs = match cli.url {
        Some(ref url) => vec![url.clone()],
        None => io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?,
    };
    if inputs.iter().all(|u| u.trim().is_empty()) {
        bail!("no URL or video ID provided\n\nUsage: ytbrief <URL>\n       echo <URL> | ytbrief");
    }

    let client = HttpTransport::build_client(None)?;
    let analyzer = Analyzer {
        source: YoutubeSource::new(HttpTransport::new(client.clone())),
        detector: config.language_detector(),
        prefs: config.language_preferences(),
        client,
        chat,
        lang: cli.lang.clone(),
        format,
        transcript_only: cli.transcript_only,
        verbose: cli.verbose,
    };
    let analyzer = &analyzer;

    let mut out: Box<dyn Write> = match cli.output {
        Some(ref path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(io::stdout()),
    };

    let failures = process_all(
        &inputs,
        move |video_id| async move { analyzer.process(&video_id).await },
        &mut out,
    )
    .await?;

    if let Some(path) = cli.output.as_ref().filter(|_| cli.verbose) {
        eprintln!("Output written to: {}", path.display());
    }
    if failures > 0 {
        bail!("{failures} video(s) could not be processed; see the messages above");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Help text shows the configured model, so the config is read before parsing
    let loaded = Config::load();
    let chat = loaded.as_ref().map(Config::chat_settings).unwrap_or_default();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(build_after_help(&chat));
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&cmd.get_matches())?;

    setup_logging(cli.verbose)?;
    let config = loaded.unwrap_or_else(|e| {
        warn!("Ignoring config: {e:#}");
        eprintln!("Warning: ignoring config: {e:#}");
        Config::default()
    });

    // Dropping `run` on Ctrl-C abandons any in-flight request
    tokio::select! {
        result = run(cli, config) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, abandoning in-flight requests");
            bail!("interrupted");
        }
    }
}
