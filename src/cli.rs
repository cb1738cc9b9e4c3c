//! Command-line front end: one-shot `analyze` and an interactive `session`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::{ClientConfig, DEFAULT_RISK_SCALE, DEFAULT_TIMEOUT_SECS};
use crate::report::{describe_error, describe_session_error, render_report, ReportOptions};
use crate::session::{SessionError, TriageSession};
use crate::triage::{AnalysisClient, AnalysisError, ImageUpload, TriageAnalyzer};

#[derive(Parser, Debug)]
#[command(name = "dermsight", version)]
#[command(about = "Submit a skin symptom description and photo for AI-assisted triage")]
pub struct Cli {
    /// Analysis service base URL (default: $DERMSIGHT_API_URL, then http://127.0.0.1:8000)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Seconds to wait for the analysis before giving up
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Risk score that corresponds to a full risk bar
    #[arg(long, global = true, default_value_t = DEFAULT_RISK_SCALE)]
    pub risk_scale: f64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a single case
    Analyze {
        /// Free-text description of the symptoms
        #[arg(long, short)]
        symptoms: String,
        /// Photo of the affected area
        #[arg(long, short)]
        image: PathBuf,
        /// Case ID of an earlier analysis this one follows up on
        #[arg(long)]
        follow_up: Option<String>,
        /// Print the raw result as JSON instead of a report
        #[arg(long)]
        json: bool,
        /// Include summary, differential diagnoses and warning signs
        #[arg(long)]
        details: bool,
    },
    /// Interactive session; offers follow-ups on the previous case
    Session {
        /// Include summary, differential diagnoses and warning signs
        #[arg(long)]
        details: bool,
    },
}

impl Cli {
    /// Flags first, then the environment, then built-in defaults.
    pub fn client_config(&self) -> ClientConfig {
        let config = match self.api_url.as_deref() {
            Some(url) => ClientConfig::new(url),
            None => ClientConfig::from_env(),
        };
        config
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_risk_scale(self.risk_scale)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Message for the terminal, as opposed to the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Analysis(e) => describe_error(e),
            Self::Session(e) => describe_session_error(e),
            other => other.to_string(),
        }
    }
}

/// Counts reported when an interactive session ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub succeeded: u32,
    pub failed: u32,
}

pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let config = cli.client_config();
    tracing::info!(base_url = %config.base_url, timeout_secs = cli.timeout_secs, "Using analysis service");

    let client = AnalysisClient::new(config.clone())?;
    let session = Arc::new(TriageSession::new());
    let watcher = spawn_interrupt_watcher(session.clone());
    let mut out = std::io::stdout();

    let outcome = match cli.command {
        Commands::Analyze {
            symptoms,
            image,
            follow_up,
            json,
            details,
        } => {
            let options = ReportOptions::from_config(&config).with_details(details);
            analyze_once(
                &client,
                &session,
                &symptoms,
                &image,
                follow_up,
                json,
                config.max_image_bytes,
                &options,
                &mut out,
            )
            .await
        }
        Commands::Session { details } => {
            let options = ReportOptions::from_config(&config).with_details(details);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_session(&client, &session, stdin, &mut out, config.max_image_bytes, &options)
                .await
                .map(|summary| {
                    tracing::info!(
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        "Session ended"
                    );
                })
        }
    };

    watcher.abort();
    outcome
}

/// Ctrl-C cancels the in-flight analysis; with nothing in flight it exits.
fn spawn_interrupt_watcher(session: Arc<TriageSession>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !session.cancel() {
                eprintln!("Interrupted");
                std::process::exit(130);
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
async fn analyze_once<A, W>(
    analyzer: &A,
    session: &TriageSession,
    symptoms: &str,
    image_path: &Path,
    follow_up: Option<String>,
    json: bool,
    max_image_bytes: u64,
    options: &ReportOptions,
    out: &mut W,
) -> Result<(), CliError>
where
    A: TriageAnalyzer + ?Sized,
    W: Write,
{
    let image = ImageUpload::from_path(image_path, max_image_bytes).await?;
    let result = session.submit(analyzer, symptoms, image, follow_up).await?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
    } else {
        writeln!(out, "{}", render_report(&result, options))?;
    }
    Ok(())
}

/// Prompt for cases until a blank symptom line or end of input.
pub async fn run_session<A, R, W>(
    analyzer: &A,
    session: &TriageSession,
    input: R,
    out: &mut W,
    max_image_bytes: u64,
    options: &ReportOptions,
) -> Result<SessionSummary, CliError>
where
    A: TriageAnalyzer + ?Sized,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut summary = SessionSummary::default();

    loop {
        writeln!(out, "\nDescribe the symptoms (blank line to quit):")?;
        out.flush()?;
        let Some(symptoms) = lines.next_line().await? else {
            break;
        };
        if symptoms.trim().is_empty() {
            break;
        }

        writeln!(out, "Path to image:")?;
        out.flush()?;
        let Some(path) = lines.next_line().await? else {
            break;
        };

        let follow_up = match session.last_case_id() {
            Some(case_id) => {
                writeln!(out, "Follow up on case {case_id}? [y/N]")?;
                out.flush()?;
                let answer = lines.next_line().await?.unwrap_or_default();
                let accepted =
                    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes");
                accepted.then_some(case_id)
            }
            None => None,
        };

        let image = match ImageUpload::from_path(Path::new(path.trim()), max_image_bytes).await {
            Ok(image) => image,
            Err(e) => {
                summary.failed += 1;
                writeln!(out, "{}", describe_error(&e))?;
                continue;
            }
        };

        writeln!(out, "Analyzing...")?;
        out.flush()?;
        match session.submit(analyzer, &symptoms, image, follow_up).await {
            Ok(result) => {
                summary.succeeded += 1;
                writeln!(out, "\n{}", render_report(&result, options))?;
            }
            Err(e) => {
                summary.failed += 1;
                writeln!(out, "{}", describe_session_error(&e))?;
            }
        }
    }

    Ok(summary)
}
