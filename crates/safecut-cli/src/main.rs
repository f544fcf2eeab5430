use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use safecut_core::{AppState, Gender, Language, WizardStep};
use safecut_session::{run_analysis, spawn_session, AnalysisRun, Config, SessionParts};
use serde::Serialize;
use std::path::PathBuf;

mod recorded;

use recorded::RecordedAnalyzer;

#[derive(Parser)]
#[command(name = "safecut", about = "SafeCut AI hairstyle simulator CLI")]
struct Cli {
    /// UI language (ko or en); overrides SAFECUT_LANG
    #[arg(long, global = true)]
    lang: Option<Language>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's usage and remaining free analyses
    Status,
    /// Share the app with a friend to earn one bonus analysis
    Invite,
    /// Clear any result and return the session to the welcome step
    Reset,
    /// Walk through consent, gender selection and one analysis
    Analyze {
        /// Gender context for the analysis (male or female)
        #[arg(short, long)]
        gender: Gender,
        /// Recommendation JSON saved from the AI backend
        #[arg(short, long)]
        recommendation: PathBuf,
        /// Captured face photo
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Extra analysis option, e.g. --option length=short
        #[arg(long = "option", value_parser = parse_key_val)]
        options: Vec<(String, String)>,
        /// Decline the privacy notice instead of agreeing
        #[arg(long)]
        decline_privacy: bool,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s}"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in {s}"));
    }
    Ok((key.trim().to_string(), value.trim().to_string()))
}

#[derive(Serialize)]
struct UsageView {
    step: WizardStep,
    progress: f32,
    date: String,
    count: u32,
    bonus_credits: u32,
    daily_limit: u32,
    remaining: i64,
    allowed: bool,
}

impl From<&AppState> for UsageView {
    fn from(state: &AppState) -> Self {
        Self {
            step: state.step,
            progress: state.step.progress(),
            date: state.usage.date.to_string(),
            count: state.usage.count,
            bonus_credits: state.usage.bonus_credits,
            daily_limit: state.policy.daily_limit,
            remaining: state.remaining(),
            allowed: state.is_allowed(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(lang) = cli.lang {
        config.language = lang;
    }
    let handle = spawn_session(SessionParts::from_config(&config))?;

    match cli.command {
        Commands::Status => {
            let state = handle.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&UsageView::from(&state))?);
        }
        Commands::Invite => {
            let (outcome, state) = handle.invite().await?;
            match outcome.notice {
                Some(notice) => println!("{notice}"),
                None => println!("Share link: {}", config.app_url),
            }
            println!(
                "Bonus credits: {} (remaining today: {})",
                state.usage.bonus_credits,
                state.remaining()
            );
        }
        Commands::Reset => {
            let state = handle.reset().await?;
            println!("{}", serde_json::to_string_pretty(&UsageView::from(&state))?);
        }
        Commands::Analyze {
            gender,
            recommendation,
            image,
            options,
            decline_privacy,
        } => {
            handle.start().await?;
            if decline_privacy {
                handle.cancel_privacy().await?;
                println!("Privacy notice declined; nothing analyzed.");
                return Ok(());
            }
            handle.agree_privacy().await?;

            let Some(attempt) = handle.choose_gender(gender).await? else {
                bail!("session did not enter the analysis step");
            };

            let analyzer = RecordedAnalyzer::new(recommendation, image, options);
            match run_analysis(&handle, attempt, analyzer).await? {
                AnalysisRun::Completed(state) => {
                    let result = state
                        .result
                        .as_ref()
                        .context("completed analysis without a result")?;
                    let report = serde_json::json!({
                        "result": result,
                        "language": state.language,
                        "usage": UsageView::from(&state),
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    handle.reset().await?;
                }
                AnalysisRun::LimitReached(state) => {
                    println!(
                        "Daily limit reached ({} used, {} bonus credits). Run `safecut invite` to earn one more analysis.",
                        state.usage.count, state.usage.bonus_credits
                    );
                }
                AnalysisRun::Stale => {
                    println!("Analysis was superseded; nothing recorded.");
                }
                AnalysisRun::Failed(e) => {
                    bail!("analysis failed: {e}");
                }
            }
        }
    }

    Ok(())
}
