//! clinisim Reference Runtime: Demo CLI
//!
//! Runs the scripted demo scenarios, or an interactive interview against
//! the sample case using either the scripted patient or a live
//! OpenAI-compatible endpoint.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- interview
//!   cargo run -p demo -- safety
//!   cargo run -p demo -- complete
//!   cargo run -p demo -- generate
//!   cargo run -p demo -- --config clinisim.toml --mode incremental interactive --live

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use clinisim_config::EngineConfig;
use clinisim_contracts::{
    error::ClinisimResult,
    session::{GradingMode, UserId},
};
use clinisim_core::traits::ChatModel;
use clinisim_openai::OpenAiChatModel;
use clinisim_ref::{
    sample_data::SAMPLE_PROFILE_ID,
    scenarios::{completion, generation, interview, safety},
    Runtime, ScriptedModel,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// clinisim: virtual-patient interview grading demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "clinisim reference runtime demo",
    long_about = "Runs clinisim demo scenarios showing the parallel analysis graph,\n\
                  incremental and holistic grading, safety escalation, and profile generation."
)]
struct Cli {
    /// Engine configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Grading mode for `interactive`, overriding the configuration.
    #[arg(long, global = true)]
    mode: Option<GradingMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all four scenarios in sequence.
    RunAll,
    /// Scenario 1: incremental interview with per-turn scores.
    Interview,
    /// Scenario 2: risk escalation and reply screening.
    Safety,
    /// Scenario 3: holistic completion and the one-way completed state.
    Complete,
    /// Scenario 4: profile generation and severity bounds.
    Generate,
    /// Interview the sample patient from stdin. Type /done to be graded.
    Interactive {
        /// Use the configured OpenAI-compatible endpoint instead of the
        /// scripted patient.
        #[arg(long)]
        live: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all().await,
        Command::Interview => interview::run_scenario().await,
        Command::Safety => safety::run_scenario().await,
        Command::Complete => completion::run_scenario().await,
        Command::Generate => generation::run_scenario().await,
        Command::Interactive { live } => run_interactive(cli.config, cli.mode, live).await,
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_all() -> ClinisimResult<()> {
    interview::run_scenario().await?;
    safety::run_scenario().await?;
    completion::run_scenario().await?;
    generation::run_scenario().await?;
    Ok(())
}

// ── Interactive interview ─────────────────────────────────────────────────────

fn load_config(path: Option<PathBuf>, mode: Option<GradingMode>) -> ClinisimResult<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::from_file(&path)?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides()?;
    if let Some(mode) = mode {
        config.grading_mode = mode;
    }
    config.validate()?;
    Ok(config)
}

async fn run_interactive(
    path: Option<PathBuf>,
    mode: Option<GradingMode>,
    live: bool,
) -> ClinisimResult<()> {
    let config = load_config(path, mode)?;
    let model: Arc<dyn ChatModel> = if live {
        Arc::new(OpenAiChatModel::from_env(
            config.model.base_url.clone(),
            config.model.name.clone(),
            &config.model.api_key_env,
        )?)
    } else {
        Arc::new(ScriptedModel::new())
    };

    let runtime = Runtime::new(&config, model).await?;
    let profile = runtime.seed_sample_profile().await?;
    let session = runtime.sessions.open_session(UserId(1), SAMPLE_PROFILE_ID).await?;

    println!("=== Interactive Interview ===");
    println!();
    println!("  Setting:         {}", profile.case_metadata.setting);
    println!("  Chief complaint: {}", profile.case_metadata.chief_complaint);
    println!("  Grading mode:    {:?}", config.grading_mode);
    println!();
    println!("  Type your questions. /done to finish and be graded, /quit to leave.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Ok(Some(line)) = lines.next_line().await else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" => return Ok(()),
            "/done" => break,
            utterance => match runtime.sessions.submit_turn(session.id, utterance).await {
                Ok(committed) => {
                    println!("  Patient: {}", committed.patient.content);
                    if let Some(score) = committed.patient.score {
                        println!("           [{:+}, total {}]", score, committed.total_score);
                    }
                }
                Err(e) => println!("  [turn failed: {}]", e),
            },
        }
    }

    let outcome = runtime.sessions.complete(session.id).await?;
    let feedback = &outcome.agent_remarks.interview_feedback;
    println!();
    println!("  Grade:            {} ({})", outcome.grade, outcome.band.label());
    println!("  Session score:    {}", outcome.total_score);
    println!("  Strengths:        {}", feedback.strengths.join(", "));
    println!("  To improve:       {}", feedback.areas_for_improvement.join(", "));
    println!("  Missed questions: {}", feedback.missed_questions.join(", "));
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("clinisim — Virtual Patient Grading Engine");
    println!("Reference Demo");
    println!("=========================================");
    println!();
    println!("Pipeline per clinician turn:");
    println!("  [1] LoadProfile reads the case from the profile store");
    println!("  [2] Seven analysis nodes run concurrently; all must finish");
    println!("  [3] GenerateResponse synthesizes the reply, screened for unsafe content");
    println!("  [4] ScoreTurn adds a per-turn score (incremental mode only)");
    println!("  [5] Both turns appended to the SHA-256 chained transcript");
    println!();
}
