use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use finserv_overlay::config::{self, Config};
use finserv_overlay::lifecycle::{
    AssessmentStore, JsonFileStore, LifecycleAction, LogPublisher, RiskAssessment, StoreError,
};
use finserv_overlay::scoring::{
    plan_review, score_factors, FactorInputs, ModelProfile, RiskFactors, ScoringConfig,
};
use finserv_overlay::synth::{
    CsvSink, GenerationReport, GenerationRequest, GenerationSettings, TransactionGenerator,
};
use finserv_overlay::{assess, output, EngineError};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
/// Input rejected by an engine (validation, transition, segregation of duties)
const EXIT_REJECTED: i32 = 2;
/// Store record changed underneath us, or request over a resource limit
const EXIT_CONFLICT: i32 = 3;
const EXIT_CONFIG: i32 = 4;
/// Generation stopped early; output is a valid prefix
const EXIT_INCOMPLETE: i32 = 5;

/// Normalised risk factors, each in [0, 1]
#[derive(Args, Debug, Clone)]
struct FactorArgs {
    #[arg(long)]
    exposure: Option<f64>,
    #[arg(long)]
    regulatory_capital_impact: Option<f64>,
    #[arg(long)]
    customer_facing: Option<f64>,
    #[arg(long)]
    limitations: Option<f64>,

    /// Derive all factors from a raw profile instead: annual exposure in USD
    #[arg(
        long,
        conflicts_with_all = [
            "exposure",
            "regulatory_capital_impact",
            "customer_facing",
            "limitations",
        ]
    )]
    annual_exposure_usd: Option<f64>,
    /// Profile: the model feeds regulatory capital calculations
    #[arg(long, requires = "annual_exposure_usd")]
    capital_model: bool,
    /// Profile: the model's output reaches customers
    #[arg(long, requires = "annual_exposure_usd")]
    customer_model: bool,
    /// Profile: number of documented model limitations
    #[arg(long, requires = "annual_exposure_usd")]
    known_limitations: Option<u32>,
}

impl FactorArgs {
    fn inputs(&self) -> Result<FactorInputs, EngineError> {
        match self.annual_exposure_usd {
            Some(usd) => {
                let profile = ModelProfile {
                    annual_exposure_usd: usd,
                    regulatory_capital_impact: self.capital_model,
                    customer_facing: self.customer_model,
                    known_limitations: self.known_limitations.unwrap_or(0),
                };
                Ok(profile.normalize()?.into())
            }
            None => Ok(FactorInputs {
                exposure: self.exposure,
                regulatory_capital_impact: self.regulatory_capital_impact,
                customer_facing: self.customer_facing,
                limitations: self.limitations,
            }),
        }
    }

    fn complete(&self) -> Result<RiskFactors, EngineError> {
        let inputs = self.inputs()?;
        let factors = inputs.complete().ok_or_else(|| {
            EngineError::validation("factors", format!("missing {}", inputs.missing().join(", ")))
        })?;
        Ok(factors)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a model without storing anything
    Score {
        #[command(flatten)]
        factors: FactorArgs,
        /// Assessment date for the review schedule (RFC 3339, defaults to now)
        #[arg(long)]
        assessed_at: Option<DateTime<Utc>>,
        /// Days since the model went into production; enables the overdue check
        #[arg(long)]
        model_age_days: Option<u32>,
    },
    /// Score a model and store the result as a draft assessment
    Assess {
        #[arg(long)]
        model: String,
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        assessor: String,
        #[command(flatten)]
        factors: FactorArgs,
    },
    /// Move an assessment through its lifecycle
    Transition {
        id: Uuid,
        /// submit, validate, request-revision, reopen or mark-stale
        action: LifecycleAction,
        #[arg(long)]
        actor: String,
    },
    /// Start a new revision of an assessment with corrected factors
    Revise {
        id: Uuid,
        #[arg(long)]
        assessor: String,
        #[command(flatten)]
        factors: FactorArgs,
    },
    /// Show one assessment, or list all of them
    Show { id: Option<Uuid> },
    /// Generate fraud-labeled synthetic transactions as CSV
    Generate {
        #[arg(long)]
        tenant: String,
        /// Job identifier; the default seed is derived from tenant and job
        #[arg(long, default_value = "default")]
        job: String,
        #[arg(long)]
        count: u64,
        #[arg(long)]
        fraud_rate: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
        /// Log-normal mu of the amount distribution
        #[arg(long)]
        mu: Option<f64>,
        /// Log-normal sigma of the amount distribution
        #[arg(long)]
        sigma: Option<f64>,
        /// Output file (defaults to stdout). Appended to when resuming
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// First index to generate, after an interrupted run
        #[arg(long, default_value_t = 0)]
        resume_from: u64,
    },
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Parser, Debug)]
#[command(name = "finserv-overlay")]
#[command(about = "Model-risk scoring and synthetic transaction generation", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/finserv-overlay/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(engine) = err.downcast_ref::<EngineError>() {
        return match engine {
            EngineError::Validation { .. }
            | EngineError::InvalidTransition { .. }
            | EngineError::SegregationOfDuties { .. } => EXIT_REJECTED,
            EngineError::ResourceLimit { .. } => EXIT_CONFLICT,
            EngineError::PartialGeneration { .. } => EXIT_INCOMPLETE,
        };
    }
    if let Some(StoreError::VersionConflict { .. }) = err.downcast_ref::<StoreError>() {
        return EXIT_CONFLICT;
    }
    EXIT_FAILURE
}

fn fail(err: anyhow::Error) -> ! {
    eprintln!("Error: {:#}", err);
    std::process::exit(exit_code(&err));
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn print_outcome(outcome: &assess::AssessmentOutcome, json: bool, use_colors: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "assessment": outcome.record,
            "score": outcome.score,
            "review": outcome.plan,
        }));
    }
    println!("{}", output::format_assessment(&outcome.record, use_colors));
    if let Some(ref score) = outcome.score {
        println!();
        println!("{}", output::format_score_result(score, outcome.plan.as_ref(), use_colors));
    }
    Ok(())
}

/// Write rows `[resume_from, count)` as CSV. Runs on a blocking thread.
///
/// When a file write fails the file is cut back to the last accepted chunk,
/// so resuming from the reported index appends cleanly.
fn write_transactions(
    generator: &TransactionGenerator,
    path: Option<PathBuf>,
    resume_from: u64,
    cancel: &AtomicBool,
) -> Result<GenerationReport> {
    let with_header = resume_from == 0;
    let Some(path) = path else {
        let mut sink = CsvSink::new(BufWriter::new(std::io::stdout().lock()), with_header);
        let report = generator.run(resume_from, &mut sink, cancel)?;
        sink.into_inner()?;
        return Ok(report);
    };

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(!with_header)
        .truncate(with_header)
        .open(&path)
        .with_context(|| format!("Failed to open output file {}", path.display()))?;
    let base = file
        .metadata()
        .with_context(|| format!("Failed to stat output file {}", path.display()))?
        .len();

    let mut sink = CsvSink::new(file, with_header);
    match generator.run(resume_from, &mut sink, cancel) {
        Ok(report) => {
            sink.into_inner()?;
            Ok(report)
        }
        Err(e) => {
            let keep = base + sink.committed_bytes();
            if let Err(truncate) = sink.get_ref().set_len(keep) {
                tracing::warn!(
                    path = %path.display(),
                    error = %truncate,
                    "could not trim partial chunk"
                );
            }
            Err(e.into())
        }
    }
}

fn run_score(
    factors: &FactorArgs,
    assessed_at: Option<DateTime<Utc>>,
    model_age_days: Option<u32>,
    scoring: &ScoringConfig,
    json: bool,
    use_colors: bool,
) -> Result<()> {
    let factors = factors.complete()?;
    let thresholds = scoring.effective_thresholds();
    let result = score_factors(&factors, &scoring.effective_weights(), &thresholds)?;
    let plan = plan_review(
        &factors,
        &result,
        &thresholds,
        &scoring.effective_review_intervals(),
        assessed_at.unwrap_or_else(Utc::now),
        model_age_days,
    )?;

    if json {
        return print_json(&serde_json::json!({ "score": result, "review": plan }));
    }
    println!("{}", output::format_score_result(&result, Some(&plan), use_colors));
    Ok(())
}

fn run_transition(
    store: &dyn AssessmentStore,
    id: &Uuid,
    action: LifecycleAction,
    actor: &str,
    json: bool,
) -> Result<()> {
    let applied = assess::apply_action(store, &LogPublisher, id, action, actor)?;
    if json {
        return print_json(&serde_json::json!({
            "assessment": applied.record,
            "event": applied.event,
        }));
    }
    println!(
        "{} -> {} ({})",
        applied.event.old_status,
        applied.event.new_status,
        applied.event.topic()
    );
    Ok(())
}

fn run_show(
    store: &dyn AssessmentStore,
    id: Option<Uuid>,
    json: bool,
    use_colors: bool,
) -> Result<()> {
    match id {
        Some(id) => {
            let record = assess::load_assessment(store, &id)?;
            if json {
                return print_json(&record);
            }
            println!("{}", output::format_assessment(&record, use_colors));
        }
        None => {
            let records = store.list().context("Failed to read assessment store")?;
            if json {
                return print_json(&records);
            }
            println!("{}", output::format_assessment_table(&records, use_colors));
        }
    }
    Ok(())
}

/// Run generation on a blocking thread while Ctrl-C requests a stop between chunks.
async fn run_generate(
    generator: TransactionGenerator,
    path: Option<PathBuf>,
    resume_from: u64,
    json: bool,
    use_colors: bool,
) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, stopping after the current chunk...");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let task = tokio::task::spawn_blocking(move || {
        write_transactions(&generator, path, resume_from, &cancel)
    });
    let joined = task.await;
    ctrl_c.abort();

    let report = match joined.context("Generation task failed")? {
        Ok(report) => report,
        Err(e) => {
            if let Some(EngineError::PartialGeneration { next_index, .. }) =
                e.downcast_ref::<EngineError>()
            {
                eprintln!("Resume with --resume-from {}", next_index);
            }
            return Err(e);
        }
    };

    if json {
        eprintln!("{}", serde_json::to_string(&report).context("Failed to serialize report")?);
    } else {
        eprintln!("{}", output::format_generation_report(&report, use_colors));
    }
    if report.cancelled {
        std::process::exit(EXIT_INCOMPLETE);
    }
    Ok(())
}

fn generation_settings(config: &Config) -> GenerationSettings {
    match config.effective_generation().settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let use_colors = output::should_use_colors();
    let config_path = cli.config.map(PathBuf::from);

    if let Commands::Init { force } = cli.command {
        let path = match config_path {
            Some(p) => p,
            None => config::get_config_path().unwrap_or_else(|e| fail(e)),
        };
        if let Err(e) = config::write_default_config(&path, force) {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
        println!("Config written to {}", path.display());
        std::process::exit(EXIT_SUCCESS);
    }

    // Load config
    let config = match config::load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    // Validate config at startup
    if let Err(errors) = config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    let scoring = config.effective_scoring();
    let open_store = || match config::resolve_store_path(&config) {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "using assessment store");
            JsonFileStore::new(path)
        }
        Err(e) => fail(e),
    };

    let result = match cli.command {
        Commands::Score {
            factors,
            assessed_at,
            model_age_days,
        } => run_score(
            &factors,
            assessed_at,
            model_age_days,
            &scoring,
            cli.json,
            use_colors,
        ),
        Commands::Assess {
            model,
            tenant,
            assessor,
            factors,
        } => factors
            .inputs()
            .map_err(anyhow::Error::from)
            .and_then(|inputs| {
                let draft = RiskAssessment::draft(model, tenant, assessor, inputs);
                assess::record_assessment(&open_store(), draft, &scoring, Utc::now())
            })
            .and_then(|outcome| print_outcome(&outcome, cli.json, use_colors)),
        Commands::Transition { id, action, actor } => {
            run_transition(&open_store(), &id, action, &actor, cli.json)
        }
        Commands::Revise {
            id,
            assessor,
            factors,
        } => factors
            .inputs()
            .map_err(anyhow::Error::from)
            .and_then(|overrides| {
                assess::revise_assessment(
                    &open_store(),
                    &id,
                    &overrides,
                    &assessor,
                    &scoring,
                    Utc::now(),
                )
            })
            .and_then(|outcome| print_outcome(&outcome, cli.json, use_colors)),
        Commands::Show { id } => run_show(&open_store(), id, cli.json, use_colors),
        Commands::Generate {
            tenant,
            job,
            count,
            fraud_rate,
            seed,
            mu,
            sigma,
            output: path,
            resume_from,
        } => {
            let settings = generation_settings(&config);
            let request = GenerationRequest {
                tenant_id: tenant,
                job_id: job,
                count,
                fraud_rate,
                seed,
                amount_mu: mu,
                amount_sigma: sigma,
            };
            // Every limit is checked here, before a single row exists
            let generator = request
                .resolve(&settings)
                .and_then(|spec| TransactionGenerator::new(spec, settings));
            match generator {
                Ok(g) => run_generate(g, path, resume_from, cli.json, use_colors).await,
                Err(e) => Err(e.into()),
            }
        }
        Commands::Init { .. } => Ok(()),
    };

    if let Err(e) = result {
        fail(e);
    }
    std::process::exit(EXIT_SUCCESS);
}
