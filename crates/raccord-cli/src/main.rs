use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use raccord_contracts::defects::DopError;
use raccord_contracts::events::EventWriter;
use raccord_contracts::models::{CAPABILITY_RACCORD_CHECK, CAPABILITY_RETRY_JUDGE};
use raccord_contracts::reports::write_report;
use raccord_contracts::scene::{CharacterStyle, ProjectSnapshot};
use raccord_engine::{new_session_id, ContinuityEngine, Credentials, EngineConfig, ImagePayload, ScenePair};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "raccord", version, about = "Scene continuity checks and retry decisions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Symbolic continuity insights for a scene against its predecessor.
    Analyze(AnalyzeArgs),
    /// Split defects into fixable and unfixable and derive the base decision.
    Classify(ClassifyArgs),
    /// Compare two rendered frames with a vision model.
    Validate(ValidateArgs),
    /// Decide whether a failed frame is worth regenerating.
    Decide(DecideArgs),
    /// Suggest the framing of the next shot.
    Suggest(SuggestArgs),
    /// Full check of one scene: insights plus an optional vision verdict.
    Check(CheckArgs),
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    project: PathBuf,
    #[arg(long)]
    scene: String,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ClassifyArgs {
    #[arg(long)]
    errors: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ValidateArgs {
    #[arg(long)]
    project: PathBuf,
    #[arg(long)]
    scene: String,
    #[arg(long)]
    current: PathBuf,
    #[arg(long)]
    previous: PathBuf,
    /// Force the faceless mannequin character style.
    #[arg(long)]
    mannequin: bool,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct DecideArgs {
    #[arg(long)]
    failed: PathBuf,
    #[arg(long)]
    reference: PathBuf,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    errors: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct SuggestArgs {
    #[arg(long)]
    project: PathBuf,
    #[arg(long)]
    scene: String,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct CheckArgs {
    #[arg(long)]
    project: PathBuf,
    #[arg(long)]
    scene: String,
    #[arg(long, requires = "previous")]
    current: Option<PathBuf>,
    #[arg(long, requires = "current")]
    previous: Option<PathBuf>,
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("raccord error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Classify(args) => run_classify(args),
        Command::Validate(args) => run_validate(args),
        Command::Decide(args) => run_decide(args),
        Command::Suggest(args) => run_suggest(args),
        Command::Check(args) => run_check(args),
    }
}

fn build_engine(events: Option<&Path>) -> Result<ContinuityEngine> {
    let session_id = new_session_id();
    let writer = match events {
        Some(path) => EventWriter::new(path, session_id),
        None => EventWriter::disabled(session_id),
    };
    ContinuityEngine::new(EngineConfig::from_env(), writer)
}

fn credentials_for(engine: &ContinuityEngine, capability: &str) -> Credentials {
    engine
        .provider_for(capability)
        .map(|provider| Credentials::from_env_for_provider(&provider))
        .unwrap_or_default()
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let engine = build_engine(args.events.as_deref())?;
    let project = ProjectSnapshot::load(&args.project)?;
    let insights = engine.analyze_raccord(&project, &args.scene);
    print_json(&serde_json::to_value(insights)?)?;
    Ok(0)
}

fn run_classify(args: ClassifyArgs) -> Result<i32> {
    let engine = build_engine(args.events.as_deref())?;
    let errors = read_errors(&args.errors)?;
    let classification = engine.classify_errors(&errors);
    print_json(&json!({
        "fixable": classification.fixable,
        "unfixable": classification.unfixable,
        "decision": classification.decision,
        "summary": classification.summary(),
    }))?;
    Ok(0)
}

fn run_validate(args: ValidateArgs) -> Result<i32> {
    let engine = build_engine(args.events.as_deref())?;
    let project = ProjectSnapshot::load(&args.project)?;
    let Some(pair) = ScenePair::for_scene(&project, &args.scene) else {
        bail!("scene '{}' has no previous scene to compare against", args.scene);
    };
    let max_dim = engine.config().max_image_dim;
    let current = ImagePayload::from_path(&args.current, max_dim)?;
    let previous = ImagePayload::from_path(&args.previous, max_dim)?;
    let style = if args.mannequin {
        CharacterStyle::Mannequin
    } else {
        project.character_style
    };
    let verdict = engine.validate_raccord_with_vision(
        Some(&current),
        Some(&previous),
        &pair,
        &credentials_for(&engine, CAPABILITY_RACCORD_CHECK),
        style,
    );
    print_json(&serde_json::to_value(verdict)?)?;
    Ok(0)
}

fn run_decide(args: DecideArgs) -> Result<i32> {
    let engine = build_engine(args.events.as_deref())?;
    let errors = read_errors(&args.errors)?;
    let max_dim = engine.config().max_image_dim;
    let failed = ImagePayload::from_path(&args.failed, max_dim)?;
    let reference = ImagePayload::from_path(&args.reference, max_dim)?;
    let result = engine.make_retry_decision(
        Some(&failed),
        Some(&reference),
        &args.prompt,
        &errors,
        &credentials_for(&engine, CAPABILITY_RETRY_JUDGE),
    );
    let mut payload = serde_json::to_value(&result)?;
    if let Value::Object(map) = &mut payload {
        map.insert(
            "augmentedPrompt".to_string(),
            Value::String(result.augmented_prompt(&args.prompt)),
        );
    }
    print_json(&payload)?;
    Ok(0)
}

fn run_suggest(args: SuggestArgs) -> Result<i32> {
    let engine = build_engine(args.events.as_deref())?;
    let project = ProjectSnapshot::load(&args.project)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let suggestion = engine.suggest_next_shot(&project, &args.scene, &mut rng);
    print_json(&serde_json::to_value(suggestion)?)?;
    Ok(0)
}

fn run_check(args: CheckArgs) -> Result<i32> {
    let engine = build_engine(args.events.as_deref())?;
    let project = ProjectSnapshot::load(&args.project)?;
    let max_dim = engine.config().max_image_dim;
    let current = load_optional_image(args.current.as_deref(), max_dim)?;
    let previous = load_optional_image(args.previous.as_deref(), max_dim)?;
    let report = engine.check_scene(
        &project,
        &args.scene,
        previous.as_ref(),
        current.as_ref(),
        &credentials_for(&engine, CAPABILITY_RACCORD_CHECK),
    );
    if let Some(path) = args.report.as_deref() {
        write_report(path, &report)?;
    }
    print_json(&serde_json::to_value(&report)?)?;
    Ok(if report.is_clean() { 0 } else { 2 })
}

fn load_optional_image(path: Option<&Path>, max_dim: u32) -> Result<Option<ImagePayload>> {
    path.map(|path| ImagePayload::from_path(path, max_dim))
        .transpose()
}

/// Accepts a bare array of defects or a verdict object carrying `errors`.
fn read_errors(path: &Path) -> Result<Vec<DopError>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading defects {}", path.display()))?;
    parse_errors(&raw).with_context(|| format!("defects file {} is invalid", path.display()))
}

fn parse_errors(raw: &str) -> Result<Vec<DopError>> {
    let value: Value = serde_json::from_str(raw)?;
    let rows = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove("errors").unwrap_or(Value::Array(Vec::new())),
        _ => bail!("expected a JSON array of defects"),
    };
    Ok(serde_json::from_value(rows)?)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
