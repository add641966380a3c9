//! Mocweave CLI: taxonomy and MOC maintenance for a markdown vault.
//!
//! Usage:
//!   mocweave [--vault dir] [--config file] ensure <level1> [level2..]
//!   mocweave place --proposal proposal.json --note Notes/foo --title "Foo"
//!   mocweave context | projection | verify | conflicts

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use mocweave::{
    EngineConfig, FsVault, GenerationError, GenerationResult, Hierarchy, HierarchyProposal,
    NoteReference, OpenVault, SubprocessGenerator, SynthesisOutcome, TaxonomyEngine,
    TextGenerator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mocweave",
    version,
    about = "Four-level knowledge taxonomy with Map-of-Content files"
)]
struct Cli {
    /// Vault root directory
    #[arg(long, global = true, default_value = ".")]
    vault: PathBuf,
    /// YAML config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the MOC chain for a hierarchy
    Ensure {
        /// Labels, domain first (1 to 4)
        #[arg(required = true, num_args = 1..=4)]
        labels: Vec<String>,
        /// Summary stored on the leaf node
        #[arg(long)]
        summary: Option<String>,
    },
    /// Count a note against the deepest existing node of a hierarchy
    Count {
        #[arg(required = true, num_args = 1..=4)]
        labels: Vec<String>,
    },
    /// Detect and record conflicts for a hierarchy, or list the log
    Conflicts {
        #[arg(num_args = 0..=4)]
        labels: Vec<String>,
    },
    /// Print the classifier context
    Context,
    /// Print the compact JSON projection of the taxonomy
    Projection,
    /// Report disagreements between the index and the MOC files
    Verify,
    /// Re-synthesize one MOC
    Synthesize {
        /// Vault-relative MOC path
        moc: PathBuf,
    },
    /// File a note from a classifier proposal
    Place {
        /// JSON proposal file
        #[arg(long)]
        proposal: PathBuf,
        /// Vault-relative note path, without extension
        #[arg(long)]
        note: String,
        /// Note title (defaults to the file stem)
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        complexity: Option<String>,
    },
}

/// Stand-in when no generator command is configured
struct NoGenerator;

#[async_trait]
impl TextGenerator for NoGenerator {
    async fn generate(&self, _prompt: &str) -> GenerationResult<String> {
        Err(GenerationError::Unavailable(
            "no generator command configured".to_string(),
        ))
    }
}

/// Default config location (~/.config/mocweave/config.yaml)
fn default_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"));
    config_dir.join("mocweave").join("config.yaml")
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::from_file(&path).map_err(|e| e.to_string()),
        None => {
            let path = default_config_path();
            if path.exists() {
                EngineConfig::from_file(&path).map_err(|e| e.to_string())
            } else {
                Ok(EngineConfig::default())
            }
        }
    }
}

fn open_engine(vault: &Path, config: EngineConfig) -> Result<TaxonomyEngine, String> {
    let store = FsVault::open(vault).map_err(|e| format!("Failed to open vault: {}", e))?;
    Ok(TaxonomyEngine::open(Arc::new(store), config))
}

fn generator_for(config: &EngineConfig) -> Box<dyn TextGenerator> {
    match &config.generator {
        Some(command) => Box::new(SubprocessGenerator::new(command.clone())),
        None => Box::new(NoGenerator),
    }
}

fn parse_hierarchy(labels: &[String]) -> Result<Hierarchy, i32> {
    Hierarchy::new(labels.iter().cloned()).map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })
}

fn describe(outcome: &SynthesisOutcome) -> String {
    match outcome {
        SynthesisOutcome::Synthesized { notes } => format!("synthesized from {} note(s)", notes),
        SynthesisOutcome::Fallback { notes, reason } => {
            format!("fallback for {} note(s): {}", notes, reason)
        }
        SynthesisOutcome::NoNotes => "no notes".to_string(),
        SynthesisOutcome::ConsistencyFault { reason } => format!("consistency fault: {}", reason),
    }
}

fn cmd_ensure(engine: &TaxonomyEngine, labels: &[String], summary: Option<&str>) -> i32 {
    let hierarchy = match parse_hierarchy(labels) {
        Ok(h) => h,
        Err(code) => return code,
    };
    match engine.ensure_exists(&hierarchy, summary) {
        Ok(path) => {
            println!("{}", path.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_count(engine: &TaxonomyEngine, labels: &[String]) -> i32 {
    let hierarchy = match parse_hierarchy(labels) {
        Ok(h) => h,
        Err(code) => return code,
    };
    match engine.increment_note_count(&hierarchy) {
        Ok(Some(node)) => {
            println!("Counted note against '{}'", node);
            0
        }
        Ok(None) => {
            eprintln!("Error: domain '{}' not in the taxonomy", hierarchy.levels()[0]);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_conflicts(engine: &TaxonomyEngine, labels: &[String]) -> i32 {
    let records = if labels.is_empty() {
        engine.index().conflicts().to_vec()
    } else {
        let hierarchy = match parse_hierarchy(labels) {
            Ok(h) => h,
            Err(code) => return code,
        };
        match engine.detect_and_record_conflicts(&hierarchy) {
            Ok(records) => records,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    };

    if records.is_empty() {
        println!("No conflicts.");
        return 0;
    }
    for record in &records {
        let locations: Vec<String> = record
            .locations()
            .iter()
            .map(|l| format!("{} (level {})", l.path, l.level))
            .collect();
        println!("{}: {}", record.concept(), locations.join(", "));
        println!("  {}", record.recommendation());
    }
    0
}

fn cmd_projection(engine: &TaxonomyEngine) -> i32 {
    match serde_json::to_string_pretty(&engine.compact_projection()) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_verify(engine: &TaxonomyEngine) -> i32 {
    match engine.verify_consistency() {
        Ok(faults) if faults.is_empty() => {
            println!("Index and MOC files agree.");
            0
        }
        Ok(faults) => {
            for fault in &faults {
                println!("{}", fault);
            }
            2
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_synthesize(engine: &TaxonomyEngine, generator: &dyn TextGenerator, moc: &Path) -> i32 {
    match engine.synthesize(generator, moc).await {
        Ok(outcome) => {
            println!("{}: {}", moc.display(), describe(&outcome));
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_place(
    engine: &TaxonomyEngine,
    generator: &dyn TextGenerator,
    proposal: &Path,
    note: NoteReference,
) -> i32 {
    let json = match std::fs::read_to_string(proposal) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", proposal.display(), e);
            return 1;
        }
    };
    let proposal = match HierarchyProposal::from_json(&json) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match engine.place_note(generator, &note, &proposal).await {
        Ok(report) => {
            for placement in &report.placements {
                println!("{} -> {}", placement.hierarchy, placement.leaf_moc.display());
                for conflict in &placement.conflicts {
                    println!("  conflict: {}", conflict.recommendation());
                }
                for step in &placement.cascade {
                    match &step.outcome {
                        Ok(outcome) => println!("  {}: {}", step.moc.display(), describe(outcome)),
                        Err(e) => println!("  {}: failed: {}", step.moc.display(), e),
                    }
                }
            }
            for failure in &report.failures {
                eprintln!("{}: failed: {}", failure.hierarchy, failure.error);
            }
            if report.failures.is_empty() {
                0
            } else {
                2
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let engine = match open_engine(&cli.vault, config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Ensure { labels, summary } => cmd_ensure(&engine, &labels, summary.as_deref()),
        Commands::Count { labels } => cmd_count(&engine, &labels),
        Commands::Conflicts { labels } => cmd_conflicts(&engine, &labels),
        Commands::Context => {
            println!("{}", engine.render_context_for_classifier());
            0
        }
        Commands::Projection => cmd_projection(&engine),
        Commands::Verify => cmd_verify(&engine),
        Commands::Synthesize { moc } => {
            let generator = generator_for(engine.config());
            run_async(cmd_synthesize(&engine, generator.as_ref(), &moc))
        }
        Commands::Place {
            proposal,
            note,
            title,
            complexity,
        } => {
            let title = title.unwrap_or_else(|| {
                Path::new(&note)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| note.clone())
            });
            let mut reference = NoteReference::new(title, note);
            if let Some(level) = complexity {
                reference = reference.with_complexity(level);
            }
            let generator = generator_for(engine.config());
            run_async(cmd_place(&engine, generator.as_ref(), &proposal, reference))
        }
    };
    std::process::exit(code);
}

fn run_async<F: std::future::Future<Output = i32>>(future: F) -> i32 {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(future),
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            1
        }
    }
}
