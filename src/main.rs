//! Tracecheck - Contract Verification Engine
//!
//! Checks captured call traces against Hoare-style API-usage contracts.

use std::path::PathBuf;
use tracecheck::app::cli::{Cli, Commands, ConfigAction};
use tracecheck::app::config::Config;
use tracecheck::event::stream::TraceFile;
use tracecheck::matcher::path_matcher::AnalysisBudget;
use tracecheck::workflow::engine::{load_contracts, Engine};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    // Initialize tracing (--verbose enables debug-level output)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Load config
    let config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else {
        Config::load_default()?
    };

    // Execute command
    match cli.command {
        Commands::Check {
            trace,
            contracts,
            format,
            output,
            max_steps,
        } => {
            run_check(&trace, &contracts, format, output, max_steps, &config)?;
        }
        Commands::Validate { contracts } => {
            run_validate(&contracts, &config)?;
        }
        Commands::Inspect {
            contracts,
            function,
            arity,
        } => {
            run_inspect(&contracts, &function, arity)?;
        }
        Commands::Init { force } => {
            run_init(force, &config)?;
        }
        Commands::Config { action } => {
            run_config(action, &config)?;
        }
    }

    Ok(())
}

fn load_registry(path: &PathBuf, config: &Config) -> anyhow::Result<tracecheck::Registry> {
    let text = std::fs::read_to_string(path)?;
    let registry = load_contracts(&text)?;
    for diagnostic in registry.diagnostics() {
        warn!("{}: {}", diagnostic.context, diagnostic.message);
    }
    if config.contracts.strict && !registry.diagnostics().is_empty() {
        anyhow::bail!(
            "{} contract(s) failed to load (strict mode)",
            registry.diagnostics().len()
        );
    }
    Ok(registry)
}

fn run_check(
    trace_path: &PathBuf,
    contracts_path: &PathBuf,
    format: Option<String>,
    output: Option<PathBuf>,
    max_steps: Option<usize>,
    config: &Config,
) -> anyhow::Result<()> {
    let registry = load_registry(contracts_path, config)?;
    let mut trace = TraceFile::load(trace_path)?;

    if config.analysis.max_paths > 0 && trace.paths.len() > config.analysis.max_paths {
        warn!(
            analyzed = config.analysis.max_paths,
            total = trace.paths.len(),
            "path limit reached; remaining paths skipped"
        );
        trace.paths.truncate(config.analysis.max_paths);
    }

    let budget = AnalysisBudget {
        max_steps: max_steps.unwrap_or(config.analysis.max_steps),
    };
    let report = Engine::new(registry).with_budget(budget).analyze_trace(&trace);

    let format = format.unwrap_or_else(|| config.report.format.clone());
    let rendered = match format.as_str() {
        "json" => serde_json::to_string_pretty(&report)?,
        _ => report.render_text(),
    };
    match output {
        Some(path) => {
            std::fs::write(&path, &rendered)?;
            info!("Wrote report to {:?}", path);
        }
        None => print!("{}", rendered),
    }

    if report.has_violations() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_validate(contracts_path: &PathBuf, config: &Config) -> anyhow::Result<()> {
    let registry = load_registry(contracts_path, config)?;
    info!("Loaded {} contract(s)", registry.len());
    for contract in registry.contracts() {
        println!(
            "{}/{}: {} post branch(es), {} future branch(es)",
            contract.name,
            contract.arity(),
            contract.post.len(),
            contract.future.len()
        );
    }
    if !registry.diagnostics().is_empty() {
        println!("{} block(s) skipped:", registry.diagnostics().len());
        for diagnostic in registry.diagnostics() {
            println!("  {}: {}", diagnostic.context, diagnostic.message);
        }
    }
    Ok(())
}

fn run_inspect(
    contracts_path: &PathBuf,
    function: &str,
    arity: Option<usize>,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(contracts_path)?;
    let registry = load_contracts(&text)?;

    let matches: Vec<_> = registry
        .contracts()
        .filter(|c| c.name == function && arity.map_or(true, |a| c.arity() == a))
        .collect();
    if matches.is_empty() {
        anyhow::bail!("no contract named {} loaded from {:?}", function, contracts_path);
    }

    for contract in matches {
        println!("{}({})", contract.name, contract.params.join(", "));
        for branch in &contract.future {
            println!("  Future ({}, {})", branch.guard, branch.expr);
            match &branch.dfa {
                Some(dfa) => print!("{}", dfa.describe()),
                None => println!("    (not compiled)"),
            }
        }
        if contract.future.is_empty() {
            println!("  (no future obligations)");
        }
    }
    Ok(())
}

fn run_init(force: bool, config: &Config) -> anyhow::Result<()> {
    let path = Config::default_path();
    if path.exists() && !force {
        anyhow::bail!("config already exists at {:?} (use --force to overwrite)", path);
    }
    config.save(&path)?;
    info!("Wrote config to {:?}", path);
    Ok(())
}

fn run_config(action: ConfigAction, config: &Config) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Reset { force } => {
            if !force {
                anyhow::bail!("pass --force to reset the configuration");
            }
            Config::default().save_default()?;
            info!("Configuration reset to defaults");
        }
    }
    Ok(())
}
