//! tidegen - message schema compiler
//!
//! # Usage
//!
//! ```bash
//! # Generate Python and C# classes for every message
//! tidegen generate ws/*/msg/*.msg ws/*/srv/*.srv -l python -l csharp -o ./gen
//!
//! # Generate only selected messages (dependencies follow automatically)
//! tidegen generate ws/geo/msg/*.msg -l python -s geo/Path
//!
//! # Validate schema files
//! tidegen check ws/geo/msg/*.msg -v
//!
//! # Show the configuration options of a generator
//! tidegen options csharp --json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};
use tidegen::options::OptionSpec;
use tidegen::{Config, LoadReport, Registry};

const PROVIDER: &str = "msg_files";

#[derive(Parser)]
#[command(name = "tidegen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Message schema compiler - generate data classes from .msg/.srv definitions")]
#[command(long_about = r#"
tidegen

Parse ROS-style message (.msg) and service (.srv) definitions and generate
serializable data classes for Python (pytide), C# (Riptide), or re-emit
them as normalized .msg/.srv files.

Input files must live in <package>/msg/<Name>.msg or <package>/srv/<Name>.srv.

Examples:
  # Generate all targets
  tidegen generate ws/*/msg/*.msg -o ./gen

  # Generate C# for one message and its dependencies
  tidegen generate ws/*/msg/*.msg -l csharp -s nav/Path

  # Check files for errors
  tidegen check ws/*/msg/*.msg
"#)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate code from schema files
    Generate {
        /// Input .msg / .srv files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to the config file's `output`)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Target generator, repeatable (python, csharp, msg); all when omitted
        #[arg(short, long = "lang")]
        lang: Vec<String>,

        /// Message id to generate, repeatable; all messages when omitted
        #[arg(short, long = "select")]
        select: Vec<String>,

        /// Base directory for template overrides
        #[arg(long)]
        templates: Option<PathBuf>,
    },

    /// Parse schema files and report errors
    Check {
        /// Input .msg / .srv files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// List every parsed message
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show configuration options
    Options {
        /// Generator name; provider and all generators when omitted
        lang: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let log_level = cli.log_level.unwrap_or_else(|| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(&log_level)
        .init();

    let result = match cli.command {
        Commands::Generate {
            inputs,
            out,
            lang,
            select,
            templates,
        } => cmd_generate(&config, &inputs, out, &lang, &select, templates),
        Commands::Check { inputs, verbose } => cmd_check(&config, &inputs, verbose),
        Commands::Options { lang, json } => cmd_options(lang.as_deref(), json),
        Commands::Version => cmd_version(),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Explicit path, else the per-user config file when present, else defaults
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return Config::load(path).with_context(|| format!("Failed to load config {}", path.display()));
    }
    let default = Config::default_path();
    if default.is_file() {
        return Config::load(&default).with_context(|| format!("Failed to load config {}", default.display()));
    }
    Ok(Config::default())
}

fn load(registry: &Registry, config: &Config, inputs: &[PathBuf]) -> anyhow::Result<LoadReport> {
    let provider = registry.provider(PROVIDER)?;
    let report = provider
        .load(inputs, &config.provider)
        .context("Failed to load schema files")?;

    for failure in &report.failures {
        error!("{}", failure);
    }
    for path in &report.skipped {
        warn!("Skipped {}", path.display());
    }
    Ok(report)
}

fn cmd_generate(
    config: &Config,
    inputs: &[PathBuf],
    out: Option<PathBuf>,
    langs: &[String],
    select: &[String],
    templates: Option<PathBuf>,
) -> anyhow::Result<()> {
    let out = out.unwrap_or_else(|| config.output.clone());
    let registry = Registry::with_defaults(templates.or_else(|| config.templates.clone()));

    let report = load(&registry, config, inputs)?;
    let selection = report.database.select(select)?;

    let names: Vec<String> = if langs.is_empty() {
        registry.generator_names().into_iter().map(String::from).collect()
    } else {
        langs.to_vec()
    };

    let mut failed = 0;
    for name in &names {
        let result = registry.generator(name).map_err(anyhow::Error::from).and_then(|generator| {
            let output = generator.generate(&report.database, &selection, &config.generator_settings(name))?;
            let written = output.write_out_files(&out)?;
            Ok((output, written))
        });

        match result {
            Ok((output, written)) => {
                println!("{}: wrote {} files to {}", name, written.len(), out.join(output.subdir).display());
                for missing in &output.missing {
                    println!("  missing type {} (in {})", missing.ty, missing.message);
                }
            }
            Err(e) => {
                error!("{}: {:#}", name, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} generators failed", failed, names.len());
    }
    if !report.failures.is_empty() {
        bail!("{} input files failed to load", report.failures.len());
    }
    info!("Generated {} messages for {} targets", selection.len(), names.len());
    Ok(())
}

fn cmd_check(config: &Config, inputs: &[PathBuf], verbose: bool) -> anyhow::Result<()> {
    let registry = Registry::with_defaults(None);
    let report = load(&registry, config, inputs)?;

    if verbose {
        for message in report.database.iter() {
            let constants = message.constant_fields().count();
            println!(
                "{} ({} fields, {} constants)",
                message.id(),
                message.fields.len() - constants,
                constants
            );
        }
    }
    for id in &report.duplicates {
        println!("duplicate: {}", id);
    }

    if !report.failures.is_empty() {
        for failure in &report.failures {
            println!("✗ {}", failure);
        }
        bail!("{} of {} files have errors", report.failures.len(), inputs.len());
    }

    println!("✓ {} messages, no errors", report.database.len());
    Ok(())
}

/// Option schema of one provider or generator
#[derive(Debug, Serialize)]
struct SchemaEntry {
    kind: &'static str,
    name: &'static str,
    description: &'static str,
    options: Vec<OptionSpec>,
}

fn option_schemas(registry: &Registry, lang: Option<&str>) -> anyhow::Result<Vec<SchemaEntry>> {
    if let Some(lang) = lang {
        let generator = registry.generator(lang)?;
        return Ok(vec![SchemaEntry {
            kind: "generator",
            name: generator.name(),
            description: generator.language(),
            options: generator.options(),
        }]);
    }

    let providers = registry.providers().map(|p| SchemaEntry {
        kind: "provider",
        name: p.name(),
        description: p.description(),
        options: p.options(),
    });
    let generators = registry.generators().map(|g| SchemaEntry {
        kind: "generator",
        name: g.name(),
        description: g.language(),
        options: g.options(),
    });
    Ok(providers.chain(generators).collect())
}

fn cmd_options(lang: Option<&str>, json: bool) -> anyhow::Result<()> {
    let registry = Registry::with_defaults(None);
    let schemas = option_schemas(&registry, lang)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    for schema in &schemas {
        println!("[{}] {} - {}", schema.kind, schema.name, schema.description);
        for option in &schema.options {
            let default = option.default.as_ref().map(|d| d.to_string()).unwrap_or_default();
            print!("  {} ({}, default {})", option.key, option.kind, default);
            if let Some(flag) = option.required_when {
                print!(", required when {}", flag);
            }
            println!();
            println!("      {}", option.description);
        }
        println!();
    }
    Ok(())
}

fn cmd_version() -> anyhow::Result<()> {
    println!("tidegen {} (message schema compiler)", tidegen::VERSION);
    println!();
    println!("Inputs:");
    println!("  - ROS-style .msg / .srv files");
    println!("Targets:");
    for generator in Registry::with_defaults(None).generators() {
        println!("  - {:<8} {}", generator.name(), generator.language());
    }
    Ok(())
}
