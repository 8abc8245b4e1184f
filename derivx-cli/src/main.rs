//! DerivX CLI: configuration checks, descriptor wire form, and result export.
//!
//! Commands:
//! - `validate`: report every invariant violation of a configuration file
//! - `args`: print the task descriptor wire JSON for a configuration
//! - `fingerprint`: print the BLAKE3 hash of the canonical payload
//! - `export`: write a stored result envelope's reporting window as CSV
//! - `template`: print a reference product as JSON or TOML

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use derivx_core::{
    Greek, ProductConfig, ProductFamily, ResultEnvelope, TaskDescriptor, TaskMethod,
};
use derivx_runner::{logging, write_window_csv, KernelSettings};

#[derive(Parser)]
#[command(name = "derivx", about = "DerivX CLI: structured-product task tooling")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a configuration file and print every violation.
    Validate {
        /// Product family: snowball or sharkfin.
        #[arg(long)]
        family: ProductFamily,

        /// Configuration file (.json or .toml).
        file: PathBuf,
    },
    /// Print the task descriptor wire JSON for a configuration.
    Args {
        #[arg(long)]
        family: ProductFamily,

        /// coupon, price, payoff or greeks.
        #[arg(long)]
        method: TaskMethod,

        /// Greek tag (d, g, v, t, r); required with --method greeks.
        #[arg(long)]
        greek: Option<Greek>,

        /// Plugin id. Defaults to the family's plugin.
        #[arg(long)]
        plugin: Option<String>,

        /// Backend wait limit in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Kernel settings file; its default_timeout_secs applies unless
        /// --timeout is given.
        #[arg(long)]
        settings: Option<PathBuf>,

        file: PathBuf,
    },
    /// Print the BLAKE3 fingerprint of the canonical payload.
    Fingerprint {
        #[arg(long)]
        family: ProductFamily,

        file: PathBuf,
    },
    /// Write the reporting window of a stored result envelope as CSV.
    Export {
        #[arg(long)]
        family: ProductFamily,

        /// Configuration the result was computed from.
        #[arg(long)]
        config: PathBuf,

        /// Result envelope JSON.
        #[arg(long)]
        result: PathBuf,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the reference product of a family.
    Template {
        #[arg(long)]
        family: ProductFamily,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Toml,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.verbose { "debug" } else { "info" });

    match cli.command {
        Commands::Validate { family, file } => run_validate(family, &file),
        Commands::Args {
            family,
            method,
            greek,
            plugin,
            timeout,
            settings,
            file,
        } => run_args(&build_task(
            family,
            method,
            greek,
            plugin,
            timeout,
            settings.as_deref(),
            &file,
        )?),
        Commands::Fingerprint { family, file } => run_fingerprint(family, &file),
        Commands::Export {
            family,
            config,
            result,
            out,
        } => run_export(family, &config, &result, &out),
        Commands::Template { family, format } => run_template(family, format),
    }
}

fn load(family: ProductFamily, path: &Path) -> Result<ProductConfig> {
    let config = ProductConfig::from_path(family, path)
        .with_context(|| format!("failed to load {family} configuration"))?;
    debug!(path = %path.display(), %family, "configuration loaded");
    Ok(config)
}

fn run_validate(family: ProductFamily, file: &Path) -> Result<()> {
    let config = load(family, file)?;
    let violations = config.violations();
    if violations.is_empty() {
        println!("{}: ok", file.display());
        return Ok(());
    }
    for v in &violations {
        println!("{}: {v}", file.display());
    }
    std::process::exit(1);
}

fn build_task(
    family: ProductFamily,
    method: TaskMethod,
    greek: Option<Greek>,
    plugin: Option<String>,
    timeout: Option<u64>,
    settings: Option<&Path>,
    file: &Path,
) -> Result<TaskDescriptor> {
    let mut config = load(family, file)?;
    if greek.is_some() {
        config = config.with_greek(greek);
    }
    let mut task = match settings {
        Some(path) => KernelSettings::from_file(path)?.descriptor(&config, method)?,
        None => TaskDescriptor::new(&config, method)?,
    };
    if let Some(plugin) = plugin {
        task = task.with_plugin(plugin);
    }
    if let Some(secs) = timeout {
        if secs == 0 {
            bail!("--timeout must be at least 1 second");
        }
        task = task.with_timeout(Duration::from_secs(secs));
    }
    Ok(task)
}

fn run_args(task: &TaskDescriptor) -> Result<()> {
    println!("{}", task.to_args()?);
    Ok(())
}

fn run_fingerprint(family: ProductFamily, file: &Path) -> Result<()> {
    let config = load(family, file)?;
    println!("{}", config.fingerprint()?);
    Ok(())
}

fn run_export(family: ProductFamily, config: &Path, result: &Path, out: &Path) -> Result<()> {
    let config = load(family, config)?;
    let text = std::fs::read_to_string(result)
        .with_context(|| format!("failed to read {}", result.display()))?;
    let envelope = ResultEnvelope::from_json(&text).context("not a result envelope")?;
    if !envelope.is_success() {
        bail!(
            "result is not a success (code {}): {}",
            envelope.return_code(),
            envelope.return_info()
        );
    }

    let surface = envelope.surface(config.surface_shape())?;
    let grid = &config.common().evaluation;
    write_window_csv(
        out,
        &surface,
        &grid.calc_price,
        grid.run_from as usize,
        grid.run_days as usize,
    )?;
    info!(out = %out.display(), rows = grid.calc_price.len(), days = grid.run_days, "window exported");
    println!("Exported to: {}", out.display());
    Ok(())
}

fn run_template(family: ProductFamily, format: Format) -> Result<()> {
    let config = ProductConfig::reference(family);
    let text = match format {
        Format::Json => serde_json::to_string_pretty(&config)?,
        Format::Toml => toml::to_string(&config).context("failed to render TOML")?,
    };
    println!("{text}");
    Ok(())
}
