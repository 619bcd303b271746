use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use mixweave::ast::unparse::unparse_module;
use mixweave::loader::{LoadError, ModuleLoader};
use mixweave::{parse_module, Manifest, Registry, WeaveConfig};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mixweave")]
#[command(about = "Weave registered injection points into Python-like modules", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings TOML (debug, trace, dump_dir); MIXWEAVE_* variables override it
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Inputs {
    /// Registration manifest (TOML)
    #[arg(short, long)]
    manifest: PathBuf,

    /// A module file or a source tree
    #[arg(short, long)]
    source: PathBuf,

    /// Module name for a single file (defaults to the file stem)
    #[arg(long)]
    module: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Weave every module and report match-count problems
    Check {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// List the resolved injection points of every module
    Points {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Print woven source
    Weave {
        #[command(flatten)]
        inputs: Inputs,

        /// Show a unified diff against the unwoven module instead
        #[arg(short, long)]
        diff: bool,

        /// Write woven modules into this directory instead of printing
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Load one module and print what it printed
    Run {
        #[command(flatten)]
        inputs: Inputs,

        /// Module to load (required for source trees)
        #[arg(short, long)]
        entry: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = WeaveConfig::resolve(cli.settings.as_deref())?;

    match cli.command {
        Commands::Check { inputs } => cmd_check(&inputs, config),
        Commands::Points { inputs } => cmd_points(&inputs, config),
        Commands::Weave { inputs, diff, out } => cmd_weave(&inputs, config, diff, out.as_deref()),
        Commands::Run { inputs, entry } => cmd_run(&inputs, config, entry),
    }
}

fn setup_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("MIXWEAVE_LOG").unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("mixweave=debug,warn"),
        _ => EnvFilter::new("mixweave=trace,debug"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Loader with the manifest registered and every input module added.
fn prepare(inputs: &Inputs, config: WeaveConfig) -> Result<(ModuleLoader, Vec<String>)> {
    let manifest = Manifest::load_from_path(&inputs.manifest)?;
    let mut registry = Registry::new();
    let count = manifest.apply(&mut registry)?;
    registry.freeze();
    tracing::debug!(injections = count, "manifest registered");

    let mut loader = ModuleLoader::new(registry, config);
    let names = if inputs.source.is_dir() {
        loader.add_tree(&inputs.source)?
    } else {
        let name = match &inputs.module {
            Some(name) => name.clone(),
            None => inputs
                .source
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .with_context(|| format!("cannot name module {}", inputs.source.display()))?,
        };
        loader.add_file(name.clone(), &inputs.source)?;
        vec![name]
    };
    if names.is_empty() {
        anyhow::bail!("no .py modules found under {}", inputs.source.display());
    }
    Ok((loader, names))
}

fn cmd_check(inputs: &Inputs, config: WeaveConfig) -> Result<()> {
    let (mut loader, names) = prepare(inputs, config)?;
    let mut failed = 0usize;
    let mut warned = 0usize;

    for name in &names {
        match loader.weave(name) {
            Ok(woven) => {
                let report = &woven.report;
                if report.warnings.is_empty() {
                    println!("{} {} ({} match(es))", "✓".green(), name, report.total_matches());
                } else {
                    warned += 1;
                    println!("{} {} ({} warning(s))", "⊙".yellow(), name, report.warnings.len());
                    for warning in &report.warnings {
                        for line in warning.lines() {
                            println!("    {}", line.yellow());
                        }
                    }
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}", "✗".red(), name);
                for line in e.to_string().lines() {
                    eprintln!("    {}", line.red());
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} ok", format!("{}", names.len() - failed - warned).green());
    println!("  {} with warnings", format!("{}", warned).yellow());
    println!("  {} failed", format!("{}", failed).red());

    if failed > 0 {
        anyhow::bail!("{failed} module(s) failed to weave");
    }
    Ok(())
}

fn cmd_points(inputs: &Inputs, config: WeaveConfig) -> Result<()> {
    let (mut loader, names) = prepare(inputs, config)?;
    for name in &names {
        let woven = loader.weave(name)?;
        if woven.report.points.is_empty() {
            continue;
        }
        println!("{}", name.bold());
        for point in &woven.report.points {
            let lines: Vec<String> = point.lines.iter().map(usize::to_string).collect();
            let count = if point.matched() == 0 {
                "0".red()
            } else {
                point.matched().to_string().green()
            };
            println!(
                "  {}.{}  {}  {} match(es) at [{}]  {} callback(s)",
                point.target,
                point.method.cyan(),
                point.descriptor,
                count,
                lines.join(", "),
                point.callbacks
            );
        }
    }
    Ok(())
}

fn cmd_weave(inputs: &Inputs, config: WeaveConfig, diff: bool, out: Option<&Path>) -> Result<()> {
    let (mut loader, names) = prepare(inputs, config)?;
    for name in &names {
        let woven = loader.weave(name)?;
        let woven_text = unparse_module(&woven.module);

        if let Some(dir) = out {
            let path = mixweave::loader::dump_module(dir, name, &woven.module)
                .map_err(|source| LoadError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            println!("{} {} -> {}", "✓".green(), name, path.display());
            continue;
        }

        if diff {
            let pristine = pristine_text(inputs, name)?;
            display_diff(name, &pristine, &woven_text);
        } else {
            println!("{}", format!("# --- {name}").bold());
            print!("{woven_text}");
        }
    }
    Ok(())
}

fn cmd_run(inputs: &Inputs, config: WeaveConfig, entry: Option<String>) -> Result<()> {
    let (mut loader, names) = prepare(inputs, config)?;
    let entry = match entry {
        Some(entry) => entry,
        None if names.len() == 1 => names[0].clone(),
        None => anyhow::bail!("--entry is required when loading a source tree"),
    };
    let interpreter = loader.load(&entry)?;
    print!("{}", interpreter.output());
    Ok(())
}

/// Unwoven module rendered the same way as the woven one, so the diff shows
/// only what weaving changed.
fn pristine_text(inputs: &Inputs, name: &str) -> Result<String> {
    let path = if inputs.source.is_dir() {
        module_path(&inputs.source, name)
    } else {
        inputs.source.clone()
    };
    let source = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok(unparse_module(&parse_module(&source)?))
}

fn module_path(root: &Path, name: &str) -> PathBuf {
    let relative: PathBuf = name.split('.').collect();
    let file = root.join(&relative).with_extension("py");
    if file.is_file() {
        file
    } else {
        root.join(relative).join("__init__.py")
    }
}

fn display_diff(module: &str, original: &str, modified: &str) {
    println!("{}", format!("--- {module} (original)").bold());
    println!("{}", format!("+++ {module} (woven)").bold());

    let diff = TextDiff::from_lines(original, modified);
    for change in diff.iter_all_changes() {
        let line = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", line);
    }
}
