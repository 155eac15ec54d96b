//! sci-recipe CLI
//!
//! Usage:
//!   sci-recipe list                     List available recipes
//!   sci-recipe info <name>              Show versions, dependencies and install state
//!   sci-recipe fetch <name>             Download and verify sources only
//!   sci-recipe install <name>           Build and install into the prefix
//!   sci-recipe test <name>              Run the smoke checks of an install
//!   sci-recipe env <name>               Print run-time exports

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sci_recipe::engine::env::render_exports;
use sci_recipe::recipe::DepType;
use sci_recipe::{output, Config, InstallOptions, Recipe, RecipeEngine, Source};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sci-recipe")]
#[command(about = "Build and install scientific software from TOML recipes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Installation prefix
    #[arg(short, long, global = true, env = "SCI_RECIPE_PREFIX")]
    prefix: Option<PathBuf>,

    /// Build directory (uses temp dir if not specified)
    #[arg(short, long, global = true)]
    build_dir: Option<PathBuf>,

    /// Directory of recipe files shadowing the built-in ones
    #[arg(short = 'r', long, global = true, env = "SCI_RECIPE_PATH")]
    recipes_path: Option<PathBuf>,

    /// Config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available recipes
    List,

    /// Show recipe information
    Info {
        /// Recipe name or path to recipe file
        recipe: String,
    },

    /// Download and verify sources without installing
    Fetch {
        recipe: String,

        /// Version tag (preferred version if not specified)
        #[arg(long)]
        version: Option<String>,

        /// Verify a local archive instead of downloading
        #[arg(long)]
        archive: Option<PathBuf>,
    },

    /// Build and install a recipe
    Install {
        recipe: String,

        /// Version tag (preferred version if not specified)
        #[arg(long)]
        version: Option<String>,

        /// Use a local archive instead of downloading
        #[arg(long, conflicts_with = "source")]
        archive: Option<PathBuf>,

        /// Use an extracted source tree as is
        #[arg(long)]
        source: Option<PathBuf>,

        /// Prefix of an installed dependency, e.g. tcl=/opt/tcl
        #[arg(long = "dep", value_parser = parse_dep)]
        deps: Vec<(String, PathBuf)>,

        /// Do not run the post-install checks
        #[arg(long)]
        skip_checks: bool,
    },

    /// Run the smoke checks against an install
    Test {
        recipe: String,

        #[arg(long)]
        version: Option<String>,

        /// Prefix of an installed dependency, e.g. tcl=/opt/tcl
        #[arg(long = "dep", value_parser = parse_dep)]
        deps: Vec<(String, PathBuf)>,
    },

    /// Print the run-time environment as shell exports
    Env {
        recipe: String,

        #[arg(long)]
        version: Option<String>,
    },
}

fn parse_dep(s: &str) -> std::result::Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, prefix)) if !name.is_empty() && !prefix.is_empty() => {
            Ok((name.to_string(), PathBuf::from(prefix)))
        }
        _ => Err(format!("expected NAME=PREFIX, got '{}'", s)),
    }
}

fn main() {
    if let Err(e) = run() {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::List => {
            let engine = RecipeEngine::new(config);
            list_recipes(&engine)?;
        }

        Commands::Info { recipe } => {
            let engine = RecipeEngine::new(config);
            let recipe = engine.load(&recipe)?;
            show_info(&engine, &recipe)?;
        }

        Commands::Fetch {
            recipe,
            version,
            archive,
        } => {
            let engine = RecipeEngine::new(config);
            let recipe = engine.load(&recipe)?;
            let path = engine.fetch(&recipe, version.as_deref(), archive.as_deref())?;
            output::success(&format!("verified {}", path.display()));
        }

        Commands::Install {
            recipe,
            version,
            archive,
            source,
            deps,
            skip_checks,
        } => {
            let engine = with_deps(RecipeEngine::new(config), deps);
            let recipe = engine.load(&recipe)?;
            let source = match (archive, source) {
                (Some(file), _) => Source::Archive(file),
                (None, Some(dir)) => Source::Directory(dir),
                (None, None) => Source::Download,
            };
            let options = InstallOptions {
                version,
                source,
                run_checks: !skip_checks,
            };

            let outcome = engine
                .install(&recipe, &options)
                .with_context(|| format!("Failed to install {}", recipe.name()))?;
            if let Some(report) = &outcome.report
                && !report.passed()
            {
                output::warning(&format!(
                    "{} of {} checks failed; run 'sci-recipe test {}' after fixing the environment",
                    report.failures().count(),
                    report.len(),
                    recipe.name()
                ));
            }
        }

        Commands::Test {
            recipe,
            version,
            deps,
        } => {
            let engine = with_deps(RecipeEngine::new(config), deps);
            let recipe = engine.load(&recipe)?;
            let report = engine.test(&recipe, version.as_deref())?;
            if !report.passed() {
                anyhow::bail!(
                    "{} of {} checks failed for {}",
                    report.failures().count(),
                    report.len(),
                    recipe.name()
                );
            }
            output::success(&format!("all {} checks passed", report.len()));
        }

        Commands::Env { recipe, version } => {
            let engine = RecipeEngine::new(config);
            let recipe = engine.load(&recipe)?;
            print!("{}", render_exports(&engine.environment(&recipe, version.as_deref())?));
        }
    }

    Ok(())
}

/// Config file first, then flags and their environment variables on top
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(prefix) = &cli.prefix {
        config.prefix = prefix.clone();
    }
    if let Some(build_dir) = &cli.build_dir {
        config.build_dir = Some(build_dir.clone());
    }
    if let Some(recipes_path) = &cli.recipes_path {
        config.recipes_path = Some(recipes_path.clone());
    }
    Ok(config)
}

fn with_deps(engine: RecipeEngine, deps: Vec<(String, PathBuf)>) -> RecipeEngine {
    deps.into_iter()
        .fold(engine, |engine, (name, prefix)| engine.with_dependency(name, prefix))
}

/// One line of `list`: a status note, or why the recipe could not be read
type ListEntry = (String, std::result::Result<(String, bool), String>);

fn listing(engine: &RecipeEngine) -> Result<Vec<ListEntry>> {
    let entries = engine
        .available()?
        .into_iter()
        .map(|name| {
            let status = engine.load(&name).and_then(|recipe| {
                let receipt = engine.receipt(&recipe)?;
                Ok(match receipt {
                    Some(r) => (format!("[installed: {}]", r.version), true),
                    None => (format!("[available: {}]", recipe.preferred_version().tag), false),
                })
            });
            (name, status.map_err(|e| e.to_string()))
        })
        .collect();
    Ok(entries)
}

fn list_recipes(engine: &RecipeEngine) -> Result<()> {
    for (name, status) in listing(engine)? {
        match status {
            Ok((note, installed)) => output::list_item(&name, &note, installed),
            Err(reason) => output::warning(&format!("skipping {}: {}", name, reason)),
        }
    }
    Ok(())
}

fn show_info(engine: &RecipeEngine, recipe: &Recipe) -> Result<()> {
    use owo_colors::OwoColorize;

    println!("{:<12} {}", "Name:".bold(), recipe.name().bold().cyan());
    if !recipe.package.description.is_empty() {
        println!("{:<12} {}", "Description:".bold(), recipe.package.description);
    }
    if !recipe.package.homepage.is_empty() {
        println!("{:<12} {}", "Homepage:".bold(), recipe.package.homepage);
    }

    println!("{}", "Versions:".bold());
    let preferred = &recipe.preferred_version().tag;
    for v in &recipe.versions {
        let mut marks = Vec::new();
        if &v.tag == preferred {
            marks.push("preferred");
        }
        if v.deprecated {
            marks.push("deprecated");
        }
        output::list_item(&v.tag, &marks.join(", "), &v.tag == preferred);
    }

    if !recipe.dependencies.is_empty() {
        println!("{}", "Depends:".bold());
        for dep in &recipe.dependencies {
            let types: Vec<&str> = dep.types.iter().map(DepType::as_str).collect();
            println!("  {} {} {}", "-".cyan(), dep.name, format!("({})", types.join(", ")).dimmed());
        }
    }
    println!();

    match engine.receipt(recipe)? {
        Some(receipt) => {
            println!("{:<12} {}", "Status:".bold(), "Installed".green());
            println!("{:<12} {}", "Installed:".bold(), receipt.version);
            println!(
                "{:<12} {}",
                "Location:".bold(),
                receipt.install_root.display().to_string().dimmed()
            );
        }
        None => println!("{:<12} {}", "Status:".bold(), "Not installed".dimmed()),
    }
    Ok(())
}
