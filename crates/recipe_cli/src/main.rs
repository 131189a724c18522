//! Command-line access to a local recipe catalog.
//!
//! # Responsibility
//! - Resolve configuration from the environment plus command-line flags.
//! - Drive the core provider for import, listing, inspection and deletion.

use clap::{Parser, Subcommand};
use log::info;
use recipe_core::{
    init_logging, open_database, ChangeNotifier, CoreConfig, DatabaseLocation, Recipe,
    RecipeId, RecipeProvider,
};
use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "recipe-cli")]
#[command(about = "Inspect and edit a local recipe catalog", version)]
struct Cli {
    /// Database file, or `:memory:`
    #[arg(long)]
    db: Option<String>,

    /// Locator authority
    #[arg(long)]
    authority: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Directory for rotating log files; logging stays off without it
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a JSON array of recipes
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// List every recipe with child counts
    List,

    /// Print one recipe as JSON
    Show {
        /// Recipe id
        id: RecipeId,
    },

    /// Delete one recipe and its children
    Delete {
        /// Recipe id
        id: RecipeId,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(&cli)?;
    if let Some(log_dir) = &cli.log_dir {
        let log_dir = if log_dir.is_absolute() {
            log_dir.clone()
        } else {
            env::current_dir()?.join(log_dir)
        };
        init_logging(config.log_level, &log_dir)?;
    }

    let db = Arc::new(open_database(&config.database)?);
    let provider = RecipeProvider::new(db, Arc::new(ChangeNotifier::new()), &config.authority)?;
    info!(
        "event=cli_start module=cli status=ok authority={} version={}",
        provider.authority(),
        recipe_core::core_version()
    );

    match cli.command {
        Commands::Import { file } => {
            let raw = fs::read_to_string(&file)?;
            let recipes: Vec<Recipe> = serde_json::from_str(&raw)?;
            let created = provider.bulk_insert(provider.collection_locator(), &recipes)?;
            println!("imported {created} of {} recipes", recipes.len());
        }
        Commands::List => {
            let query = provider.query(provider.collection_locator())?;
            for recipe in &query.recipes {
                println!(
                    "{}\t{}\tservings={}\tingredients={}\tsteps={}",
                    recipe.id,
                    recipe.name,
                    recipe.servings,
                    recipe.ingredients.len(),
                    recipe.steps.len()
                );
            }
        }
        Commands::Show { id } => {
            let locator = provider.item_locator(id);
            match provider.query(&locator)?.into_single() {
                Some(recipe) => println!("{}", serde_json::to_string_pretty(&recipe)?),
                None => return Err(format!("no recipe at {locator}").into()),
            }
        }
        Commands::Delete { id } => {
            let count = provider.delete(provider.item_locator(id))?;
            println!("deleted {count}");
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<CoreConfig, Box<dyn Error>> {
    let mut config = CoreConfig::from_env()?;
    if let Some(db) = &cli.db {
        config = config.with_database(DatabaseLocation::parse(db));
    }
    if let Some(authority) = &cli.authority {
        config = config.with_authority(authority)?;
    }
    if let Some(level) = &cli.log_level {
        config = config.with_log_level(level)?;
    }
    Ok(config)
}
