//! canopy CLI - render node trees and inspect registrations offline
//!
//! Loads the same configuration as the HTTP service and runs requests
//! through the pipeline from the command line.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process;

use canopy::{CanopyConfig, HookBus, PageRequest, Pipeline, QueryState, Registry, TemplatePartResolver};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(version, about = "Hydrate and serialize typed node trees", long_about = None)]
struct Cli {
    /// Path to canopy.yaml
    #[arg(short, long, global = true, default_value = "canopy.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a request file and print the response
    Render {
        /// JSON file with `defaults`, `page`, `providers` arrays
        #[arg(short, long)]
        input: PathBuf,

        /// JSON file with the resolved query descriptor
        #[arg(short, long)]
        query: Option<PathBuf>,

        /// Treat the request as not found
        #[arg(long)]
        not_found: bool,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// List registered node types
    Registrations,

    /// Print the normalized registration of one node type
    Schema {
        /// Node type name
        name: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = CanopyConfig::load(&cli.config).map_err(|e| e.to_string())?;
    let registry = config.build_registry();

    match cli.command {
        Commands::Render {
            input,
            query,
            not_found,
            pretty,
        } => {
            let request: PageRequest = read_json(&input)?;
            let mut query: QueryState = match query {
                Some(path) => read_json(&path)?,
                None => QueryState::default(),
            };
            query.not_found |= not_found;

            let hooks = HookBus::new();
            let resolver = config.template_part_resolver();
            let mut pipeline = Pipeline::new(&registry, &hooks).with_fallback(config.fallback.clone());
            if let Some(resolver) = &resolver {
                pipeline = pipeline.with_template_parts(resolver as &dyn TemplatePartResolver);
            }

            let response = pipeline.render(request, &query);
            let output = if pretty {
                serde_json::to_string_pretty(&response)
            } else {
                serde_json::to_string(&response)
            }
            .map_err(|e| format!("Failed to serialize response: {}", e))?;

            println!("{}", output);
        }

        Commands::Registrations => {
            list_registrations(&registry);
        }

        Commands::Schema { name } => {
            let registration = registry
                .resolve(&name)
                .ok_or_else(|| format!("No registration for '{}'", name))?;
            let output = serde_json::to_string_pretty(registration.as_ref())
                .map_err(|e| format!("Failed to serialize registration: {}", e))?;
            println!("{}", output);
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&contents).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

fn list_registrations(registry: &Registry) {
    if registry.is_empty() {
        println!("No node types registered");
        return;
    }

    for name in registry.names() {
        if let Some(registration) = registry.resolve(name) {
            let hidden: Vec<&str> = registration.hidden_keys().collect();
            println!(
                "{}  ({} fields, themes: {}{}{})",
                name,
                registration.config_schema.len(),
                registration
                    .theme_options
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                if hidden.is_empty() {
                    String::new()
                } else {
                    format!(", hidden: {}", hidden.join(", "))
                },
                registration
                    .alias
                    .as_ref()
                    .map(|alias| format!(", alias: {}", alias))
                    .unwrap_or_default(),
            );
        }
    }
}
