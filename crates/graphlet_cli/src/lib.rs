//! Command-line interface for graphlet.
//!
//! Drives the built-in library demo engine, mainly for poking at the
//! runtime without writing a host program.
//!
//! # Usage
//!
//! ```bash
//! # Execute a request file against the demo schema
//! graphlet run request.json
//!
//! # Measure a request without executing it
//! graphlet check request.json
//!
//! # List the demo schema's types
//! graphlet schema
//! ```
//!
//! A request file is the JSON form of a [`graphlet_runtime::Request`]:
//!
//! ```json
//! {
//!   "operation": {
//!     "kind": "query",
//!     "selections": [
//!       {"name": "books", "selections": [
//!         {"name": "title"},
//!         {"name": "author", "selections": [{"name": "name"}]}
//!       ]}
//!     ]
//!   }
//! }
//! ```

pub mod demo;

use clap::{Parser, Subcommand};
use colored::Colorize;
use graphlet_runtime::{EngineConfig, Request, TypeDef};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "graphlet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a request file against the demo engine
    Run {
        /// Path to the request JSON file
        request: PathBuf,

        /// Request deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Maximum query depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum query complexity
        #[arg(long)]
        max_complexity: Option<usize>,
    },

    /// Analyze a request (depth and complexity) without executing it
    Check {
        /// Path to the request JSON file
        request: PathBuf,

        /// Maximum query depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum query complexity
        #[arg(long)]
        max_complexity: Option<usize>,
    },

    /// List the demo schema's types and fields
    Schema,
}

/// Runs a parsed command line, returning the process exit code.
pub async fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            request,
            timeout_ms,
            max_depth,
            max_complexity,
        } => {
            let mut config = apply_limits(EngineConfig::default(), max_depth, max_complexity);
            if let Some(timeout_ms) = timeout_ms {
                config = config.with_request_timeout(Duration::from_millis(timeout_ms));
            }
            let engine = demo::build_demo_engine(config)?;
            let request = read_request(&request)?;

            let response = engine.execute(request).await;
            let failed = response.has_errors();
            println!("{}", serde_json::to_string_pretty(&response)?);
            if failed {
                eprintln!("{}", "completed with errors".yellow());
            }
            Ok(0)
        }
        Commands::Check {
            request,
            max_depth,
            max_complexity,
        } => {
            let config = apply_limits(EngineConfig::default(), max_depth, max_complexity);
            let engine = demo::build_demo_engine(config)?;
            let request = read_request(&request)?;

            match engine.check(&request).await {
                Ok(metrics) => {
                    println!(
                        "{} depth={} complexity={}",
                        "accepted".green(),
                        metrics.depth,
                        metrics.complexity
                    );
                    Ok(0)
                }
                Err(error) => {
                    eprintln!("{} {}", "rejected:".red(), error);
                    Ok(1)
                }
            }
        }
        Commands::Schema => {
            let engine = demo::build_demo_engine(EngineConfig::default())?;
            for (name, type_def) in engine.schema().types() {
                match type_def {
                    TypeDef::Object(object) => {
                        println!("{} {}", "type".cyan(), name.bold());
                        for field in object.fields.values() {
                            println!("  {}: {}", field.name, field.ty);
                        }
                    }
                    TypeDef::Scalar(_) => println!("{} {}", "scalar".cyan(), name),
                    TypeDef::Interface(_) => println!("{} {}", "interface".cyan(), name),
                    TypeDef::Union(_) => println!("{} {}", "union".cyan(), name),
                    TypeDef::Enum(_) => println!("{} {}", "enum".cyan(), name),
                    TypeDef::InputObject(_) => println!("{} {}", "input".cyan(), name),
                }
            }
            Ok(0)
        }
    }
}

fn apply_limits(
    config: EngineConfig,
    max_depth: Option<usize>,
    max_complexity: Option<usize>,
) -> EngineConfig {
    let config = match max_depth {
        Some(depth) => config.with_max_depth(depth),
        None => config,
    };
    match max_complexity {
        Some(complexity) => config.with_max_complexity(complexity),
        None => config,
    }
}

fn read_request(path: &Path) -> Result<Request, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
