//! Schema Config CLI
//!
//! View and manage schema enhancer settings.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use schema_enhancer::EnhancerSettings;

#[derive(Parser)]
#[command(name = "schema-config")]
#[command(about = "View and manage schema enhancer settings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective settings
    Show {
        /// Settings file to layer on top (optional)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a settings file with the default values
    Init {
        /// Output path
        #[arg(short, long, default_value = "schema-enhancer.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate settings
    Validate {
        /// Settings file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { config, toml, json } => {
            let settings = EnhancerSettings::load_from(config.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(&settings)?);
            } else {
                println!("📋 Schema Enhancer Settings\n");
                println!("Sources:");
                println!("  Actions schema: {}", settings.schema_url);
                println!("  Serve schema:   {}", settings.serve_schema_url);
                println!("\nCache:");
                println!("  Directory: {}", settings.cache_path().display());
                println!("\nFetch:");
                println!("  Timeout: {}s", settings.fetch_timeout().as_secs());
            }
        }

        Commands::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
            }
            EnhancerSettings::default().save(&output)?;
            println!("✅ Created settings file: {}", output.display());
        }

        Commands::Validate { config } => match EnhancerSettings::load_from(config.as_deref()) {
            Ok(settings) => {
                let mut valid = true;
                for key in ["schema_url", "serve_schema_url"] {
                    if let Err(e) = settings.url_for(key) {
                        eprintln!("❌ {}", e);
                        valid = false;
                    }
                }
                if !valid {
                    std::process::exit(1);
                }
                println!("✅ Settings are valid");
                println!("   Actions schema: {}", settings.schema_url);
                println!("   Serve schema:   {}", settings.serve_schema_url);
                println!("   Cache:          {}", settings.cache_path().display());
            }
            Err(e) => {
                eprintln!("❌ Settings error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
