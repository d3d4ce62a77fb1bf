//! Schema Enhance CLI
//!
//! Applies one enhancer to a local schema file, without touching the cache.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use jsonschema::JSONSchema;
use schema_enhancer::cache::serialize_artifact;
use schema_enhancer::enhance::enhancer_by_name;
use schema_enhancer::{Checksum, SchemaObject};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-enhance")]
#[command(about = "Enhance a local schema file with editor snippets")]
struct Cli {
    /// Schema file to enhance
    input: PathBuf,

    /// Enhancer to apply
    #[arg(short, long, value_enum, default_value = "action")]
    variant: Variant,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Compile the result as a JSON Schema before writing it
    #[arg(long)]
    check: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Variant {
    Action,
    Serve,
}

impl Variant {
    fn name(self) -> &'static str {
        match self {
            Variant::Action => "action",
            Variant::Serve => "serve",
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let enhancer = enhancer_by_name(cli.variant.name())
        .ok_or_else(|| anyhow!("unknown enhancer: {}", cli.variant.name()))?;

    let content = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", cli.input.display()))?;
    let schema = SchemaObject::from_value(value)
        .with_context(|| format!("{} is not a JSON Schema object", cli.input.display()))?;

    let enhanced = enhancer.enhance(schema)?;
    let bytes = serialize_artifact(&enhanced)?;

    if cli.check {
        let compiled: serde_json::Value = serde_json::from_slice(&bytes)?;
        JSONSchema::compile(&compiled).map_err(|e| anyhow!("enhanced schema does not compile: {}", e))?;
        eprintln!("✅ Enhanced schema compiles");
    }

    match cli.output {
        Some(path) => {
            std::fs::write(&path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "✅ Wrote {} ({}, sha256 {})",
                path.display(),
                enhancer.local_filename(),
                Checksum::from_bytes(&bytes).short()
            );
        }
        None => println!("{}", String::from_utf8_lossy(&bytes)),
    }

    Ok(())
}
