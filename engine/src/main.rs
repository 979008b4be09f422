//! jstransform CLI - Reshape JSON and XML documents with schema-embedded rules
//!
//! # Main Commands
//!
//! ```bash
//! jstransform transform --schema image.json --id cumulo input.json   # Transform JSON input
//! jstransform transform --schema teams.json --id sport --xml in.xml   # Transform XML input
//! jstransform validate --schema image.json output.json                # Validate a document
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! jstransform tree --schema image.json --id cumulo   # Show the compiled transformer tree (--xml for XPath rules)
//! jstransform operations                             # Show available operations
//! ```
//!
//! `-v` raises the log level (repeat for more); `RUST_LOG` overrides it.

use clap::{ArgAction, Parser, Subcommand};
use jstransform::logging::init_logging;
use jstransform::{
    new_transformer, InputFormat, InstanceTransformer, PathDialect, Schema, TransformError, TransformOptions,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "jstransform")]
#[command(about = "Transform JSON or XML documents into the shape of a JSON schema", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform an input document using the rules embedded in a schema
    Transform {
        /// Input document (JSON, or XML with --xml)
        input: PathBuf,

        /// Target JSON schema
        #[arg(short, long)]
        schema: PathBuf,

        /// Transform identifier selecting the rule-set
        #[arg(short, long)]
        id: String,

        /// Treat the input as XML (rule paths are XPath)
        #[arg(long)]
        xml: bool,

        /// Transformer options as JSON (validate, emptyRequiredArray, staticFields)
        #[arg(long)]
        options: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip validation of the result
        #[arg(long)]
        no_validate: bool,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a JSON document against a schema
    Validate {
        /// Input JSON document
        input: PathBuf,

        /// JSON schema
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Show the transformer tree compiled for an identifier
    Tree {
        /// JSON schema
        #[arg(short, long)]
        schema: PathBuf,

        /// Transform identifier
        #[arg(short, long)]
        id: String,

        /// Compile rule paths as XPath
        #[arg(long)]
        xml: bool,
    },

    /// Show available operations
    Operations,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Transform {
            input,
            schema,
            id,
            xml,
            options,
            output,
            no_validate,
            pretty,
        } => cmd_transform(
            &input,
            &schema,
            &id,
            xml,
            options.as_deref(),
            output.as_deref(),
            no_validate,
            pretty,
        ),

        Commands::Validate { input, schema } => cmd_validate(&input, &schema),

        Commands::Tree { schema, id, xml } => cmd_tree(&schema, &id, xml),

        Commands::Operations => cmd_operations(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_transform(
    input: &Path,
    schema_path: &Path,
    id: &str,
    xml: bool,
    options_path: Option<&Path>,
    output: Option<&Path>,
    no_validate: bool,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(input = %input.display(), schema = %schema_path.display(), id, "transforming");

    let schema = Schema::from_file(schema_path)?;

    let mut options: TransformOptions = match options_path {
        Some(p) => serde_json::from_str(&fs::read_to_string(p)?)?,
        None => TransformOptions::default(),
    };
    if no_validate {
        options.validate = false;
    }

    let format = if xml { InputFormat::Xml } else { InputFormat::Json };
    let transformer = new_transformer(schema, id, format, options)?;

    let raw = fs::read(input)?;
    let encoded = match transformer.transform(&raw) {
        Ok(encoded) => encoded,
        Err(TransformError::ValidationFailure { errors }) => {
            eprintln!("Result failed validation:");
            for err in &errors {
                eprintln!("  - {}", err);
            }
            return Err(format!("{} validation error(s)", errors.len()).into());
        }
        Err(e) => return Err(e.into()),
    };

    let text = if pretty {
        let value: serde_json::Value = serde_json::from_slice(&encoded)?;
        serde_json::to_string_pretty(&value)?
    } else {
        String::from_utf8(encoded)?
    };
    write_output(&text, output)?;

    Ok(())
}

fn cmd_validate(input: &Path, schema_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::from_file(schema_path)?;
    let raw = fs::read(input)?;

    let errors = schema.validate(&raw)?;
    if errors.is_empty() {
        eprintln!("{}: valid", input.display());
        return Ok(());
    }

    eprintln!("{}: {} error(s)", input.display(), errors.len());
    for err in &errors {
        eprintln!("  - {}", err);
    }
    std::process::exit(1);
}

fn cmd_tree(schema_path: &Path, id: &str, xml: bool) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::from_file(schema_path)?;
    let dialect = if xml { PathDialect::XPath } else { PathDialect::JsonPath };
    let tree = InstanceTransformer::build(&schema, id, dialect)?;
    print!("{}", tree.describe());
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", jstransform::operations_description());
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            tracing::info!(path = %p.display(), "output written");
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
