use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lineage_graph::config::{BuildConfig, SchemaSource};
use lineage_graph::document::LineageDocument;
use lineage_graph::error::{BuildError, ErrorLayer, Result};
use lineage_graph::logging::init_logging;
use lineage_graph::row::{load_rows, InputFormat};
use tracing::info;

#[derive(Parser)]
#[command(about = "Render tabular lineage rows as an expandable graph document")]
struct LineageGraphCli {
    /// Name of the root node, e.g. the model whose lineage this is.
    #[arg(long, value_parser)]
    root: String,

    /// Lineage rows as CSV, a JSON array of objects or JSON lines.
    #[arg(long, value_parser)]
    input: PathBuf,

    /// Input format; guessed from the input's extension when omitted.
    #[arg(long, value_enum)]
    format: Option<InputFormat>,

    /// TOML build configuration.
    #[arg(long, value_parser)]
    config: Option<PathBuf>,

    /// Built-in schema to use, overriding the configuration's.
    #[arg(long, value_parser = ["default", "extended"])]
    schema: Option<String>,

    #[arg(long, value_parser, default_value = "lineage_graph.html")]
    output: PathBuf,

    /// Also write the document payload as JSON to this path.
    #[arg(long, value_parser)]
    emit_json: Option<PathBuf>,
}

fn run(cli: LineageGraphCli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => BuildConfig::load(path)?,
        None => BuildConfig::default(),
    };
    if let Some(name) = cli.schema {
        config.schema = SchemaSource::Named(name);
    }

    let format = match cli.format.or_else(|| InputFormat::from_path(&cli.input)) {
        Some(format) => format,
        None => {
            return Err(BuildError::new(
                ErrorLayer::BadInput,
                format!(
                    "Can't tell the format of '{}'; pass --format",
                    cli.input.display()
                ),
            ))
        }
    };
    let rows = load_rows(&cli.input, format)?;

    let document = LineageDocument::build(&rows, &cli.root, &config)?;
    document.write_html(&cli.output)?;
    if let Some(json_path) = &cli.emit_json {
        document.write_json(json_path)?;
    }

    info!(
        rows = rows.len(),
        initial_nodes = document.payload.view.initial.nodes.len(),
        "done"
    );
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let cli = LineageGraphCli::parse();
    let output = cli.output.clone();
    match run(cli) {
        Ok(()) => {
            println!("Wrote {}", output.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("lineage-graph: {}", err);
            ExitCode::FAILURE
        }
    }
}
