//! # docmap-cli
//!
//! Command-line interface for the document mapping engine: run a
//! mapping over an input document, invert a mapping, or derive a
//! schema tree from XSD, JSON Schema, sample XML, CSV metadata or an
//! IDOC definition.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docmap_adapter_idoc::{IdocDefinition, IdocParser};
use docmap_mapping::{execute, invert, MappingDefinition};
use docmap_schema::model::Schema;
use docmap_serialize::{csv::CsvSerializer, json, XmlSerializer};
use docmap_tree::Value;

#[derive(Parser)]
#[command(name = "docmap")]
#[command(about = "Document mapping engine CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Transform an input document through a mapping
    Transform {
        /// Input document (xml, json or idoc flat file)
        input: PathBuf,

        /// Output file path
        output: PathBuf,

        /// Mapping definition (json or yaml)
        #[arg(short, long)]
        mapping: PathBuf,

        /// Target schema for output ordering (schema json)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output format, defaults to the output file extension
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// IDOC definition for positional input (auto-detected if absent)
        #[arg(long)]
        idoc_definition: Option<PathBuf>,
    },

    /// Invert a mapping definition
    Invert {
        /// Mapping definition (json or yaml)
        input: PathBuf,

        /// Inverted mapping output path
        output: PathBuf,
    },

    /// Derive a schema tree from a schema source
    Schema {
        /// Source file (xsd, json schema, sample xml, csv metadata,
        /// idoc definition)
        input: PathBuf,

        /// Schema json output path
        output: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Xml,
    Json,
    Csv,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Transform {
            input,
            output,
            mapping,
            schema,
            format,
            idoc_definition,
        } => transform(
            &input,
            &output,
            &mapping,
            schema.as_deref(),
            format,
            idoc_definition.as_deref(),
        ),
        Commands::Invert { input, output } => invert_mapping(&input, &output),
        Commands::Schema { input, output } => derive_schema(&input, &output),
    }
}

fn transform(
    input: &Path,
    output: &Path,
    mapping_path: &Path,
    schema_path: Option<&Path>,
    format: Option<OutputFormat>,
    idoc_definition: Option<&Path>,
) -> anyhow::Result<()> {
    let mapping = load_mapping(mapping_path)?;
    let tree = load_input(input, idoc_definition)?;
    let schema = schema_path.map(load_schema).transpose()?;

    info!(mapping = %mapping.name, input = %input.display(), "running transformation");
    let result = execute(&tree, &mapping)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }
    for error in &result.errors {
        warn!(rule = %error.rule_id, "rule failed: {}", error.message);
    }

    let format = format
        .or_else(|| format_from_extension(output))
        .unwrap_or(OutputFormat::Json);
    let (text, render_warnings) = render(&result.output_tree, format, schema.as_ref())?;
    for warning in render_warnings {
        warn!("{warning}");
    }

    std::fs::write(output, text)
        .with_context(|| format!("cannot write output to '{}'", output.display()))?;
    info!(
        output = %output.display(),
        error_count = result.errors.len(),
        "transformation finished"
    );
    if result.errors.is_empty() {
        Ok(())
    } else {
        bail!("{} rule(s) failed, see log for details", result.errors.len())
    }
}

fn invert_mapping(input: &Path, output: &Path) -> anyhow::Result<()> {
    let mapping = load_mapping(input)?;
    let (inverted, warnings) = invert(&mapping);
    for warning in &warnings {
        warn!(
            rule = %warning.rule_id,
            "lossy inversion: {} ({} -> {})",
            warning.reason,
            warning.source,
            warning.target
        );
    }

    let text = if has_extension(output, "yaml") || has_extension(output, "yml") {
        inverted.to_yaml()?
    } else {
        inverted.to_json()?
    };
    std::fs::write(output, text)
        .with_context(|| format!("cannot write mapping to '{}'", output.display()))?;
    info!(
        name = %inverted.name,
        lossy_count = warnings.len(),
        "wrote inverted mapping"
    );
    Ok(())
}

fn derive_schema(input: &Path, output: &Path) -> anyhow::Result<()> {
    let schema = load_schema_source(input)?;
    schema.validate()?;
    std::fs::write(output, schema.to_json()?)
        .with_context(|| format!("cannot write schema to '{}'", output.display()))?;
    info!(
        name = %schema.name,
        field_count = schema.len(),
        "wrote schema tree"
    );
    Ok(())
}

fn load_input(path: &Path, idoc_definition: Option<&Path>) -> anyhow::Result<Value> {
    let read = |path: &Path| {
        std::fs::read_to_string(path)
            .with_context(|| format!("cannot read input '{}'", path.display()))
    };
    if has_extension(path, "xml") {
        return Ok(docmap_serialize::from_xml(&read(path)?)?);
    }
    if has_extension(path, "json") {
        return Ok(json::from_json(&read(path)?)?);
    }
    // anything else is treated as an IDOC flat file
    let parser = match idoc_definition {
        Some(definition) => IdocParser::with_definition(IdocDefinition::from_file(definition)?),
        None => IdocParser::new(),
    };
    let parsed = parser.parse_file(path)?;
    for warning in &parsed.warnings {
        warn!("{warning}");
    }
    Ok(parsed.tree)
}

fn load_mapping(path: &Path) -> anyhow::Result<MappingDefinition> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read mapping '{}'", path.display()))?;
    let mapping = if has_extension(path, "yaml") || has_extension(path, "yml") {
        MappingDefinition::from_yaml(&text)?
    } else {
        MappingDefinition::from_json(&text)?
    };
    Ok(mapping)
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read schema '{}'", path.display()))?;
    Ok(Schema::from_json(&text)?)
}

fn load_schema_source(path: &Path) -> anyhow::Result<Schema> {
    let name = path
        .file_stem()
        .map_or_else(|| "schema".to_string(), |stem| stem.to_string_lossy().into_owned());

    if has_extension(path, "xsd") {
        return Ok(docmap_schema::xsd::parse_file(path)?);
    }
    if has_extension(path, "csv") {
        return Ok(docmap_schema::csv_meta::parse_file(path)?);
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read schema source '{}'", path.display()))?;
    if has_extension(path, "xml") {
        return Ok(docmap_schema::sample_xml::parse_str(&text, &name)?);
    }
    if has_extension(path, "json") {
        // an IDOC definition and a JSON Schema are both json files
        if let Ok(definition) = IdocDefinition::from_json(&text) {
            return Ok(docmap_adapter_idoc::to_schema(&definition)?);
        }
        return Ok(docmap_schema::json_schema::parse_str(&text, &name)?);
    }
    bail!(
        "cannot derive a schema from '{}': unsupported extension",
        path.display()
    )
}

fn render(
    tree: &Value,
    format: OutputFormat,
    schema: Option<&Schema>,
) -> anyhow::Result<(String, Vec<String>)> {
    match format {
        OutputFormat::Xml => {
            let serializer = match schema {
                Some(schema) => XmlSerializer::new().with_schema(schema),
                None => XmlSerializer::new(),
            };
            let rendered = serializer.serialize(tree)?;
            Ok((rendered.text, rendered.warnings))
        }
        OutputFormat::Json => match schema {
            Some(schema) => {
                let rendered = json::to_json_ordered(tree, schema)?;
                Ok((rendered.text, rendered.warnings))
            }
            None => Ok((json::to_json_pretty(tree)?, Vec::new())),
        },
        OutputFormat::Csv => {
            let rendered = CsvSerializer::new().serialize(tree)?;
            Ok((rendered.text, rendered.warnings))
        }
    }
}

fn format_from_extension(path: &Path) -> Option<OutputFormat> {
    if has_extension(path, "xml") {
        Some(OutputFormat::Xml)
    } else if has_extension(path, "json") {
        Some(OutputFormat::Json)
    } else if has_extension(path, "csv") {
        Some(OutputFormat::Csv)
    } else {
        None
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
