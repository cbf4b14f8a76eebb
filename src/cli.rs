use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::compiler::RouteCompiler;
use crate::config::{load_config, DocsManifest, GeneratorConfig};
use crate::normalizer::Normalizer;
use crate::openapi_builder::OpenApiBuilder;
use crate::registry::MetadataRegistry;
use crate::router::RouteFile;
use crate::serializer::{load_document, serialize_json, serialize_yaml, write_to_file};
use crate::validate::{validate_document, Severity};

/// OpenAPI document generator - builds OpenAPI 3 documents from a route table and
/// documentation metadata
#[derive(Parser, Debug)]
#[command(name = "openapi-from-routes")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate an OpenAPI document
    Generate {
        /// Route table exported by the application, as JSON
        #[arg(value_name = "ROUTES")]
        routes: PathBuf,

        /// Documentation manifest (YAML or JSON)
        #[arg(short = 'd', long = "docs", value_name = "FILE")]
        docs: Option<PathBuf>,

        /// Generator configuration (YAML or JSON)
        #[arg(short = 'c', long = "config", value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output format (yaml or json)
        #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
        output_format: OutputFormat,

        /// Output file path (if not specified, outputs to stdout)
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output_path: Option<PathBuf>,
    },
    /// Check a generated document
    Validate {
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,
    },
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

fn require_file(label: &str, path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("{} does not exist: {}", label, path.display());
    }
    if !path.is_file() {
        bail!("{} is not a file: {}", label, path.display());
    }
    Ok(())
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    match &args.command {
        Command::Generate {
            routes,
            docs,
            config,
            output_format,
            output_path,
        } => {
            // a missing route table is reported later and yields an empty document
            if let Some(docs) = docs {
                require_file("Docs manifest", docs)?;
            }
            if let Some(config) = config {
                require_file("Config file", config)?;
            }

            info!("Route table: {}", routes.display());
            info!("Output format: {:?}", output_format);
            if let Some(output) = output_path {
                info!("Output file: {}", output.display());
            } else {
                info!("Output: stdout");
            }
        }
        Command::Validate { document } => {
            require_file("Document", document)?;
            info!("Document: {}", document.display());
        }
    }

    Ok(args)
}

/// Run the selected command
pub fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Generate {
            routes,
            docs,
            config,
            output_format,
            output_path,
        } => generate(
            &routes,
            docs.as_deref(),
            config.as_deref(),
            output_format,
            output_path.as_deref(),
        ),
        Command::Validate { document } => validate(&document),
    }
}

fn generate(
    routes: &Path,
    docs: Option<&Path>,
    config: Option<&Path>,
    output_format: OutputFormat,
    output_path: Option<&Path>,
) -> Result<()> {
    info!("Starting OpenAPI document generation...");

    let config_path = config;
    let mut config: GeneratorConfig = match config_path {
        Some(path) => load_config(path)?,
        None => GeneratorConfig::default(),
    };
    // components_dir is relative to the config file
    if let (Some(dir), Some(path)) = (config.components_dir.clone(), config_path) {
        if dir.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.components_dir = Some(base.join(dir));
        }
    }

    let manifest: DocsManifest = match docs {
        Some(path) => load_config(path)?,
        None => {
            warn!("No docs manifest given, every route will be left out");
            DocsManifest::default()
        }
    };

    let mut registry = MetadataRegistry::new();
    manifest.register(&mut registry);
    let handlers = manifest.handler_resolver();
    let normalizer = Normalizer::new();
    let compiler =
        RouteCompiler::new(&registry, &handlers, &normalizer).with_filter(config.filter.clone());

    info!("Building OpenAPI document...");
    let document = OpenApiBuilder::from_config(&config)
        .generate(&RouteFile::new(routes.to_path_buf()), &compiler)?;

    info!("Serializing to {:?} format...", output_format);
    let content = match output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    if let Some(output_path) = output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    let operations = document
        .get("paths")
        .and_then(|paths| paths.as_object())
        .map(|paths| {
            paths
                .values()
                .filter_map(|item| item.as_object())
                .map(|item| item.len())
                .sum::<usize>()
        })
        .unwrap_or(0);
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Documented members: {}", registry.len());
    info!("  - Operations: {}", operations);

    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let document = load_document(path)?;
    let report = validate_document(&document);
    print!("{}", report);

    if !report.passed() {
        let errors = report
            .failures()
            .filter(|check| check.severity == Severity::Error)
            .count();
        bail!("{} failed validation ({} checks failed)", path.display(), errors);
    }
    info!("{} passed validation", path.display());
    Ok(())
}
