//! openapi-from-routes - command-line front end for the generator.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-routes generate [OPTIONS] <ROUTES>
//! openapi-from-routes validate <DOCUMENT>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation from an exported route table and a docs manifest:
//! ```bash
//! openapi-from-routes generate routes.json --docs docs.yaml -o openapi.yaml
//! ```
//!
//! Generate JSON with a generator config:
//! ```bash
//! openapi-from-routes generate routes.json -d docs.yaml -c openapi.config.yaml -f json
//! ```
//!
//! Check the result:
//! ```bash
//! openapi-from-routes validate openapi.yaml -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_routes::cli;

fn main() -> Result<()> {
    // Parse once up front so the verbose flag can configure the logger
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("openapi-from-routes starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("Done");

    Ok(())
}
