//! DAL query command
//!
//! Runs one IVOA DAL discovery request against the catalog database and
//! prints the response document as JSON.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::{fmt, EnvFilter};

use dal_query::config::ServiceConfig;
use dal_query::output::{render, ErrorDocument, ResponseDocument};
use dal_query::{parse_key_value, resolve_protocol, run_query};

/// DAL query command
#[derive(Parser, Debug)]
#[command(name = "dal-query")]
#[command(about = "Run an IVOA DAL discovery query (SIA, SSA or cone search)")]
struct Args {
    /// Service configuration file
    #[arg(short, long, env = "DAL_CONFIG")]
    config: PathBuf,

    /// Catalog database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Protocol to serve (image, spectrum or cone); defaults to the configured one
    #[arg(short, long)]
    protocol: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Indent the JSON output
    #[arg(long)]
    pretty: bool,

    /// Request parameters as KEY=VALUE, e.g. POS=180,0 SIZE=0.5
    #[arg(value_parser = parse_key_value)]
    params: Vec<(String, String)>,
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = match ServiceConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            return ExitCode::from(2);
        }
    };

    let outcome = resolve_protocol(&config, args.protocol.as_deref()).and_then(|protocol| {
        run_query(&config, protocol, &args.params, args.database_url.as_deref())
    });

    let (rendered, code) = match &outcome {
        Ok(response) => (
            render(&ResponseDocument::new(response), args.pretty),
            ExitCode::SUCCESS,
        ),
        Err(err) => {
            warn!(error = %err, "Request failed");
            (render(&ErrorDocument::from(err), args.pretty), ExitCode::FAILURE)
        }
    };

    match rendered {
        Ok(text) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{}", text) {
                error!("Failed to write response: {}", e);
                return ExitCode::FAILURE;
            }
            code
        }
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            ExitCode::FAILURE
        }
    }
}
