//! # Khazna Register
//!
//! The boundary callers talk to: load configuration, start logging, open
//! the ledgers, run one command, print its JSON result.
//!
//! ## Module Organization
//! ```text
//! khazna_register/
//! ├── lib.rs          ◄─── You are here (Cli & run)
//! ├── config.rs       ◄─── RegisterConfig: defaults → khazna.toml → env
//! ├── state.rs        ◄─── AppContext: Database + orchestrator + config
//! ├── error.rs        ◄─── ApiError { code, message, retryable }
//! └── commands/
//!     ├── mod.rs      ◄─── Command (clap subcommands) + dispatch
//!     ├── sale.rs     ◄─── Sale commands
//!     ├── ledger.rs   ◄─── Stock, customer and cashbox commands
//!     └── report.rs   ◄─── Audit and summaries
//! ```
//!
//! ## Invocation
//! ```text
//! khazna [--config <PATH>] <COMMAND> [REQUEST]
//!
//!   REQUEST   JSON file with the request body, `-` for stdin.
//!             Omitted means an empty body.
//!
//! stdout ◄── { "status": "ok",    "data":  { ... } }
//!        ◄── { "status": "error", "error": { "code": "...", "message": "..." } }
//! stderr ◄── tracing output
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod state;

use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::Command;
use config::RegisterConfig;
use error::ApiError;
use state::AppContext;

/// Khazna POS register: sales, stock, cash and customer ledgers.
#[derive(Parser, Debug)]
#[command(name = "khazna", version)]
pub struct Cli {
    /// Config file (default: khazna.toml in the platform config dir)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// The JSON envelope printed on stdout.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Ok { data: Value },
    Error { error: ApiError },
}

/// Runs the register for one invocation and returns the process exit code.
///
/// `args` includes the program name, as `std::env::args_os()` yields it.
pub async fn run<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version land here too, with exit code 0.
            let _ = e.print();
            return ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(2));
        }
    };

    let config = match RegisterConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return emit(Response::Error { error: e.into() }),
    };
    init_tracing(&config.logging.level);

    let response = match execute(config, &cli.command).await {
        Ok(data) => Response::Ok { data },
        Err(error) => Response::Error { error },
    };
    emit(response)
}

/// Opens the ledgers and runs the command.
pub async fn execute(config: RegisterConfig, command: &Command) -> Result<Value, ApiError> {
    let body = read_body(command.request())?;
    info!(?command, store = %config.store.name, "Register command");
    let ctx = AppContext::open(config).await?;
    let result = commands::dispatch(&ctx, command, body).await;
    ctx.db().close().await;
    result
}

fn read_body(source: Option<&str>) -> Result<Value, ApiError> {
    let raw = match source {
        None => return Ok(Value::Null),
        Some("-") => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .map_err(|e| ApiError::validation(format!("Cannot read stdin: {}", e)))?;
            raw
        }
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| ApiError::validation(format!("Cannot read {}: {}", path, e)))?,
    };
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&raw)?)
}

fn emit(response: Response) -> ExitCode {
    let code = match &response {
        Response::Ok { .. } => ExitCode::SUCCESS,
        Response::Error { .. } => ExitCode::FAILURE,
    };
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Cannot encode response: {}", e);
            return ExitCode::FAILURE;
        }
    }
    code
}

/// Initializes the tracing subscriber on stderr.
///
/// ## Log Levels
/// - `RUST_LOG` wins when set
/// - otherwise `[logging] level` / `KHAZNA_LOG`
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;
    use crate::commands::RequestArgs;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_invocation() {
        let cli =
            Cli::try_parse_from(["khazna", "--config", "/etc/khazna.toml", "edit-sale", "-"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/khazna.toml")));
        assert_eq!(
            cli.command,
            Command::EditSale(RequestArgs {
                request: Some("-".to_string()),
            })
        );

        // --config is global, so it may follow the command.
        let cli = Cli::try_parse_from(["khazna", "audit", "-c", "khazna.toml"]).unwrap();
        assert_eq!(cli.command, Command::Audit);
        assert_eq!(cli.config, Some(PathBuf::from("khazna.toml")));
    }

    #[test]
    fn test_command_names_are_kebab_case() {
        let names: Vec<String> = Cli::command()
            .get_subcommands()
            .map(|sub| sub.get_name().to_string())
            .collect();
        for expected in ["checkout", "edit-sale", "receive-payment", "record-expense", "audit"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        for sub in Cli::command().get_subcommands() {
            assert!(sub.get_about().is_some(), "{} has no about", sub.get_name());
        }
    }

    #[test]
    fn test_parse_errors() {
        let err = Cli::try_parse_from(["khazna", "--config"]).unwrap_err();
        assert_ne!(err.exit_code(), 0);
        let err = Cli::try_parse_from(["khazna", "void-sale"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(Cli::try_parse_from(["khazna", "get-sale", "a.json", "b.json"]).is_err());
        assert!(Cli::try_parse_from(["khazna", "audit", "a.json"]).is_err());

        let help = Cli::try_parse_from(["khazna", "--help"]).unwrap_err();
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);
        assert_eq!(help.exit_code(), 0);
    }

    #[test]
    fn test_response_envelope() {
        let ok = serde_json::to_value(Response::Ok {
            data: serde_json::json!({ "id": "s1" }),
        })
        .unwrap();
        assert_eq!(ok["status"], "ok");
        assert_eq!(ok["data"]["id"], "s1");

        let err = serde_json::to_value(Response::Error {
            error: ApiError::not_found("Sale", "s1"),
        })
        .unwrap();
        assert_eq!(err["status"], "error");
        assert_eq!(err["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_execute_against_a_file_database() {
        let dir = std::env::temp_dir().join(format!("khazna-register-{}", std::process::id()));
        let mut config = RegisterConfig::default();
        config.database.path = Some(dir.join("khazna.db"));

        let report = execute(config, &Command::Audit).await.unwrap();
        assert_eq!(report["cashboxes_checked"], 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
