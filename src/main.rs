use clap::{ArgAction, Parser, Subcommand};
use owo_colors::OwoColorize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use ub_client::error::{advice_for, classify, ErrorKind, OperationError};
use ub_client::logging::{init_logging, LoggingConfig};
use ub_client::stream::StreamEvent;
use ub_client::{ApiRequest, Client, ClientConfig, Method, RequestOptions};

#[derive(Parser, Debug)]
#[command(name = "ub")]
#[command(version)]
#[command(about = "Command-line client for the UB service API")]
struct Cli {
    /// Suppress all output except errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one request and print the response data
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Path relative to the base URL
        path: String,

        /// JSON request body
        #[arg(long, value_name = "JSON")]
        data: Option<String>,

        /// Make a single attempt
        #[arg(long)]
        no_retry: bool,

        /// Per-attempt timeout in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },
    /// Run a streaming request, printing progress to stderr and the result to stdout
    Stream {
        /// Path relative to the base URL
        path: String,

        /// JSON request body
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },
    /// Check that the service is reachable and healthy
    Health,
    /// Show the recovery advice for an error code
    Explain {
        /// Wire error code, e.g. RATE_LIMITED
        code: String,
    },
}

mod exit_codes {
    use std::process::ExitCode;

    /// The operation failed
    pub fn failed() -> ExitCode {
        ExitCode::from(1)
    }

    /// Bad arguments or configuration
    pub fn usage() -> ExitCode {
        ExitCode::from(2)
    }

    /// Cancelled with Ctrl-C
    pub fn interrupted() -> ExitCode {
        ExitCode::from(130)
    }
}

/// Optional styling for terminal output.
#[derive(Clone, Copy)]
struct Palette {
    color: bool,
}

impl Palette {
    fn error(self, text: &str) -> String {
        if self.color {
            text.red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn code(self, text: &str) -> String {
        if self.color {
            text.yellow().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn label(self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    fn good(self, text: &str) -> String {
        if self.color {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }
}

fn print_error(palette: Palette, error: &OperationError) {
    eprintln!("{} {}", palette.error("error:"), error.message());
    eprintln!("  {} {}", palette.label("kind:"), palette.code(error.kind().code()));
    if let Some(status) = error.http_status() {
        eprintln!("  {} {}", palette.label("status:"), status);
    }
    eprintln!("  {} {}", palette.label("suggestion:"), error.suggestion());
    if !error.alternatives().is_empty() {
        eprintln!("  {}", palette.label("alternatives:"));
        for alternative in error.alternatives() {
            eprintln!("    - {alternative}");
        }
    }
}

fn explain(palette: Palette, code: &str) {
    let kind = classify(code);
    let advice = advice_for(kind);

    println!("{} ({:?})", palette.code(kind.code()), kind.category());
    if kind == ErrorKind::Unknown && !code.trim().eq_ignore_ascii_case("UNKNOWN") {
        println!("  {} {code:?} is not a known code", palette.label("note:"));
    }
    let retry = if advice.can_retry {
        palette.good("yes")
    } else {
        palette.error("no")
    };
    println!("  {} {retry}", palette.label("retryable:"));
    if let Some(delay) = advice.retry_after {
        println!("  {} {}ms", palette.label("retry after:"), delay.as_millis());
    }
    println!("  {} {}", palette.label("suggestion:"), advice.suggestion);
    for alternative in &advice.alternatives {
        println!("    - {alternative}");
    }
}

fn parse_body(data: Option<&str>) -> Result<Option<Value>, String> {
    data.map(|text| serde_json::from_str(text).map_err(|err| format!("--data is not valid JSON: {err}")))
        .transpose()
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

fn print_progress(event: StreamEvent, quiet: bool) {
    if quiet {
        return;
    }
    let Some(update) = event.as_progress() else {
        return;
    };
    match (update.stage, update.elapsed) {
        (Some(stage), Some(elapsed)) => eprintln!("progress: {stage} ({elapsed}ms)"),
        (Some(stage), None) => eprintln!("progress: {stage}"),
        _ => {
            if let StreamEvent::Progress(payload) = event {
                eprintln!("progress: {payload}");
            }
        }
    }
}

/// Cancels the returned token on Ctrl-C.
fn install_interrupt_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!(error = %err, "could not install Ctrl-C handler");
    }
    token
}

/// Loads configuration and builds the client, reporting failures as usage errors.
fn connect(config_path: Option<&Path>, palette: Palette) -> Result<Client, ExitCode> {
    let config = ClientConfig::load(config_path).map_err(|err| {
        eprintln!("{} {err}", palette.error("error:"));
        exit_codes::usage()
    })?;
    tracing::debug!(config = ?config, "configuration loaded");

    Client::new(&config).map_err(|error| {
        print_error(palette, &error);
        exit_codes::usage()
    })
}

fn outcome(palette: Palette, result: Result<Value, OperationError>) -> ExitCode {
    match result {
        Ok(value) => {
            print_json(&value);
            ExitCode::SUCCESS
        }
        Err(error) if error.kind() == ErrorKind::RequestAborted => {
            print_error(palette, &error);
            exit_codes::interrupted()
        }
        Err(error) => {
            print_error(palette, &error);
            exit_codes::failed()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(LoggingConfig::from_verbosity(cli.verbose, cli.quiet));

    let palette = Palette {
        color: !cli.no_color && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        Commands::Explain { code } => {
            explain(palette, &code);
            ExitCode::SUCCESS
        }
        Commands::Request {
            method,
            path,
            data,
            no_retry,
            timeout_ms,
        } => {
            let Some(method) = Method::parse(&method) else {
                eprintln!("{} unsupported method {method:?}", palette.error("error:"));
                return exit_codes::usage();
            };
            let body = match parse_body(data.as_deref()) {
                Ok(body) => body,
                Err(message) => {
                    eprintln!("{} {message}", palette.error("error:"));
                    return exit_codes::usage();
                }
            };

            let client = match connect(cli.config.as_deref(), palette) {
                Ok(client) => client,
                Err(code) => return code,
            };

            let mut request = ApiRequest::new(method, path);
            request.body = body;

            let mut options = RequestOptions::new().with_cancel(install_interrupt_handler());
            if no_retry {
                options = options.with_retry(false);
            }
            if let Some(ms) = timeout_ms {
                options = options.with_timeout(Duration::from_millis(ms));
            }

            outcome(palette, client.request::<Value>(request, &options).await)
        }
        Commands::Stream { path, data } => {
            let body = match parse_body(data.as_deref()) {
                Ok(body) => body,
                Err(message) => {
                    eprintln!("{} {message}", palette.error("error:"));
                    return exit_codes::usage();
                }
            };

            let client = match connect(cli.config.as_deref(), palette) {
                Ok(client) => client,
                Err(code) => return code,
            };

            let request = ApiRequest::post(path, body.unwrap_or_else(|| Value::Object(Default::default())));
            let options = RequestOptions::new().with_cancel(install_interrupt_handler());
            let quiet = cli.quiet;

            let result = client
                .stream(request, |event| print_progress(event, quiet), &options)
                .await;
            outcome(palette, result)
        }
        Commands::Health => match connect(cli.config.as_deref(), palette) {
            Ok(client) => outcome(palette, client.health().await),
            Err(code) => code,
        },
    }
}
