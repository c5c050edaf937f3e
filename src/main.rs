//! CLI entry point for `falcon`, a small CrowdStrike Falcon API client.
//!
//! Credentials come from `--client-id`/`--client-secret`, a TOML config
//! file, or the `FALCON_CLIENT_ID`/`FALCON_CLIENT_SECRET` environment
//! variables, in that order of precedence.
//!
//! Exit codes:
//! - 0: success
//! - 1: runtime error (auth failure, API error status, network failure)
//! - 2: argument validation error (clap handles this automatically)

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use falcon_sdk::config::{FalconConfig, CLIENT_SECRET_ENV};
use falcon_sdk::hosts::{query_devices_by_filter, DeviceQuery};
use falcon_sdk::{ApiResult, FalconClient, ServiceCall};

const RATE_LIMIT_RETRIES: u32 = 3;
const RATE_LIMIT_FALLBACK: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "falcon", version, about, long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// API client ID.
    #[arg(long)]
    client_id: Option<String>,

    /// API client secret. Prefer the FALCON_CLIENT_SECRET environment
    /// variable so the secret stays out of process listings.
    #[arg(long, env = CLIENT_SECRET_ENV, hide_env_values = true)]
    client_secret: Option<String>,

    /// Base URL or region short name (US1, US2, EU1, USGOV1, USGOV2).
    #[arg(long)]
    base_url: Option<String>,

    /// Log request and response details to stderr.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a bearer token.
    Token,

    /// Revoke a bearer token.
    Revoke {
        #[arg(long)]
        token: String,
    },

    /// Run any operation from the endpoint manifest.
    Call {
        /// Operation ID (`QueryDevicesByFilter`) or method name
        /// (`query_devices_by_filter`).
        operation: String,

        /// Keyword argument as `name=value`; repeatable. Values that parse
        /// as JSON are sent as JSON.
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, Value)>,

        /// JSON request body.
        #[arg(long, value_parser = parse_json)]
        body: Option<Value>,

        /// Comma-separated IDs.
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },

    /// List host AIDs.
    Hosts {
        /// FQL filter.
        #[arg(long)]
        filter: Option<String>,

        #[arg(long)]
        limit: Option<u32>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON body: {e}"))
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Cli) -> falcon_sdk::Result<FalconConfig> {
    let mut config = match &args.config {
        Some(path) => FalconConfig::from_file(path)?,
        None => FalconConfig::default(),
    };
    if let Some(id) = &args.client_id {
        config.client_id = Some(id.clone());
    }
    if let Some(secret) = &args.client_secret {
        config.client_secret = Some(secret.clone());
    }
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url.clone());
    }
    if args.debug {
        config = config.with_debug(true);
    }
    Ok(config.with_env_fallback())
}

/// Seconds until the epoch timestamp in `X-Ratelimit-Retryafter`.
fn retry_delay(result: &ApiResult) -> Duration {
    let Some(at) = result
        .headers()
        .retry_after()
        .and_then(|v| v.trim().parse::<u64>().ok())
    else {
        return RATE_LIMIT_FALLBACK;
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Duration::from_secs(at.saturating_sub(now).max(1))
}

async fn with_rate_limit_retry<F, Fut>(mut attempt: F) -> falcon_sdk::Result<ApiResult>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = falcon_sdk::Result<ApiResult>>,
{
    let mut retries = 0;
    loop {
        let result = attempt().await?;
        if result.status_code() != 429 || retries == RATE_LIMIT_RETRIES {
            return Ok(result);
        }
        retries += 1;
        let delay = retry_delay(&result);
        tracing::warn!(retry = retries, delay_secs = delay.as_secs(), "rate limited, retrying");
        tokio::time::sleep(delay).await;
    }
}

fn report(result: &ApiResult) -> ExitCode {
    if result.is_success() {
        if let Some(content) = result.resources().bytes() {
            println!("{} bytes of binary content", content.len());
        } else {
            match serde_json::to_string_pretty(&result.dictify()) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{result}"),
            }
        }
        return ExitCode::SUCCESS;
    }
    if result.errors().is_empty() {
        eprintln!("[{}] request failed", result.status_code());
    }
    for record in result.errors().records() {
        eprintln!("[{}] {}", render_code(&record.code, result.status_code()), record.message);
    }
    ExitCode::FAILURE
}

fn render_code(code: &Value, status: u16) -> String {
    match code {
        Value::Null => status.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build_call(params: &[(String, Value)], body: Option<&Value>, ids: &[String]) -> ServiceCall {
    let keywords: Map<String, Value> = params.iter().cloned().collect();
    let mut call = ServiceCall::new().keywords(keywords);
    if let Some(body) = body {
        call = call.body(body.clone());
    }
    if !ids.is_empty() {
        call = call.keyword("ids", ids.join(","));
    }
    call
}

async fn run(args: Cli) -> falcon_sdk::Result<ExitCode> {
    let config = load_config(&args)?;
    let client = FalconClient::new(config)?;

    let result = match &args.command {
        Command::Token => {
            let result = client.login().await?;
            if result.status_code() == 201 {
                match result.raw().value().get("access_token").and_then(Value::as_str) {
                    Some(token) => {
                        println!("{token}");
                        return Ok(ExitCode::SUCCESS);
                    }
                    None => {
                        let missing = ApiResult::error(500, "token response had no access_token");
                        return Ok(report(&missing));
                    }
                }
            }
            result
        }
        Command::Revoke { token } => client.revoke(token).await?,
        Command::Call {
            operation,
            params,
            body,
            ids,
        } => {
            let client = &client;
            with_rate_limit_retry(move || {
                client.execute(operation, build_call(params, body.as_ref(), ids))
            })
            .await?
        }
        Command::Hosts { filter, limit } => {
            let query = DeviceQuery {
                filter: filter.clone(),
                limit: *limit,
                ..DeviceQuery::default()
            };
            let (client, query) = (&client, &query);
            with_rate_limit_retry(move || query_devices_by_filter(client, query)).await?
        }
    };
    Ok(report(&result))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.debug);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
