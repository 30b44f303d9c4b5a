use adminapi::{
    commands::{self, MasterDataKind, RequestSpec},
    error::{ApiError, Cancelled},
    http::{RetryOverrides, query_pairs},
};
use anyhow::Result;
use clap::Parser;
use reqwest::Method;
use serde_json::{Value, json};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// adminapi - Event admin API client
///
/// Call the event admin backend from the command line. Reads (GET, HEAD) are
/// retried with exponential backoff on network errors and 5xx responses;
/// writes are sent exactly once. Failures are reported with a normalized,
/// user-facing message and error code.
///
/// If ADMINAPI_MEMBERS_TOKEN is set, it is sent as a bearer token on members
/// API calls.
///
/// Examples:
///   adminapi get events -q page=1            # GET {base}/api/events?page=1
///   adminapi post events --data '{"name":"Satsang"}'
///   adminapi master-data event-types
#[derive(Parser, Debug)]
#[command(author, version = env!("ADMINAPI_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Admin API base URL (defaults to http://localhost:8080)
    #[arg(
        long = "api-url",
        env = "ADMINAPI_BASE_URL",
        value_name = "URL",
        global = true
    )]
    pub api_url: Option<String>,

    /// Members API base URL
    #[arg(
        long = "members-url",
        env = "ADMINAPI_MEMBERS_URL",
        value_name = "URL",
        global = true
    )]
    pub members_url: Option<String>,

    /// Print failures as normalized JSON records on stderr
    #[arg(long = "json-errors", global = true)]
    pub json_errors: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// GET an endpoint (retried)
    Get(ReadArgs),

    /// HEAD an endpoint (retried)
    Head(ReadArgs),

    /// POST a JSON body to an endpoint
    Post(WriteArgs),

    /// PUT a JSON body to an endpoint
    Put(WriteArgs),

    /// PATCH an endpoint with a JSON body
    Patch(WriteArgs),

    /// DELETE an endpoint
    Delete(TargetArgs),

    /// Fetch a master-data list
    MasterData(MasterDataArgs),

    /// Print the absolute URL for an endpoint
    Url(UrlArgs),

    /// Remove duplicate records from a JSON array
    Dedupe(DedupeArgs),
}

#[derive(clap::Args, Debug)]
pub struct TargetArgs {
    /// Endpoint path, e.g. "events" or "/api/events/1"
    #[arg(value_name = "ENDPOINT")]
    pub endpoint: String,

    /// Query parameter (repeatable)
    #[arg(short = 'q', long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Query parameters as a JSON object
    #[arg(long = "params", value_name = "JSON")]
    pub params: Option<String>,

    /// Extra request header (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Send to the members API instead of the admin API
    #[arg(long)]
    pub members: bool,
}

#[derive(clap::Args, Debug)]
pub struct RetryArgs {
    /// Maximum number of retries after the first attempt
    #[arg(long = "max-retries", value_name = "N")]
    pub max_retries: Option<u32>,

    /// Delay before the first retry, in milliseconds
    #[arg(long = "initial-delay", value_name = "MS")]
    pub initial_delay: Option<u64>,

    /// Upper bound for any retry delay, in milliseconds
    #[arg(long = "max-delay", value_name = "MS")]
    pub max_delay: Option<u64>,

    /// Factor applied to the delay after each retry
    #[arg(long = "backoff-multiplier", value_name = "FACTOR")]
    pub backoff_multiplier: Option<f64>,

    /// HTTP status that triggers a retry (repeatable; replaces the defaults)
    #[arg(long = "retry-status", value_name = "STATUS")]
    pub retry_status: Vec<u16>,
}

impl RetryArgs {
    fn overrides(&self) -> RetryOverrides {
        let mut overrides = RetryOverrides::default();
        if let Some(n) = self.max_retries {
            overrides = overrides.max_retries(n);
        }
        if let Some(ms) = self.initial_delay {
            overrides = overrides.initial_delay_ms(ms);
        }
        if let Some(ms) = self.max_delay {
            overrides = overrides.max_delay_ms(ms);
        }
        if let Some(factor) = self.backoff_multiplier {
            overrides = overrides.backoff_multiplier(factor);
        }
        if !self.retry_status.is_empty() {
            overrides = overrides.retryable_status_codes(self.retry_status.iter().copied());
        }
        overrides
    }
}

#[derive(clap::Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub retry: RetryArgs,
}

#[derive(clap::Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// JSON request body (defaults to {})
    #[arg(short = 'd', long = "data", value_name = "JSON")]
    pub data: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct MasterDataArgs {
    /// Which list to fetch
    #[arg(value_enum, value_name = "KIND")]
    pub kind: MasterDataKind,

    /// Restrict event-sub-categories to one category
    #[arg(long = "category-id", value_name = "ID")]
    pub category_id: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct UrlArgs {
    #[arg(value_name = "ENDPOINT")]
    pub endpoint: String,

    /// Resolve against the members API
    #[arg(long)]
    pub members: bool,
}

#[derive(clap::Args, Debug)]
pub struct DedupeArgs {
    /// Record kind: special-guests, volunteers, media, promotional-materials
    #[arg(value_name = "KIND")]
    pub kind: String,

    /// JSON file holding an array of records (defaults to stdin)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,
}

fn request_spec(method: Method, target: TargetArgs) -> Result<RequestSpec> {
    let mut spec = RequestSpec::new(method, target.endpoint);
    spec.query = commands::parse_pairs(&target.query, '=')?;
    if let Some(params) = &target.params {
        match commands::parse_json(params, "--params")? {
            Value::Object(map) => spec.query.extend(query_pairs(&map)),
            _ => anyhow::bail!("--params must be a JSON object"),
        }
    }
    spec.headers = commands::parse_pairs(&target.headers, ':')?;
    spec.members = target.members;
    Ok(spec)
}

fn read_spec(method: Method, args: ReadArgs) -> Result<RequestSpec> {
    let mut spec = request_spec(method, args.target)?;
    spec.retry = args.retry.overrides();
    Ok(spec)
}

fn write_spec(method: Method, args: WriteArgs) -> Result<RequestSpec> {
    let mut spec = request_spec(method, args.target)?;
    spec.body = args
        .data
        .as_deref()
        .map(|data| commands::parse_json(data, "--data"))
        .transpose()?;
    Ok(spec)
}

/// Cancels the returned token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    token
}

async fn run(cli: Cli) -> Result<()> {
    let runtime = adminapi::runtime::RealRuntime;

    let spec = match cli.command {
        Commands::Get(args) => read_spec(Method::GET, args)?,
        Commands::Head(args) => read_spec(Method::HEAD, args)?,
        Commands::Post(args) => write_spec(Method::POST, args)?,
        Commands::Put(args) => write_spec(Method::PUT, args)?,
        Commands::Patch(args) => write_spec(Method::PATCH, args)?,
        Commands::Delete(args) => request_spec(Method::DELETE, args)?,
        Commands::MasterData(args) => {
            let value =
                commands::master_data(runtime, cli.api_url, args.kind, args.category_id).await?;
            return commands::print_json(&value);
        }
        Commands::Url(args) => {
            let url = commands::url(
                runtime,
                cli.api_url,
                cli.members_url,
                &args.endpoint,
                args.members,
            )?;
            println!("{}", url);
            return Ok(());
        }
        Commands::Dedupe(args) => {
            let value = commands::dedupe(runtime, &args.kind, args.input.as_deref())?;
            return commands::print_json(&value);
        }
    };

    let value = commands::request(
        runtime,
        cli.api_url,
        cli.members_url,
        spec,
        cancel_on_ctrl_c(),
    )
    .await?;
    commands::print_json(&value)
}

/// JSON record for `--json-errors`.
fn error_record(err: &anyhow::Error) -> Result<Value> {
    if let Some(api_err) = err.downcast_ref::<ApiError>() {
        return Ok(serde_json::to_value(api_err.app_error())?);
    }
    let code = if err.downcast_ref::<Cancelled>().is_some() {
        "CANCELLED"
    } else {
        "CLI_ERROR"
    };
    Ok(json!({"message": format!("{:#}", err), "code": code}))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match run(cli).await {
        Err(err) if json_errors => {
            eprintln!("{}", serde_json::to_string_pretty(&error_record(&err)?)?);
            std::process::exit(1);
        }
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adminapi::error::HttpFailure;
    use clap::Parser;

    #[test]
    fn test_cli_get_parsing() {
        let cli = Cli::try_parse_from([
            "adminapi", "get", "events", "-q", "page=1", "-H", "X-Trace: 1",
        ])
        .unwrap();
        match cli.command {
            Commands::Get(args) => {
                assert_eq!(args.target.endpoint, "events");
                assert_eq!(args.target.query, vec!["page=1"]);
                assert_eq!(args.target.headers, vec!["X-Trace: 1"]);
                assert!(!args.target.members);
                assert!(args.retry.overrides().is_empty());
            }
            _ => panic!("Expected Get command"),
        }
        assert_eq!(cli.api_url, None);
        assert!(!cli.json_errors);
    }

    #[test]
    fn test_cli_retry_flags() {
        let cli = Cli::try_parse_from([
            "adminapi",
            "get",
            "events",
            "--max-retries",
            "5",
            "--initial-delay",
            "10",
            "--retry-status",
            "429",
            "--retry-status",
            "503",
        ])
        .unwrap();
        let Commands::Get(args) = cli.command else {
            panic!("Expected Get command");
        };
        let overrides = args.retry.overrides();
        assert_eq!(overrides.max_retries, Some(5));
        assert_eq!(overrides.initial_delay_ms, Some(10));
        assert_eq!(overrides.max_delay_ms, None);
        assert_eq!(
            overrides.retryable_status_codes,
            Some(vec![429, 503])
        );
    }

    #[test]
    fn test_cli_global_api_url_parsing() {
        let cli =
            Cli::try_parse_from(["adminapi", "url", "events", "--api-url", "http://x"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://x"));

        let cli =
            Cli::try_parse_from(["adminapi", "--api-url", "http://y", "url", "events"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://y"));
    }

    #[test]
    fn test_cli_post_parsing() {
        let cli =
            Cli::try_parse_from(["adminapi", "post", "events", "--data", r#"{"a":1}"#]).unwrap();
        let Commands::Post(args) = cli.command else {
            panic!("Expected Post command");
        };
        let spec = write_spec(Method::POST, args).unwrap();
        assert_eq!(spec.body, Some(json!({"a": 1})));
    }

    #[test]
    fn test_cli_post_rejects_retry_flags() {
        let result = Cli::try_parse_from(["adminapi", "post", "events", "--max-retries", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_master_data_parsing() {
        let cli = Cli::try_parse_from([
            "adminapi",
            "master-data",
            "event-sub-categories",
            "--category-id",
            "4",
        ])
        .unwrap();
        let Commands::MasterData(args) = cli.command else {
            panic!("Expected MasterData command");
        };
        assert_eq!(args.kind, MasterDataKind::EventSubCategories);
        assert_eq!(args.category_id, Some(4));

        assert!(Cli::try_parse_from(["adminapi", "master-data", "nope"]).is_err());
    }

    #[test]
    fn test_request_spec_merges_params() {
        let target = TargetArgs {
            endpoint: "events".into(),
            query: vec!["page=1".into()],
            params: Some(r#"{"tags": ["a", "b"], "skip": null}"#.into()),
            headers: vec![],
            members: true,
        };
        let spec = request_spec(Method::GET, target).unwrap();
        assert_eq!(
            spec.query,
            vec![
                ("page".to_string(), "1".to_string()),
                ("tags".to_string(), "a".to_string()),
                ("tags".to_string(), "b".to_string()),
            ]
        );
        assert!(spec.members);
    }

    #[test]
    fn test_request_spec_rejects_non_object_params() {
        let target = TargetArgs {
            endpoint: "events".into(),
            query: vec![],
            params: Some("[1]".into()),
            headers: vec![],
            members: false,
        };
        assert!(request_spec(Method::GET, target).is_err());
    }

    #[test]
    fn test_error_record() {
        let err: anyhow::Error = ApiError::new(
            Method::GET,
            "http://host/api/events",
            4,
            HttpFailure::status(503, None),
        )
        .into();
        let record = error_record(&err).unwrap();
        assert_eq!(record["code"], "HTTP_503");
        assert_eq!(record["status"], 503);

        let record = error_record(&anyhow::anyhow!("bad flag")).unwrap();
        assert_eq!(record, json!({"message": "bad flag", "code": "CLI_ERROR"}));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["adminapi", "events"]).is_err());
    }
}
