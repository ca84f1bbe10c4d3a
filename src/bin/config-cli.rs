use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "config-cli")]
#[command(about = "Client for the proxy-chain config daemon", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CONFIG_HANDLER_URL", default_value = "http://127.0.0.1:8090")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon version and counts
    Status,
    /// Print a service by id
    Service { id: String },
    /// Print a service by url
    ServiceByUrl { url: String },
    /// Check whether a service exists
    ServiceExist {
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        id: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Store a service read from a YAML or JSON file
    SetService { file: PathBuf },
    /// Generate a service skeleton with a manager client
    GenerateService {
        id: String,
        url: String,
        #[arg(long, default_value = "independent")]
        r#type: String,
    },
    /// Generate a handler for a category
    GenerateHandler {
        category: String,
        #[arg(long, default_value = "replier")]
        handler_type: String,
        #[arg(long)]
        internal: bool,
    },
    /// Check whether a parameter is set
    ParamExist { name: String },
    /// Read a string parameter
    StringParam { name: String },
    /// Read an unsigned integer parameter
    Uint64Param { name: String },
    /// Read a boolean parameter
    BoolParam { name: String },
    /// Set a parameter default (value is parsed as JSON, else kept as a string)
    SetDefault { name: String, value: String },
    /// Register a proxy chain read from a YAML or JSON file
    SetProxyChain { file: PathBuf },
    /// List proxy chains ending at a service url
    ProxyChainsByUrl { url: String },
    /// Lint the proxy chains of a service
    LintService { url: String },
    /// Stop the daemon
    Close,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let (command, parameters) = match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            return print_response(res).await;
        }
        Commands::Service { id } => ("service", json!({ "id": id })),
        Commands::ServiceByUrl { url } => ("service-by-url", json!({ "url": url })),
        Commands::ServiceExist { id, url } => match id {
            Some(id) => ("service-exist", json!({ "id": id })),
            None => ("service-exist", json!({ "url": url })),
        },
        Commands::SetService { file } => ("set-service", json!({ "service": read_document(&file)? })),
        Commands::GenerateService { id, url, r#type } => (
            "generate-service",
            json!({ "id": id, "url": url, "type": r#type }),
        ),
        Commands::GenerateHandler {
            category,
            handler_type,
            internal,
        } => (
            "generate-handler",
            json!({ "category": category, "handler_type": handler_type, "internal": internal }),
        ),
        Commands::ParamExist { name } => ("param-exist", json!({ "name": name })),
        Commands::StringParam { name } => ("string-param", json!({ "name": name })),
        Commands::Uint64Param { name } => ("uint64-param", json!({ "name": name })),
        Commands::BoolParam { name } => ("bool-param", json!({ "name": name })),
        Commands::SetDefault { name, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            ("set-default", json!({ "name": name, "value": value }))
        }
        Commands::SetProxyChain { file } => (
            "set-proxy-chain",
            json!({ "proxy_chain": read_document(&file)? }),
        ),
        Commands::ProxyChainsByUrl { url } => ("proxy-chains-by-url", json!({ "url": url })),
        Commands::LintService { url } => ("lint-service", json!({ "url": url })),
        Commands::Close => ("close", json!({})),
    };

    let res = client
        .post(format!("{}/config/{}", cli.url, command))
        .json(&json!({ "parameters": parameters }))
        .send()
        .await?;
    print_response(res).await
}

/// Reads a YAML document. JSON files parse as YAML too.
fn read_document(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: config handler returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);

    if json.get("status").and_then(Value::as_str) == Some("fail") {
        std::process::exit(1);
    }
    Ok(())
}
