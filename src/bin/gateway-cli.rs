use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the fan-out gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Bootstrap admin key or an issued token.
    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway status
    Status,
    /// List configured backends
    Backends,
    /// Manage access tokens
    #[command(subcommand)]
    Tokens(TokenCommands),
    /// Query the audit log
    Audit {
        /// Only events of this type (e.g. rate-limit-exceeded)
        #[arg(long)]
        event_type: Option<String>,
        /// Minimum severity (low, medium, high, critical)
        #[arg(long)]
        min_severity: Option<String>,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Audit totals by event type
    AuditStats,
    /// Anomaly report for one client identifier
    Anomaly { client: String },
}

#[derive(Subcommand)]
enum TokenCommands {
    List,
    Create {
        name: String,
        /// Comma-separated: read,write,dispatch,admin
        #[arg(long, value_delimiter = ',', default_value = "dispatch")]
        scopes: Vec<String>,
        #[arg(long)]
        expiry_days: Option<u32>,
    },
    Revoke { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_string();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Backends => {
            let res = client.get(format!("{}/api/backends", base)).send().await?;
            return print_response(res).await;
        }
        Commands::Tokens(TokenCommands::List) => client.get(format!("{}/admin/tokens", base)),
        Commands::Tokens(TokenCommands::Create { name, scopes, expiry_days }) => client
            .post(format!("{}/admin/tokens", base))
            .json(&json!({ "name": name, "scopes": scopes, "expiryDays": expiry_days })),
        Commands::Tokens(TokenCommands::Revoke { id }) => {
            client.delete(format!("{}/admin/tokens/{}", base, id))
        }
        Commands::Audit { event_type, min_severity, client: who, limit } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(t) = event_type {
                query.push(("eventType", t));
            }
            if let Some(s) = min_severity {
                query.push(("minSeverity", s));
            }
            if let Some(c) = who {
                query.push(("client", c));
            }
            if let Some(l) = limit {
                query.push(("limit", l.to_string()));
            }
            client.get(format!("{}/admin/audit", base)).query(&query)
        }
        Commands::AuditStats => client.get(format!("{}/admin/audit/stats", base)),
        Commands::Anomaly { client: who } => {
            client.get(format!("{}/admin/audit/anomalies/{}", base, who))
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
