//! Nursy CLI - a command line client for the Nursy session layer.
//!
//! Issues demo session tokens, inspects the stored session, and sends
//! session-aware requests to the Nursy API through the request gateway.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::sync::broadcast::Receiver;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nursy_core::api::{ApiResponse, Method, RequestOptions, SessionEvent};
use nursy_core::auth::SessionState;
use nursy_core::{ApiClient, Config, NewClaims};

#[derive(Debug, Parser)]
#[command(name = "nursy", version, about = "Nursy session client")]
struct Cli {
    /// API base URL (overrides the config file)
    #[arg(long, global = true, env = "NURSY_API_BASE_URL")]
    api_base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Issue a new session token and store it
    Login {
        #[arg(long)]
        sub: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Remove the stored session token
    Logout,
    /// Show the stored session
    Status,
    /// Decode a token and print its claims
    Decode { token: String },
    /// Send a GET request
    Get { endpoint: String },
    /// Send a DELETE request
    Delete { endpoint: String },
    /// Send a POST request with an optional JSON body
    Post {
        endpoint: String,
        #[arg(long)]
        data: Option<String>,
    },
    /// Send a PUT request with an optional JSON body
    Put {
        endpoint: String,
        #[arg(long)]
        data: Option<String>,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.api_base_url {
        config.api_base_url = Some(url);
    }
    debug!(api_base_url = config.api_base_url(), storage = %config.storage, "Configuration loaded");

    match cli.command {
        Command::Login {
            sub,
            name,
            email,
            role,
        } => {
            let claims = NewClaims {
                sub: Some(sub),
                name,
                email,
                role,
            };
            login(&config, claims)
        }
        Command::Logout => {
            config.session()?.logout();
            eprintln!("Logged out.");
            Ok(())
        }
        Command::Status => status(&config),
        Command::Decode { token } => {
            let claims = config
                .codec()
                .decode(Some(token.as_str()))
                .context("Token could not be decoded")?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }
        Command::Get { endpoint } => request(&config, Method::GET, &endpoint, None).await,
        Command::Delete { endpoint } => request(&config, Method::DELETE, &endpoint, None).await,
        Command::Post { endpoint, data } => {
            request(&config, Method::POST, &endpoint, data.as_deref()).await
        }
        Command::Put { endpoint, data } => {
            request(&config, Method::PUT, &endpoint, data.as_deref()).await
        }
    }
}

async fn request(
    config: &Config,
    method: Method,
    endpoint: &str,
    data: Option<&str>,
) -> Result<()> {
    let client = config.api_client()?;
    call(
        &client,
        method,
        endpoint,
        data,
        &mut io::stdout(),
        &mut io::stderr(),
    )
    .await
}

fn login(config: &Config, claims: NewClaims) -> Result<()> {
    let session = config.session()?;
    let token = session.login(&claims).context("Failed to start session")?;
    info!(storage = %config.storage, "Stored session token");
    println!("{}", token);
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let session = config.session()?;
    let now = session.codec().now();

    match session.state().context("Failed to read session")? {
        SessionState::Absent => println!("No session. Run `nursy login` to start one."),
        SessionState::Corrupted => {
            println!("Stored session is corrupted. Run `nursy logout` and log in again.")
        }
        SessionState::Expired(claims) => {
            println!("Session for {} has expired.", claims.display_name());
        }
        SessionState::Active(claims) => {
            println!(
                "Logged in as {} ({}), expires in {} min",
                claims.display_name(),
                claims.role.as_deref().unwrap_or("no role"),
                claims.minutes_until_expiry(now)
            );
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }
    Ok(())
}

/// Send one request, writing the body to `out` and status plus session
/// notices to `notices`.
async fn call<O: Write, N: Write>(
    client: &ApiClient,
    method: Method,
    endpoint: &str,
    data: Option<&str>,
    out: &mut O,
    notices: &mut N,
) -> Result<()> {
    let mut events = client.subscribe();

    let mut options = RequestOptions::new(method);
    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("--data must be valid JSON")?;
        options = options.json(&body)?;
    }

    let response: ApiResponse<Value> = client
        .send(endpoint, options)
        .await
        .with_context(|| format!("Request to {} failed", endpoint))?;

    writeln!(notices, "HTTP {}", response.status)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&response.body)?)?;

    report_session_events(&mut events, notices)?;
    Ok(())
}

fn report_session_events<W: Write>(
    events: &mut Receiver<SessionEvent>,
    notices: &mut W,
) -> io::Result<()> {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Invalidated {
                endpoint,
                redirect_to,
            } => writeln!(
                notices,
                "Session rejected by {}; token cleared. Log in again ({}).",
                endpoint, redirect_to
            )?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use nursy_core::config::StorageBackend;
    use serde_json::json;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login() {
        let cli = Cli::try_parse_from([
            "nursy", "login", "--sub", "42", "--name", "Ali", "--role", "student",
        ])
        .unwrap();
        match cli.command {
            Command::Login { sub, name, email, role } => {
                assert_eq!(sub, "42");
                assert_eq!(name.as_deref(), Some("Ali"));
                assert_eq!(email, None);
                assert_eq!(role.as_deref(), Some("student"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_post_with_global_base_url() {
        let cli = Cli::try_parse_from([
            "nursy",
            "post",
            "/notes",
            "--data",
            r#"{"text":"hi"}"#,
            "--api-base-url",
            "http://127.0.0.1:9000",
        ])
        .unwrap();
        assert_eq!(cli.api_base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert!(matches!(cli.command, Command::Post { ref endpoint, .. } if endpoint == "/notes"));
    }

    #[test]
    fn test_login_requires_sub() {
        assert!(Cli::try_parse_from(["nursy", "login", "--name", "Ali"]).is_err());
    }

    fn memory_client(base_url: String) -> ApiClient {
        let config = Config {
            api_base_url: Some(base_url),
            storage: StorageBackend::Memory,
            ..Config::default()
        };
        config.api_client().unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_call_prints_login_notice() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/wallet");
                then.status(401).json_body(json!({"error": "unauthorized"}));
            })
            .await;

        let client = memory_client(server.base_url());
        client.session().login(&NewClaims::new("42")).unwrap();

        let mut out = Vec::new();
        let mut notices = Vec::new();
        call(&client, Method::GET, "/wallet", None, &mut out, &mut notices)
            .await
            .unwrap();
        mock.assert_async().await;

        let notices = String::from_utf8(notices).unwrap();
        assert!(notices.contains("HTTP 401"));
        assert!(notices.contains("/wallet"));
        assert!(notices.contains("Log in again (/login)"));

        let body: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(client.session().current().unwrap(), None);
    }

    #[tokio::test]
    async fn test_successful_call_prints_no_notice() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/notes").json_body(json!({"text": "hi"}));
                then.status(201).json_body(json!({"id": 7}));
            })
            .await;

        let client = memory_client(server.base_url());
        let mut out = Vec::new();
        let mut notices = Vec::new();
        call(
            &client,
            Method::POST,
            "/notes",
            Some(r#"{"text": "hi"}"#),
            &mut out,
            &mut notices,
        )
        .await
        .unwrap();

        let notices = String::from_utf8(notices).unwrap();
        assert_eq!(notices.trim(), "HTTP 201 Created");
        let body: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body["id"], 7);
    }

    #[tokio::test]
    async fn test_invalid_data_is_rejected_before_sending() {
        let client = memory_client("http://127.0.0.1:1".to_string());
        let mut out = Vec::new();
        let mut notices = Vec::new();
        let result = call(
            &client,
            Method::PUT,
            "/notes/7",
            Some("{not json"),
            &mut out,
            &mut notices,
        )
        .await;
        assert!(result.is_err());
        assert!(out.is_empty());
    }
}
