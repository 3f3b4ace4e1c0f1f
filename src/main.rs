#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use gambit_server::auth;
use gambit_server::config;
use gambit_server::logging;
use gambit_server::server::GameServer;
use gambit_server::social::InMemorySocialGraph;
use gambit_server::websocket;

/// Gambit -- lightweight WebSocket session server for multiplayer chess
#[derive(Parser, Debug)]
#[command(name = "gambit-server")]
#[command(about = "A lightweight, in-memory WebSocket session server for multiplayer chess")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with_all = ["print_config", "issue_token"])]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with_all = ["validate_config", "issue_token"])]
    print_config: bool,

    /// Mint a development JWT and exit. Format: userId:username:email
    #[arg(long, value_name = "USER:NAME:EMAIL")]
    issue_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Invite origin: {}", cfg.invite_origin);
                println!("  Room code length: {}", cfg.session.room_code_length);
                println!("  Clock budget (ms): {}", cfg.session.initial_clock_ms);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    if let Some(raw) = cli.issue_token {
        let mut parts = raw.splitn(3, ':');
        let (Some(user_id), Some(username), Some(email)) =
            (parts.next(), parts.next(), parts.next())
        else {
            eprintln!("--issue-token expects userId:username:email");
            std::process::exit(1);
        };
        let token = auth::issue(
            &cfg.auth.jwt_secret,
            user_id,
            username,
            email,
            cfg.auth.token_ttl_secs,
        )
        .map_err(|e| anyhow::anyhow!("Failed to issue token: {e}"))?;
        println!("{token}");
        return Ok(());
    }

    validation_result.map_err(|e| anyhow::anyhow!(e))?;

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting Gambit server");

    // Standalone mode runs with the in-memory friendship set; a deployment
    // fronted by the social graph service swaps in its client here.
    let social = Arc::new(InMemorySocialGraph::new());
    let server = GameServer::new(cfg.clone(), social);

    let router = websocket::create_router(&cfg.cors_origins).with_state(server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.cors_origins,
        "Server started - WebSocket protocol: /ws, Metrics: /metrics"
    );

    axum::serve(listener, router).await?;

    Ok(())
}
