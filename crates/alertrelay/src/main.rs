//! `alertrelay` - CLI for the vehicle alert relay
//!
//! This binary runs the HTTP server and provides tooling for keys,
//! configuration and database status.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use alertrelay::cli::{Cli, Command, ConfigCommand, ServeCommand};
use alertrelay::http::{self, AppState, Settings};
use alertrelay::{init_logging, Config, Database, Storage, TokenIssuer, VapidKeys, WebPushSender};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Config validation reports on its own instead of failing to load
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        handle_validate(file.clone().or_else(|| cli.config.clone()));
        return Ok(());
    }

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, serve_cmd),
        Command::VapidKeys(keys_cmd) => handle_vapid_keys(keys_cmd.json),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }
    config.validate()?;
    config.require_secrets()?;
    let addr = config.bind_addr()?;

    let db_path = config.database_path();
    let storage = Storage::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    info!(path = %db_path.display(), "database ready");

    let push = WebPushSender::new(
        &config.push.vapid_private_key,
        &config.push.subject,
        config.push.ttl_seconds,
    )
    .context("setting up web push")?;

    let state = AppState::new(
        Database::new(storage),
        TokenIssuer::new(&config.auth.jwt_secret, config.token_ttl()),
        Arc::new(push),
        Settings::from_config(&config),
    );
    let router = http::router(state, &config.server);

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(http::serve(addr, router))?;
    Ok(())
}

fn handle_vapid_keys(json: bool) -> anyhow::Result<()> {
    let keys = VapidKeys::generate();
    if json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
    } else {
        println!("VAPID_PUBLIC_KEY={}", keys.public_key);
        println!("VAPID_PRIVATE_KEY={}", keys.private_key);
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let db_path = config.database_path();
    let stats = if db_path.exists() {
        Some(Storage::open(&db_path)?.stats()?)
    } else {
        None
    };

    if json {
        let status = serde_json::json!({
            "database_path": db_path,
            "database_exists": stats.is_some(),
            "total_users": stats.as_ref().map(|s| s.total_users),
            "subscribed_users": stats.as_ref().map(|s| s.subscribed_users),
            "db_size_bytes": stats.as_ref().map(|s| s.db_size_bytes),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("alertrelay status");
        println!("-----------------");
        println!("Database:      {}", db_path.display());
        match stats {
            Some(stats) => {
                println!("Users:         {}", stats.total_users);
                println!("Subscribed:    {}", stats.subscribed_users);
                println!("Size:          {} bytes", stats.db_size_bytes);
            }
            None => println!("               (not created yet)"),
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = config.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Address:            {}:{}", config.server.host, config.server.port);
                println!(
                    "  Static dir:         {}",
                    config
                        .server
                        .static_dir
                        .as_ref()
                        .map_or_else(|| "(none)".to_string(), |d| d.display().to_string())
                );
                println!("  Body limit:         {} bytes", config.server.body_limit_bytes);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Auth]");
                println!("  JWT secret:         {}", display_secret(&config.auth.jwt_secret));
                println!("  Token TTL (hours):  {}", config.auth.token_ttl_hours);
                println!("  Min password len:   {}", config.auth.min_password_length);
                println!();
                println!("[Push]");
                println!("  VAPID public key:   {}", display_secret(&config.push.vapid_public_key));
                println!(
                    "  VAPID private key:  {}",
                    display_secret(&config.push.vapid_private_key)
                );
                println!("  Subject:            {}", config.push.subject);
                println!("  TTL (seconds):      {}", config.push.ttl_seconds);
                println!();
                println!("[Webhook]");
                println!(
                    "  Secret:             {}",
                    config.webhook.secret.as_deref().map_or("(none)", display_secret)
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            handle_validate(file);
        }
    }
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(config) => match config.require_secrets() {
            Ok(()) => println!("Configuration is valid."),
            Err(e) => println!("Configuration is valid, but the server cannot start: {e}"),
        },
        Err(e) => println!("Configuration error: {e}"),
    }
}

fn display_secret(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
