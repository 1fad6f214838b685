//!
//! youthmh server binary
//! ---------------------
//! Command-line entry point for the portal backend. Settings come from environment
//! variables and an optional nested JSON config file; a few flags override them.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use youthmh::config::{Config, CONFIG_PATH_ENV};

fn parse_port_arg(args: &[String], flag: &str) -> Result<Option<u16>> {
    let Some(raw) = flag_value(args, flag) else { return Ok(None); };
    let port = raw.parse::<u16>().with_context(|| format!("{} expects a port number, got {:?}", flag, raw))?;
    Ok(Some(port))
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("While building the log filter")?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("youthmh server\n\nUSAGE:\n  youthmh_server [--http-port N] [--config PATH]\n  youthmh_server --hash-password PASSWORD\n\nOPTIONS:\n  --http-port N          HTTP port (env: HTTP_PORT, default 8080)\n  --config PATH          Nested JSON config file (env: {CONFIG_PATH_ENV})\n  --hash-password PW     Print an Argon2 hash for an auth.users entry and exit\n\nThe server speaks plain HTTP. Session cookies are marked Secure, so put a TLS proxy in\nfront of it or set SESSION_COOKIE_SECURE=false for plain-HTTP testing off localhost.\n");
        return Ok(());
    }

    if let Some(pw) = flag_value(&args, "--hash-password") {
        let phc = youthmh::identity::hash_password(&pw).context("While hashing password")?;
        println!("{}", phc);
        return Ok(());
    }

    // CLI argument overrides environment
    let config_path = flag_value(&args, "--config").or_else(|| env::var(CONFIG_PATH_ENV).ok()).map(PathBuf::from);
    let mut config = Config::load(config_path.as_deref())
        .with_context(|| format!("While loading configuration (config file: {:?})", config_path))?;
    if let Some(port) = parse_port_arg(&args, "--http-port")? {
        config.http_port = port;
    }

    tracing::info!(target: "startup", "youthmh starting: http_port={}, config={:?}", config.http_port, config_path);
    youthmh::server::run(config).await
}
