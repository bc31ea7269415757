//!
//! casgate server binary
//! ---------------------
//! Command-line entry point for the CAS gateway demo app. Configuration comes from an
//! optional JSON file, `CASGATE_*` environment variables and CLI flags, in that order.

use std::env;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use casgate::{GatewayConfig, GatewayOptions};

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn parse_bool_arg(args: &[String], flag: &str, negated: &str) -> Option<bool> {
    let mut i = 0;
    while i < args.len() {
        let a = &args[i];
        if a == negated {
            return Some(false);
        }
        if a == flag {
            // If next token is present and not another flag, try parse bool; otherwise true
            if i + 1 < args.len() && !args[i + 1].starts_with('-') {
                return Some(!matches!(args[i + 1].to_lowercase().as_str(), "0" | "false" | "no" | "off"));
            }
            return Some(true);
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

const USAGE: &str = "casgate server

USAGE:
  casgate_server [--config FILE] [--bind ADDR] [--cas-url URL] [--service-url URL]
                 [--cas-version 1.0|2.0|3.0] [--renew] [--gateway] [--destroy-session]
                 [--dev-user NAME]

OPTIONS:
  --config FILE        JSON file with gateway options
  --bind ADDR          Listen address (env: CASGATE_BIND, default 127.0.0.1:3000)
  --cas-url URL        CAS server base URL (env: CASGATE_CAS_URL)
  --service-url URL    Base URL of this application (env: CASGATE_SERVICE_URL)
  --cas-version V      CAS protocol version (env: CASGATE_CAS_VERSION, default 3.0)
  --renew [bool]       Send renew=true on login (env: CASGATE_RENEW)
  --gateway [bool]     Send gateway=true on login (env: CASGATE_GATEWAY)
  --destroy-session    Destroy the whole session on logout (env: CASGATE_DESTROY_SESSION)
  --dev-user NAME      Enable dev mode and authenticate everyone as NAME
";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber with env filter, defaulting to info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("invalid RUST_LOG filter")?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let base = match parse_arg(&args, "--config") {
        Some(path) => GatewayOptions::from_json_file(Path::new(&path))?,
        None => GatewayOptions::default(),
    };
    let mut opts = base.merge_env();

    // CLI arguments override environment
    if let Some(v) = parse_arg(&args, "--cas-url") { opts.cas_url = v; }
    if let Some(v) = parse_arg(&args, "--service-url") { opts.service_url = v; }
    if let Some(v) = parse_arg(&args, "--cas-version") { opts.cas_version = v; }
    if let Some(v) = parse_bool_arg(&args, "--renew", "--no-renew") { opts.renew = v; }
    if let Some(v) = parse_bool_arg(&args, "--gateway", "--no-gateway") { opts.gateway = v; }
    if has_flag(&args, "--destroy-session") { opts.destroy_session = true; }
    if let Some(user) = parse_arg(&args, "--dev-user") {
        opts.dev_mode = true;
        opts.dev_mode_user = user;
    }

    let bind = parse_arg(&args, "--bind")
        .or_else(|| env::var("CASGATE_BIND").ok())
        .unwrap_or_else(|| "127.0.0.1:3000".to_string());
    let addr: SocketAddr = bind.parse().with_context(|| format!("invalid bind address '{}'", bind))?;

    let config = GatewayConfig::from_options(opts).context("invalid gateway configuration")?;
    casgate::server::run_with_config(config, addr).await
}
