//!
//! creathon edge gate binary
//! -------------------------
//! Command-line entry point for the page-serving edge gate. Supports configuration via
//! CLI flags and `CREATHON_*` environment variables; flags win over the environment.

use anyhow::Result;
use std::env;

use creathon_access::config::AccessConfig;

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag
            && i + 1 < args.len() {
                return args[i + 1].parse::<u16>().ok();
            }
        i += 1;
    }
    None
}

fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            if i + 1 < args.len() && !args[i + 1].starts_with("--") {
                return Some(args[i + 1].clone());
            }
            break;
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
    // Initialize tracing subscriber with env filter, defaulting to info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("creathon gate\n\nUSAGE:\n  creathon_gate [--http-port N] [--identity-url URL] [--user-info-path PATH]\n\nOPTIONS:\n  --http-port N           HTTP port (env: CREATHON_HTTP_PORT, default 3000)\n  --identity-url URL      Backend base URL (env: CREATHON_IDENTITY_URL, default http://127.0.0.1:5000)\n  --user-info-path PATH   User-info route (env: CREATHON_USER_INFO_PATH, default /api/auth/me)\n");
        return Ok(());
    }

    // Environment over defaults, then CLI over environment
    let mut config = AccessConfig::from_env()?;
    if let Some(port) = parse_port_arg(&args, "--http-port") { config.http_port = port; }
    if let Some(url) = parse_string_arg(&args, "--identity-url") { config.identity_url = url; }
    if let Some(path) = parse_string_arg(&args, "--user-info-path") { config.user_info_path = path; }

    tracing::info!(
        "creathon gate using http_port={}, identity_url={}",
        config.http_port, config.identity_url
    );
    creathon_access::server::run(config).await
}
