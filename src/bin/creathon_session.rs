//!
//! creathon session CLI
//! --------------------
//! Client-side counterpart of the gate: resolves the current session the way the portal
//! front does, prints the normalized result and landing path, and keeps the hint file warm.
//! Can also evaluate a guard for a set of roles, or log out (clear hints).

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::cookie::Jar;
use reqwest::Url;

use creathon_access::config::AccessConfig;
use creathon_access::identity::{logout, resolve_landing_path, AccessGuard, GuardState, Navigator, SessionHints};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--identity-url URL] [--token T] [--refresh-token T] [--hints-file PATH]\n  {program} --require ROLE[,ROLE...] [--require-all] [--token T]\n  {program} --logout [--hints-file PATH]\n\nFlags:\n  --identity-url <url>     Backend base URL (env: CREATHON_IDENTITY_URL)\n  --user-info-path <path>  User-info route (env: CREATHON_USER_INFO_PATH)\n  --token <t>              Access token, sent as the access cookie\n  --refresh-token <t>      Refresh token, sent as the refresh cookie\n  --hints-file <path>      Persisted hints (env: CREATHON_HINTS_FILE)\n  --require <roles>        Evaluate an access guard for these comma-separated roles\n  --require-all            Guard requires every listed role\n  --logout                 Clear hints and print the login path\n  -h, --help               Show this help"
    );
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

/// A terminal has no page to replace; print where the browser would have gone.
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn hard_navigate(&self, path: &str) {
        println!("navigate {}", path);
    }
}

fn seed_jar(config: &AccessConfig, access: Option<&str>, refresh: Option<&str>) -> Result<Arc<Jar>> {
    let jar = Arc::new(Jar::default());
    let url = Url::parse(&config.identity_url).context("invalid identity URL")?;
    if let Some(tok) = access {
        jar.add_cookie_str(&format!("{}={}; Path=/", config.access_cookie, tok), &url);
    }
    if let Some(tok) = refresh {
        jar.add_cookie_str(&format!("{}={}; Path=/", config.refresh_cookie, tok), &url);
    }
    Ok(jar)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("warn"))?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "creathon_session".to_string());
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print_usage(&program);
        return Ok(());
    }

    let mut config = AccessConfig::from_env()?;
    if let Some(url) = parse_string_arg(&args, "--identity-url") { config.identity_url = url; }
    if let Some(path) = parse_string_arg(&args, "--user-info-path") { config.user_info_path = path; }
    if let Some(path) = parse_string_arg(&args, "--hints-file") { config.hints_file = Some(PathBuf::from(path)); }

    if has_flag(&args, "--logout") {
        let store = config.hint_store();
        logout(store.as_ref(), &PrintNavigator, &config.landing.login);
        return Ok(());
    }

    let access = parse_string_arg(&args, "--token");
    let refresh = parse_string_arg(&args, "--refresh-token");
    let jar = seed_jar(&config, access.as_deref(), refresh.as_deref())?;
    let resolver = Arc::new(config.session_resolver(jar)?);

    if let Some(list) = parse_string_arg(&args, "--require") {
        let roles: Vec<String> = list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        let guard = AccessGuard::new(resolver, roles).require_all(has_flag(&args, "--require-all"));
        let state = guard.settled().await;
        println!("{}", if state == GuardState::Authorized { "authorized" } else { "unauthorized" });
        if state != GuardState::Authorized {
            std::process::exit(3);
        }
        return Ok(());
    }

    let result = resolver.resolve_session().await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    println!("landing {}", resolve_landing_path(result.user(), &config.landing));
    let hints = SessionHints::read(resolver.hints().as_ref());
    if !hints.is_empty() {
        println!("hints {}", serde_json::to_string(&hints)?);
    }
    Ok(())
}
