//! Check command: acquire credentials and report what gets attached.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use leetcode_auth::auth::CSRF_HEADER;
use leetcode_auth::config::{FileConfig, load_default_file_config, load_file_config};
use leetcode_auth::{Credentials, CredentialsProvider, HttpLeetCodeClient};
use reqwest::Method;
use reqwest::header::COOKIE;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::cli::CheckArgs;

/// Outcome of a credential check. Holds cookie names only, never values.
#[derive(Debug, Serialize)]
struct CheckReport {
    strategy: String,
    base_uri: String,
    domain: String,
    cookies: Vec<String>,
    csrf_header: bool,
}

pub async fn run_check_command(args: &CheckArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = match config_path {
        Some(path) => load_file_config(path)?,
        None => {
            let loaded = load_default_file_config()?;
            debug!(
                path = ?loaded.path,
                loaded = loaded.loaded_from_file,
                "resolved config file"
            );
            loaded.config
        }
    };
    config.apply_env_overrides();
    if let Some(from) = &args.from {
        config.credentials.from.clone_from(from);
    }
    config.validate()?;

    let report = check(&config).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("strategy = {}", report.strategy);
        println!("base_uri = {}", report.base_uri);
        println!("domain = {}", report.domain);
        println!(
            "cookies = {}",
            if report.cookies.is_empty() {
                "<none>".to_string()
            } else {
                report.cookies.join(", ")
            }
        );
        println!("csrf_header = {}", report.csrf_header);
    }
    Ok(())
}

async fn check(config: &FileConfig) -> Result<CheckReport> {
    let base_uri = config.base_uri()?;
    let credentials = Arc::new(Credentials::from_config(&config.credentials));
    let client = HttpLeetCodeClient::new(base_uri.as_str(), credentials.clone())?;

    let mut home_request = client.request(Method::GET, "/")?;
    credentials
        .attach(&mut home_request)
        .await
        .with_context(|| format!("Failed to acquire `{}` credentials", credentials.kind()))?;

    let domain = Url::parse(&base_uri)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| anyhow!("Base URI has no host: {base_uri}"))?;
    let report = CheckReport {
        strategy: credentials.kind().to_string(),
        base_uri,
        domain,
        cookies: cookie_names(&home_request),
        csrf_header: home_request.headers().contains_key(CSRF_HEADER),
    };
    info!(
        strategy = %report.strategy,
        domain = %report.domain,
        cookies = report.cookies.len(),
        "credential check complete"
    );
    Ok(report)
}

fn cookie_names(request: &reqwest::Request) -> Vec<String> {
    request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.split_once('=').map(|(name, _)| name.trim().to_string()))
        .filter(|name| !name.is_empty())
        .collect()
}
