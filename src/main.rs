use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser};
use reqwest::Url;
use sgl_http_balancer::client::{
    uri, BalancingAsyncHttpClient, ReqwestAsyncHttpClient, Request, StringResponseHandler,
};
use sgl_http_balancer::config::BalancingClientConfigBuilder;
use sgl_http_balancer::core::ServiceBalancer;
use sgl_http_balancer::logging::{self, LoggingConfig};
use sgl_http_balancer::metrics;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "sgl-http-balancer")]
#[command(about = "Issue one GET against a set of equivalent endpoints with retries")]
#[command(long_about = r#"
Issue one GET against a set of equivalent endpoints with retries

The request path is resolved beneath whichever endpoint the balancer picks.
Retryable failures (connect errors, 408/500/502/503/504) move on to another
endpoint until --max-attempts is reached.

Examples:
  sgl-http-balancer --endpoint http://127.0.0.1:8001 --endpoint http://127.0.0.1:8002 \
    --path v1/health --max-attempts 3
"#)]
struct CliArgs {
    /// Endpoint base URI (can be specified multiple times)
    #[arg(long = "endpoint", action = ArgAction::Append, required = true)]
    endpoints: Vec<String>,

    /// Relative request path, e.g. v1/health
    #[arg(long, default_value = "")]
    path: String,

    /// Maximum transport calls for the request
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Logical service name for logs and metrics
    #[arg(long, default_value = "demo")]
    service_type: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    request_timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info", value_parser = ["debug", "info", "warn", "error"])]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

impl CliArgs {
    fn log_level(&self) -> Level {
        match self.log_level.as_str() {
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let _log_guard = logging::init_logging(LoggingConfig {
        level: args.log_level(),
        json_format: args.json_logs,
        ..Default::default()
    })?;
    metrics::init_metrics();

    uri::validate_relative(&args.path).context("invalid --path")?;

    let config = BalancingClientConfigBuilder::new()
        .max_attempts(args.max_attempts)
        .service_type(args.service_type.clone())
        .request_timeout_secs(args.request_timeout_secs)
        .build()
        .context("invalid client configuration")?;

    let endpoints = args
        .endpoints
        .iter()
        .map(|endpoint| Url::parse(endpoint).with_context(|| format!("invalid endpoint {endpoint}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let balancer = ServiceBalancer::with_uris(config.service_type.clone(), endpoints);

    let transport =
        ReqwestAsyncHttpClient::new(&config).context("failed to build HTTP transport")?;
    let client = BalancingAsyncHttpClient::new(balancer, transport, &config);

    let result = client
        .execute(Request::get(args.path.clone()).build(), Arc::new(StringResponseHandler))
        .await;

    for stats in client.attempt_stats() {
        println!(
            "{} {} {} count={} mean={:?}",
            stats.endpoint,
            stats.outcome,
            stats.category,
            stats.count,
            stats.mean_latency()
        );
    }

    let body = result.context("request failed")?;
    println!("{body}");
    Ok(())
}
