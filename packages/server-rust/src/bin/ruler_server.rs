//! Ruler API server binary.
//!
//! Reads configuration from flags and `RULER_*` environment variables, wires
//! both ruler backends behind the fork dispatcher, and serves until Ctrl+C.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use ruler_core::BackendKind;
use ruler_server::service::backends::{NativeBackend, ProxyBackend};
use ruler_server::service::middleware::TokenVerifier;
use ruler_server::service::{BackendRegistry, DatasourceCache, ForkedRulerApi, LogFormat, ServerConfig};
use ruler_server::NetworkModule;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_format);

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    let datasources = match &config.datasources_file {
        Some(path) => DatasourceCache::load_file(path)?,
        None => {
            warn!("no datasources file configured; only the native ruler is reachable");
            DatasourceCache::new()
        }
    };
    info!(count = datasources.len(), "datasources loaded");
    let lookup = Arc::new(datasources);

    let native = match &config.rules_file {
        Some(path) => NativeBackend::load_file(path)?,
        None => {
            warn!("no rules file configured; native alert and rule statuses start empty");
            NativeBackend::new()
        }
    };

    let registry = BackendRegistry::builder()
        .with(BackendKind::Native, Arc::new(native))
        .with(
            BackendKind::Proxied,
            Arc::new(ProxyBackend::new(lookup.clone(), config.proxy_timeout())?),
        )
        .build();
    let api = Arc::new(ForkedRulerApi::new(lookup, Arc::new(registry)));
    let verifier = Arc::new(TokenVerifier::hs256(config.jwt_secret.as_bytes()));

    let mut module = NetworkModule::new(config.network(), api, verifier);
    let port = module.start().await?;
    info!(host = %config.host, port, "ruler server started");

    module
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("ruler server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    let _ = match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Plain => registry.with(fmt::layer()).try_init(),
    };
}
