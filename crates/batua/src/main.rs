//! Batua: a smart-account wallet provider served over stdio.

use eyre::WrapErr;
use tokio::io::BufReader;

use batua_adapters::{random_uuid_v4, AdapterConfig};

mod host;

fn main() -> eyre::Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = AdapterConfig::from_env().wrap_err("invalid BATUA_* configuration")?;
    let uuid = random_uuid_v4();
    tracing::info!(chains = config.chains.len(), %uuid, "Starting Batua");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start async runtime")?;

    runtime.block_on(async move {
        let mut host = host::Host::from_config(&config, uuid)?;
        host.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    })
}
