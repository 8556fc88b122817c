//! Standalone chat relay.
//!
//! ```text
//! CHATRELAY_BIND       listen address       (default 0.0.0.0:8080)
//! CHATRELAY_SNAPSHOT   membership file      (default roomClientMap.json)
//! CHATRELAY_DELIMITER  field separator      (default |)
//! RUST_LOG             log filter           (default info)
//! ```
//!
//! Membership is loaded from the snapshot at startup and written back on
//! Ctrl-C.

use std::env;

use chatrelay::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_SNAPSHOT: &str = "roomClientMap.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = env::var("CHATRELAY_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let snapshot =
        env::var("CHATRELAY_SNAPSHOT").unwrap_or_else(|_| DEFAULT_SNAPSHOT.to_string());
    let config = RelayConfig {
        delimiter: delimiter_from_env()?,
        ..RelayConfig::default()
    };

    let server = ChatRelayServerBuilder::new()
        .bind(&bind)
        .config(config)
        .snapshot(&snapshot)
        .build()
        .await?;
    let registry = server.registry();

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if let Err(e) = registry.snapshot().save(&snapshot).await {
        tracing::error!(error = %e, "failed to save membership snapshot");
    }
    Ok(())
}

fn delimiter_from_env() -> Result<char, Box<dyn std::error::Error>> {
    let Ok(raw) = env::var("CHATRELAY_DELIMITER") else {
        return Ok(RelayConfig::default().delimiter);
    };
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("CHATRELAY_DELIMITER must be one character, got {raw:?}").into()),
    }
}
