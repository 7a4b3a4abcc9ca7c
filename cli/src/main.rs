//! nbsync - keeps an editor's notebooks mirrored on the analysis server.
//!
//! The editor host speaks newline-delimited JSON over stdin/stdout:
//!
//! ```text
//! host --HostMessage--> stdin -> Bridge -> Reconciler -> analysis server
//! host <--HostEvent---- stdout <- Bridge <- markers / notifications
//! ```
//!
//! stdout carries only protocol messages; logs go to a file.

mod bridge;
mod logging;
mod wire;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use nbsync_config::NbsyncConfig;

use crate::bridge::Bridge;
use crate::wire::{HostEvent, HostMessage};

fn load_config() -> NbsyncConfig {
    match NbsyncConfig::load() {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::info!("No config file, using defaults");
            NbsyncConfig::default()
        }
        Err(e) => {
            tracing::warn!("{e}; using defaults");
            NbsyncConfig::default()
        }
    }
}

async fn write_events<W>(out: &mut W, events: Vec<HostEvent>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if events.is_empty() {
        return Ok(());
    }
    for event in events {
        let mut line = serde_json::to_vec(&event).context("serializing host event")?;
        line.push(b'\n');
        out.write_all(&line).await.context("writing to stdout")?;
    }
    out.flush().await.context("flushing stdout")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logging::init();

    let config = load_config();
    let mut bridge = Bridge::from_config(&config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            tracing::info!("Host closed stdin");
            bridge.shutdown().await;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match serde_json::from_str::<HostMessage>(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Skipping malformed host message: {e}");
                continue;
            }
        };

        let flow = bridge.handle(message).await;
        write_events(&mut stdout, bridge.drain()).await?;
        if flow.is_break() {
            tracing::info!("Shutdown requested");
            break;
        }
    }

    Ok(())
}
