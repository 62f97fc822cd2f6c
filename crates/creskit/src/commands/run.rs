//! `creskit run`: long-lived bridge that prints every update.
//!
//! Table and plain output print one line per update; the JSON formats
//! print one compact object per line (NDJSON).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use creskit_core::{Bridge, BridgeConfig, ConnectionState, PointUpdate};

use crate::cli::{GlobalOpts, OutputFormat, RunArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    mut config: BridgeConfig,
    args: RunArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.no_prime {
        config.prime_on_start = false;
    }
    let addr = config.peer.addr();
    let color = output::should_color(global.color);

    let (update_tx, mut updates) = mpsc::unbounded_channel::<PointUpdate>();
    let bridge = Bridge::new(config, Arc::new(update_tx))?;
    bridge.connect().await?;

    let mut state = bridge
        .watch_connection()
        .ok_or_else(|| CliError::Internal("connection state unavailable".into()))?;

    let result = loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break Ok(());
            }

            changed = state.changed() => {
                if changed.is_err() {
                    break Err(CliError::ConnectionFailed {
                        addr: addr.clone(),
                        reason: "gave up reconnecting".into(),
                    });
                }
                let current = *state.borrow_and_update();
                report_state(current, &addr, global.quiet);
            }

            Some(update) = updates.recv() => {
                print_update(&update, global, color)?;
            }
        }
    };

    bridge.disconnect().await;
    result
}

fn report_state(state: ConnectionState, addr: &str, quiet: bool) {
    if quiet {
        return;
    }
    match state {
        ConnectionState::Connected => eprintln!("connected to {addr}"),
        ConnectionState::Connecting => eprintln!("connecting to {addr}..."),
        ConnectionState::Disconnected => eprintln!("disconnected from {addr}"),
    }
}

fn print_update(update: &PointUpdate, global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let line = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(update)?,
        OutputFormat::Plain => format!(
            "{}:{}:{} {}",
            update.kind,
            update.id,
            update.characteristic,
            output::format_value(update.value)
        ),
        OutputFormat::Table => format!(
            "{} ({} {})  {} = {}",
            output::paint_label(&update.name, color),
            update.kind,
            update.id,
            update.characteristic,
            output::paint_value(update.value, color)
        ),
    };
    output::print_output(&line, global.quiet);
    Ok(())
}
