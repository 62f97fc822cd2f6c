//! `creskit set`: one write, then exit.

use std::sync::Arc;

use serde::Serialize;

use creskit_core::{Bridge, BridgeConfig, Characteristic, NullSink, PointKind, SetOutcome};

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Written {
    kind: PointKind,
    id: String,
    characteristic: Characteristic,
    value: i64,
    outcome: SetOutcome,
}

pub async fn handle(
    config: BridgeConfig,
    args: SetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let SetArgs {
        kind,
        id,
        characteristic,
        value,
    } = args;

    // Range check up front so a bad value never waits on the network
    if kind.profile().can_write(characteristic) && !characteristic.accepts(value) {
        return Err(CliError::Validation {
            field: characteristic.to_string(),
            reason: format!("{value} is out of range"),
        });
    }

    let outcome = Bridge::oneshot(config, Arc::new(NullSink), {
        let id = id.clone();
        move |bridge| async move { bridge.point(kind, &id)?.set(characteristic, value) }
    })
    .await?;

    let written = Written {
        kind,
        id,
        characteristic,
        value,
        outcome,
    };
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &written,
        |w| {
            format!(
                "{} {} {} = {} ({})",
                w.kind,
                w.id,
                output::paint_label(&w.characteristic.to_string(), color),
                output::paint_value(Some(w.value), color),
                w.outcome
            )
        },
        |w| w.outcome.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
