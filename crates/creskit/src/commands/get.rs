//! `creskit get`: one read, then exit.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use creskit_core::{Bridge, BridgeConfig, Characteristic, NullSink, PointKind};

use crate::cli::{GetArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Reading {
    kind: PointKind,
    id: String,
    name: String,
    characteristic: Characteristic,
    value: Option<i64>,
}

fn detail(r: &Reading, color: bool) -> String {
    format!(
        "{} ({} {})  {} = {}",
        output::paint_label(&r.name, color),
        r.kind,
        r.id,
        r.characteristic,
        output::paint_value(r.value, color)
    )
}

pub async fn handle(
    config: BridgeConfig,
    args: GetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let GetArgs {
        kind,
        id,
        characteristic,
        timeout,
    } = args;
    let wait = Duration::from_secs(timeout);

    let (name, answer) = Bridge::oneshot(config, Arc::new(NullSink), {
        let id = id.clone();
        move |bridge| async move {
            let point = bridge.point(kind, &id)?;
            let answer = tokio::time::timeout(wait, point.get(characteristic)).await;
            Ok((point.name().to_owned(), answer))
        }
    })
    .await?;
    let value = answer.map_err(|_| CliError::Timeout { seconds: timeout })??;

    let reading = Reading {
        kind,
        id,
        name,
        characteristic,
        value,
    };
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &reading,
        |r| detail(r, color),
        |r| output::format_value(r.value),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
