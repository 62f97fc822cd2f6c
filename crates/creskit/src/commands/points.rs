//! `creskit points`: what the config file bridges, no controller needed.

use serde::Serialize;
use tabled::Tabled;

use creskit_core::{Characteristic, PointConfig, PointKind};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Reads")]
    reads: String,
    #[tabled(rename = "Writes")]
    writes: String,
    #[tabled(rename = "Event")]
    event: String,
}

#[derive(Serialize)]
struct Listing {
    kind: PointKind,
    id: String,
    name: String,
    serial_number: String,
    reads: Vec<Characteristic>,
    writes: Vec<Characteristic>,
    event: Option<&'static str>,
}

impl From<&PointConfig> for Listing {
    fn from(p: &PointConfig) -> Self {
        let profile = p.kind.profile();
        let mut reads = profile.readable.to_vec();
        reads.extend(profile.fixed.iter().map(|(c, _)| *c));
        Self {
            kind: p.kind,
            id: p.id.clone(),
            name: p.name.clone(),
            serial_number: p.info().serial_number,
            reads,
            writes: profile.writable.to_vec(),
            event: profile.event.as_ref().map(|binding| binding.command),
        }
    }
}

fn join(items: &[Characteristic]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn row(l: &Listing) -> PointRow {
    PointRow {
        kind: l.kind.to_string(),
        id: l.id.clone(),
        name: l.name.clone(),
        reads: join(&l.reads),
        writes: join(&l.writes),
        event: l.event.unwrap_or("-").to_owned(),
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::resolve_path(global);
    let points = config::load(global)?
        .points()
        .map_err(|e| CliError::from_config(e, &path))?;

    let listings: Vec<Listing> = points.iter().map(Listing::from).collect();
    let out = output::render_list(global.output, &listings, row, |l| {
        format!("{}:{}", l.kind, l.id)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
