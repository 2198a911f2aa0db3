// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spool filename scheme (spec §6): `<ISO-8601 timestamp with `:`/`.`
//! replaced by `-`>-<kind-with-dots-as-dashes>-<first-8-of-uuid>.json`.

use chrono::SecondsFormat;
use wfe_core::Event;

pub struct ParsedFilename {
    pub timestamp: String,
    pub kind_dashed: String,
    pub short_id: String,
}

pub fn format(event: &Event) -> String {
    let ts = event.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);
    let ts_safe = ts.replace([':', '.'], "-");
    format!("{ts_safe}-{}-{}.json", event.kind_str().replace('.', "-"), event.id.short())
}

/// Reverses `format`, tolerating the kind segment containing dashes of its
/// own (it's everything between the timestamp and the trailing id8).
pub fn parse(name: &str) -> Option<ParsedFilename> {
    let stem = name.strip_suffix(".json")?;
    let (timestamp, rest) = stem.split_once('Z')?;
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    let (kind_dashed, short_id) = rest.rsplit_once('-')?;
    Some(ParsedFilename {
        timestamp: format!("{timestamp}Z"),
        kind_dashed: kind_dashed.to_string(),
        short_id: short_id.to_string(),
    })
}
