//! Legacy line-oriented waypoint format (`QGC WPL 110`).
//!
//! One header line, then one tab-separated line per item:
//! seq, current, frame, command, p1..p4, lat, lon, alt, autocontinue. Item 0 is home.

use std::str::FromStr;

use crate::error::{PlanError, PlanResult};
use crate::geo::Coordinate;
use crate::mission::MissionItem;
use crate::plan::{validate_coordinate, PlanModel, PlanSettings};

pub const LEGACY_HEADER: &str = "QGC WPL 110";
const LEGACY_PREFIX: &str = "QGC WPL";
const SUPPORTED_VERSION: &str = "110";
const FIELD_COUNT: usize = 12;

/// True if `text` starts with a legacy header of any version.
pub fn looks_like_legacy(text: &str) -> bool {
    text.trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with(LEGACY_PREFIX)
}

/// Parses the whole file. Any bad line aborts the load with its 1-based line number.
pub fn parse_items(text: &str) -> PlanResult<Vec<MissionItem>> {
    Ok(parse_rows(text)?.into_iter().map(|(_, item)| item).collect())
}

/// Items paired with the line they were read from.
fn parse_rows(text: &str) -> PlanResult<Vec<(usize, MissionItem)>> {
    let mut lines = text.lines().enumerate();
    let header = lines
        .next()
        .map(|(_, line)| line.trim_start_matches('\u{feff}').trim())
        .unwrap_or("");
    check_header(header)?;

    let mut rows = Vec::new();
    for (index, raw) in lines {
        let line_no = index + 1;
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        rows.push((line_no, parse_line(line_no, line)?));
    }
    Ok(rows)
}

/// Loads a flat plan; the first item becomes home. Rows the plan rejects are reported
/// as parse errors on their line.
pub fn from_legacy(text: &str, settings: PlanSettings) -> PlanResult<PlanModel> {
    let mut rows = parse_rows(text)?.into_iter();
    let home = match rows.next() {
        Some((line_no, item)) => validate_coordinate(item.coordinate())
            .map_err(|err| PlanError::parse_at(line_no, format!("home: {err}")))?,
        None => Coordinate::default(),
    };
    let mut plan = PlanModel::new(home, settings);
    for (line_no, item) in rows {
        let end = plan.len();
        plan.insert_mission_item(item, end)
            .map_err(|err| PlanError::parse_at(line_no, err.to_string()))?;
    }
    plan.drain_events();
    Ok(plan)
}

/// Writes every flattened item, home first, with CRLF line endings.
pub fn to_legacy(plan: &PlanModel) -> String {
    let mut out = String::new();
    out.push_str(LEGACY_HEADER);
    out.push_str("\r\n");
    for (index, item) in plan.mission_items().iter().enumerate() {
        let current = item.is_current || index == 0;
        let params: Vec<String> = item.params.iter().map(f64::to_string).collect();
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\r\n",
            item.seq,
            u8::from(current),
            item.frame,
            item.command,
            params.join("\t"),
            u8::from(item.autocontinue)
        ));
    }
    out
}

fn check_header(header: &str) -> PlanResult<()> {
    let Some(version) = header.strip_prefix(LEGACY_PREFIX) else {
        return Err(PlanError::parse_at(
            1,
            format!("expected \"{LEGACY_HEADER}\" header, found {header:?}"),
        ));
    };
    match version.trim() {
        SUPPORTED_VERSION => Ok(()),
        "120" => Err(PlanError::parse_at(
            1,
            "\"QGC WPL 120\" files are not supported",
        )),
        other => Err(PlanError::parse_at(
            1,
            format!("unknown legacy format version {other:?}"),
        )),
    }
}

fn parse_line(line_no: usize, line: &str) -> PlanResult<MissionItem> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != FIELD_COUNT {
        return Err(PlanError::parse_at(
            line_no,
            format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
        ));
    }

    let seq: u16 = field(line_no, &fields, 0, "sequence")?;
    let current: u8 = field(line_no, &fields, 1, "current flag")?;
    let frame = field(line_no, &fields, 2, "frame")?;
    let command = field(line_no, &fields, 3, "command")?;
    let mut params = [0.0; 7];
    for (offset, slot) in params.iter_mut().enumerate() {
        *slot = field(line_no, &fields, 4 + offset, "parameter")?;
    }
    let autocontinue: u8 = field(line_no, &fields, 11, "autocontinue flag")?;

    let item = MissionItem {
        seq,
        is_current: current != 0,
        frame,
        command,
        params,
        autocontinue: autocontinue != 0,
    };
    if item.specifies_coordinate() {
        let coordinate = item.coordinate();
        if !coordinate.is_finite() || !(-90.0..=90.0).contains(&coordinate.lat) {
            return Err(PlanError::parse_at(
                line_no,
                format!(
                    "invalid coordinate {}, {}, {}",
                    coordinate.lat, coordinate.lon, coordinate.alt
                ),
            ));
        }
    }
    Ok(item)
}

fn field<T: FromStr>(line_no: usize, fields: &[&str], index: usize, name: &str) -> PlanResult<T> {
    let raw = fields[index].trim();
    raw.parse::<T>().map_err(|_| {
        PlanError::parse_at(
            line_no,
            format!("field {} ({name}) is not a valid number: {raw:?}", index + 1),
        )
    })
}
