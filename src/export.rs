use anyhow::{Context, Result};
use chrono::Local;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::lines::NodeKey;
use crate::mission::command_label;
use crate::plan::{PlanModel, StreamEntry};
use crate::stats::SegmentKind;

const EXPORT_DIR: &str = "exports";

/// Writes the connecting lines and the statistics summary under `exports/`.
pub fn export_lines(plan: &PlanModel) -> Result<PathBuf> {
    export_lines_to(Path::new(EXPORT_DIR), plan)
}

pub fn export_lines_to(dir: &Path, plan: &PlanModel) -> Result<PathBuf> {
    let filename = format!("mission-lines-{}.csv", Local::now().format("%Y%m%d-%H%M%S"));
    let mut path = export_path(dir, &filename)?;
    if path.exists() {
        path = unique_path(&path);
    }

    fs::write(&path, lines_csv(plan))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn lines_csv(plan: &PlanModel) -> String {
    let entries: HashMap<NodeKey, &StreamEntry> =
        plan.stream().iter().map(|e| (e.key, e)).collect();
    let classifier = &plan.settings().classifier;

    let mut rows = Vec::with_capacity(plan.lines().len() + 6);
    rows.push(
        "from_seq,to_seq,to_command,start_lat,start_lon,end_lat,end_lon,distance_m,bearing_deg,segment"
            .to_string(),
    );
    for line in plan.lines() {
        let from = entries.get(&line.from).map(|e| e.seq);
        let to = entries.get(&line.to);
        let command = to.map(|e| e.item.command).unwrap_or_default();
        let segment = match classifier.classify(command) {
            SegmentKind::Cruise => "cruise",
            SegmentKind::Hover => "hover",
        };
        rows.push(format!(
            "{},{},{},{:.7},{:.7},{:.7},{:.7},{:.2},{:.1},{}",
            opt_usize(from),
            opt_usize(to.map(|e| e.seq)),
            command_label(command),
            line.start.lat,
            line.start.lon,
            line.end.lat,
            line.end.lon,
            line.distance,
            line.bearing,
            segment
        ));
    }

    let stats = plan.statistics();
    rows.push(String::new());
    rows.push("statistic,meters".to_string());
    rows.push(format!("total_distance,{:.2}", stats.total_distance));
    rows.push(format!("cruise_distance,{:.2}", stats.cruise_distance));
    rows.push(format!("hover_distance,{:.2}", stats.hover_distance));
    rows.push(format!(
        "max_telemetry_distance,{:.2}",
        stats.max_telemetry_distance
    ));
    rows.join("\n")
}

fn opt_usize(value: Option<usize>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn export_path(dir: &Path, filename: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir.join(filename))
}

fn unique_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let mut i = 1;
    loop {
        let name = if ext.is_empty() {
            format!("{stem}-{i}")
        } else {
            format!("{stem}-{i}.{ext}")
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}
