use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PlanResult;
use crate::export;
use crate::geo::Coordinate;
use crate::mission::{command_label, MissionItem};
use crate::plan::{EntryKind, PlanModel};
use crate::sim::LoopbackVehicle;
use crate::storage;
use crate::sync::{SyncCoordinator, SyncNotice, TransferState, VehicleLink};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const SETTLE_GRACE: Duration = Duration::from_secs(2);

/// Runs one non-interactive session: load, edit, optionally sync, then report and save.
pub fn run(config: &Config) -> Result<()> {
    let plan = initial_plan(config)?;
    if config.sim_vehicle {
        run_with_vehicle(config, plan)
    } else {
        run_offline(config, plan)
    }
}

fn initial_plan(config: &Config) -> Result<PlanModel> {
    let settings = config.plan_settings();
    let mut plan = if config.plan_file.trim().is_empty() {
        PlanModel::new(config.home.unwrap_or_default(), settings)
    } else {
        let path = Path::new(config.plan_file.trim());
        storage::load_plan(path, settings)
            .with_context(|| format!("Failed to load plan {}", path.display()))?
    };
    if let Some(home) = config.home {
        plan.set_home_position(home)
            .context("Invalid home position")?;
    }
    Ok(plan)
}

fn run_offline(config: &Config, mut plan: PlanModel) -> Result<()> {
    apply_edits(&mut plan, config).context("Plan edit rejected")?;
    for event in plan.drain_events() {
        debug!("plan event: {event:?}");
    }
    report(config, &plan)?;
    if let Some(path) = save_target(config) {
        storage::save_plan(path, &plan, config.save_format(), &config.plan_header())
            .with_context(|| format!("Failed to save {}", path.display()))?;
        println!("saved {} plan to {}", config.save_format().as_str(), path.display());
    }
    Ok(())
}

fn run_with_vehicle(config: &Config, plan: PlanModel) -> Result<()> {
    let home = config.home.unwrap_or_else(|| plan.home_position());
    let vehicle = LoopbackVehicle::spawn(
        Some(home),
        vec![MissionItem::waypoint(0, home)],
        Duration::from_millis(config.sim_latency_ms),
    );
    let deadline = Duration::from_millis(config.sim_latency_ms.saturating_mul(4)) + SETTLE_GRACE;
    let mut sync = SyncCoordinator::new(vehicle, plan, config.plan_header());

    sync.start(config.edit_mode)
        .context("Failed to attach to vehicle")?;
    wait_for_idle(&mut sync, deadline)?;

    if !config.edit_mode && has_edits(config) {
        warn!("edits requested in fly mode; applying them to the local plan");
    }
    sync.edit(|plan| apply_edits(plan, config))
        .context("Plan edit rejected")?;

    if config.upload {
        sync.send_to_vehicle().context("Failed to start upload")?;
        wait_for_idle(&mut sync, deadline)?;
        if let TransferState::Error(message) = sync.upload_state() {
            return Err(anyhow!("Upload failed: {message}"));
        }
        println!(
            "vehicle holds {} mission items",
            sync.link().current_mission_items().len()
        );
    }

    for event in sync.drain_plan_events() {
        debug!("plan event: {event:?}");
    }
    report(config, sync.plan())?;
    println!("unsent changes: {}", if sync.dirty() { "yes" } else { "no" });

    if let Some(path) = save_target(config) {
        sync.save_to_file(path, config.save_format())
            .with_context(|| format!("Failed to save {}", path.display()))?;
        println!("saved {} plan to {}", config.save_format().as_str(), path.display());
    }
    Ok(())
}

/// Pumps vehicle events until no transfer is in flight.
fn wait_for_idle<L: VehicleLink>(sync: &mut SyncCoordinator<L>, limit: Duration) -> Result<()> {
    let deadline = Instant::now() + limit;
    loop {
        sync.pump();
        for notice in sync.drain_notices() {
            log_notice(&notice);
        }
        if !sync.sync_in_progress() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(anyhow!("Vehicle did not answer within {limit:?}"));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn log_notice(notice: &SyncNotice) {
    match notice {
        SyncNotice::LoadComplete => info!("mission loaded from vehicle"),
        SyncNotice::SendComplete => info!("mission sent to vehicle"),
        SyncNotice::Failed(message) => warn!("vehicle transfer failed: {message}"),
        SyncNotice::Conflict { vehicle_items } => {
            warn!("vehicle mission ({vehicle_items} items) differs from unsent plan")
        }
        SyncNotice::DirtyChanged(dirty) => debug!("dirty: {dirty}"),
    }
}

fn has_edits(config: &Config) -> bool {
    !config.insert.is_empty() || !config.insert_survey.is_empty() || !config.remove.is_empty()
}

/// Removals run first, highest index first, so each index refers to the loaded plan.
fn apply_edits(plan: &mut PlanModel, config: &Config) -> PlanResult<()> {
    let mut remove = config.remove.clone();
    remove.sort_unstable();
    remove.dedup();
    for index in remove.into_iter().rev() {
        plan.remove(index)?;
    }
    for coordinate in &config.insert {
        plan.insert_simple(*coordinate, plan.len())?;
    }
    for coordinate in &config.insert_survey {
        plan.insert_complex(*coordinate, plan.len())?;
    }
    Ok(())
}

fn save_target(config: &Config) -> Option<&Path> {
    let path = config.save_file.trim();
    (!path.is_empty()).then(|| Path::new(path))
}

fn report(config: &Config, plan: &PlanModel) -> Result<()> {
    print!("{}", summary(plan));
    if config.export_lines {
        let path = export::export_lines(plan)?;
        println!("exported lines to {}", path.display());
    }
    Ok(())
}

fn summary(plan: &PlanModel) -> String {
    let home = plan.home_position();
    let mut out = format!(
        "home {:.7},{:.7} alt {:.1} m, {} items\n",
        home.lat,
        home.lon,
        home.alt,
        plan.len().saturating_sub(1)
    );
    for entry in plan.stream() {
        let kind = match entry.kind {
            EntryKind::Home => "home",
            EntryKind::Simple => "item",
            EntryKind::Child => "child",
            EntryKind::Anchor => "anchor",
        };
        let coordinate: Coordinate = entry.item.coordinate();
        out.push_str(&format!(
            "{:>4} {:<6} {:<16} {:>12.7} {:>12.7} {:>8.1}",
            entry.seq,
            kind,
            command_label(entry.item.command),
            coordinate.lat,
            coordinate.lon,
            coordinate.alt
        ));
        if entry.on_path && entry.kind != EntryKind::Home {
            out.push_str(&format!(
                " {:>9.1} m {:>6.1} deg",
                entry.metrics.distance, entry.metrics.azimuth
            ));
        }
        out.push('\n');
    }
    let stats = plan.statistics();
    out.push_str(&format!(
        "total {:.1} m (cruise {:.1} m, hover {:.1} m), max telemetry {:.1} m\n",
        stats.total_distance,
        stats.cruise_distance,
        stats.hover_distance,
        stats.max_telemetry_distance
    ));
    out
}
