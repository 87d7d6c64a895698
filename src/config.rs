use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::geo::Coordinate;
use crate::mission::MavCmd;
use crate::model::{PlanHeader, DEFAULT_AUTOPILOT, DEFAULT_GROUND_STATION};
use crate::plan::PlanSettings;
use crate::stats::{SegmentClassifier, DEFAULT_HOVER_COMMANDS};
use crate::storage::PlanFormat;
use crate::survey::SurveyDefaults;

pub const DEFAULT_CONFIG_FILE: &str = "mission-plan.toml";
pub const DEFAULT_SURVEY_SIZE_M: f64 = 100.0;
pub const DEFAULT_SURVEY_SPACING_M: f64 = 20.0;
pub const DEFAULT_SURVEY_ALTITUDE_M: f64 = 50.0;
pub const DEFAULT_SURVEY_ANGLE_DEG: f64 = 0.0;
pub const DEFAULT_ACCEPTANCE_RADIUS_M: f64 = 0.0;
pub const DEFAULT_EDIT_MODE: bool = true;
pub const DEFAULT_SIM_LATENCY_MS: u64 = 150;
pub const DEFAULT_LOG_FILE: &str = "mission-plan.log";

const MIN_SURVEY_SIZE_M: f64 = 1.0;
const MIN_SURVEY_SPACING_M: f64 = 0.5;
const MAX_SIM_LATENCY_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub plan_file: String,
    pub save_file: String,
    pub save_legacy: bool,
    pub export_lines: bool,
    pub ground_station: String,
    pub autopilot: i64,
    pub hover_commands: Vec<MavCmd>,
    pub survey_size_m: f64,
    pub survey_spacing_m: f64,
    pub survey_altitude_m: f64,
    pub survey_angle_deg: f64,
    pub default_acceptance_radius_m: f64,
    pub edit_mode: bool,
    pub sim_vehicle: bool,
    pub sim_latency_ms: u64,
    pub upload: bool,
    pub insert: Vec<Coordinate>,
    pub insert_survey: Vec<Coordinate>,
    pub remove: Vec<usize>,
    pub home: Option<Coordinate>,
    pub log_enabled: bool,
    pub log_level: String,
    pub log_file: String,
}

impl Config {
    pub(crate) fn defaults(config_path: PathBuf) -> Self {
        Self {
            config_path,
            plan_file: String::new(),
            save_file: String::new(),
            save_legacy: false,
            export_lines: false,
            ground_station: DEFAULT_GROUND_STATION.to_string(),
            autopilot: DEFAULT_AUTOPILOT,
            hover_commands: DEFAULT_HOVER_COMMANDS.to_vec(),
            survey_size_m: DEFAULT_SURVEY_SIZE_M,
            survey_spacing_m: DEFAULT_SURVEY_SPACING_M,
            survey_altitude_m: DEFAULT_SURVEY_ALTITUDE_M,
            survey_angle_deg: DEFAULT_SURVEY_ANGLE_DEG,
            default_acceptance_radius_m: DEFAULT_ACCEPTANCE_RADIUS_M,
            edit_mode: DEFAULT_EDIT_MODE,
            sim_vehicle: false,
            sim_latency_ms: DEFAULT_SIM_LATENCY_MS,
            upload: false,
            insert: Vec::new(),
            insert_survey: Vec::new(),
            remove: Vec::new(),
            home: None,
            log_enabled: false,
            log_level: "info".to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }

    pub fn plan_settings(&self) -> PlanSettings {
        PlanSettings {
            classifier: SegmentClassifier::new(self.hover_commands.iter().copied()),
            survey: SurveyDefaults {
                size_m: self.survey_size_m,
                spacing_m: self.survey_spacing_m,
                altitude_m: self.survey_altitude_m,
                angle_deg: self.survey_angle_deg,
            },
            acceptance_radius: self.default_acceptance_radius_m,
        }
    }

    pub fn plan_header(&self) -> PlanHeader {
        PlanHeader {
            ground_station: self.ground_station.clone(),
            autopilot: self.autopilot,
        }
    }

    pub fn save_format(&self) -> PlanFormat {
        if self.save_legacy {
            PlanFormat::Legacy
        } else {
            PlanFormat::Structured
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    plan_file: Option<String>,
    save_file: Option<String>,
    save_legacy: Option<bool>,
    export_lines: Option<bool>,
    ground_station: Option<String>,
    autopilot: Option<i64>,
    hover_commands: Option<Vec<MavCmd>>,
    survey_size_m: Option<f64>,
    survey_spacing_m: Option<f64>,
    survey_altitude_m: Option<f64>,
    survey_angle_deg: Option<f64>,
    default_acceptance_radius_m: Option<f64>,
    edit_mode: Option<bool>,
    sim_vehicle: Option<bool>,
    sim_latency_ms: Option<u64>,
    upload: Option<bool>,
    insert: Option<Vec<String>>,
    insert_survey: Option<Vec<String>>,
    remove: Option<Vec<usize>>,
    home: Option<String>,
    log_enabled: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
}

pub fn parse_args() -> Result<Config> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_from(&args)
}

fn parse_from(args: &[String]) -> Result<Config> {
    let mut explicit_config: Option<PathBuf> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--config needs a value"))?;
            explicit_config = Some(PathBuf::from(value));
        }
    }

    let env_config = env::var("MISSION_CONFIG").ok().map(PathBuf::from);
    let explicit = explicit_config.is_some() || env_config.is_some();
    let config_path = explicit_config
        .or(env_config)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut config = Config::defaults(config_path.clone());

    if config_path.exists() {
        if let Some(file_config) = load_file_config(&config_path)? {
            apply_file_config(&mut config, file_config)?;
        }
    } else if explicit {
        return Err(anyhow!("Config file not found: {}", config_path.display()));
    }

    apply_env(&mut config)?;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{name} needs a value"))
        };
        match arg.as_str() {
            "--config" => {
                value("--config")?;
            }
            "--plan" => config.plan_file = value("--plan")?,
            "--save" => config.save_file = value("--save")?,
            "--legacy" => config.save_legacy = true,
            "--structured" => config.save_legacy = false,
            "--export-lines" => config.export_lines = true,
            "--ground-station" => config.ground_station = value("--ground-station")?,
            "--autopilot" => {
                config.autopilot = value("--autopilot")?
                    .parse()
                    .context("--autopilot expects an integer")?;
            }
            "--hover-commands" => {
                config.hover_commands = parse_command_list(&value("--hover-commands")?)?;
            }
            "--survey-size" => {
                config.survey_size_m = parse_f64("--survey-size", &value("--survey-size")?)?
                    .max(MIN_SURVEY_SIZE_M);
            }
            "--survey-spacing" => {
                config.survey_spacing_m =
                    parse_f64("--survey-spacing", &value("--survey-spacing")?)?
                        .max(MIN_SURVEY_SPACING_M);
            }
            "--survey-altitude" => {
                config.survey_altitude_m =
                    parse_f64("--survey-altitude", &value("--survey-altitude")?)?;
            }
            "--survey-angle" => {
                config.survey_angle_deg = parse_f64("--survey-angle", &value("--survey-angle")?)?;
            }
            "--acceptance-radius" => {
                config.default_acceptance_radius_m =
                    parse_f64("--acceptance-radius", &value("--acceptance-radius")?)?.max(0.0);
            }
            "--edit-mode" => config.edit_mode = true,
            "--fly-mode" => config.edit_mode = false,
            "--sim-vehicle" => config.sim_vehicle = true,
            "--sim-latency-ms" => {
                let ms: u64 = value("--sim-latency-ms")?
                    .parse()
                    .context("--sim-latency-ms expects milliseconds")?;
                config.sim_latency_ms = ms.min(MAX_SIM_LATENCY_MS);
            }
            "--upload" => config.upload = true,
            "--insert" => config.insert.push(parse_coordinate(&value("--insert")?)?),
            "--insert-survey" => {
                config
                    .insert_survey
                    .push(parse_coordinate(&value("--insert-survey")?)?);
            }
            "--remove" => {
                let index = value("--remove")?;
                config.remove.push(
                    index
                        .parse()
                        .with_context(|| format!("--remove expects an index, got {index}"))?,
                );
            }
            "--home" => config.home = Some(parse_coordinate(&value("--home")?)?),
            "--log" => config.log_enabled = true,
            "--no-log" => config.log_enabled = false,
            "--log-level" => config.log_level = value("--log-level")?,
            "--log-file" => config.log_file = value("--log-file")?,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                return Err(anyhow!("Unknown argument: {other}"));
            }
        }
    }

    Ok(config)
}

fn apply_env(config: &mut Config) -> Result<()> {
    if let Ok(value) = env::var("MISSION_PLAN_FILE") {
        config.plan_file = value;
    }
    if let Ok(value) = env::var("MISSION_SAVE_FILE") {
        config.save_file = value;
    }
    if let Ok(value) = env::var("MISSION_SAVE_LEGACY") {
        config.save_legacy = truthy(&value);
    }
    if let Ok(value) = env::var("MISSION_EXPORT_LINES") {
        config.export_lines = truthy(&value);
    }
    if let Ok(value) = env::var("MISSION_GROUND_STATION") {
        config.ground_station = value;
    }
    if let Ok(value) = env::var("MISSION_AUTOPILOT") {
        if let Ok(id) = value.trim().parse::<i64>() {
            config.autopilot = id;
        }
    }
    if let Ok(value) = env::var("MISSION_HOVER_COMMANDS") {
        config.hover_commands = parse_command_list(&value)?;
    }
    if let Ok(value) = env::var("MISSION_SURVEY_SIZE_M") {
        let size = parse_f64("MISSION_SURVEY_SIZE_M", &value)?;
        config.survey_size_m = size.max(MIN_SURVEY_SIZE_M);
    }
    if let Ok(value) = env::var("MISSION_SURVEY_SPACING_M") {
        let spacing = parse_f64("MISSION_SURVEY_SPACING_M", &value)?;
        config.survey_spacing_m = spacing.max(MIN_SURVEY_SPACING_M);
    }
    if let Ok(value) = env::var("MISSION_SURVEY_ALTITUDE_M") {
        let altitude = parse_f64("MISSION_SURVEY_ALTITUDE_M", &value)?;
        config.survey_altitude_m = altitude;
    }
    if let Ok(value) = env::var("MISSION_SURVEY_ANGLE_DEG") {
        let angle = parse_f64("MISSION_SURVEY_ANGLE_DEG", &value)?;
        config.survey_angle_deg = angle;
    }
    if let Ok(value) = env::var("MISSION_ACCEPTANCE_RADIUS_M") {
        let radius = parse_f64("MISSION_ACCEPTANCE_RADIUS_M", &value)?;
        config.default_acceptance_radius_m = radius.max(0.0);
    }
    if let Ok(value) = env::var("MISSION_EDIT_MODE") {
        config.edit_mode = truthy(&value);
    }
    if let Ok(value) = env::var("MISSION_SIM_VEHICLE") {
        config.sim_vehicle = truthy(&value);
    }
    if let Ok(value) = env::var("MISSION_SIM_LATENCY_MS") {
        if let Ok(ms) = value.trim().parse::<u64>() {
            config.sim_latency_ms = ms.min(MAX_SIM_LATENCY_MS);
        }
    }
    if let Ok(value) = env::var("MISSION_HOME") {
        config.home = Some(parse_coordinate(&value)?);
    }
    if let Ok(value) = env::var("MISSION_LOG_ENABLED") {
        config.log_enabled = truthy(&value);
    }
    if let Ok(value) = env::var("MISSION_LOG_LEVEL") {
        config.log_level = value;
    }
    if let Ok(value) = env::var("MISSION_LOG_FILE") {
        config.log_file = value;
    }
    Ok(())
}

fn load_file_config(path: &Path) -> Result<Option<FileConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let cfg: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(cfg))
}

fn apply_file_config(target: &mut Config, file: FileConfig) -> Result<()> {
    if let Some(plan_file) = file.plan_file {
        target.plan_file = plan_file;
    }
    if let Some(save_file) = file.save_file {
        target.save_file = save_file;
    }
    if let Some(save_legacy) = file.save_legacy {
        target.save_legacy = save_legacy;
    }
    if let Some(export_lines) = file.export_lines {
        target.export_lines = export_lines;
    }
    if let Some(ground_station) = file.ground_station {
        target.ground_station = ground_station;
    }
    if let Some(autopilot) = file.autopilot {
        target.autopilot = autopilot;
    }
    if let Some(hover_commands) = file.hover_commands {
        target.hover_commands = hover_commands;
    }
    if let Some(size) = file.survey_size_m {
        let size = finite("survey_size_m", size)?;
        target.survey_size_m = size.max(MIN_SURVEY_SIZE_M);
    }
    if let Some(spacing) = file.survey_spacing_m {
        let spacing = finite("survey_spacing_m", spacing)?;
        target.survey_spacing_m = spacing.max(MIN_SURVEY_SPACING_M);
    }
    if let Some(altitude) = file.survey_altitude_m {
        let altitude = finite("survey_altitude_m", altitude)?;
        target.survey_altitude_m = altitude;
    }
    if let Some(angle) = file.survey_angle_deg {
        let angle = finite("survey_angle_deg", angle)?;
        target.survey_angle_deg = angle;
    }
    if let Some(radius) = file.default_acceptance_radius_m {
        let radius = finite("default_acceptance_radius_m", radius)?;
        target.default_acceptance_radius_m = radius.max(0.0);
    }
    if let Some(edit_mode) = file.edit_mode {
        target.edit_mode = edit_mode;
    }
    if let Some(sim_vehicle) = file.sim_vehicle {
        target.sim_vehicle = sim_vehicle;
    }
    if let Some(latency) = file.sim_latency_ms {
        target.sim_latency_ms = latency.min(MAX_SIM_LATENCY_MS);
    }
    if let Some(upload) = file.upload {
        target.upload = upload;
    }
    if let Some(insert) = file.insert {
        target.insert = insert
            .iter()
            .map(|v| parse_coordinate(v))
            .collect::<Result<_>>()?;
    }
    if let Some(insert_survey) = file.insert_survey {
        target.insert_survey = insert_survey
            .iter()
            .map(|v| parse_coordinate(v))
            .collect::<Result<_>>()?;
    }
    if let Some(remove) = file.remove {
        target.remove = remove;
    }
    if let Some(home) = file.home {
        target.home = Some(parse_coordinate(&home)?);
    }
    if let Some(log_enabled) = file.log_enabled {
        target.log_enabled = log_enabled;
    }
    if let Some(log_level) = file.log_level {
        target.log_level = log_level;
    }
    if let Some(log_file) = file.log_file {
        target.log_file = log_file;
    }
    Ok(())
}

fn truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes" | "on")
}

fn parse_f64(flag: &str, value: &str) -> Result<f64> {
    let parsed: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("{flag} expects a number, got {value}"))?;
    finite(flag, parsed)
}

fn finite(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(anyhow!("{name} must be finite"));
    }
    Ok(value)
}

/// Parses `lat,lon[,alt]`.
pub fn parse_coordinate(value: &str) -> Result<Coordinate> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(anyhow!("expected LAT,LON[,ALT], got {value:?}"));
    }
    let mut numbers = [0.0; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .with_context(|| format!("invalid number {part:?} in coordinate {value:?}"))?;
    }
    Ok(Coordinate::new(numbers[0], numbers[1], numbers[2]))
}

fn parse_command_list(value: &str) -> Result<Vec<MavCmd>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<MavCmd>()
                .with_context(|| format!("invalid command id {v:?}"))
        })
        .collect()
}

fn print_help() {
    println!("mission-plan");
    println!("Usage: mission-plan [--plan PATH] [--save PATH] [--legacy|--structured] [--config PATH]");
    println!("       [--home LAT,LON,ALT] [--insert LAT,LON,ALT]... [--insert-survey LAT,LON,ALT]...");
    println!("       [--remove INDEX]... [--export-lines]");
    println!("       [--ground-station NAME] [--autopilot ID] [--hover-commands ID,ID,...]");
    println!("       [--survey-size M] [--survey-spacing M] [--survey-altitude M] [--survey-angle DEG]");
    println!("       [--acceptance-radius M]");
    println!("       [--edit-mode|--fly-mode] [--sim-vehicle] [--sim-latency-ms MS] [--upload]");
    println!("       [--log] [--no-log] [--log-level LEVEL] [--log-file PATH]");
    println!("Environment: MISSION_CONFIG overrides config path (default {DEFAULT_CONFIG_FILE})");
    println!("Environment: MISSION_PLAN_FILE/MISSION_SAVE_FILE/MISSION_SAVE_LEGACY select files");
    println!("Environment: MISSION_HOME sets the planned home position");
    println!("Environment: MISSION_HOVER_COMMANDS sets command ids counted as hover");
    println!("Environment: MISSION_SURVEY_SIZE_M/SPACING_M/ALTITUDE_M/ANGLE_DEG set survey defaults");
    println!("Environment: MISSION_ACCEPTANCE_RADIUS_M sets the default waypoint acceptance radius");
    println!("Environment: MISSION_EDIT_MODE/SIM_VEHICLE/SIM_LATENCY_MS control vehicle sync");
    println!("Environment: MISSION_LOG_ENABLED/LEVEL/FILE configure logging");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::{MAV_CMD_NAV_LAND, MAV_CMD_NAV_WAYPOINT};
    use crate::stats::SegmentKind;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        dir.push(format!("mission-plan-test-{suffix}"));
        let _ = fs::create_dir_all(&dir);
        dir.push(name);
        dir
    }

    fn base_config() -> Config {
        Config::defaults(PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = base_config();
        assert_eq!(cfg.ground_station, "QGroundControl");
        assert_eq!(cfg.autopilot, 3);
        assert_eq!(cfg.hover_commands, vec![21, 22, 84, 85, 17, 18, 19, 31]);
        assert!(cfg.edit_mode);
        assert_eq!(cfg.sim_latency_ms, 150);
        assert_eq!(cfg.save_format(), PlanFormat::Structured);
    }

    #[test]
    fn load_file_config_parses_values() {
        let path = temp_file("config.toml");
        let content = r#"
plan_file = "missions/field.plan"
save_legacy = true
ground_station = "TestStation"
autopilot = 12
hover_commands = [21, 22]
survey_spacing_m = 10.0
insert = ["47.1,8.2,30", "47.2,8.3"]
home = "47.0,8.0,400"
log_enabled = true
log_level = "debug"
"#;
        fs::write(&path, content).unwrap();
        let file = load_file_config(&path).unwrap().unwrap();
        assert_eq!(file.plan_file.as_deref(), Some("missions/field.plan"));
        assert_eq!(file.hover_commands, Some(vec![21, 22]));

        let mut cfg = base_config();
        apply_file_config(&mut cfg, file).unwrap();
        assert!(cfg.save_legacy);
        assert_eq!(cfg.ground_station, "TestStation");
        assert_eq!(cfg.autopilot, 12);
        assert_eq!(cfg.survey_spacing_m, 10.0);
        assert_eq!(cfg.insert.len(), 2);
        assert_eq!(cfg.insert[1], Coordinate::new(47.2, 8.3, 0.0));
        assert_eq!(cfg.home, Some(Coordinate::new(47.0, 8.0, 400.0)));
        assert!(cfg.log_enabled);
        assert_eq!(cfg.log_level, "debug");
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn apply_file_config_clamps() {
        let mut cfg = base_config();
        let file = FileConfig {
            survey_size_m: Some(0.0),
            survey_spacing_m: Some(0.01),
            default_acceptance_radius_m: Some(-3.0),
            sim_latency_ms: Some(1_000_000),
            ..Default::default()
        };
        apply_file_config(&mut cfg, file).unwrap();
        assert_eq!(cfg.survey_size_m, 1.0);
        assert_eq!(cfg.survey_spacing_m, 0.5);
        assert_eq!(cfg.default_acceptance_radius_m, 0.0);
        assert_eq!(cfg.sim_latency_ms, 60_000);
    }

    #[test]
    fn non_finite_file_values_are_rejected() {
        let content = "survey_altitude_m = nan\n";
        let file: FileConfig = toml::from_str(content).unwrap();
        let mut cfg = base_config();
        let err = apply_file_config(&mut cfg, file).unwrap_err();
        assert!(err.to_string().contains("survey_altitude_m"));
        assert_eq!(cfg.survey_altitude_m, DEFAULT_SURVEY_ALTITUDE_M);

        let file = FileConfig {
            survey_angle_deg: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(apply_file_config(&mut cfg, file).is_err());
        assert!(parse_f64("MISSION_SURVEY_SPACING_M", "inf").is_err());
        assert_eq!(parse_f64("MISSION_SURVEY_SPACING_M", " 12.5 ").unwrap(), 12.5);
    }

    #[test]
    fn bad_coordinate_in_file_is_an_error() {
        let mut cfg = base_config();
        let file = FileConfig {
            home: Some("north,east".to_string()),
            ..Default::default()
        };
        assert!(apply_file_config(&mut cfg, file).is_err());
    }

    #[test]
    fn cli_flags_override() {
        let path = temp_file("empty.toml");
        fs::write(&path, "").unwrap();
        let cfg = parse_from(&args(&[
            "--config",
            path.to_str().unwrap(),
            "--insert",
            "1,2,3",
            "--insert",
            "4,5,6",
            "--remove",
            "2",
            "--fly-mode",
            "--legacy",
            "--hover-commands",
            "16, 21",
        ]))
        .unwrap();
        assert_eq!(cfg.insert.len(), 2);
        assert_eq!(cfg.remove, vec![2]);
        assert!(!cfg.edit_mode);
        assert_eq!(cfg.save_format(), PlanFormat::Legacy);
        let classifier = cfg.plan_settings().classifier;
        assert_eq!(classifier.classify(MAV_CMD_NAV_WAYPOINT), SegmentKind::Hover);
        assert_eq!(classifier.classify(22), SegmentKind::Cruise);
        assert_eq!(classifier.classify(MAV_CMD_NAV_LAND), SegmentKind::Hover);
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = parse_from(&args(&["--config", "/nonexistent/mission-plan.toml"])).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn flag_errors() {
        let path = temp_file("empty.toml");
        fs::write(&path, "").unwrap();
        let config = path.to_str().unwrap();
        assert!(parse_from(&args(&["--config", config, "--insert"])).is_err());
        assert!(parse_from(&args(&["--config", config, "--bogus"])).is_err());
        assert!(parse_from(&args(&["--config", config, "--remove", "x"])).is_err());
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn coordinate_strings() {
        assert_eq!(
            parse_coordinate(" 47.5, 8.25 ,100").unwrap(),
            Coordinate::new(47.5, 8.25, 100.0)
        );
        assert_eq!(parse_coordinate("1,2").unwrap(), Coordinate::new(1.0, 2.0, 0.0));
        assert!(parse_coordinate("1").is_err());
        assert!(parse_coordinate("1,2,3,4").is_err());
        assert!(parse_coordinate("a,b").is_err());
    }
}
