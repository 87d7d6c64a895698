use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::PlanResult;
use crate::legacy;
use crate::model::{self, PlanHeader};
use crate::plan::{PlanModel, PlanSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanFormat {
    Structured,
    Legacy,
}

impl PlanFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "plan" | "mission" | "json" => Some(PlanFormat::Structured),
            "waypoints" | "txt" => Some(PlanFormat::Legacy),
            _ => None,
        }
    }

    /// Content wins over the extension; a legacy extension without a legacy header still
    /// goes to the legacy parser so the header error is reported.
    pub fn detect(path: &Path, text: &str) -> Self {
        if legacy::looks_like_legacy(text) {
            return PlanFormat::Legacy;
        }
        Self::from_path(path).unwrap_or(PlanFormat::Structured)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanFormat::Structured => "structured",
            PlanFormat::Legacy => "legacy",
        }
    }
}

/// Parses `text` in the given format into a new model. The caller's plan is never touched.
pub fn parse_plan(text: &str, format: PlanFormat, settings: PlanSettings) -> PlanResult<PlanModel> {
    match format {
        PlanFormat::Structured => model::from_json(text, settings),
        PlanFormat::Legacy => legacy::from_legacy(text, settings),
    }
}

pub fn render_plan(plan: &PlanModel, format: PlanFormat, header: &PlanHeader) -> PlanResult<String> {
    match format {
        PlanFormat::Structured => model::to_json(plan, header),
        PlanFormat::Legacy => Ok(legacy::to_legacy(plan)),
    }
}

pub fn load_plan(path: &Path, settings: PlanSettings) -> PlanResult<PlanModel> {
    let text = fs::read_to_string(path)?;
    let format = PlanFormat::detect(path, &text);
    debug!("loading {} as {} plan", path.display(), format.as_str());
    let plan = parse_plan(&text, format, settings)?;
    info!(
        "loaded {} items from {}",
        plan.len().saturating_sub(1),
        path.display()
    );
    Ok(plan)
}

pub fn save_plan(
    path: &Path,
    plan: &PlanModel,
    format: PlanFormat,
    header: &PlanHeader,
) -> PlanResult<()> {
    let content = render_plan(plan, format, header)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    info!("saved {} plan to {}", format.as_str(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanError;
    use crate::geo::Coordinate;
    use std::path::PathBuf;
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

    fn sample() -> PlanModel {
        let mut plan = PlanModel::new(Coordinate::new(47.0, 8.0, 400.0), PlanSettings::default());
        plan.insert_simple(Coordinate::new(47.001, 8.0, 30.0), 1).unwrap();
        plan.insert_simple(Coordinate::new(47.001, 8.002, 30.0), 2).unwrap();
        plan
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            PlanFormat::from_path(Path::new("a.plan")),
            Some(PlanFormat::Structured)
        );
        assert_eq!(
            PlanFormat::from_path(Path::new("a.WAYPOINTS")),
            Some(PlanFormat::Legacy)
        );
        assert_eq!(PlanFormat::from_path(Path::new("a")), None);
        assert_eq!(
            PlanFormat::detect(Path::new("a.plan"), "QGC WPL 110\n"),
            PlanFormat::Legacy
        );
        assert_eq!(
            PlanFormat::detect(Path::new("a.txt"), "{}"),
            PlanFormat::Legacy
        );
        assert_eq!(
            PlanFormat::detect(Path::new("noext"), "{}"),
            PlanFormat::Structured
        );
    }

    #[test]
    fn structured_file_roundtrip() {
        let path = temp_file("mission.plan");
        let plan = sample();
        save_plan(&path, &plan, PlanFormat::Structured, &PlanHeader::default()).unwrap();
        let loaded = load_plan(&path, PlanSettings::default()).unwrap();
        assert_eq!(loaded.mission_items(), plan.mission_items());
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn legacy_file_roundtrip() {
        let path = temp_file("mission.waypoints");
        let plan = sample();
        save_plan(&path, &plan, PlanFormat::Legacy, &PlanHeader::default()).unwrap();
        let loaded = load_plan(&path, PlanSettings::default()).unwrap();
        assert_eq!(loaded.mission_items(), plan.mission_items());
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = temp_file("absent.plan");
        let err = load_plan(&path, PlanSettings::default()).unwrap_err();
        assert!(matches!(err, PlanError::Io(_)));
        let _ = fs::remove_dir(path.parent().unwrap());
    }
}
