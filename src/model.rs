//! Structured (JSON) plan file format.
//!
//! Simple items are stored positionally (no sequence numbers); complex items carry only the
//! parameters needed to regenerate their children plus their top-level position in the plan.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{PlanError, PlanResult};
use crate::geo::Coordinate;
use crate::mission::{MissionItem, MAV_FRAME_GLOBAL_RELATIVE_ALT};
use crate::plan::{validate_coordinate, PlanModel, PlanSettings, VisualKind};
use crate::survey::{SurveyParams, COMPLEX_TYPE_SURVEY};

pub const PLAN_FILE_VERSION: &str = "1.0";
pub const SUPPORTED_MAJOR_VERSION: u32 = 1;
pub const DEFAULT_GROUND_STATION: &str = "QGroundControl";
/// MAV_AUTOPILOT_ARDUPILOTMEGA
pub const DEFAULT_AUTOPILOT: i64 = 3;

const SIMPLE_ITEM_TYPE: &str = "SimpleItem";
const COMPLEX_ITEM_TYPE: &str = "ComplexItem";

/// Identification written into the file header.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanHeader {
    pub ground_station: String,
    pub autopilot: i64,
}

impl Default for PlanHeader {
    fn default() -> Self {
        Self {
            ground_station: DEFAULT_GROUND_STATION.to_string(),
            autopilot: DEFAULT_AUTOPILOT,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlanFile {
    #[serde(deserialize_with = "de_version")]
    pub version: String,
    #[serde(rename = "groundStation", default)]
    pub ground_station: String,
    #[serde(
        rename = "MAV_AUTOPILOT",
        default,
        deserialize_with = "de_opt_i64_from_any"
    )]
    pub autopilot: Option<i64>,
    #[serde(rename = "plannedHomePosition", default)]
    pub planned_home: Option<HomeRecord>,
    #[serde(default)]
    pub items: Vec<SimpleItemRecord>,
    #[serde(rename = "complexItems", default)]
    pub complex_items: Vec<ComplexItemRecord>,
}

/// Home is written as a bare coordinate; the older item-shaped form is still accepted.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HomeRecord {
    Coordinate(Vec<f64>),
    Item { coordinate: Vec<f64> },
}

impl HomeRecord {
    fn values(&self) -> &[f64] {
        match self {
            HomeRecord::Coordinate(values) => values,
            HomeRecord::Item { coordinate } => coordinate,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimpleItemRecord {
    #[serde(rename = "type", default = "simple_item_type")]
    pub kind: String,
    #[serde(rename = "autoContinue", default = "default_true")]
    pub auto_continue: bool,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub command: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub frame: Option<i64>,
    /// param1..param4; `null` stands for an unset (NaN) value.
    #[serde(default)]
    pub params: Vec<Option<f64>>,
    #[serde(default)]
    pub coordinate: Option<Vec<f64>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ComplexItemRecord {
    #[serde(rename = "type", default = "complex_item_type")]
    pub kind: String,
    #[serde(rename = "complexItemType")]
    pub complex_type: String,
    /// Top-level index in the plan (home is 0).
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub position: Option<i64>,
    pub anchor: Vec<f64>,
    #[serde(default)]
    pub polygon: Vec<Vec<f64>>,
    pub grid: GridRecord,
    #[serde(rename = "cameraTrigger", default)]
    pub camera_trigger: bool,
    #[serde(
        rename = "cameraTriggerDistance",
        default,
        deserialize_with = "de_opt_f64_from_any"
    )]
    pub trigger_distance: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GridRecord {
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub altitude: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub spacing: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub angle: Option<f64>,
}

/// Serializes the plan (home, simple items, complex item parameters) as pretty JSON.
pub fn to_json(plan: &PlanModel, header: &PlanHeader) -> PlanResult<String> {
    let home = plan.home_position();
    let mut items = Vec::new();
    let mut complex_items = Vec::new();
    for (position, visual) in plan.items().iter().enumerate().skip(1) {
        match visual.kind() {
            VisualKind::Simple(item) => items.push(simple_record(item)),
            VisualKind::Complex(complex) => complex_items.push(ComplexItemRecord {
                kind: complex_item_type(),
                complex_type: complex.complex_type().to_string(),
                position: i64::try_from(position).ok(),
                anchor: vec![complex.anchor.lat, complex.anchor.lon, complex.anchor.alt],
                polygon: complex
                    .survey
                    .polygon
                    .iter()
                    .map(|v| vec![v.lat, v.lon])
                    .collect(),
                grid: GridRecord {
                    altitude: Some(complex.survey.altitude),
                    spacing: Some(complex.survey.spacing),
                    angle: Some(complex.survey.angle_deg),
                },
                camera_trigger: complex.survey.camera_trigger,
                trigger_distance: Some(complex.survey.trigger_distance),
            }),
        }
    }

    let file = PlanFile {
        version: PLAN_FILE_VERSION.to_string(),
        ground_station: header.ground_station.clone(),
        autopilot: Some(header.autopilot),
        planned_home: Some(HomeRecord::Coordinate(vec![home.lat, home.lon, home.alt])),
        items,
        complex_items,
    };
    serde_json::to_string_pretty(&file).map_err(|err| PlanError::Io(err.into()))
}

/// Parses a structured plan into a fresh model built through the regular insert operations.
pub fn from_json(text: &str, settings: PlanSettings) -> PlanResult<PlanModel> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| PlanError::parse_at(err.line(), err.to_string()))?;
    check_version(&value)?;
    let file: PlanFile = serde_json::from_value(value)
        .map_err(|err| PlanError::parse(format!("invalid plan structure: {err}")))?;
    debug!(
        "plan file from {:?}: {} simple, {} complex items",
        file.ground_station,
        file.items.len(),
        file.complex_items.len()
    );

    let home = match &file.planned_home {
        Some(record) => coordinate_from(record.values(), "plannedHomePosition")?,
        None => Coordinate::default(),
    };
    let home = validate_coordinate(home)
        .map_err(|err| PlanError::parse(format!("plannedHomePosition: {err}")))?;
    let mut plan = PlanModel::new(home, settings);

    let simple: Vec<MissionItem> = file
        .items
        .iter()
        .enumerate()
        .map(|(i, record)| mission_item_from(i, record))
        .collect::<PlanResult<_>>()?;
    let complex: Vec<(Coordinate, SurveyParams)> = file
        .complex_items
        .iter()
        .enumerate()
        .map(|(i, record)| survey_from(i, record))
        .collect::<PlanResult<_>>()?;
    let positions: Vec<Option<i64>> = file.complex_items.iter().map(|c| c.position).collect();

    for slot in interleave(simple.len(), &positions) {
        let end = plan.len();
        match slot {
            Slot::Simple(i) => plan
                .insert_mission_item(simple[i].clone(), end)
                .map_err(|err| PlanError::parse(format!("items[{i}]: {err}")))?,
            Slot::Complex(i) => {
                let (anchor, survey) = complex[i].clone();
                plan.insert_survey(anchor, survey, end)
                    .map_err(|err| PlanError::parse(format!("complexItems[{i}]: {err}")))?
            }
        };
    }
    plan.drain_events();
    Ok(plan)
}

fn check_version(value: &Value) -> PlanResult<()> {
    let found = match value.get("version") {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(other) => return Err(PlanError::parse(format!("invalid version value {other}"))),
        None => return Err(PlanError::parse("missing version")),
    };
    let major = found
        .split('.')
        .next()
        .and_then(|major| major.trim().parse::<u32>().ok());
    match major {
        Some(SUPPORTED_MAJOR_VERSION) => Ok(()),
        _ => Err(PlanError::Version {
            found,
            supported: SUPPORTED_MAJOR_VERSION,
        }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Simple(usize),
    Complex(usize),
}

/// Merges the two stored lists back into plan order. Complex items without a usable position
/// go after everything else.
fn interleave(simple_count: usize, positions: &[Option<i64>]) -> Vec<Slot> {
    let total = simple_count + positions.len();
    let mut placed: Vec<Option<Slot>> = vec![None; total];
    let mut leftovers = Vec::new();
    for (i, position) in positions.iter().enumerate() {
        let index = position
            .and_then(|p| usize::try_from(p).ok())
            .filter(|p| (1..=total).contains(p));
        match index {
            Some(p) if placed[p - 1].is_none() => placed[p - 1] = Some(Slot::Complex(i)),
            _ => leftovers.push(i),
        }
    }
    let mut fill = (0..simple_count)
        .map(Slot::Simple)
        .chain(leftovers.into_iter().map(Slot::Complex));
    placed
        .into_iter()
        .filter_map(|slot| slot.or_else(|| fill.next()))
        .collect()
}

fn simple_record(item: &MissionItem) -> SimpleItemRecord {
    let coordinate = item.coordinate();
    SimpleItemRecord {
        kind: simple_item_type(),
        auto_continue: item.autocontinue,
        command: Some(i64::from(item.command)),
        frame: Some(i64::from(item.frame)),
        params: item
            .command_params()
            .iter()
            .map(|p| if p.is_nan() { None } else { Some(*p) })
            .collect(),
        coordinate: Some(vec![coordinate.lat, coordinate.lon, coordinate.alt]),
    }
}

fn mission_item_from(index: usize, record: &SimpleItemRecord) -> PlanResult<MissionItem> {
    let at = |message: String| PlanError::parse(format!("items[{index}]: {message}"));
    if record.kind != SIMPLE_ITEM_TYPE {
        return Err(at(format!("unexpected item type {:?}", record.kind)));
    }
    let command = record
        .command
        .ok_or_else(|| at("missing command".to_string()))?;
    let command = u16::try_from(command).map_err(|_| at(format!("command {command} out of range")))?;
    let frame = match record.frame {
        Some(frame) => {
            u8::try_from(frame).map_err(|_| at(format!("frame {frame} out of range")))?
        }
        None => MAV_FRAME_GLOBAL_RELATIVE_ALT,
    };
    if record.params.len() > 4 {
        return Err(at(format!(
            "expected at most 4 params, found {}",
            record.params.len()
        )));
    }
    let mut params = [0.0; 4];
    for (slot, value) in params.iter_mut().zip(&record.params) {
        *slot = value.unwrap_or(f64::NAN);
    }
    let coordinate = match &record.coordinate {
        Some(values) => coordinate_from(values, &format!("items[{index}].coordinate"))?,
        None => Coordinate::default(),
    };

    let mut item = MissionItem::waypoint(0, coordinate);
    item.command = command;
    item.frame = frame;
    item.autocontinue = record.auto_continue;
    item.set_command_params(params);
    if item.specifies_coordinate() && record.coordinate.is_none() {
        return Err(at(format!("command {command} requires a coordinate")));
    }
    Ok(item)
}

fn survey_from(index: usize, record: &ComplexItemRecord) -> PlanResult<(Coordinate, SurveyParams)> {
    let at = |message: String| PlanError::parse(format!("complexItems[{index}]: {message}"));
    if record.kind != COMPLEX_ITEM_TYPE {
        return Err(at(format!("unexpected item type {:?}", record.kind)));
    }
    if record.complex_type != COMPLEX_TYPE_SURVEY {
        return Err(at(format!(
            "unsupported complex item type {:?}",
            record.complex_type
        )));
    }
    let anchor = coordinate_from(&record.anchor, &format!("complexItems[{index}].anchor"))?;
    let polygon = record
        .polygon
        .iter()
        .map(|vertex| coordinate_from(vertex, &format!("complexItems[{index}].polygon")))
        .collect::<PlanResult<Vec<_>>>()?;
    let altitude = record
        .grid
        .altitude
        .ok_or_else(|| at("grid.altitude is required".to_string()))?;
    let spacing = record
        .grid
        .spacing
        .ok_or_else(|| at("grid.spacing is required".to_string()))?;
    Ok((
        anchor,
        SurveyParams {
            polygon,
            altitude,
            spacing,
            angle_deg: record.grid.angle.unwrap_or(0.0),
            camera_trigger: record.camera_trigger,
            trigger_distance: record.trigger_distance.unwrap_or(0.0),
        },
    ))
}

fn coordinate_from(values: &[f64], what: &str) -> PlanResult<Coordinate> {
    match values {
        [lat, lon] => Ok(Coordinate::new(*lat, *lon, 0.0)),
        [lat, lon, alt] => Ok(Coordinate::new(*lat, *lon, *alt)),
        _ => Err(PlanError::parse(format!(
            "{what}: expected [lat, lon, alt], found {} values",
            values.len()
        ))),
    }
}

fn simple_item_type() -> String {
    SIMPLE_ITEM_TYPE.to_string()
}

fn complex_item_type() -> String {
    COMPLEX_ITEM_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

fn de_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected version string, got {other}"
        ))),
    }
}

fn de_opt_i64_from_any<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                Ok(Some(value))
            } else if let Some(value) = number.as_f64().filter(|v| v.fract() == 0.0) {
                Ok(Some(value as i64))
            } else {
                Err(serde::de::Error::custom(format!(
                    "expected integer, got {number}"
                )))
            }
        }
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| serde::de::Error::custom(format!("expected integer, got {text:?}")))
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

fn de_opt_f64_from_any<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected float-compatible number")),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| serde::de::Error::custom(format!("expected number, got {text:?}")))
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}
