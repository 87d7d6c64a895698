//! Survey (lawnmower) complex item.
//!
//! A survey owns a polygon and a grid description. Its child waypoints are never edited or
//! persisted directly; they are regenerated from the parameters whenever the plan recalculates.

use tracing::warn;

use crate::geo::{self, Coordinate};
use crate::mission::{
    MissionItem, MAV_CMD_DO_SET_CAM_TRIGG_DIST, MAV_FRAME_GLOBAL_RELATIVE_ALT, MAV_FRAME_MISSION,
};

pub const COMPLEX_TYPE_SURVEY: &str = "survey";

const MAX_TRANSECTS: usize = 500;

#[derive(Clone, Debug, PartialEq)]
pub struct SurveyParams {
    /// Polygon vertices; altitude is ignored.
    pub polygon: Vec<Coordinate>,
    /// Transect altitude relative to home, meters.
    pub altitude: f64,
    /// Distance between adjacent transects, meters.
    pub spacing: f64,
    /// Transect heading, degrees clockwise from east-west lines.
    pub angle_deg: f64,
    pub camera_trigger: bool,
    pub trigger_distance: f64,
}

/// Grid defaults applied to newly inserted surveys.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurveyDefaults {
    pub size_m: f64,
    pub spacing_m: f64,
    pub altitude_m: f64,
    pub angle_deg: f64,
}

impl Default for SurveyDefaults {
    fn default() -> Self {
        Self {
            size_m: 100.0,
            spacing_m: 20.0,
            altitude_m: 50.0,
            angle_deg: 0.0,
        }
    }
}

impl SurveyParams {
    /// Square survey of `defaults.size_m` centered on `center`.
    pub fn square(center: Coordinate, defaults: SurveyDefaults) -> Self {
        let half = defaults.size_m.max(0.0) / 2.0;
        let polygon = [(-half, -half), (half, -half), (half, half), (-half, half)]
            .iter()
            .map(|(east, north)| geo::from_local(center.with_alt(0.0), *east, *north))
            .collect();
        Self {
            polygon,
            altitude: defaults.altitude_m,
            spacing: defaults.spacing_m,
            angle_deg: defaults.angle_deg,
            camera_trigger: false,
            trigger_distance: 25.0,
        }
    }

    fn centroid(&self) -> Option<Coordinate> {
        if self.polygon.is_empty() {
            return None;
        }
        let n = self.polygon.len() as f64;
        let lat = self.polygon.iter().map(|c| c.lat).sum::<f64>() / n;
        let lon = self.polygon.iter().map(|c| c.lon).sum::<f64>() / n;
        Some(Coordinate::new(lat, lon, 0.0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComplexItem {
    /// Position the item was placed at; used for the path when there are no children.
    pub anchor: Coordinate,
    pub survey: SurveyParams,
    children: Vec<MissionItem>,
}

impl ComplexItem {
    pub fn new(anchor: Coordinate, survey: SurveyParams) -> Self {
        let mut item = Self {
            anchor,
            survey,
            children: Vec::new(),
        };
        item.regenerate();
        item
    }

    pub fn complex_type(&self) -> &'static str {
        COMPLEX_TYPE_SURVEY
    }

    pub fn children(&self) -> &[MissionItem] {
        &self.children
    }

    /// Number of sequence numbers this item occupies (at least one).
    pub fn sequence_span(&self) -> usize {
        self.children.len().max(1)
    }

    /// Replaces the child list from the current parameters. Returns true if it changed.
    pub fn regenerate(&mut self) -> bool {
        let children = build_children(&self.survey);
        if children == self.children {
            return false;
        }
        self.children = children;
        true
    }

    /// Moves the whole survey so the anchor lands on `coordinate`.
    pub fn translate_to(&mut self, coordinate: Coordinate) {
        let (east, north) = geo::to_local(self.anchor, coordinate);
        let anchor = self.anchor;
        for vertex in &mut self.survey.polygon {
            let (e, n) = geo::to_local(anchor, *vertex);
            *vertex = geo::from_local(anchor.with_alt(0.0), e + east, n + north);
        }
        self.anchor = coordinate;
    }
}

fn build_children(survey: &SurveyParams) -> Vec<MissionItem> {
    let transects = build_transects(survey);
    let mut children = Vec::with_capacity(transects.len() * 2 + 2);
    for (i, (entry, exit)) in transects.into_iter().enumerate() {
        children.push(survey_waypoint(entry, survey.altitude));
        if i == 0 && survey.camera_trigger {
            children.push(camera_trigger(survey.trigger_distance));
        }
        children.push(survey_waypoint(exit, survey.altitude));
    }
    if survey.camera_trigger && !children.is_empty() {
        children.push(camera_trigger(0.0));
    }
    children
}

fn survey_waypoint(coord: Coordinate, altitude: f64) -> MissionItem {
    let mut item = MissionItem::waypoint(0, coord.with_alt(altitude));
    item.frame = MAV_FRAME_GLOBAL_RELATIVE_ALT;
    item
}

fn camera_trigger(distance: f64) -> MissionItem {
    MissionItem {
        seq: 0,
        is_current: false,
        frame: MAV_FRAME_MISSION,
        command: MAV_CMD_DO_SET_CAM_TRIGG_DIST,
        params: [distance, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        autocontinue: true,
    }
}

/// Lawnmower transects clipped to the polygon, alternating direction.
fn build_transects(survey: &SurveyParams) -> Vec<(Coordinate, Coordinate)> {
    if survey.polygon.len() < 3 || !(survey.spacing.is_finite() && survey.spacing > 0.0) {
        return Vec::new();
    }
    let origin = match survey.centroid() {
        Some(origin) => origin,
        None => return Vec::new(),
    };

    let angle = survey.angle_deg.to_radians();
    let (sin_a, cos_a) = angle.sin_cos();
    // rotate into the grid frame, where transects are horizontal
    let points: Vec<(f64, f64)> = survey
        .polygon
        .iter()
        .map(|v| {
            let (e, n) = geo::to_local(origin, *v);
            (e * cos_a + n * sin_a, -e * sin_a + n * cos_a)
        })
        .collect();

    let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let height = max_y - min_y;
    if !height.is_finite() {
        return Vec::new();
    }

    let mut count = ((height / survey.spacing - 1e-9).ceil() as usize).max(1);
    if count > MAX_TRANSECTS {
        warn!(
            "survey spacing {:.2}m yields {count} transects, capping at {MAX_TRANSECTS}",
            survey.spacing
        );
        count = MAX_TRANSECTS;
    }
    let first_y = min_y + (height - (count - 1) as f64 * survey.spacing) / 2.0;

    let mut transects = Vec::with_capacity(count);
    let mut forward = true;
    for i in 0..count {
        let y = first_y + i as f64 * survey.spacing;
        let Some((x_min, x_max)) = clip_row(&points, y) else {
            continue;
        };
        let (x1, x2) = if forward { (x_min, x_max) } else { (x_max, x_min) };
        let to_geo = |x: f64| {
            let east = x * cos_a - y * sin_a;
            let north = x * sin_a + y * cos_a;
            geo::from_local(origin, east, north)
        };
        transects.push((to_geo(x1), to_geo(x2)));
        forward = !forward;
    }
    transects
}

fn clip_row(points: &[(f64, f64)], y: f64) -> Option<(f64, f64)> {
    let mut xs = Vec::new();
    for i in 0..points.len() {
        let (x1, y1) = points[i];
        let (x2, y2) = points[(i + 1) % points.len()];
        if (y1 <= y && y < y2) || (y2 <= y && y < y1) {
            let t = (y - y1) / (y2 - y1);
            xs.push(x1 + t * (x2 - x1));
        }
    }
    if xs.len() < 2 {
        return None;
    }
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}
