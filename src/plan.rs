//! Ordered mission plan and its recalculation pipeline.
//!
//! Index 0 of the item list is always the planned home position. Every mutation goes through
//! [`PlanModel`], which re-derives sequence numbers, complex-item children, connecting lines
//! and statistics before queuing a single batch of [`PlanEvent`]s.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, trace};

use crate::error::{PlanError, PlanResult};
use crate::geo::{self, Coordinate};
use crate::lines::{LineCache, NodeKey, PathNode, WaypointLine};
use crate::mission::{
    MavCmd, MavFrame, MissionItem, MAV_CMD_NAV_WAYPOINT, MAV_FRAME_GLOBAL,
    MAV_FRAME_GLOBAL_RELATIVE_ALT,
};
use crate::stats::{self, Leg, MissionStatistics, SegmentClassifier};
use crate::survey::{ComplexItem, SurveyDefaults, SurveyParams};

/// Stable handle of a top-level item. Never reused within one model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub enum VisualKind {
    Simple(MissionItem),
    Complex(ComplexItem),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisualItem {
    id: ItemId,
    sequence: usize,
    kind: VisualKind,
}

impl VisualItem {
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// First sequence number occupied by this item.
    pub fn sequence_number(&self) -> usize {
        self.sequence
    }

    pub fn kind(&self) -> &VisualKind {
        &self.kind
    }

    pub fn is_simple(&self) -> bool {
        matches!(self.kind, VisualKind::Simple(_))
    }

    pub fn as_simple(&self) -> Option<&MissionItem> {
        match &self.kind {
            VisualKind::Simple(item) => Some(item),
            VisualKind::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexItem> {
        match &self.kind {
            VisualKind::Complex(item) => Some(item),
            VisualKind::Simple(_) => None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        match &self.kind {
            VisualKind::Simple(item) => item.coordinate(),
            VisualKind::Complex(item) => item.anchor,
        }
    }

    /// Mission items this entry contributes to the flattened plan.
    pub fn expand(&self) -> Vec<MissionItem> {
        match &self.kind {
            VisualKind::Simple(item) => vec![item.clone()],
            VisualKind::Complex(item) => item.children().to_vec(),
        }
    }

    fn sequence_span(&self) -> usize {
        match &self.kind {
            VisualKind::Simple(_) => 1,
            VisualKind::Complex(item) => item.sequence_span(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Home,
    Simple,
    /// Synthesized child of a complex item.
    Child,
    /// Stand-in for a complex item without children.
    Anchor,
}

/// Figures derived for a path entry relative to its predecessor and to home.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ItemMetrics {
    pub distance: f64,
    pub azimuth: f64,
    /// Absolute altitude change from the previous path entry.
    pub altitude_delta: f64,
    pub home_distance: f64,
}

/// One entry of the fully expanded item stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamEntry {
    pub seq: usize,
    pub key: NodeKey,
    pub kind: EntryKind,
    pub item: MissionItem,
    pub on_path: bool,
    pub metrics: ItemMetrics,
}

/// Change notifications, queued only after a recalculation has completed.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanEvent {
    ItemsChanged,
    LinesChanged,
    StatisticsChanged(MissionStatistics),
    HomePositionChanged(Coordinate),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlanSettings {
    pub classifier: SegmentClassifier,
    pub survey: SurveyDefaults,
    /// param2 for new waypoints when no earlier waypoint sets one.
    pub acceptance_radius: f64,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            classifier: SegmentClassifier::default(),
            survey: SurveyDefaults::default(),
            acceptance_radius: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PlanModel {
    items: Vec<VisualItem>,
    stream: Vec<StreamEntry>,
    lines: Vec<WaypointLine>,
    cache: LineCache,
    stats: MissionStatistics,
    settings: PlanSettings,
    next_id: u64,
    emitted_home: Coordinate,
    events: VecDeque<PlanEvent>,
}

impl Default for PlanModel {
    fn default() -> Self {
        Self::new(Coordinate::default(), PlanSettings::default())
    }
}

impl PlanModel {
    pub fn new(home: Coordinate, settings: PlanSettings) -> Self {
        let home = geo::normalized(home);
        let mut home_item = MissionItem::waypoint(0, home);
        home_item.frame = MAV_FRAME_GLOBAL;
        let mut model = Self {
            items: vec![VisualItem {
                id: ItemId(0),
                sequence: 0,
                kind: VisualKind::Simple(home_item),
            }],
            stream: Vec::new(),
            lines: Vec::new(),
            cache: LineCache::new(),
            stats: MissionStatistics::default(),
            settings,
            next_id: 1,
            emitted_home: home,
            events: VecDeque::new(),
        };
        model.recalc(false);
        model.events.clear();
        model
    }

    /// Builds a plan from a flat vehicle/legacy list whose first entry is home.
    pub fn from_mission_items(items: &[MissionItem], settings: PlanSettings) -> PlanResult<Self> {
        let home = items
            .first()
            .map(MissionItem::coordinate)
            .unwrap_or_default();
        let mut model = Self::new(validate_coordinate(home)?, settings);
        for item in items.iter().skip(1) {
            let end = model.items.len();
            model.insert_mission_item(item.clone(), end)?;
        }
        model.events.clear();
        Ok(model)
    }

    pub fn settings(&self) -> &PlanSettings {
        &self.settings
    }

    /// Top-level items, home first.
    pub fn items(&self) -> &[VisualItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when only the home position is present.
    pub fn is_empty(&self) -> bool {
        self.items.len() == 1
    }

    pub fn stream(&self) -> &[StreamEntry] {
        &self.stream
    }

    pub fn lines(&self) -> &[WaypointLine] {
        &self.lines
    }

    pub fn statistics(&self) -> MissionStatistics {
        self.stats
    }

    pub fn home_position(&self) -> Coordinate {
        self.items[0].coordinate()
    }

    pub fn line_cache(&self) -> &LineCache {
        &self.cache
    }

    pub fn drain_events(&mut self) -> Vec<PlanEvent> {
        self.events.drain(..).collect()
    }

    /// Inserts a waypoint at `index` (clamped to [1, len]) and returns its sequence number.
    pub fn insert_simple(&mut self, coordinate: Coordinate, index: usize) -> PlanResult<usize> {
        let coordinate = validate_coordinate(coordinate)?;
        let index = self.clamp_insert_index(index);
        let mut item = MissionItem::waypoint(0, coordinate);
        item.frame = self
            .last_path_frame(index)
            .unwrap_or(MAV_FRAME_GLOBAL_RELATIVE_ALT);
        item.params[1] = self
            .last_acceptance_radius(index)
            .unwrap_or(self.settings.acceptance_radius);
        Ok(self.insert_visual(VisualKind::Simple(item), index))
    }

    /// Inserts a fully specified simple item, as produced by a loader or the vehicle.
    pub fn insert_mission_item(&mut self, item: MissionItem, index: usize) -> PlanResult<usize> {
        let mut item = item;
        if item.specifies_coordinate() {
            item.set_coordinate(validate_coordinate(item.coordinate())?);
        }
        item.is_current = false;
        let index = self.clamp_insert_index(index);
        Ok(self.insert_visual(VisualKind::Simple(item), index))
    }

    /// Inserts a survey with the default square parameterization centered on `coordinate`.
    pub fn insert_complex(&mut self, coordinate: Coordinate, index: usize) -> PlanResult<usize> {
        let coordinate = validate_coordinate(coordinate)?;
        let survey = SurveyParams::square(coordinate, self.settings.survey);
        self.insert_survey(coordinate, survey, index)
    }

    pub fn insert_survey(
        &mut self,
        anchor: Coordinate,
        survey: SurveyParams,
        index: usize,
    ) -> PlanResult<usize> {
        let anchor = validate_coordinate(anchor)?;
        for vertex in &survey.polygon {
            validate_coordinate(*vertex)?;
        }
        let index = self.clamp_insert_index(index);
        Ok(self.insert_visual(VisualKind::Complex(ComplexItem::new(anchor, survey)), index))
    }

    pub fn remove(&mut self, index: usize) -> PlanResult<()> {
        self.check_editable_index(index)?;
        let removed = self.items.remove(index);
        let evicted = self.cache.evict_item(removed.id);
        debug!(
            "removed item {:?} at index {index} ({evicted} lines evicted)",
            removed.id
        );
        self.recalc(true);
        Ok(())
    }

    /// Clears every item except home.
    pub fn remove_all(&mut self) {
        self.items.truncate(1);
        self.cache.clear();
        debug!("removed all items");
        self.recalc(true);
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> PlanResult<()> {
        self.check_editable_index(from)?;
        self.check_editable_index(to)?;
        if from == to {
            return Ok(());
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.recalc(true);
        Ok(())
    }

    pub fn set_home_position(&mut self, coordinate: Coordinate) -> PlanResult<()> {
        let coordinate = validate_coordinate(coordinate)?;
        self.modify_item(0, |kind| match kind {
            VisualKind::Simple(item) => {
                item.set_coordinate(coordinate);
                Ok(FieldChange::Coordinate)
            }
            VisualKind::Complex(_) => Err(PlanError::validation("home must be a simple item")),
        })
    }

    pub fn set_coordinate(&mut self, index: usize, coordinate: Coordinate) -> PlanResult<()> {
        if index == 0 {
            return self.set_home_position(coordinate);
        }
        let coordinate = validate_coordinate(coordinate)?;
        self.modify_item(index, |kind| {
            match kind {
                VisualKind::Simple(item) => item.set_coordinate(coordinate),
                VisualKind::Complex(item) => item.translate_to(coordinate),
            }
            Ok(FieldChange::Coordinate)
        })
    }

    pub fn set_command(&mut self, index: usize, command: MavCmd) -> PlanResult<()> {
        self.check_editable_index(index)?;
        self.modify_item(index, |kind| {
            simple_mut(kind)?.command = command;
            Ok(FieldChange::Shape)
        })
    }

    pub fn set_params(&mut self, index: usize, params: [f64; 4]) -> PlanResult<()> {
        self.check_editable_index(index)?;
        // NaN marks an unset parameter
        if params.iter().any(|p| p.is_infinite()) {
            return Err(PlanError::validation("command parameters must not be infinite"));
        }
        self.modify_item(index, |kind| {
            simple_mut(kind)?.set_command_params(params);
            Ok(FieldChange::Other)
        })
    }

    pub fn set_frame(&mut self, index: usize, frame: MavFrame) -> PlanResult<()> {
        self.check_editable_index(index)?;
        self.modify_item(index, |kind| {
            simple_mut(kind)?.frame = frame;
            Ok(FieldChange::Other)
        })
    }

    pub fn set_autocontinue(&mut self, index: usize, autocontinue: bool) -> PlanResult<()> {
        self.check_editable_index(index)?;
        self.modify_item(index, |kind| {
            simple_mut(kind)?.autocontinue = autocontinue;
            Ok(FieldChange::Other)
        })
    }

    pub fn set_survey(&mut self, index: usize, survey: SurveyParams) -> PlanResult<()> {
        self.check_editable_index(index)?;
        for vertex in &survey.polygon {
            validate_coordinate(*vertex)?;
        }
        self.modify_item(index, |kind| match kind {
            VisualKind::Complex(item) => {
                item.survey = survey;
                Ok(FieldChange::Shape)
            }
            VisualKind::Simple(_) => Err(PlanError::validation("item is not a complex item")),
        })
    }

    /// Replaces this plan's content with `other`'s, keeping this model's settings and queue.
    pub fn adopt(&mut self, other: PlanModel) {
        self.items = other.items;
        self.next_id = other.next_id;
        self.cache.clear();
        self.recalc(true);
    }

    /// Flattened items for upload, home first, renumbered contiguously.
    pub fn mission_items(&self) -> Vec<MissionItem> {
        let mut out = Vec::with_capacity(self.stream.len());
        for entry in self.stream.iter().filter(|e| e.kind != EntryKind::Anchor) {
            let mut item = entry.item.clone();
            item.seq = to_seq(out.len());
            out.push(item);
        }
        out
    }

    /// Re-runs the full pipeline. Queues events only for values that actually changed.
    pub fn recalculate(&mut self) {
        self.recalc(false);
    }

    fn insert_visual(&mut self, kind: VisualKind, index: usize) -> usize {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.items.insert(
            index,
            VisualItem {
                id,
                sequence: 0,
                kind,
            },
        );
        self.recalc(true);
        let seq = self.items[index].sequence;
        debug!("inserted item {id:?} at index {index}, sequence {seq}");
        seq
    }

    /// Applies an edit to one item, then invalidates what the edit can have touched.
    fn modify_item<F>(&mut self, index: usize, edit: F) -> PlanResult<()>
    where
        F: FnOnce(&mut VisualKind) -> PlanResult<FieldChange>,
    {
        let item = self
            .items
            .get_mut(index)
            .ok_or_else(|| PlanError::validation(format!("no item at index {index}")))?;
        let mut kind = item.kind.clone();
        let change = edit(&mut kind)?;
        item.kind = kind;
        let id = item.id;
        self.on_item_field_changed(id, change);
        Ok(())
    }

    fn on_item_field_changed(&mut self, id: ItemId, change: FieldChange) {
        if change == FieldChange::Coordinate || change == FieldChange::Shape {
            let is_complex = self
                .items
                .iter()
                .find(|item| item.id == id)
                .is_some_and(|item| !item.is_simple());
            let dropped = if is_complex {
                self.cache.evict_item(id)
            } else {
                self.cache.invalidate_node(NodeKey::item(id))
            };
            trace!("item {id:?} changed ({change:?}), {dropped} lines invalidated");
        }
        self.recalc(true);
    }

    fn recalc(&mut self, items_touched: bool) {
        for item in &mut self.items {
            if let VisualKind::Complex(complex) = &mut item.kind {
                if complex.regenerate() {
                    self.cache.evict_item(item.id);
                }
            }
        }

        let stream = self.build_stream();
        let home = self.home_position();
        let (stream, lines, legs) = self.connect(stream, home);
        let points: Vec<Coordinate> = stream
            .iter()
            .filter(|e| e.on_path && e.kind != EntryKind::Home)
            .map(|e| e.item.coordinate())
            .collect();
        let stats = stats::aggregate(home, &legs, points, &self.settings.classifier);

        if items_touched || stream != self.stream {
            self.events.push_back(PlanEvent::ItemsChanged);
        }
        if lines != self.lines {
            self.events.push_back(PlanEvent::LinesChanged);
        }
        if stats != self.stats {
            self.events.push_back(PlanEvent::StatisticsChanged(stats));
        }
        if home != self.emitted_home {
            self.events.push_back(PlanEvent::HomePositionChanged(home));
            self.emitted_home = home;
        }

        debug!(
            "recalculated: {} items, {} stream entries, {} lines, {:.1}m total",
            self.items.len(),
            stream.len(),
            lines.len(),
            stats.total_distance
        );
        self.stream = stream;
        self.lines = lines;
        self.stats = stats;
    }

    /// Assigns contiguous sequence numbers across the expanded stream.
    fn build_stream(&mut self) -> Vec<StreamEntry> {
        let mut stream = Vec::with_capacity(self.items.len());
        let mut seq = 0usize;
        for (index, item) in self.items.iter_mut().enumerate() {
            item.sequence = seq;
            match &item.kind {
                VisualKind::Simple(mission) => {
                    let kind = if index == 0 {
                        EntryKind::Home
                    } else {
                        EntryKind::Simple
                    };
                    stream.push(entry(seq, NodeKey::item(item.id), kind, mission.clone()));
                }
                VisualKind::Complex(complex) if complex.children().is_empty() => {
                    let anchor = MissionItem::waypoint(0, complex.anchor);
                    stream.push(entry(seq, NodeKey::item(item.id), EntryKind::Anchor, anchor));
                }
                VisualKind::Complex(complex) => {
                    for (i, child) in complex.children().iter().enumerate() {
                        stream.push(entry(
                            seq + i,
                            NodeKey::child(item.id, i),
                            EntryKind::Child,
                            child.clone(),
                        ));
                    }
                }
            }
            seq += item.sequence_span();
        }
        stream
    }

    /// Connects consecutive path entries through the line cache and fills per-entry metrics.
    fn connect(
        &mut self,
        mut stream: Vec<StreamEntry>,
        home: Coordinate,
    ) -> (Vec<StreamEntry>, Vec<WaypointLine>, Vec<Leg>) {
        let path: Vec<usize> = stream
            .iter()
            .enumerate()
            .filter(|(_, e)| e.on_path)
            .map(|(i, _)| i)
            .collect();
        let nodes: Vec<PathNode> = path
            .iter()
            .map(|&i| PathNode {
                key: stream[i].key,
                coordinate: stream[i].item.coordinate(),
            })
            .collect();

        let live: HashSet<_> = nodes.windows(2).map(|w| (w[0].key, w[1].key)).collect();
        self.cache.retain_pairs(&live);

        let mut lines = Vec::with_capacity(live.len());
        let mut legs = Vec::with_capacity(live.len());
        for (pos, pair) in nodes.windows(2).enumerate() {
            let line = self.cache.line(pair[0], pair[1]);
            let prev = &stream[path[pos]].item;
            let dest_index = path[pos + 1];
            let dest = &stream[dest_index].item;
            let altitude_delta = geo::altitude_delta(
                prev.coordinate().with_alt(absolute_altitude(prev, home.alt)),
                dest.coordinate().with_alt(absolute_altitude(dest, home.alt)),
            );
            let destination = dest.command;
            stream[dest_index].metrics = ItemMetrics {
                distance: line.distance,
                azimuth: line.bearing,
                altitude_delta,
                home_distance: geo::distance(home, pair[1].coordinate),
            };
            legs.push(Leg { line, destination });
            lines.push(line);
        }
        (stream, lines, legs)
    }

    fn clamp_insert_index(&self, index: usize) -> usize {
        index.clamp(1, self.items.len())
    }

    fn check_editable_index(&self, index: usize) -> PlanResult<()> {
        if index == 0 {
            return Err(PlanError::validation(
                "the home position cannot be removed or reordered",
            ));
        }
        if index >= self.items.len() {
            return Err(PlanError::validation(format!(
                "index {index} out of range (plan has {} items)",
                self.items.len()
            )));
        }
        Ok(())
    }

    fn last_path_frame(&self, before: usize) -> Option<MavFrame> {
        self.items[1..before]
            .iter()
            .rev()
            .filter_map(VisualItem::as_simple)
            .find(|item| item.on_flight_path())
            .map(|item| item.frame)
    }

    fn last_acceptance_radius(&self, before: usize) -> Option<f64> {
        self.items[1..before]
            .iter()
            .rev()
            .filter_map(VisualItem::as_simple)
            .find(|item| item.command == MAV_CMD_NAV_WAYPOINT)
            .map(|item| item.params[1])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldChange {
    /// Position moved; incident lines are stale.
    Coordinate,
    /// Command or shape changed; the item's path contribution may differ.
    Shape,
    Other,
}

fn entry(seq: usize, key: NodeKey, kind: EntryKind, mut item: MissionItem) -> StreamEntry {
    item.seq = to_seq(seq);
    let on_path = match kind {
        EntryKind::Home | EntryKind::Anchor => true,
        EntryKind::Simple | EntryKind::Child => item.on_flight_path(),
    };
    StreamEntry {
        seq,
        key,
        kind,
        item,
        on_path,
        metrics: ItemMetrics::default(),
    }
}

fn simple_mut(kind: &mut VisualKind) -> PlanResult<&mut MissionItem> {
    match kind {
        VisualKind::Simple(item) => Ok(item),
        VisualKind::Complex(_) => Err(PlanError::validation("item is not a simple item")),
    }
}

fn absolute_altitude(item: &MissionItem, home_alt: f64) -> f64 {
    let alt = item.coordinate().alt;
    if item.relative_altitude() {
        home_alt + alt
    } else {
        alt
    }
}

fn to_seq(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Rejects non-finite values and out-of-range latitude; wraps longitude.
pub fn validate_coordinate(coordinate: Coordinate) -> PlanResult<Coordinate> {
    if !coordinate.is_finite() {
        return Err(PlanError::validation(format!(
            "coordinate is not finite: {coordinate:?}"
        )));
    }
    if !(-90.0..=90.0).contains(&coordinate.lat) {
        return Err(PlanError::validation(format!(
            "latitude {} is out of range [-90, 90]",
            coordinate.lat
        )));
    }
    Ok(geo::normalized(coordinate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::{MAV_CMD_DO_CHANGE_SPEED, MAV_CMD_NAV_LAND, MAV_CMD_NAV_TAKEOFF};

    fn home() -> Coordinate {
        Coordinate::new(0.0, 0.0, 0.0)
    }

    fn sequences(model: &PlanModel) -> Vec<usize> {
        model.stream().iter().map(|e| e.seq).collect()
    }

    fn assert_contiguous(model: &PlanModel) {
        let seqs = sequences(model);
        let expected: Vec<usize> = (0..seqs.len()).collect();
        assert_eq!(seqs, expected);
        assert_eq!(model.items()[0].sequence_number(), 0);
    }

    #[test]
    fn empty_plan_has_no_lines_or_distance() {
        let model = PlanModel::new(home(), PlanSettings::default());
        assert!(model.is_empty());
        assert!(model.lines().is_empty());
        assert_eq!(model.statistics(), MissionStatistics::default());
        assert_eq!(sequences(&model), vec![0]);
    }

    #[test]
    fn two_waypoint_scenario() {
        let mut model = PlanModel::new(home(), PlanSettings::default());
        let a = Coordinate::new(0.0, 0.001, 50.0);
        let b = Coordinate::new(0.002, 0.001, 50.0);
        assert_eq!(model.insert_simple(a, 1).unwrap(), 1);
        assert_eq!(model.insert_simple(b, 2).unwrap(), 2);
        assert_eq!(sequences(&model), vec![0, 1, 2]);

        let expected = geo::distance(home(), a) + geo::distance(a, b);
        let stats = model.statistics();
        assert!((stats.total_distance - expected).abs() < 1e-6);
        assert_eq!(model.lines().len(), 2);

        model.remove(1).unwrap();
        assert_eq!(sequences(&model), vec![0, 1]);
        assert_eq!(model.lines().len(), 1);
        let single = geo::distance(home(), b);
        assert!((model.statistics().total_distance - single).abs() < 1e-6);
        assert!((model.statistics().max_telemetry_distance - single).abs() < 1e-6);
    }

    #[test]
    fn insert_at_zero_goes_after_home() {
        let mut model = PlanModel::default();
        let seq = model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 0).unwrap();
        assert_eq!(seq, 1);
        assert_eq!(model.items()[0].id(), ItemId(0));
        let seq = model.insert_simple(Coordinate::new(0.002, 0.0, 10.0), 99).unwrap();
        assert_eq!(seq, 2);
    }

    #[test]
    fn home_cannot_be_removed_or_moved() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 1).unwrap();
        assert!(matches!(model.remove(0), Err(PlanError::Validation(_))));
        assert!(matches!(model.move_item(0, 1), Err(PlanError::Validation(_))));
        assert!(matches!(model.remove(5), Err(PlanError::Validation(_))));
        assert_eq!(model.len(), 2);
        assert_eq!(model.stream()[0].kind, EntryKind::Home);
    }

    #[test]
    fn invalid_coordinate_is_rejected_without_change() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 1).unwrap();
        model.drain_events();
        let before = model.stream().to_vec();
        let err = model.insert_simple(Coordinate::new(91.0, 0.0, 0.0), 1);
        assert!(matches!(err, Err(PlanError::Validation(_))));
        let err = model.set_coordinate(1, Coordinate::new(f64::NAN, 0.0, 0.0));
        assert!(matches!(err, Err(PlanError::Validation(_))));
        assert_eq!(model.stream(), &before[..]);
        assert!(model.drain_events().is_empty());
    }

    #[test]
    fn sequences_stay_contiguous_through_edits() {
        let mut model = PlanModel::default();
        let mut state: u64 = 0x2545_f491;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as usize
        };
        for step in 0..60 {
            let len = model.len();
            match next() % 4 {
                0 | 1 => {
                    let c = Coordinate::new((step as f64) * 1e-4, 0.001, 20.0);
                    model.insert_simple(c, next() % (len + 1)).unwrap();
                }
                2 => {
                    let c = Coordinate::new(0.0, (step as f64) * 1e-4, 0.0);
                    model.insert_complex(c, next() % (len + 1)).unwrap();
                }
                _ => {
                    if len > 1 {
                        model.remove(1 + next() % (len - 1)).unwrap();
                    }
                }
            }
            assert_contiguous(&model);
        }
    }

    #[test]
    fn complex_item_expands_in_place() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 1).unwrap();
        let seq = model.insert_complex(Coordinate::new(0.002, 0.002, 0.0), 2).unwrap();
        assert_eq!(seq, 2);
        let children = model.items()[2].expand().len();
        assert_eq!(children, 10);
        let after = model.insert_simple(Coordinate::new(0.003, 0.0, 10.0), 3).unwrap();
        assert_eq!(after, 2 + children);
        assert_contiguous(&model);
        // home -> wp -> every child -> wp
        assert_eq!(model.lines().len(), 1 + children + 1);
    }

    #[test]
    fn childless_complex_uses_anchor() {
        let mut model = PlanModel::default();
        let anchor = Coordinate::new(0.002, 0.0, 0.0);
        let mut survey = SurveyParams::square(anchor, SurveyDefaults::default());
        survey.polygon.clear();
        let seq = model.insert_survey(anchor, survey, 1).unwrap();
        assert_eq!(seq, 1);
        model.insert_simple(Coordinate::new(0.004, 0.0, 10.0), 2).unwrap();
        assert_eq!(sequences(&model), vec![0, 1, 2]);
        assert_eq!(model.lines().len(), 2);
        assert_eq!(model.lines()[0].end, anchor);
        assert_eq!(model.lines()[1].start, anchor);
        // the anchor is not uploaded
        assert_eq!(model.mission_items().len(), 2);
    }

    #[test]
    fn remove_all_then_rebuild_is_identical() {
        let coords = [
            Coordinate::new(0.001, 0.001, 30.0),
            Coordinate::new(0.002, -0.001, 40.0),
            Coordinate::new(0.0, 0.003, 30.0),
        ];
        let mut model = PlanModel::default();
        for (i, c) in coords.iter().enumerate() {
            model.insert_simple(*c, i + 1).unwrap();
        }
        model.insert_complex(Coordinate::new(0.004, 0.0, 0.0), 4).unwrap();
        let seqs = sequences(&model);
        let stats = model.statistics();

        model.remove_all();
        assert!(model.is_empty());
        assert_eq!(model.statistics(), MissionStatistics::default());

        for (i, c) in coords.iter().enumerate() {
            model.insert_simple(*c, i + 1).unwrap();
        }
        model.insert_complex(Coordinate::new(0.004, 0.0, 0.0), 4).unwrap();
        assert_eq!(sequences(&model), seqs);
        assert_eq!(model.statistics(), stats);
    }

    #[test]
    fn telemetry_invariant_under_reorder() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 1).unwrap();
        model.insert_simple(Coordinate::new(0.0, 0.01, 10.0), 2).unwrap();
        model.insert_simple(Coordinate::new(0.002, 0.002, 10.0), 3).unwrap();
        let before = model.statistics();
        model.move_item(1, 3).unwrap();
        let after = model.statistics();
        assert!((before.max_telemetry_distance - after.max_telemetry_distance).abs() < 1e-9);
        assert!((before.total_distance - after.total_distance).abs() > 1.0);
        assert_contiguous(&model);
    }

    #[test]
    fn total_is_cruise_plus_hover() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.0, 0.0, 20.0), 1).unwrap();
        model.set_command(1, MAV_CMD_NAV_TAKEOFF).unwrap();
        model.insert_simple(Coordinate::new(0.001, 0.0, 20.0), 2).unwrap();
        model.insert_simple(Coordinate::new(0.001, 0.001, 20.0), 3).unwrap();
        model.set_command(3, MAV_CMD_NAV_LAND).unwrap();
        let stats = model.statistics();
        assert_eq!(stats.total_distance, stats.cruise_distance + stats.hover_distance);
        assert!(stats.hover_distance > 100.0);
        assert!(stats.cruise_distance > 100.0);
    }

    #[test]
    fn survey_edit_regenerates_children_and_shifts_sequences() {
        let mut model = PlanModel::default();
        model.insert_complex(Coordinate::new(0.002, 0.0, 0.0), 1).unwrap();
        model.insert_simple(Coordinate::new(0.004, 0.0, 10.0), 2).unwrap();
        let before = model.items()[1].as_complex().map(|c| c.children().len()).unwrap();
        assert_eq!(model.items()[2].sequence_number(), before + 1);
        model.drain_events();

        let mut survey = model.items()[1].as_complex().unwrap().survey.clone();
        survey.spacing = 50.0;
        let computed = model.line_cache().computed();
        model.set_survey(1, survey).unwrap();

        let after = model.items()[1].as_complex().map(|c| c.children().len()).unwrap();
        assert!(after < before);
        assert_eq!(model.items()[2].sequence_number(), after + 1);
        assert_contiguous(&model);
        assert_eq!(model.lines().len(), after + 1);
        assert_eq!(model.line_cache().len(), model.lines().len());
        assert_eq!(model.line_cache().computed(), computed + after as u64 + 1);
        assert!(model.drain_events().contains(&PlanEvent::ItemsChanged));

        assert!(model.set_survey(2, SurveyParams::square(home(), SurveyDefaults::default())).is_err());
    }

    #[test]
    fn autocontinue_edit_reaches_flattened_items() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 1).unwrap();
        model.insert_complex(Coordinate::new(0.002, 0.0, 0.0), 2).unwrap();
        assert!(model.mission_items()[1].autocontinue);

        model.set_autocontinue(1, false).unwrap();
        assert!(!model.mission_items()[1].autocontinue);
        model.set_autocontinue(1, true).unwrap();
        assert!(model.mission_items()[1].autocontinue);

        assert!(model.set_autocontinue(0, false).is_err());
        assert!(model.set_autocontinue(2, false).is_err());
    }

    #[test]
    fn coordinate_edit_recomputes_only_incident_lines() {
        let mut model = PlanModel::default();
        for i in 1..=4 {
            model
                .insert_simple(Coordinate::new(0.001 * i as f64, 0.0, 10.0), i)
                .unwrap();
        }
        let computed = model.line_cache().computed();
        model.set_coordinate(2, Coordinate::new(0.0015, 0.001, 10.0)).unwrap();
        assert_eq!(model.line_cache().computed(), computed + 2);
        assert_eq!(model.line_cache().len(), 4);

        model.recalculate();
        assert_eq!(model.line_cache().computed(), computed + 2);
    }

    #[test]
    fn non_path_items_do_not_break_lines() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 1).unwrap();
        model.insert_simple(Coordinate::new(0.002, 0.0, 10.0), 2).unwrap();
        model.insert_simple(Coordinate::new(0.003, 0.0, 10.0), 3).unwrap();
        model.set_command(2, MAV_CMD_DO_CHANGE_SPEED).unwrap();
        assert_eq!(model.lines().len(), 2);
        assert_eq!(sequences(&model), vec![0, 1, 2, 3]);
        let leg = model.lines()[1];
        assert!((leg.distance - geo::distance(leg.start, leg.end)).abs() < 1e-9);
    }

    #[test]
    fn home_move_updates_home_relative_figures() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 1).unwrap();
        let before = model.stream()[1].metrics.home_distance;
        model.drain_events();

        let new_home = Coordinate::new(-0.001, 0.0, 100.0);
        model.set_home_position(new_home).unwrap();
        let metrics = model.stream()[1].metrics;
        assert!(metrics.home_distance > before * 1.5);
        // relative waypoint at 10m over a 100m home: absolute 110m
        assert!((metrics.altitude_delta - 10.0).abs() < 1e-9);

        let events = model.drain_events();
        assert!(events.contains(&PlanEvent::HomePositionChanged(new_home)));
        assert!(events.contains(&PlanEvent::LinesChanged));
    }

    #[test]
    fn new_waypoint_inherits_frame_and_radius() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 1).unwrap();
        model.set_frame(1, MAV_FRAME_GLOBAL).unwrap();
        model.set_params(1, [0.0, 3.5, 0.0, 0.0]).unwrap();
        model.insert_simple(Coordinate::new(0.002, 0.0, 10.0), 2).unwrap();
        let item = model.items()[2].as_simple().cloned().unwrap();
        assert_eq!(item.frame, MAV_FRAME_GLOBAL);
        assert_eq!(item.params[1], 3.5);
    }

    #[test]
    fn events_are_batched_per_mutation() {
        let mut model = PlanModel::default();
        model.insert_simple(Coordinate::new(0.001, 0.0, 10.0), 1).unwrap();
        let events = model.drain_events();
        assert_eq!(events.iter().filter(|e| **e == PlanEvent::ItemsChanged).count(), 1);
        assert!(events.contains(&PlanEvent::LinesChanged));
        assert!(events
            .iter()
            .any(|e| matches!(e, PlanEvent::StatisticsChanged(_))));

        model.recalculate();
        assert!(model.drain_events().is_empty());
    }

    #[test]
    fn flatten_and_rebuild_round_trip() {
        let mut model = PlanModel::new(Coordinate::new(47.0, 8.0, 400.0), PlanSettings::default());
        model.insert_simple(Coordinate::new(47.001, 8.0, 30.0), 1).unwrap();
        model.insert_simple(Coordinate::new(47.002, 8.001, 30.0), 2).unwrap();
        let items = model.mission_items();
        assert_eq!(items.len(), 3);
        assert_eq!(items.iter().map(|i| i.seq).collect::<Vec<_>>(), vec![0, 1, 2]);

        let rebuilt = PlanModel::from_mission_items(&items, PlanSettings::default()).unwrap();
        assert_eq!(rebuilt.mission_items(), items);
        assert_eq!(rebuilt.statistics(), model.statistics());
    }
}
