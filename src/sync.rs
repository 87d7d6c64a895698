//! Load/send orchestration between the plan and a vehicle link.
//!
//! Requests are fire-and-forget; completions come back as [`VehicleEvent`]s that the owner feeds
//! in through [`SyncCoordinator::handle_event`] (or [`SyncCoordinator::pump`]) on the same thread.

use std::collections::VecDeque;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{PlanError, PlanResult};
use crate::geo::Coordinate;
use crate::mission::MissionItem;
use crate::model::PlanHeader;
use crate::plan::{PlanEvent, PlanModel};
use crate::storage::{self, PlanFormat};

/// Monotonic id attached to each request so late responses can be recognized.
pub type RequestToken = u64;

/// Vehicle side of the sync. Item lists always carry home at index 0.
pub trait VehicleLink {
    fn current_mission_items(&self) -> Vec<MissionItem>;
    fn home_position_available(&self) -> bool;
    fn home_position(&self) -> Coordinate;
    /// Starts a download; answered by `ItemsLoaded` or `LoadFailed` with the same token.
    fn request_mission_items(&mut self, token: RequestToken) -> PlanResult<()>;
    /// Starts an upload; answered by `SendComplete` or `SendFailed` with the same token.
    fn upload_items(&mut self, token: RequestToken, items: Vec<MissionItem>) -> PlanResult<()>;
    /// Next completion or vehicle-side change, if one has arrived.
    fn poll_event(&mut self) -> Option<VehicleEvent>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum VehicleEvent {
    ItemsLoaded {
        token: RequestToken,
        items: Vec<MissionItem>,
    },
    LoadFailed {
        token: RequestToken,
        message: String,
    },
    SendComplete {
        token: RequestToken,
    },
    SendFailed {
        token: RequestToken,
        message: String,
    },
    /// The vehicle's mission changed without a request from us.
    ItemsChanged(Vec<MissionItem>),
    HomeChanged(Coordinate),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransferState {
    Idle,
    InFlight(RequestToken),
    Error(String),
}

impl TransferState {
    pub fn in_flight(&self) -> bool {
        matches!(self, TransferState::InFlight(_))
    }

    fn is(&self, token: RequestToken) -> bool {
        *self == TransferState::InFlight(token)
    }
}

/// Notifications for the UI layer.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncNotice {
    LoadComplete,
    SendComplete,
    Failed(String),
    /// The vehicle reported a different mission while local edits are unsent.
    Conflict { vehicle_items: usize },
    DirtyChanged(bool),
}

pub struct SyncCoordinator<L: VehicleLink> {
    link: L,
    plan: PlanModel,
    header: PlanHeader,
    edit_mode: bool,
    dirty: bool,
    download: TransferState,
    upload: TransferState,
    next_token: RequestToken,
    /// Plan revision, bumped by every accepted mutation.
    revision: u64,
    sent_revision: u64,
    pending_send: bool,
    first_items_from_vehicle: bool,
    notices: VecDeque<SyncNotice>,
}

impl<L: VehicleLink> SyncCoordinator<L> {
    pub fn new(link: L, plan: PlanModel, header: PlanHeader) -> Self {
        Self {
            link,
            plan,
            header,
            edit_mode: true,
            dirty: false,
            download: TransferState::Idle,
            upload: TransferState::Idle,
            next_token: 0,
            revision: 0,
            sent_revision: 0,
            pending_send: false,
            first_items_from_vehicle: true,
            notices: VecDeque::new(),
        }
    }

    /// Attaches to the vehicle. Outside edit mode, or with an empty plan, the vehicle's
    /// mission is requested right away.
    pub fn start(&mut self, edit_mode: bool) -> PlanResult<()> {
        self.edit_mode = edit_mode;
        self.first_items_from_vehicle = true;
        info!(
            "sync start ({} mode)",
            if edit_mode { "edit" } else { "fly" }
        );
        if self.link.home_position_available() && (!edit_mode || self.plan.is_empty()) {
            self.apply_vehicle_home(self.link.home_position());
        }
        if !edit_mode || self.plan.is_empty() {
            self.load_from_vehicle()?;
        }
        Ok(())
    }

    pub fn plan(&self) -> &PlanModel {
        &self.plan
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn sync_in_progress(&self) -> bool {
        self.download.in_flight() || self.upload.in_flight()
    }

    pub fn download_state(&self) -> &TransferState {
        &self.download
    }

    pub fn upload_state(&self) -> &TransferState {
        &self.upload
    }

    pub fn send_pending(&self) -> bool {
        self.pending_send
    }

    /// Applies a plan mutation. Accepted mutations mark the plan dirty; rejected ones
    /// leave everything unchanged.
    ///
    /// The closure runs against a copy, so a batch that fails partway commits nothing.
    pub fn edit<T, F>(&mut self, mutation: F) -> PlanResult<T>
    where
        F: FnOnce(&mut PlanModel) -> PlanResult<T>,
    {
        let mut draft = self.plan.clone();
        let value = mutation(&mut draft)?;
        self.plan = draft;
        self.revision += 1;
        self.set_dirty(true);
        Ok(value)
    }

    pub fn load_from_vehicle(&mut self) -> PlanResult<RequestToken> {
        if self.upload.in_flight() {
            return Err(PlanError::Sync(
                "cannot load while a send is in progress".to_string(),
            ));
        }
        let token = self.issue_token();
        if let TransferState::InFlight(previous) = self.download {
            debug!("load {token} supersedes load {previous}");
        }
        self.download = TransferState::InFlight(token);
        if let Err(err) = self.link.request_mission_items(token) {
            self.download = TransferState::Error(err.to_string());
            self.notices.push_back(SyncNotice::Failed(err.to_string()));
            return Err(err);
        }
        debug!("requested mission items (token {token})");
        Ok(token)
    }

    /// Uploads the current plan. While another send is in flight the request is coalesced
    /// into a single follow-up send.
    pub fn send_to_vehicle(&mut self) -> PlanResult<()> {
        if self.download.in_flight() {
            return Err(PlanError::Sync(
                "cannot send while a load is in progress".to_string(),
            ));
        }
        if self.upload.in_flight() {
            if !self.pending_send {
                debug!("send already in flight, queuing follow-up");
            }
            self.pending_send = true;
            return Ok(());
        }
        self.issue_send()
    }

    /// Replaces the plan with a file's content. On error the current plan is untouched.
    pub fn load_from_file(&mut self, path: &Path) -> PlanResult<()> {
        let loaded = match storage::load_plan(path, self.plan.settings().clone()) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!("failed to load {}: {err}", path.display());
                return Err(err);
            }
        };
        self.plan.adopt(loaded);
        self.revision += 1;
        self.set_dirty(false);
        Ok(())
    }

    pub fn save_to_file(&mut self, path: &Path, format: PlanFormat) -> PlanResult<()> {
        storage::save_plan(path, &self.plan, format, &self.header)?;
        self.set_dirty(false);
        Ok(())
    }

    /// Feeds every event the link has ready. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.link.poll_event() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: VehicleEvent) {
        match event {
            VehicleEvent::ItemsLoaded { token, items } => {
                if !self.download.is(token) {
                    debug!("discarding stale load response (token {token})");
                    return;
                }
                match PlanModel::from_mission_items(&items, self.plan.settings().clone()) {
                    Ok(loaded) => {
                        self.download = TransferState::Idle;
                        self.replace_plan(loaded);
                        info!("loaded {} items from vehicle", items.len().saturating_sub(1));
                        self.notices.push_back(SyncNotice::LoadComplete);
                    }
                    Err(err) => self.fail_download(err.to_string()),
                }
            }
            VehicleEvent::LoadFailed { token, message } => {
                if self.download.is(token) {
                    self.fail_download(message);
                }
            }
            VehicleEvent::SendComplete { token } => {
                if !self.upload.is(token) {
                    debug!("ignoring send completion for token {token}");
                    return;
                }
                self.upload = TransferState::Idle;
                info!("send {token} complete");
                self.notices.push_back(SyncNotice::SendComplete);
                if self.pending_send {
                    self.pending_send = false;
                    if let Err(err) = self.issue_send() {
                        warn!("follow-up send failed to start: {err}");
                    }
                } else if self.revision == self.sent_revision {
                    self.set_dirty(false);
                }
            }
            VehicleEvent::SendFailed { token, message } => {
                if !self.upload.is(token) {
                    return;
                }
                warn!("send {token} failed: {message}");
                self.upload = TransferState::Error(message.clone());
                self.pending_send = false;
                self.notices.push_back(SyncNotice::Failed(message));
            }
            VehicleEvent::ItemsChanged(items) => self.on_vehicle_items(items),
            VehicleEvent::HomeChanged(home) => {
                if self.edit_mode {
                    debug!("vehicle home changed, plan home kept (edit mode)");
                } else {
                    self.apply_vehicle_home(home);
                }
            }
        }
    }

    pub fn drain_notices(&mut self) -> Vec<SyncNotice> {
        self.notices.drain(..).collect()
    }

    pub fn drain_plan_events(&mut self) -> Vec<PlanEvent> {
        self.plan.drain_events()
    }

    fn on_vehicle_items(&mut self, items: Vec<MissionItem>) {
        if self.download.in_flight() {
            debug!("vehicle items changed during a load, waiting for the response");
            return;
        }
        let replace = !self.edit_mode || self.first_items_from_vehicle || self.plan.is_empty();
        if !replace {
            let vehicle_items = items.len().saturating_sub(1);
            warn!("vehicle reported {vehicle_items} items while the plan has local edits");
            self.notices
                .push_back(SyncNotice::Conflict { vehicle_items });
            return;
        }
        match PlanModel::from_mission_items(&items, self.plan.settings().clone()) {
            Ok(loaded) => {
                self.replace_plan(loaded);
                self.notices.push_back(SyncNotice::LoadComplete);
            }
            Err(err) => {
                warn!("rejected vehicle items: {err}");
                self.notices.push_back(SyncNotice::Failed(err.to_string()));
            }
        }
    }

    fn replace_plan(&mut self, loaded: PlanModel) {
        self.plan.adopt(loaded);
        self.revision += 1;
        self.first_items_from_vehicle = false;
        self.set_dirty(false);
    }

    fn apply_vehicle_home(&mut self, home: Coordinate) {
        if let Err(err) = self.plan.set_home_position(home) {
            warn!("ignoring vehicle home position: {err}");
        }
    }

    fn issue_send(&mut self) -> PlanResult<()> {
        let token = self.issue_token();
        let items = self.plan.mission_items();
        let count = items.len();
        self.upload = TransferState::InFlight(token);
        self.sent_revision = self.revision;
        if let Err(err) = self.link.upload_items(token, items) {
            self.upload = TransferState::Error(err.to_string());
            self.notices.push_back(SyncNotice::Failed(err.to_string()));
            return Err(err);
        }
        debug!("sending {count} items (token {token})");
        Ok(())
    }

    fn fail_download(&mut self, message: String) {
        warn!("load from vehicle failed: {message}");
        self.download = TransferState::Error(message.clone());
        self.notices.push_back(SyncNotice::Failed(message));
    }

    fn issue_token(&mut self) -> RequestToken {
        self.next_token += 1;
        self.next_token
    }

    fn set_dirty(&mut self, dirty: bool) {
        if self.dirty != dirty {
            self.dirty = dirty;
            self.notices.push_back(SyncNotice::DirtyChanged(dirty));
        }
    }
}
