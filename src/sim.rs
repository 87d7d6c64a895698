use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{PlanError, PlanResult};
use crate::geo::Coordinate;
use crate::mission::MissionItem;
use crate::sync::{RequestToken, VehicleEvent, VehicleLink};

enum Request {
    Download(RequestToken),
    Upload(RequestToken, Vec<MissionItem>),
    /// Vehicle-side mission edit, announced as `ItemsChanged`.
    ReplaceItems(Vec<MissionItem>),
    MoveHome(Coordinate),
    Shutdown,
}

#[derive(Debug, Default)]
struct VehicleState {
    home: Option<Coordinate>,
    items: Vec<MissionItem>,
    fail_next_upload: Option<String>,
}

/// In-memory vehicle that answers requests from a worker thread after a fixed latency.
pub struct LoopbackVehicle {
    tx: Sender<Request>,
    rx: Receiver<VehicleEvent>,
    state: Arc<Mutex<VehicleState>>,
    worker: Option<JoinHandle<()>>,
}

impl LoopbackVehicle {
    pub fn spawn(home: Option<Coordinate>, items: Vec<MissionItem>, latency: Duration) -> Self {
        let (tx, requests) = mpsc::channel();
        let (events, rx) = mpsc::channel();
        let state = Arc::new(Mutex::new(VehicleState {
            home,
            items,
            fail_next_upload: None,
        }));
        let shared = Arc::clone(&state);
        let worker = thread::spawn(move || run_vehicle(requests, events, shared, latency));
        info!("loopback vehicle started (latency {latency:?})");
        Self {
            tx,
            rx,
            state,
            worker: Some(worker),
        }
    }

    /// Makes the next upload fail with `message`.
    pub fn fail_next_upload(&self, message: impl Into<String>) {
        lock(&self.state).fail_next_upload = Some(message.into());
    }

    pub fn replace_items(&self, items: Vec<MissionItem>) {
        let _ = self.tx.send(Request::ReplaceItems(items));
    }

    pub fn move_home(&self, home: Coordinate) {
        let _ = self.tx.send(Request::MoveHome(home));
    }

    fn submit(&self, request: Request) -> PlanResult<()> {
        self.tx
            .send(request)
            .map_err(|_| PlanError::Sync("loopback vehicle is not running".to_string()))
    }
}

impl VehicleLink for LoopbackVehicle {
    fn current_mission_items(&self) -> Vec<MissionItem> {
        lock(&self.state).items.clone()
    }

    fn home_position_available(&self) -> bool {
        lock(&self.state).home.is_some()
    }

    fn home_position(&self) -> Coordinate {
        lock(&self.state).home.unwrap_or_default()
    }

    fn request_mission_items(&mut self, token: RequestToken) -> PlanResult<()> {
        self.submit(Request::Download(token))
    }

    fn upload_items(&mut self, token: RequestToken, items: Vec<MissionItem>) -> PlanResult<()> {
        self.submit(Request::Upload(token, items))
    }

    fn poll_event(&mut self) -> Option<VehicleEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for LoopbackVehicle {
    fn drop(&mut self) {
        let _ = self.tx.send(Request::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn lock(state: &Mutex<VehicleState>) -> std::sync::MutexGuard<'_, VehicleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_vehicle(
    requests: Receiver<Request>,
    events: Sender<VehicleEvent>,
    state: Arc<Mutex<VehicleState>>,
    latency: Duration,
) {
    while let Ok(request) = requests.recv() {
        if matches!(request, Request::Shutdown) {
            break;
        }
        thread::sleep(latency);
        let event = match request {
            Request::Download(token) => VehicleEvent::ItemsLoaded {
                token,
                items: lock(&state).items.clone(),
            },
            Request::Upload(token, items) => {
                let mut vehicle = lock(&state);
                if let Some(message) = vehicle.fail_next_upload.take() {
                    VehicleEvent::SendFailed { token, message }
                } else if let Some(message) = check_upload(&items) {
                    VehicleEvent::SendFailed { token, message }
                } else {
                    debug!("vehicle accepted {} items", items.len());
                    vehicle.items = items;
                    VehicleEvent::SendComplete { token }
                }
            }
            Request::ReplaceItems(items) => {
                lock(&state).items = items.clone();
                VehicleEvent::ItemsChanged(items)
            }
            Request::MoveHome(home) => {
                lock(&state).home = Some(home);
                VehicleEvent::HomeChanged(home)
            }
            Request::Shutdown => break,
        };
        if events.send(event).is_err() {
            debug!("link dropped, stopping loopback vehicle");
            break;
        }
    }
}

/// Mirrors what a flight controller rejects: a missing home entry or gaps in sequence numbers.
fn check_upload(items: &[MissionItem]) -> Option<String> {
    if items.is_empty() {
        return Some("mission must contain the home position".to_string());
    }
    items
        .iter()
        .enumerate()
        .find(|(i, item)| usize::from(item.seq) != *i)
        .map(|(i, item)| format!("item {i} has sequence number {}", item.seq))
}
