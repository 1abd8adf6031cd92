//! Shared application state: store handles, realtime hub, per-session gates.

pub mod hub;
pub mod lifecycle;
pub mod rooms;
pub mod session;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::{
    auth::AuthProvider,
    config::AppConfig,
    dao::session_store::{ScoreStore, SessionStore},
    error::ServiceError,
};

pub use self::hub::RealtimeHub;

/// Cheaply clonable handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Handles to the installed storage backend.
#[derive(Clone)]
pub struct StoreHandles {
    /// Durable session records.
    pub sessions: Arc<dyn SessionStore>,
    /// Append-only score records.
    pub scores: Arc<dyn ScoreStore>,
}

/// Central application state storing the realtime hub and database handles.
pub struct AppState {
    stores: RwLock<Option<StoreHandles>>,
    hub: RealtimeHub,
    auth: Arc<dyn AuthProvider>,
    // Per-session mutation gates serializing read-modify-write cycles.
    session_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, auth: Arc<dyn AuthProvider>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            stores: RwLock::new(None),
            hub: RealtimeHub::new(),
            auth,
            session_gates: DashMap::new(),
            degraded: degraded_tx,
            config,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Realtime hub driving all room fan-out.
    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }

    /// External identity resolver.
    pub fn auth(&self) -> Arc<dyn AuthProvider> {
        self.auth.clone()
    }

    /// Obtain handles to the current storage backend, if one is installed.
    pub async fn stores(&self) -> Option<StoreHandles> {
        let guard = self.stores.read().await;
        guard.clone()
    }

    /// Storage handles, or [`ServiceError::Degraded`] when none are installed.
    pub async fn require_stores(&self) -> Result<StoreHandles, ServiceError> {
        self.stores().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn install_stores(&self, handles: StoreHandles) {
        {
            let mut guard = self.stores.write().await;
            *guard = Some(handles);
        }
        self.update_degraded(false);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_stores(&self) {
        {
            let mut guard = self.stores.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.stores.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Mutation gate for one session. Holding the lock serializes every
    /// read-modify-write cycle targeting that session; unrelated sessions
    /// use unrelated gates and proceed in parallel.
    pub fn session_gate(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.session_gates
            .entry(session_id)
            .or_default()
            .clone()
    }

    /// Drop the gate of a session that reached a terminal state.
    pub fn discard_session_gate(&self, session_id: Uuid) {
        self.session_gates.remove(&session_id);
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }
}
