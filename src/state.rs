use crate::{
    channel::EventChannel, engine::MatchingEngine, errors::EngineError, projections::Projections,
    wal::EventLog,
};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::info;

const LOG_FILE: &str = "events.log";

/// Shared application state: the engine behind its single-writer mutex, the
/// channel it publishes to, and the projections fed from that channel.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<MatchingEngine>>,
    pub channel: Arc<EventChannel>,
    pub projections: Arc<Mutex<Projections>>,
}

impl AppState {
    /// Open the durability log under `data_dir`, replay it through a fresh
    /// engine, and seed the projections from the replayed sequence. Live
    /// traffic is only wired up after this returns.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(crate::wal::WalError::from)?;

        let channel = Arc::new(EventChannel::new());
        let wal = EventLog::open(data_dir.join(LOG_FILE))?;
        let mut engine = MatchingEngine::new(wal, channel.clone());
        let replayed = engine.bootstrap()?;

        let mut projections = Projections::default();
        projections.seed(&replayed);
        info!(
            seeded = replayed.len(),
            trades = projections.tape.len(),
            "projections seeded from replay"
        );

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            channel,
            projections: Arc::new(Mutex::new(projections)),
        })
    }
}
