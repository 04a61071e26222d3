use std::path::PathBuf;
use std::sync::Arc;

use helios_broker::{JobQueue, StatusStore};
use slog::Logger;

use crate::fanout::Fanout;

#[derive(Clone)]
pub struct AppState {
    pub storage_root: PathBuf,
    pub queue: Arc<dyn JobQueue>,
    pub status_store: Arc<dyn StatusStore>,
    pub fanout: Arc<Fanout>,
    pub log: Logger,
}
