//! Shared application state: the durable store behind its lock, and the
//! in-memory authoring sessions.
//!
//! The polling loop is the only writer and processes messages strictly
//! sequentially, so the locks exist for one reason: the scheduled backup
//! task reads the same durable documents from its own task. Writers take
//! the write guard around load-mutate-save sequences; the backup takes the
//! read guard for its snapshot.
//!
//! Wizard sessions are ephemeral by design: lost on restart, cleared on
//! cancel/confirm.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::store::StateStore;
use crate::wizard::WizardState;

pub struct AppState {
    pub store: RwLock<StateStore>,
    pub wizards: RwLock<HashMap<i64, WizardState>>,
}

impl AppState {
    pub fn new(store: StateStore) -> Self {
        Self {
            store: RwLock::new(store),
            wizards: RwLock::new(HashMap::new()),
        }
    }
}
