//! Application state management.

use std::sync::Arc;

use crate::broker::Broker;
use crate::store::{Error, Store};

use super::config::Config;

/// Shared application state: the store plus the change-event broker.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    broker: Arc<Broker>,
}

impl AppState {
    /// Wrap an already-open store with a fresh broker.
    pub fn new(store: Store) -> AppState {
        AppState {
            store: Arc::new(store),
            broker: Arc::new(Broker::new()),
        }
    }

    /// Open the store described by the configuration.
    pub fn from_config(config: &Config) -> Result<AppState, Error> {
        Ok(AppState::new(Store::open(&config.data_dir)?))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }
}
