use std::sync::Arc;

use crate::config::AppSettings;
use crate::gate::Gatekeeper;

/// Application state shared across request handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<AppSettings>,
    pub gatekeeper: Arc<Gatekeeper>,
}

impl AppState {
    pub fn new(settings: AppSettings, gatekeeper: Gatekeeper) -> Self {
        Self {
            settings: Arc::new(settings),
            gatekeeper: Arc::new(gatekeeper),
        }
    }
}
