use std::sync::Arc;

use warden_application::{BanService, Clock};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub ban_service: BanService,
    pub clock: Arc<dyn Clock>,
    pub admin_api_token: Arc<str>,
}
