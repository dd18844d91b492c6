use crate::broadcast::BroadcastHub;
use crate::db::Store;
use crate::telephony::TelephonyService;

#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Store,
    pub hub: BroadcastHub,
    pub telephony: TelephonyService,
}
