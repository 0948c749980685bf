pub mod api;
pub mod detector;
pub mod poller;
pub mod store;
pub mod types;

pub const ALERTS_UNSEEN_EVENT: &str = "alerts_unseen";
