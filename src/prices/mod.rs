pub mod adapters;
pub mod feeds;
pub mod reconciler;
pub mod types;

pub const PRICE_UPDATE_EVENT: &str = "price_update";
pub const FEED_STATUS_EVENT: &str = "feed_status";
