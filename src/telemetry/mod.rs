pub mod forwarder;
pub mod panic;
pub mod record;
