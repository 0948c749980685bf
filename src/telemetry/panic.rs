use crate::telemetry::forwarder::ErrorForwarder;
use crate::telemetry::record::{ErrorOrigin, ErrorRecord, Severity};
use std::panic::PanicHookInfo;
use std::sync::Arc;

pub const PANIC_ERROR_TYPE: &str = "panic";

pub fn panic_record(info: &PanicHookInfo<'_>, session_id: &str) -> ErrorRecord {
    let payload = info.payload();
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    };

    let record = ErrorRecord::new(
        ErrorOrigin::HostProcess,
        session_id,
        Severity::Critical,
        PANIC_ERROR_TYPE,
        message,
    );

    match info.location() {
        Some(location) => record.with_stack(format!(
            "at {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        )),
        None => record,
    }
}

pub fn install_panic_hook(forwarder: Arc<ErrorForwarder>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let record = panic_record(info, forwarder.session_id());
        tracing::error!(message = %record.message, "host process panicked");
        forwarder.report(record);
        previous(info);
    }));
}
