use std::any::Any;
use std::backtrace::Backtrace;

/// Route panics through tracing with location and a captured backtrace.
///
/// Replaces the default stderr hook so JSON log streams stay parseable.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let backtrace = Backtrace::force_capture();
        tracing::error!(
            panic.payload = %panic_message(info.payload()),
            panic.location = %location,
            backtrace = %backtrace,
            "panic"
        );
    }));
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
