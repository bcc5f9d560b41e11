//! ---
//! halow_section: "03-logging"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Context-enriched logging macros."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
/// Emit an event at the given level enriched with an OTA [`LogContext`](crate::LogContext).
#[doc(hidden)]
#[macro_export]
macro_rules! __ota_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            session = ctx.session.unwrap_or(""),
            process = ctx.process.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with OTA session context.
#[macro_export]
macro_rules! ota_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__ota_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__ota_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with OTA session context.
#[macro_export]
macro_rules! ota_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__ota_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__ota_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with OTA session context.
#[macro_export]
macro_rules! ota_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__ota_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__ota_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with OTA session context.
#[macro_export]
macro_rules! ota_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__ota_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__ota_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
