//! Structured log macros.
//!
//! Every transfer log record carries the same fields so a single payment can
//! be followed across roles:
//! - `role`: initiator, mediator or target
//! - `secrethash`: the transfer's secrethash
//! - Additional context fields

/// Log a transfer-related event with standard fields.
///
/// ```rust,ignore
/// log_transfer_event!(info, "mediator", "[pcn] pair created", secrethash, payee = %addr);
/// ```
#[macro_export]
macro_rules! log_transfer_event {
    ($level:ident, $role:expr, $msg:expr, $secrethash:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            role = $role,
            secrethash = %$secrethash,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a channel-related event with standard fields.
#[macro_export]
macro_rules! log_channel_event {
    ($level:ident, $msg:expr, $channel_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            channel_id = %$channel_id,
            $($($field)*,)?
            $msg
        )
    };
}
