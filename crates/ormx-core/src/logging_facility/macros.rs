//! Canonical logging macros
//!
//! Every unit-of-work boundary (flush, query execution, reference loading)
//! logs one start event and exactly one end or end_error event. All three
//! public macros expand through `__ormx_op_event!`, which stamps the
//! `component`, `op` and `event` fields in one place.

#[doc(hidden)]
#[macro_export]
macro_rules! __ormx_op_event {
    ($level:ident, $op:expr, $event:ident $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $crate::ormx_core_types::schema::$event,
            $($($field)*)?
        )
    };
}

/// Log the start of an operation
///
/// Extra fields use `tracing` field syntax and usually carry the session id
/// so parallel sessions can be told apart.
///
/// ```
/// # use ormx_core::log_op_start;
/// let session_id = "0190b1f2-session";
/// log_op_start!("load_reference");
/// log_op_start!("flush", session_id = %session_id, tracked = 3);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__ormx_op_event!(info, $op, EVENT_START $(, $($field)*)?)
    };
}

/// Log the successful end of an operation
///
/// `duration_ms` is mandatory; flush also reports its row counts.
///
/// ```
/// # use ormx_core::log_op_end;
/// log_op_end!("flush", duration_ms = 3, inserted = 2, updated = 0, deleted = 1);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__ormx_op_event!(
            info,
            $op,
            EVENT_END,
            duration_ms = $duration
            $(, $($field)*)?
        )
    };
}

/// Log a failed operation with its canonical kind and code
///
/// `$err` is anything convertible into `ExError`.
///
/// ```
/// # use ormx_core::{log_op_error, errors::OrmError};
/// let err = OrmError::WriteFailed {
///     phase: "DELETE".to_string(),
///     table: "widget".to_string(),
///     reason: "0 rows affected".to_string(),
/// };
/// log_op_error!("flush", err, duration_ms = 1, session_id = "s-1");
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        $crate::__ormx_op_event!(
            error,
            $op,
            EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code()
            $(, $($field)*)?
        )
    }};
}
