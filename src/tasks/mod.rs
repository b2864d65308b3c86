//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Reset token cleanup: deletes expired password reset tokens every interval

mod cleanup;

pub use cleanup::{
    purge_expired_tokens, run_cleanup_pass, CleanupScheduler, InFlightPasses, SchedulerState,
};
