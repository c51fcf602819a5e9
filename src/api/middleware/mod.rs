//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator (protected routes only)
//! 2. Audit logger, logs after auth so it sees the caller

pub mod audit;
pub mod auth;
