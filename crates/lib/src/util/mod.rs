//! Shared utilities.
//!
//! Test helpers for exercising commands and runners.
