//! End-to-end tests driving the `subforge` binary against fake tools.

#![cfg(unix)]

mod build_tests;
mod common;
mod plan_tests;
