//! # bluegate-server
//!
//! HTTP server library for bluegate.
//!
//! This library provides the API handlers, state and logging setup; the
//! `bluegate-server` binary wires them to a BlueZ backend.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
