#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

//! # Gambit Server
//!
//! A lightweight, in-memory WebSocket session server for real-time
//! multiplayer chess: JWT-authenticated sockets, two-seat game rooms with
//! lazily-sampled clocks, presence, and draw/rematch/invite side protocols.
//!
//! No database, no background timers. Run the binary and connect.

/// JWT verification and claims
pub mod auth;

/// Lazy two-sided countdown clock
pub mod clock;

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// Presence tracking (multi-tab connection sets)
pub mod presence;

/// Wire protocol: events, frames, error taxonomy
pub mod protocol;

/// Game room aggregate and lifecycle state machine
pub mod room;

/// Chess rules adapter
pub mod rules;

/// Main gateway orchestration
pub mod server;

/// Social graph boundary (friend lookups)
pub mod social;

/// WebSocket connection handling
pub mod websocket;
