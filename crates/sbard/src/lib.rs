//! sbard - Status bar overlay service
//!
//! This crate provides the service that owns the overlay bar:
//! - `service` - Service Core actor (create/destroy state machine)
//! - `overlay` - Overlay Window Manager and compositor seam
//! - `compat` / `oom` - privileged-execution capability shim and its Linux backend
//! - `signals` - screen-state and lock-presence listeners
//! - `monitor` - foreground-application monitor
//! - `server` - Unix socket Remote Control Interface
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          sbard                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │  ControlServer  │────▶│       ServiceActor          │    │
//! │  │  (Unix Socket)  │     │  (overlay lifecycle owner)  │    │
//! │  └────────┬────────┘     └───┬─────────┬─────────┬─────┘    │
//! │           │                  │         │         │          │
//! │           ▼                  ▼         ▼         ▼          │
//! │  ┌─────────────────┐   ┌─────────┐ ┌────────┐ ┌─────────┐   │
//! │  │ConnectionHandler│   │ Overlay │ │ Compat │ │ Monitor │   │
//! │  │  (per client)   │   │ Manager │ │  Shim  │ │  task   │   │
//! │  └─────────────────┘   └─────────┘ └────────┘ └─────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod compat;
pub mod config;
pub mod lifecycle;
pub mod monitor;
pub mod notice;
pub mod oom;
pub mod overlay;
pub mod prefs;
pub mod process;
pub mod server;
pub mod service;
pub mod signals;
