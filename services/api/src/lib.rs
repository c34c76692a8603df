//! services/api/src/lib.rs
//!
//! The HTTP and WebSocket service of the prep portal: configuration, the
//! adapters behind the core ports, the study workflows and the web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod study;
pub mod web;
