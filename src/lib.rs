//! cortex-lens - question answering and dashboards over a cloud warehouse.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod config;
pub mod dashboards;
pub mod error;
pub mod logging;
pub mod present;
pub mod rag;
pub mod reference;
pub mod warehouse;
