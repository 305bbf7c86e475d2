//! # siteops
//!
//! Construction-operations core: the work item lifecycle and approval
//! workflow engine. Creates work items, applies rule-based automation at
//! creation, drives status through multi-step approval chains, and emits
//! notifications as side effects.

pub mod analysis;
pub mod automation;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod storage;
pub mod telemetry;
