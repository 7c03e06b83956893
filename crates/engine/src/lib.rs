//! Push dispatch core: token filter, client registry, job queue, worker pool,
//! dispatch engine and request coordinator.

pub mod blacklist;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod queue;
pub mod registry;
pub mod reporter;
pub mod service;
pub mod stats;
