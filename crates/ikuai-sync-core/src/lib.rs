// # ikuai-sync-core
//
// Core library for keeping iKuai router groups in sync with remote lists.
//
// ## Architecture Overview
//
// This library provides the synchronization pipeline:
// - **JobSet**: Parses indexed, pipe-delimited job entries into typed jobs
// - **ListFetcher**: Trait for downloading a remote list
// - **RowSet**: Normalizes and deduplicates fetched rows
// - **DeviceClient**: Trait for authenticated show/delete/add on the router
// - **SyncEngine**: Runs one job through fetch → dedup → delete → chunked add
// - **Scheduler**: Triggers jobs from their cron expressions
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Pipeline logic is separate from HTTP implementations
// 2. **Replace, Don't Merge**: Every run replaces the target's contents wholesale
// 3. **Empty Is Not Authoritative**: A run that fetched nothing never deletes
// 4. **Failure Isolation**: A failing job or URL never blocks the others
// 5. **Library-First**: All pipeline functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod normalize;
pub mod rows;
pub mod scheduler;
pub mod traits;

// Re-export core types for convenience
pub use config::{JobSet, SyncConfig};
pub use engine::{SyncEngine, SyncOutcome, SyncReport};
pub use error::{Error, Result};
pub use job::{ResourceKind, SyncJob};
pub use rows::RowSet;
pub use scheduler::Scheduler;
pub use traits::{DeviceClient, DeviceSession, ListFetcher, NewEntry, RemoteEntry};
