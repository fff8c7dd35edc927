//! Core traits for the sync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ListFetcher`]: Resolve a source URL into list rows
//! - [`DeviceClient`]: Open authenticated sessions against the router
//! - [`DeviceSession`]: Show/delete/add entries of one resource kind

pub mod device;
pub mod list_fetcher;

pub use device::{DeviceClient, DeviceSession, NewEntry, RemoteEntry};
pub use list_fetcher::ListFetcher;
