//! REST client for the event site's API.
//!
//! This module provides the `RemoteApi` seam used by the sync queue (form
//! delivery) and the prefetcher (critical content), and `ApiClient`, the
//! reqwest-backed implementation of it.

pub mod client;
pub mod error;

pub use client::{ApiClient, RemoteApi};
pub use error::ApiError;
