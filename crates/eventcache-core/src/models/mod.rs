//! Data models for cached content.
//!
//! - `ContentRecord`: the single stored entity, with its `ContentType`,
//!   `Priority` and `SyncStatus`
//! - `FormType`, `FormSubmission`: the envelope stored for queued forms

pub mod form;
pub mod record;

pub use form::{FormSubmission, FormType};
pub use record::{ContentRecord, ContentType, Priority, SyncStatus};
