//! Resource index
//!
//! Keeps a materialized-path index of a Company > Building > Department >
//! Employee style hierarchy in step with the entity tables, and answers
//! prefix-based access checks against it.

pub mod access;
pub mod backfill;
pub mod entities;
pub mod errors;
pub mod hierarchy;
pub mod index;
pub mod jobs;
pub mod path;
pub mod registry;
pub mod repository;
pub mod seed;
pub mod settings;
pub mod sync;

pub use access::{path_matches, Annotated, ResourceFilter};
pub use errors::IndexError;
pub use index::{ResourceCriteria, ResourceIndex, ResourceIndexEntry};
pub use path::ParentSpec;
pub use registry::ResourceRegistry;
pub use repository::Repository;
pub use sync::{LifecycleHooks, ResourceSync, SyncReport};
