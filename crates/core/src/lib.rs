//! `vigil-core`: domain foundation for the system view.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! targets, jobs, tasks, archives, operator annotations, and the composition
//! of those rows into a system view.

pub mod annotation;
pub mod archive;
pub mod entity;
pub mod error;
pub mod id;
pub mod target;
pub mod task;
pub mod view;

pub use annotation::{Annotation, AnnotationBatch, ArchiveAnnotation, RawAnnotation, TaskAnnotation};
pub use archive::{Archive, ArchiveSize, ArchiveStatus};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ArchiveId, JobId, PolicyId, StoreId, TargetId, TaskId};
pub use target::{Job, Keep, RetentionRef, StoreRef, Target};
pub use task::{Task, TaskOp};
pub use view::{SystemView, compose_system_view, expiry_days};
