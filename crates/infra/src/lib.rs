//! Infrastructure layer: stores, view composition, annotations and the
//! relevance reconciler.

pub mod annotations;
pub mod error;
pub mod relevance;
pub mod store;
pub mod system_view;

pub use annotations::{AnnotateOutcome, AnnotationApplier};
pub use error::{ServiceError, ServiceResult};
pub use relevance::{RelevanceReconciler, RelevanceSweeper, RelevanceSweeperHandle};
pub use store::{
    InMemorySystemStore, PostgresSystemStore, RelevanceReport, RelevanceScope, StoreError,
    SystemStore,
};
pub use system_view::ViewBuilder;

#[cfg(test)]
mod integration_tests;
