//! Publishing subsystem: category resolution, unit lookup and the
//! publishing action.

pub mod action;
pub mod categories;
pub mod lookup;

// Re-export commonly used types
pub use action::{
    ActionOutcome, ActionStats, AnnotateError, ArtifactAnnotator, CategoriesAction, PublishError,
};
pub use categories::{
    CategoryResolver, CategorySettings, ResolveError, ResolvedCategories, DEFAULT_CATEGORY_LABEL,
    DEFAULT_CATEGORY_NAME,
};
pub use lookup::{LayeredLookup, UnitLookup};
