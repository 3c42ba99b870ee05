//! Courseware core: pure decisions shared by the download pipeline.
mod catalog;
mod classify;
mod naming;
mod unit;

pub use catalog::{CatalogError, Course, CourseCatalog, CourseSource};
pub use classify::{ArchiveDecision, ArchivePolicy, DEFAULT_MAX_MEMBERS, DEFAULT_PROJECT_EXTENSIONS};
pub use naming::{alphabetic_key, display_name, folder_name};
pub use unit::{advance, SkipReason, UnitEvent, UnitPhase, UnitTrace};
