//! Agent submission logbook.
//!
//! A submitted property gets a content-addressed document set and an
//! append-only, versioned logbook. Versions are deep-copied snapshots;
//! nothing is ever rewritten or deleted, and the current view is always
//! derivable from the latest version.

pub mod documents;
pub mod logbook;
pub mod persistence;
pub mod store;
pub mod submission;

pub use documents::*;
pub use persistence::*;
pub use store::*;
pub use submission::*;
pub use self::logbook::*;
