//! API endpoint modules.

pub mod documents;
pub mod workflows;

pub use documents::*;
pub use workflows::*;
