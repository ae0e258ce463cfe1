// Workflow definitions and their dependency graphs

pub mod dag;
mod definition;
mod render;
mod tokens;

pub use dag::DependencyGraph;
