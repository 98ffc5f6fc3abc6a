//! Type definitions for graph paths.

/// A step in a path: a map key or a decimal sequence index.
pub type PathStep = String;

/// A path as a list of steps.
pub type Path = Vec<PathStep>;
