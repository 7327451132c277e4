//! File system helpers shared by the archiver, sources and targets.

pub mod metadata;
pub mod walker;
