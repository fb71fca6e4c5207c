// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`launcher`] provides the `WorkerLauncher` trait and the production
//!   `ProcessLauncher`, which starts every job's worker as its own OS process.
//!   Tests replace it with an in-process launcher.

pub mod launcher;

pub use launcher::{ProcessLauncher, WorkerLauncher};
