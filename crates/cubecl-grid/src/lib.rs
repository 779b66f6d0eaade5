#![warn(missing_docs)]

//! Cooperative core grid used to execute partition kernels on the host.
//!
//! A launch runs the same kernel on a fixed number of cores, each on its own worker thread.
//! Cores communicate through [GlobalMemory] and a [Workspace] of counters, and synchronize
//! with a grid-wide barrier. Each core streams data through a two-slot [ScratchPipeline]
//! sized by its scratch memory.

extern crate alloc;

#[macro_use]
extern crate derive_new;

/// Global configuration module.
pub mod config;
/// Kernel logging module.
pub mod logging;

mod grid;
mod memory;
mod pipeline;
mod platform;

pub use grid::*;
pub use memory::*;
pub use pipeline::*;
pub use platform::*;
