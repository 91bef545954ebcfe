//! # evh-core
//!
//! Core types shared by the evh crates: the error taxonomy, the
//! N-dimensional histogram buffer and the traits through which the analysis
//! layer reaches record data and output storage.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod histogram;
pub mod traits;

pub use error::{Error, Result};
pub use histogram::{Axis, Histogram, MAX_DIMENSIONS};
pub use traits::{EventSource, HistogramSink, TreeProvider};
