//! # evh-root
//!
//! Concrete collaborators for the evh analysis layer: an expression engine,
//! a TTree::Draw-style histogram filler, in-memory columnar trees loaded from
//! JSON, and JSON result documents.
//!
//! ## Example
//!
//! ```no_run
//! use evh_core::{Axis, EventSource, Histogram};
//! use evh_root::MemoryFile;
//!
//! let f = MemoryFile::open("events.json").unwrap();
//! let tree = f.tree("Event.").unwrap();
//! let mut h = Histogram::new("x", "", vec![Axis::uniform(10, 0.0, 1.0).unwrap()]).unwrap();
//! tree.query_fill(&mut h, "Primary.x", "1", 0..tree.entry_count()).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod expr;
pub mod file;
pub mod filler;
pub mod output;
pub mod tree;

pub use error::{Result, RootError};
pub use expr::CompiledExpr;
pub use file::MemoryFile;
pub use filler::{Column, fill_range};
pub use output::{JsonSink, ResultDocument};
pub use tree::{MemoryTree, SPECIES_ID_LEAF};
