//! # CountDb - A Durable Counter Transaction Engine
//!
//! CountDb executes small, pre-compiled transaction scripts against named
//! 64-bit integer counters and durably persists the resulting mutations.
//! Results are returned synchronously from cache state; durability happens
//! asynchronously through a write-ahead batching pipeline.
//!
//! ## Architecture
//!
//! The engine consists of several key components:
//!
//! - **Program**: compact bytecode decoded into compare-then-mutate
//!   instructions and executed in order, exactly once each
//! - **Cache**: shared in-memory counter store with dirty tracking
//! - **Journal**: write-ahead epoch log bracketing every durability epoch
//! - **Pipeline**: background worker rotating dirty counters out of the
//!   cache and flushing them to storage in FIFO order with retry
//! - **Storage**: the persistent sink, file-backed or in-memory
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use countdb::{FileStorage, Options, ScriptRequest, Service};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), countdb::Error> {
//! let storage = Arc::new(FileStorage::open("./data/counters.db")?);
//! let service = Service::open("./data", Options::default(), storage)?;
//!
//! // INC "hits" if it still equals 5 (compare-and-increment).
//! let request = ScriptRequest {
//!     names: vec!["hits".into()],
//!     code: vec![0x1013, 0, 5], // op=INC cmp=EQ target=NAME(0) operand=IMM16U(5)
//! };
//! let response = service.process(&request)?;
//! println!("results: {:?}", response.results);
//!
//! service.close();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod cache;
pub mod config;
pub mod error;
pub mod journal;
pub mod pipeline;
pub mod program;
pub mod service;
pub mod storage;

// Re-exports
pub use cache::{Batch, Cache, CounterId};
pub use config::Options;
pub use error::{Error, Result};
pub use journal::Journal;
pub use pipeline::BatchSubmitter;
pub use program::{Cmp, Instruction, Op, Program};
pub use service::{ScriptRequest, ScriptResponse, Service};
pub use storage::{FileStorage, MemoryStorage, Storage};
