//! Request orchestration.
//!
//! A request carries counter names and a bytecode script. Processing is
//! three phases: hydrate (fetch uncached counters from storage), compute
//! (compile + run, synchronous against the cache; scripts execute one at
//! a time, so instructions from concurrent requests never interleave), and
//! the persist signal. The counters the script wrote are already dirty in
//! the cache when `run` returns, which is all the durability pipeline
//! needs. The request completes without waiting for storage.
//!
//! The network transport is not part of this crate; a server binds
//! [`Service::process`] (or [`Service::process_json`] for a JSON endpoint)
//! to whatever framing it uses.

use crate::cache::Cache;
use crate::config::Options;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::pipeline::BatchSubmitter;
use crate::program::Program;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// A transaction script request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// Counter names the script references, in NAME-index order.
    #[serde(rename = "s")]
    pub names: Vec<String>,

    /// The bytecode word stream.
    #[serde(rename = "c")]
    pub code: Vec<u16>,
}

/// The response to a script request: one result per instruction, in
/// encoded order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptResponse {
    /// Result values, one per executed instruction.
    pub results: Vec<i64>,
}

/// The counter transaction service.
///
/// Wires the shared cache, the epoch journal, and a storage sink together
/// and runs the durability pipeline for its lifetime. Any number of
/// threads may call [`Service::process`] concurrently.
///
/// # Example
///
/// ```rust,no_run
/// use countdb::{FileStorage, Options, ScriptRequest, Service};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), countdb::Error> {
/// let storage = Arc::new(FileStorage::open("./data/counters.db")?);
/// let service = Service::open("./data", Options::default(), storage)?;
///
/// // One instruction: INC "hits", unconditional.
/// let request = ScriptRequest { names: vec!["hits".into()], code: vec![0x1F10, 0] };
/// let response = service.process(&request)?;
/// println!("hits = {}", response.results[0]);
///
/// service.close();
/// # Ok(())
/// # }
/// ```
pub struct Service {
    cache: Arc<Cache>,
    storage: Arc<dyn Storage>,
    /// Serializes the compute phase: a script's instructions never
    /// interleave with another request's instructions.
    run_lock: parking_lot::Mutex<()>,
    submitter: Option<BatchSubmitter>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("submitter_active", &self.submitter.is_some())
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Opens the service with its data directory and storage sink.
    ///
    /// The directory holds the epoch journal; it is created if missing
    /// (unless disabled in options). Unconfirmed epochs found in the
    /// journal are logged; their writes may not have reached storage.
    pub fn open<P: AsRef<Path>>(
        dir: P,
        options: Options,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        options.validate()?;

        let dir = dir.as_ref();
        if !dir.exists() {
            if options.create_if_missing {
                std::fs::create_dir_all(dir)?;
            } else {
                return Err(Error::invalid_argument(format!(
                    "Data directory does not exist: {:?}",
                    dir
                )));
            }
        }

        let journal = Journal::open(dir.join(&options.journal_filename), options.sync_journal)?;
        let cache = Arc::new(Cache::new());
        let submitter = BatchSubmitter::spawn(
            Arc::clone(&cache),
            journal,
            Arc::clone(&storage),
            options.flush_interval,
        )?;

        log::info!("Service opened at {:?}", dir);
        Ok(Self { cache, storage, run_lock: parking_lot::Mutex::new(()), submitter: Some(submitter) })
    }

    /// Executes one script request and returns its results.
    ///
    /// Compile errors abort the request before any counter is touched.
    /// The response is produced entirely from cache state; durability of
    /// the script's writes happens later, out of band.
    pub fn process(&self, request: &ScriptRequest) -> Result<ScriptResponse> {
        let ids = self.cache.acquire(&request.names);
        let mut program = Program::compile(&request.code, ids, &self.cache)?;

        program.hydrate(&self.cache, self.storage.as_ref())?;
        {
            let _serial = self.run_lock.lock();
            program.run();
        }
        log::debug!("Script ran {} instruction(s)", program.len());

        Ok(ScriptResponse { results: program.into_results() })
    }

    /// JSON boundary for [`Service::process`]: takes the request as a
    /// `{"s": [...], "c": [...]}` document, returns the response document.
    pub fn process_json(&self, request: &str) -> Result<String> {
        let request: ScriptRequest =
            serde_json::from_str(request).map_err(|e| Error::Serialization(e.to_string()))?;
        let response = self.process(&request)?;
        serde_json::to_string(&response).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Stops the durability pipeline and returns once it has drained.
    ///
    /// The pipeline's shutdown pass rotates and attempts to store anything
    /// still dirty; batches storage keeps rejecting stay journaled as
    /// unconfirmed epochs.
    pub fn close(mut self) {
        if let Some(submitter) = self.submitter.take() {
            submitter.close();
        }
        log::info!("Service closed");
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        // Best-effort: an explicit close() already took the submitter.
        if let Some(submitter) = self.submitter.take() {
            submitter.close();
        }
    }
}
