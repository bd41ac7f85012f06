//! Threaded interface for submitting and cancelling queries.
//!
//! Each query runs on its own thread and hands its answer back over a
//! channel. Cancellation is cooperative: the worker checks its token between
//! lexing, validation and evaluation, and a query cancelled while evaluating
//! discards its answer.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::datasource::Datasource;
use crate::error::{Result, WhereError};
use crate::recordset::RecordSet;
use crate::statement::Where;

/// Cancellation token shared with the worker thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Opaque query identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(u64);

/// Handle to a running or completed query.
pub struct QueryHandle {
    pub id: QueryId,
    cancel: CancelToken,
    started: Instant,
    join: Option<JoinHandle<()>>,
    results: Receiver<Result<RecordSet>>,
}
impl QueryHandle {
    /// Request cancellation (cooperative). The worker may take a short time to observe it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
    /// Wait for the query to finish and take its answer.
    pub fn join(mut self) -> Result<RecordSet> {
        let outcome = self.results.recv().unwrap_or(Err(WhereError::Cancelled));
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
        outcome
    }
    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Query submission options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// The file the statement is evaluated against.
    pub scope: String,
    /// Values for `?name?` placeholders.
    pub replacements: HashMap<String, String>,
    /// Give up once this much time has passed, checked between steps.
    pub timeout: Option<Duration>,
}

impl QueryOptions {
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            ..Self::default()
        }
    }
}

type Registry = Arc<Mutex<HashMap<QueryId, CancelToken>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry managing query lifecycles.
pub struct QueryInterface<D> {
    datasource: Arc<D>,
    config: EngineConfig,
    next_id: Mutex<u64>,
    active: Registry, // for external cancellation
}

impl<D: Datasource + Send + Sync + 'static> QueryInterface<D> {
    pub fn new(datasource: Arc<D>, config: EngineConfig) -> Self {
        Self {
            datasource,
            config,
            next_id: Mutex::new(0),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn allocate_id(&self) -> QueryId {
        let mut g = lock(&self.next_id);
        *g += 1;
        QueryId(*g)
    }

    /// Submit a statement for evaluation on a background thread.
    pub fn start_query(&self, statement: String, options: QueryOptions) -> QueryHandle {
        let id = self.allocate_id();
        let cancel = CancelToken::new();
        lock(&self.active).insert(id, cancel.clone());

        let (tx, rx) = mpsc::channel();
        let datasource = Arc::clone(&self.datasource);
        let config = self.config.clone();
        let active = Arc::clone(&self.active);
        let cancel_for_thread = cancel.clone();
        let started = Instant::now();
        let join = std::thread::spawn(move || {
            let outcome = run_query(
                &statement,
                datasource.as_ref(),
                options,
                &config,
                &cancel_for_thread,
                started,
            );
            log_outcome(id, started, &outcome);
            lock(&active).remove(&id);
            // the handle may have been dropped
            let _ = tx.send(outcome);
        });

        QueryHandle {
            id,
            cancel,
            started,
            join: Some(join),
            results: rx,
        }
    }

    /// Run a statement on the current thread.
    pub fn run_sync(&self, statement: &str, options: QueryOptions) -> Result<RecordSet> {
        let started = Instant::now();
        run_query(
            statement,
            self.datasource.as_ref(),
            options,
            &self.config,
            &CancelToken::new(),
            started,
        )
    }

    /// Cancel a query by id.
    pub fn cancel(&self, id: QueryId) -> bool {
        if let Some(tok) = lock(&self.active).get(&id) {
            tok.cancel();
            true
        } else {
            false
        }
    }

    /// Queries started and not yet finished.
    pub fn active_queries(&self) -> usize {
        lock(&self.active).len()
    }
}

fn log_outcome(id: QueryId, started: Instant, outcome: &Result<RecordSet>) {
    let ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(answer) => info!(query = id.0, ms, records = answer.count(), "query complete"),
        Err(WhereError::Cancelled) => info!(query = id.0, ms, "query cancelled"),
        Err(e) => warn!(query = id.0, ms, error = %e, "query failed"),
    }
}

fn run_query<D: Datasource + ?Sized>(
    statement: &str,
    datasource: &D,
    mut options: QueryOptions,
    config: &EngineConfig,
    cancel: &CancelToken,
    started: Instant,
) -> Result<RecordSet> {
    let checkpoint = || {
        let expired = options.timeout.is_some_and(|t| started.elapsed() > t);
        if cancel.is_cancelled() || expired {
            Err(WhereError::Cancelled)
        } else {
            Ok(())
        }
    };
    let mut query = Where::new(statement);
    checkpoint()?;
    query.parse()?;
    query.fill_placeholders(&mut options.replacements)?;
    checkpoint()?;
    query.validate(datasource, &options.scope)?;
    checkpoint()?;
    let answer = query.evaluate_with(datasource, &options.scope, config)?;
    checkpoint()?;
    Ok(answer)
}
