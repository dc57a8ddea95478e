//! The execution engine: one background worker that loads dictionaries and
//! refreshes dynamic value sources, plus the read path used for suggestions.
//!
//! Callers enqueue commands; the worker runs them one at a time in FIFO
//! order. The first command that fails (or panics) is recorded as the fault,
//! the worker moves to [`WorkerState::Faulted`] and exits, leaving later
//! commands queued. Loaded suggestors are published as a whole new snapshot,
//! so [`ExecutionEngine::suggest`] never waits on the worker.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use command_suggest_core::{
    Dictionary, DictionarySuggestor, ExecutionContext, ParsingContext, Platforms, SuggestOptions,
    Suggestion, ValueSource,
};
use command_suggest_db::{DictionaryDatabase, SuggestConfig};
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};
use crate::process::ProcessContext;
use crate::queue::TaskQueue;

/// Lifecycle of the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No worker, or the worker was stopped.
    Stopped,
    /// Spawned but not yet draining the queue.
    Starting,
    /// Draining the queue.
    Running,
    /// Exited after a command failed; see [`Health::last_fault`].
    Faulted,
}

/// Snapshot of the engine's condition.
#[derive(Debug, Clone)]
pub struct Health {
    /// Worker lifecycle state.
    pub state: WorkerState,
    /// Most recent worker fault, kept across restarts.
    pub last_fault: Option<Arc<EngineError>>,
    /// Commands waiting in the queue.
    pub queued: usize,
    /// Dictionaries currently loaded.
    pub dictionaries: usize,
}

impl Health {
    /// `true` while the worker is alive and has not faulted.
    pub fn is_healthy(&self) -> bool {
        matches!(self.state, WorkerState::Starting | WorkerState::Running)
    }
}

enum EngineCommand {
    InitializeDictionary(PathBuf),
    RefreshSourceCache {
        source: ValueSource,
        working_directory: Option<String>,
    },
    RefreshDictionaryCache {
        dictionary: Arc<Dictionary>,
        working_directory: Option<String>,
    },
    Barrier(mpsc::Sender<()>),
}

impl fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializeDictionary(path) => {
                f.debug_tuple("InitializeDictionary").field(path).finish()
            }
            Self::RefreshSourceCache {
                source,
                working_directory,
            } => f
                .debug_struct("RefreshSourceCache")
                .field("source", &source.name)
                .field("working_directory", working_directory)
                .finish(),
            Self::RefreshDictionaryCache {
                dictionary,
                working_directory,
            } => f
                .debug_struct("RefreshDictionaryCache")
                .field("dictionary", &dictionary.name)
                .field("working_directory", working_directory)
                .finish(),
            Self::Barrier(_) => f.write_str("Barrier"),
        }
    }
}

type SuggestorSnapshot = Arc<Vec<Arc<DictionarySuggestor>>>;

struct Shared {
    context: Arc<dyn ExecutionContext>,
    options: SuggestOptions,
    state: Mutex<WorkerState>,
    last_fault: Mutex<Option<Arc<EngineError>>>,
    suggestors: RwLock<SuggestorSnapshot>,
}

impl Shared {
    fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn last_fault(&self) -> Option<Arc<EngineError>> {
        self.last_fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_fault(&self, fault: EngineError) {
        *self.last_fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(fault));
        self.set_state(WorkerState::Faulted);
    }

    fn suggestors(&self) -> SuggestorSnapshot {
        Arc::clone(&self.suggestors.read().unwrap_or_else(PoisonError::into_inner))
    }

    // Replaces suggestors by dictionary name, appending new ones.
    fn publish(&self, loaded: Vec<Arc<DictionarySuggestor>>) {
        let current = self.suggestors();
        let mut next: Vec<Arc<DictionarySuggestor>> = current
            .iter()
            .filter(|existing| {
                !loaded
                    .iter()
                    .any(|new| new.dictionary().name == existing.dictionary().name)
            })
            .cloned()
            .collect();
        next.extend(loaded);
        *self.suggestors.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    fn execute(&self, command: EngineCommand) -> Result<()> {
        match command {
            EngineCommand::InitializeDictionary(path) => self.load(path),
            EngineCommand::RefreshSourceCache {
                source,
                working_directory,
            } => {
                source.store().clear_refresh_queued();
                source.refresh_cache(working_directory.as_deref())?;
                Ok(())
            }
            EngineCommand::RefreshDictionaryCache {
                dictionary,
                working_directory,
            } => {
                let working_directory = working_directory.as_deref();
                for source in dictionary.sources() {
                    if source.needs_refresh(working_directory) {
                        source.store().clear_refresh_queued();
                        source.refresh_cache(working_directory)?;
                    }
                }
                Ok(())
            }
            EngineCommand::Barrier(done) => {
                // the waiter may have timed out already
                let _ = done.send(());
                Ok(())
            }
        }
    }

    fn load(&self, path: PathBuf) -> Result<()> {
        let db = DictionaryDatabase::from_path(&path)?;
        let platform = Platforms::current();
        let mut loaded = Vec::new();

        for dictionary in db.into_dictionaries() {
            if !dictionary.supports(platform) {
                debug!(dictionary = %dictionary.name, "Skipping dictionary for another platform");
                continue;
            }
            dictionary.initialize(Some(Arc::clone(&self.context)))?;
            loaded.push(Arc::new(
                DictionarySuggestor::new(Arc::new(dictionary)).with_options(self.options),
            ));
        }

        info!(path = %path.display(), dictionaries = loaded.len(), "Initialized dictionaries");
        self.publish(loaded);
        Ok(())
    }
}

struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn run_worker(queue: TaskQueue<EngineCommand>, shared: Arc<Shared>, stop: Arc<AtomicBool>) {
    shared.set_state(WorkerState::Running);
    info!("Worker started");

    while let Some(command) = queue.pop(&stop) {
        let label = format!("{command:?}");
        let fault = match panic::catch_unwind(AssertUnwindSafe(|| shared.execute(command))) {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => err,
            Err(payload) => EngineError::WorkerPanicked(panic_message(payload.as_ref())),
        };
        error!(command = %label, error = %fault, "Worker faulted");
        shared.record_fault(fault);
        return;
    }

    shared.set_state(WorkerState::Stopped);
    info!("Worker stopped");
}

/// Owns the background worker, its command queue and the loaded
/// suggestors.
///
/// Commands may be enqueued before [`start`](Self::start); they run once a
/// worker is alive.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use command_suggest_core::{ParsingContext, tokenize};
/// use command_suggest_engine::ExecutionEngine;
///
/// let mut engine = ExecutionEngine::with_process_context();
/// engine.initialize_dictionary("dictionaries/");
/// engine.start().unwrap();
/// engine.sync(Duration::from_secs(5)).unwrap();
///
/// let request = ParsingContext::new(tokenize(["git", "c"], false));
/// for suggestion in engine.suggest(&request) {
///     println!("{suggestion}");
/// }
/// engine.stop().unwrap();
/// ```
pub struct ExecutionEngine {
    queue: TaskQueue<EngineCommand>,
    shared: Arc<Shared>,
    refresh_on_suggest: bool,
    worker: Option<Worker>,
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("state", &self.shared.state())
            .field("queued", &self.queue.len())
            .field("refresh_on_suggest", &self.refresh_on_suggest)
            .finish()
    }
}

impl ExecutionEngine {
    /// Creates a stopped engine whose sources run through `context`.
    pub fn new(context: Arc<dyn ExecutionContext>) -> Self {
        Self::with_options(context, SuggestOptions::default())
    }

    /// Creates a stopped engine with explicit matching options.
    pub fn with_options(context: Arc<dyn ExecutionContext>, options: SuggestOptions) -> Self {
        Self {
            queue: TaskQueue::new(),
            shared: Arc::new(Shared {
                context,
                options,
                state: Mutex::new(WorkerState::Stopped),
                last_fault: Mutex::new(None),
                suggestors: RwLock::new(Arc::new(Vec::new())),
            }),
            refresh_on_suggest: true,
            worker: None,
        }
    }

    /// Creates a stopped engine backed by a [`ProcessContext`].
    pub fn with_process_context() -> Self {
        Self::new(Arc::new(ProcessContext::new()))
    }

    /// Creates a stopped engine from a configuration file's settings and
    /// enqueues its dictionaries.
    pub fn from_config(config: &SuggestConfig) -> Self {
        let context = ProcessContext::new().with_timeout(config.execution.command_timeout());
        let mut engine = Self::with_options(Arc::new(context), config.suggest_options());
        engine.refresh_on_suggest = config.execution.refresh_on_suggest;
        for path in &config.dictionaries {
            engine.initialize_dictionary(path.clone());
        }
        engine
    }

    /// Enables or disables refresh scheduling from [`suggest`](Self::suggest).
    pub fn set_refresh_on_suggest(&mut self, enabled: bool) {
        self.refresh_on_suggest = enabled;
    }

    /// Spawns the worker.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyStarted`] if a worker exists, including
    /// a faulted one that was not [`stop`](Self::stop)ped yet.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        self.shared.set_state(WorkerState::Starting);
        let stop = Arc::new(AtomicBool::new(false));
        let queue = self.queue.clone();
        let shared = Arc::clone(&self.shared);
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("suggest-worker".to_string())
            .spawn(move || run_worker(queue, shared, worker_stop))
            .map_err(|err| {
                self.shared.set_state(WorkerState::Stopped);
                EngineError::Spawn(err)
            })?;

        self.worker = Some(Worker { handle, stop });
        debug!(queued = self.queue.len(), "Spawned worker");
        Ok(())
    }

    /// Signals the worker and waits for it to finish its current command.
    ///
    /// Queued commands are kept for the next [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotStarted`] if there is no worker.
    pub fn stop(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(EngineError::NotStarted)?;
        worker.stop.store(true, Ordering::Release);
        self.queue.wake_all();
        if worker.handle.join().is_err() {
            warn!("Worker thread panicked outside a command");
        }
        self.shared.set_state(WorkerState::Stopped);
        Ok(())
    }

    /// Enqueues loading of a dictionary file or directory.
    pub fn initialize_dictionary(&self, path: impl Into<PathBuf>) {
        self.queue
            .push(EngineCommand::InitializeDictionary(path.into()));
    }

    /// Enqueues a refresh of one value source.
    pub fn refresh_cache(&self, source: &ValueSource, working_directory: Option<&str>) {
        self.queue.push(EngineCommand::RefreshSourceCache {
            source: source.clone(),
            working_directory: working_directory.map(String::from),
        });
    }

    /// Enqueues a refresh of every due dynamic source of `dictionary`.
    pub fn cache_dictionary(&self, dictionary: &Arc<Dictionary>, working_directory: Option<&str>) {
        self.queue.push(EngineCommand::RefreshDictionaryCache {
            dictionary: Arc::clone(dictionary),
            working_directory: working_directory.map(String::from),
        });
    }

    /// Waits until every command enqueued before this call has run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotStarted`] without a worker,
    /// [`EngineError::WorkerExited`] if the worker stops or faults first, and
    /// [`EngineError::SyncTimeout`] when `timeout` elapses.
    pub fn sync(&self, timeout: Duration) -> Result<()> {
        let Some(worker) = &self.worker else {
            return Err(EngineError::NotStarted);
        };

        let (done, reached) = mpsc::channel();
        self.queue.push(EngineCommand::Barrier(done));

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match reached.recv_timeout(remaining.min(Duration::from_millis(10))) {
                Ok(()) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => return Err(EngineError::WorkerExited),
                Err(RecvTimeoutError::Timeout) => {
                    if worker.handle.is_finished() {
                        return Err(EngineError::WorkerExited);
                    }
                    if remaining.is_zero() {
                        return Err(EngineError::SyncTimeout);
                    }
                }
            }
        }
    }

    /// Current health snapshot.
    pub fn health(&self) -> Health {
        Health {
            state: self.shared.state(),
            last_fault: self.shared.last_fault(),
            queued: self.queue.len(),
            dictionaries: self.shared.suggestors().len(),
        }
    }

    /// `true` while a worker is alive and has not faulted.
    pub fn is_healthy(&self) -> bool {
        self.worker.is_some() && self.health().is_healthy()
    }

    /// The most recent worker fault.
    pub fn last_fault(&self) -> Option<Arc<EngineError>> {
        self.shared.last_fault()
    }

    /// The currently loaded suggestors, as an immutable snapshot.
    pub fn suggestors(&self) -> Arc<Vec<Arc<DictionarySuggestor>>> {
        self.shared.suggestors()
    }

    /// Suggestions for `request` from the suggestor that handles its command.
    ///
    /// Reads cached values only. When refresh scheduling is enabled, dynamic
    /// sources of the selected dictionary that need a refresh are enqueued,
    /// at most one pending refresh per source.
    pub fn suggest(&self, request: &ParsingContext) -> Vec<Suggestion> {
        let snapshot = self.shared.suggestors();
        let Some(suggestor) = snapshot
            .iter()
            .find(|s| s.matches_command(&request.command))
        else {
            return Vec::new();
        };

        if self.refresh_on_suggest {
            let working_directory = request.working_directory.as_deref();
            for source in suggestor.dictionary().sources() {
                if source.needs_refresh(working_directory)
                    && source.store().try_mark_refresh_queued()
                {
                    self.refresh_cache(source, working_directory);
                }
            }
        }

        suggestor.get_predictions(request).collect()
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop();
        }
    }
}
