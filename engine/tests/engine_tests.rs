use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use command_suggest_core::{
    CachePolicy, Clock, Dictionary, ExecutionContext, Parameter, ParsingContext, Platforms,
    SourceError, SourceItem, ValueSource, tokenize,
};
use command_suggest_engine::{EngineError, ExecutionEngine, WorkerState};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct FakeContext {
    calls: AtomicUsize,
    panic_on_execute: bool,
}

impl Clock for FakeContext {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl ExecutionContext for FakeContext {
    fn execute(
        &self,
        _command: &str,
        _working_directory: Option<&str>,
    ) -> Result<Vec<SourceItem>, SourceError> {
        if self.panic_on_execute {
            panic!("source exploded");
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            SourceItem::from_name("First"),
            SourceItem::from_name("Second"),
        ])
    }
}

fn git_dictionary() -> Dictionary {
    Dictionary::new("git")
        .with_parameter(Parameter::command("commit"))
        .with_parameter(
            Parameter::command("checkout").with_parameter(
                Parameter::positional("Branch").with_source(
                    ValueSource::new_dynamic("Branches", "git branch").with_cache(CachePolicy {
                        by_time_secs: Some(60),
                        by_current_working_directory: true,
                    }),
                ),
            ),
        )
}

fn write_dictionary(dir: &Path, dictionary: &Dictionary) -> PathBuf {
    let path = dir.join(format!("{}.json", dictionary.name));
    std::fs::write(&path, serde_json::to_string_pretty(dictionary).unwrap()).unwrap();
    path
}

fn request(words: &[&str]) -> ParsingContext {
    ParsingContext::new(tokenize(words.iter().copied(), false)).with_working_directory("/repo")
}

fn texts(engine: &ExecutionEngine, words: &[&str]) -> Vec<String> {
    engine
        .suggest(&request(words))
        .into_iter()
        .map(|s| s.text)
        .collect()
}

fn other_platform() -> Platforms {
    if Platforms::current() == Platforms::WINDOWS {
        Platforms::LINUX
    } else {
        Platforms::WINDOWS
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_start_stop_misuse() {
    let mut engine = ExecutionEngine::new(Arc::new(FakeContext::default()));
    assert!(matches!(engine.stop(), Err(EngineError::NotStarted)));
    assert!(matches!(engine.sync(TIMEOUT), Err(EngineError::NotStarted)));

    engine.start().unwrap();
    assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));
    engine.sync(TIMEOUT).unwrap();
    assert!(engine.is_healthy());
    assert_eq!(engine.health().state, WorkerState::Running);

    engine.stop().unwrap();
    assert_eq!(engine.health().state, WorkerState::Stopped);
    assert!(!engine.is_healthy());
    assert!(matches!(engine.stop(), Err(EngineError::NotStarted)));
}

#[test]
fn test_commands_enqueued_before_start_run_after_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &git_dictionary());

    let mut engine = ExecutionEngine::new(Arc::new(FakeContext::default()));
    engine.initialize_dictionary(&path);
    assert!(engine.suggestors().is_empty());

    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();
    assert_eq!(engine.suggestors().len(), 1);
    assert_eq!(texts(&engine, &["git", "c"]), vec!["git commit", "git checkout"]);
}

#[test]
fn test_stop_keeps_queue_for_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &git_dictionary());

    let mut engine = ExecutionEngine::new(Arc::new(FakeContext::default()));
    engine.start().unwrap();
    engine.stop().unwrap();

    engine.initialize_dictionary(&path);
    assert_eq!(engine.health().queued, 1);

    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();
    assert_eq!(engine.health().dictionaries, 1);
}

// ---------------------------------------------------------------------------
// Dictionary loading
// ---------------------------------------------------------------------------

#[test]
fn test_reload_replaces_dictionary_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &git_dictionary());

    let mut engine = ExecutionEngine::new(Arc::new(FakeContext::default()));
    engine.initialize_dictionary(&path);
    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();
    let before = engine.suggestors();

    let updated = Dictionary::new("git").with_parameter(Parameter::command("clone"));
    write_dictionary(dir.path(), &updated);
    engine.initialize_dictionary(&path);
    engine.sync(TIMEOUT).unwrap();

    assert_eq!(engine.suggestors().len(), 1);
    assert_eq!(texts(&engine, &["git", "c"]), vec!["git clone"]);
    // a snapshot taken earlier is unaffected
    assert_eq!(before[0].dictionary().parameters.len(), 2);
}

#[test]
fn test_directory_load_skips_other_platforms() {
    let dir = tempfile::tempdir().unwrap();
    write_dictionary(dir.path(), &git_dictionary());
    write_dictionary(
        dir.path(),
        &Dictionary::new("foreign")
            .with_platforms(other_platform())
            .with_parameter(Parameter::command("run")),
    );

    let mut engine = ExecutionEngine::new(Arc::new(FakeContext::default()));
    engine.initialize_dictionary(dir.path());
    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();

    let names: Vec<String> = engine
        .suggestors()
        .iter()
        .map(|s| s.dictionary().name.clone())
        .collect();
    assert_eq!(names, vec!["git"]);
    assert!(texts(&engine, &["foreign", ""]).is_empty());
}

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

#[test]
fn test_load_failure_faults_worker_and_keeps_rest_queued() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &git_dictionary());

    let mut engine = ExecutionEngine::new(Arc::new(FakeContext::default()));
    engine.initialize_dictionary(dir.path().join("missing.json"));
    engine.initialize_dictionary(&path);
    engine.start().unwrap();

    assert!(matches!(engine.sync(TIMEOUT), Err(EngineError::WorkerExited)));
    let health = engine.health();
    assert_eq!(health.state, WorkerState::Faulted);
    assert!(!engine.is_healthy());
    assert!(matches!(
        health.last_fault.as_deref(),
        Some(EngineError::Database(_))
    ));
    assert!(engine.suggestors().is_empty());
    assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));

    // restart drains what was left behind
    engine.stop().unwrap();
    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();
    assert_eq!(engine.suggestors().len(), 1);
    assert!(engine.last_fault().is_some());
}

#[test]
fn test_invalid_dictionary_is_configuration_fault() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &Dictionary::new("empty"));

    let mut engine = ExecutionEngine::new(Arc::new(FakeContext::default()));
    engine.initialize_dictionary(&path);
    engine.start().unwrap();

    assert!(engine.sync(TIMEOUT).is_err());
    assert!(matches!(
        engine.last_fault().as_deref(),
        Some(EngineError::Configuration(_))
    ));
}

#[test]
fn test_panicking_source_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &git_dictionary());
    let context = FakeContext {
        panic_on_execute: true,
        ..FakeContext::default()
    };

    let mut engine = ExecutionEngine::new(Arc::new(context));
    engine.initialize_dictionary(&path);
    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();

    let suggestors = engine.suggestors();
    engine.cache_dictionary(suggestors[0].dictionary(), Some("/repo"));
    assert!(engine.sync(TIMEOUT).is_err());

    match engine.last_fault().as_deref() {
        Some(EngineError::WorkerPanicked(message)) => assert_eq!(message, "source exploded"),
        other => panic!("unexpected fault {other:?}"),
    }
    assert_eq!(engine.health().state, WorkerState::Faulted);
}

// ---------------------------------------------------------------------------
// Dynamic sources
// ---------------------------------------------------------------------------

#[test]
fn test_suggest_schedules_refresh_then_serves_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &git_dictionary());
    let context = Arc::new(FakeContext::default());

    let mut engine = ExecutionEngine::new(context.clone());
    engine.initialize_dictionary(&path);
    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();

    // nothing cached yet: no values, but a refresh is scheduled
    assert!(texts(&engine, &["git", "checkout", "F"]).is_empty());
    engine.sync(TIMEOUT).unwrap();
    assert_eq!(
        texts(&engine, &["git", "checkout", "F"]),
        vec!["git checkout First"]
    );
    assert_eq!(context.calls.load(Ordering::SeqCst), 1);

    // fresh entry: no further refresh
    texts(&engine, &["git", "checkout", ""]);
    engine.sync(TIMEOUT).unwrap();
    assert_eq!(context.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_at_most_one_queued_refresh_per_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &git_dictionary());
    let context = Arc::new(FakeContext::default());

    let mut engine = ExecutionEngine::new(context.clone());
    engine.initialize_dictionary(&path);
    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();
    engine.stop().unwrap();

    for _ in 0..5 {
        texts(&engine, &["git", "checkout", "F"]);
    }
    assert_eq!(engine.health().queued, 1);

    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();
    assert_eq!(context.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_refresh_disabled_on_suggest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &git_dictionary());
    let context = Arc::new(FakeContext::default());

    let mut engine = ExecutionEngine::new(context.clone());
    engine.set_refresh_on_suggest(false);
    engine.initialize_dictionary(&path);
    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();

    texts(&engine, &["git", "checkout", "F"]);
    engine.sync(TIMEOUT).unwrap();
    assert_eq!(context.calls.load(Ordering::SeqCst), 0);

    // explicit refresh still works
    let suggestors = engine.suggestors();
    engine.cache_dictionary(suggestors[0].dictionary(), Some("/repo"));
    engine.sync(TIMEOUT).unwrap();
    assert_eq!(
        texts(&engine, &["git", "checkout", "S"]),
        vec!["git checkout Second"]
    );
}

#[test]
fn test_cache_is_scoped_to_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dictionary(dir.path(), &git_dictionary());

    let mut engine = ExecutionEngine::new(Arc::new(FakeContext::default()));
    engine.set_refresh_on_suggest(false);
    engine.initialize_dictionary(&path);
    engine.start().unwrap();
    engine.sync(TIMEOUT).unwrap();

    let suggestors = engine.suggestors();
    let source = suggestors[0].dictionary().sources()[0];
    engine.refresh_cache(source, Some("/repo"));
    engine.sync(TIMEOUT).unwrap();

    assert_eq!(texts(&engine, &["git", "checkout", "F"]).len(), 1);
    let elsewhere = ParsingContext::new(tokenize(["git", "checkout", "F"], false))
        .with_working_directory("/elsewhere");
    assert!(engine.suggest(&elsewhere).is_empty());
}
