use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use command_suggest_core::{MatchMode, ParsingContext, StalenessPolicy, split_line, tokenize};
use command_suggest_db::{DictionaryDatabase, SuggestConfig};
use command_suggest_engine::ExecutionEngine;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "suggest")]
#[command(about = "Suggest command-line completions from command dictionaries")]
#[command(version)]
struct Cli {
    /// Log engine activity to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print suggestions for a partially typed command line
    Complete(CompleteArgs),

    /// Validate dictionary files or directories
    Validate(ValidateArgs),

    /// List the dictionaries found in files or directories
    List(ListArgs),
}

#[derive(Args)]
struct CompleteArgs {
    /// Engine configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dictionary file or directory (repeatable, added after the config's)
    #[arg(short, long = "dictionary")]
    dictionaries: Vec<PathBuf>,

    /// Working directory for dynamic sources
    #[arg(long)]
    cwd: Option<String>,

    /// Candidate matching (overrides the config)
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Drop expired cache entries instead of serving them
    #[arg(long)]
    reject_expired: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Seconds to wait for dictionaries and sources to load
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Raw command line to complete, split like a shell would
    #[arg(short, long, conflicts_with = "words")]
    line: Option<String>,

    /// The line ends with a space (a new word is being started)
    #[arg(short, long)]
    trailing_space: bool,

    /// Words of the command line
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    words: Vec<String>,
}

#[derive(Args)]
struct ValidateArgs {
    /// Dictionary files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Args)]
struct ListArgs {
    /// Dictionary files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Prefix,
    Contains,
}

impl From<ModeArg> for MatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Prefix => MatchMode::Prefix,
            ModeArg::Contains => MatchMode::Contains,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Complete(args) => run_complete(args),
        Commands::Validate(args) => run_validate(args),
        Commands::List(args) => run_list(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn run_complete(args: CompleteArgs) -> Result<(), String> {
    let mut config = match &args.config {
        Some(path) => SuggestConfig::load(path)
            .map_err(|e| format!("failed to load config {}: {e}", path.display()))?,
        None => SuggestConfig::default(),
    };
    config.dictionaries.extend(args.dictionaries);
    if let Some(mode) = args.mode {
        config.matching.mode = mode.into();
    }
    if args.reject_expired {
        config.matching.staleness = StalenessPolicy::RejectExpired;
    }
    if config.dictionaries.is_empty() {
        return Err("no dictionaries given (use --dictionary or --config)".to_string());
    }

    let (words, trailing_space) = match &args.line {
        Some(line) => split_line(line),
        None => (args.words, args.trailing_space),
    };
    let tokens = tokenize(words, trailing_space);
    if tokens.is_empty() {
        return Err("nothing to complete".to_string());
    }
    let mut request = ParsingContext::new(tokens);
    if let Some(cwd) = &args.cwd {
        request = request.with_working_directory(cwd.clone());
    }

    // A one-shot process: load everything up front, then answer once.
    let timeout = Duration::from_secs(args.timeout_secs);
    let mut engine = ExecutionEngine::from_config(&config);
    engine.set_refresh_on_suggest(false);
    engine.start().map_err(|e| e.to_string())?;
    engine.sync(timeout).map_err(|e| describe_failure(&engine, e))?;

    let snapshot = engine.suggestors();
    if let Some(suggestor) = snapshot.iter().find(|s| s.matches_command(&request.command)) {
        engine.cache_dictionary(suggestor.dictionary(), request.working_directory.as_deref());
        // Failed sources only lose their values; static candidates still apply.
        if let Err(err) = engine.sync(timeout) {
            warn!(error = %describe_failure(&engine, err), "Dynamic sources unavailable");
        }
    } else {
        debug!(command = %request.command, "No dictionary handles command");
    }

    let suggestions = engine.suggest(&request);
    engine.stop().map_err(|e| e.to_string())?;
    info!(count = suggestions.len(), "Completed");

    match args.format {
        OutputFormat::Text => {
            for suggestion in &suggestions {
                match &suggestion.description {
                    Some(description) => println!("{suggestion}\t{description}"),
                    None => println!("{suggestion}"),
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&suggestions)
                .map_err(|e| format!("failed to serialize suggestions: {e}"))?;
            println!("{json}");
        }
    }

    Ok(())
}

fn describe_failure(engine: &ExecutionEngine, err: command_suggest_engine::EngineError) -> String {
    match engine.last_fault() {
        Some(fault) => format!("{err}: {fault}"),
        None => err.to_string(),
    }
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let mut checked = 0usize;
    let mut failures = Vec::new();

    for path in &args.paths {
        let db = match DictionaryDatabase::from_path(path) {
            Ok(db) => db,
            Err(e) => {
                failures.push(e.to_string());
                continue;
            }
        };
        for dictionary in db.iter() {
            checked += 1;
            match dictionary.validate() {
                Ok(()) => println!("ok      {}", dictionary.name),
                Err(e) => {
                    println!("invalid {}: {e}", dictionary.name);
                    failures.push(format!("{}: {e}", dictionary.name));
                }
            }
        }
    }

    println!(
        "{} dictionaries checked, {} problems",
        checked,
        failures.len()
    );
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures.join("; "))
    }
}

fn run_list(args: ListArgs) -> Result<(), String> {
    for path in &args.paths {
        let db = DictionaryDatabase::from_path(path).map_err(|e| e.to_string())?;
        for dictionary in db.iter() {
            let description = if dictionary.description.is_empty() {
                String::new()
            } else {
                format!("  {}", dictionary.description)
            };
            println!(
                "{} [{}]{}",
                dictionary.name,
                dictionary.keys.join(", "),
                description
            );
        }
    }
    Ok(())
}
