//! End-to-end engine example.
//!
//! Builds a small git dictionary in code, writes it to a temporary file,
//! loads it through the background worker and prints suggestions for a few
//! partial command lines. The branch source runs `git branch` in the current
//! directory, so run it from inside a repository to see branch names.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p command-suggest-demos --example git_dictionary
//! RUST_LOG=debug cargo run -p command-suggest-demos --example git_dictionary
//! ```

use std::io::Write;
use std::time::Duration;

use command_suggest_core::{
    CachePolicy, Dictionary, Parameter, ParsingContext, SourceItem, ValueSource, split_line,
    tokenize,
};
use command_suggest_engine::ExecutionEngine;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let dir = std::env::temp_dir().join("command_suggest_example_git");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("git.json");
    let mut file = std::fs::File::create(&path).unwrap();
    serde_json::to_writer_pretty(&mut file, &git_dictionary()).unwrap();
    file.flush().unwrap();

    let cwd = std::env::current_dir()
        .ok()
        .map(|p| p.display().to_string());

    let mut engine = ExecutionEngine::with_process_context();
    engine.initialize_dictionary(&path);
    engine.start().unwrap();
    engine.sync(Duration::from_secs(5)).unwrap();
    println!("{:?}", engine.health());

    for line in ["git c", "git commit ", "git commit --cleanup=", "git checkout "] {
        let (words, trailing) = split_line(line);
        let mut request = ParsingContext::new(tokenize(words, trailing));
        if let Some(cwd) = &cwd {
            request = request.with_working_directory(cwd.clone());
        }

        // The first request for a dynamic source only schedules its refresh.
        let mut suggestions = engine.suggest(&request);
        if suggestions.is_empty() {
            engine.sync(Duration::from_secs(5)).unwrap();
            suggestions = engine.suggest(&request);
        }

        println!();
        println!("{line:?}");
        for suggestion in &suggestions {
            match &suggestion.description {
                Some(description) => println!("  {:<40} {description}", suggestion.text),
                None => println!("  {}", suggestion.text),
            }
        }
    }

    engine.stop().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

fn git_dictionary() -> Dictionary {
    Dictionary::new("git")
        .with_description("Distributed version control")
        .with_parameter(
            Parameter::command("commit")
                .with_description("Record changes to the repository")
                .with_parameter(
                    Parameter::value(&["--message", "-m"], "Message")
                        .with_description("Use the given message"),
                )
                .with_parameter(Parameter::flag(&["--amend"], "Amend"))
                .with_parameter(Parameter::value(&["--cleanup"], "Cleanup").with_source(
                    ValueSource::new_static(
                        "Cleanup mode",
                        vec![
                            SourceItem::from_name("strip"),
                            SourceItem::from_name("whitespace"),
                            SourceItem::from_name("verbatim"),
                        ],
                    ),
                )),
        )
        .with_parameter(
            Parameter::command("checkout")
                .with_description("Switch branches")
                .with_parameter(Parameter::positional("Branch").with_source(
                    ValueSource::new_dynamic("Branches", "git branch --format=%(refname:short)")
                        .with_cache(CachePolicy {
                            by_time_secs: Some(15),
                            by_current_working_directory: true,
                        }),
                )),
        )
        .with_parameter(Parameter::flag(&["--help", "-h"], "Help").mark_recursive())
}
