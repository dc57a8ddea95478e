//! Dictionary database example.
//!
//! Writes a JSON and a YAML dictionary to a temporary directory, loads the
//! directory with `DictionaryDatabase`, looks commands up by key and
//! validates every dictionary.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p command-suggest-demos --example load_dictionaries
//! ```

use command_suggest_core::{Dictionary, Parameter, Platforms};
use command_suggest_db::DictionaryDatabase;

const LS_YAML: &str = r#"
keys: [ls, dir]
platforms: [linux, macos]
name: ls
description: List directory contents
parameters:
  - keys: [-l]
    name: Long
    type: flag
  - keys: [--color]
    name: Color
    type: value
    separator: equals
    source:
      name: When
      kind: static
      items:
        - name: auto
        - name: always
        - name: never
"#;

fn main() {
    let dir = std::env::temp_dir().join("command_suggest_example_db");
    std::fs::create_dir_all(&dir).unwrap();

    let cargo = Dictionary::new("cargo")
        .with_platforms(Platforms::ALL)
        .with_parameter(Parameter::command("build"))
        .with_parameter(Parameter::command("test"));
    std::fs::write(
        dir.join("cargo.json"),
        serde_json::to_string_pretty(&cargo).unwrap(),
    )
    .unwrap();
    std::fs::write(dir.join("ls.yaml"), LS_YAML).unwrap();

    let start = std::time::Instant::now();
    let db = DictionaryDatabase::from_dir(&dir).unwrap();
    println!("Loaded {} dictionaries in {:.2?}", db.len(), start.elapsed());

    // Lookup by any command key, ignoring case
    if let Some(ls) = db.get("DIR") {
        println!("`DIR` resolves to {} ({})", ls.name, ls.description);
        println!("  applies here: {}", ls.supports(Platforms::current()));
    }

    println!();
    for dictionary in db.iter() {
        let status = match dictionary.validate() {
            Ok(()) => "ok".to_string(),
            Err(e) => format!("invalid: {e}"),
        };
        println!(
            "{:<8} keys={:?} sources={} {status}",
            dictionary.name,
            dictionary.keys,
            dictionary.sources().len()
        );
    }

    std::fs::remove_dir_all(&dir).ok();
}
