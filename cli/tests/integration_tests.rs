use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

/// Helper to create a temp directory that is cleaned up on drop.
struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(name: &str) -> Self {
        let path =
            std::env::temp_dir().join(format!("suggest_cli_test_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).expect("failed to create temp dir");
        Self { path }
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// A git dictionary with a static and a dynamic value source.
fn write_git_dictionary(dir: &TempDir) -> PathBuf {
    let json = serde_json::json!({
        "keys": ["git"],
        "platforms": ["all"],
        "name": "git",
        "description": "Distributed version control",
        "parameters": [
            {
                "keys": ["commit"],
                "name": "commit",
                "type": "command",
                "description": "Record changes",
                "parameters": [
                    { "keys": ["--message", "-m"], "name": "Message", "type": "value" },
                    {
                        "keys": ["--cleanup"],
                        "name": "Cleanup",
                        "type": "value",
                        "source": {
                            "name": "Cleanup mode",
                            "kind": "static",
                            "items": [{ "name": "strip" }, { "name": "default" }]
                        }
                    }
                ]
            },
            {
                "keys": ["checkout"],
                "name": "checkout",
                "type": "command",
                "parameters": [
                    {
                        "name": "Branch",
                        "type": "value",
                        "source": {
                            "name": "Branches",
                            "kind": "dynamic",
                            "command": "printf 'main\\nfeature\\n'"
                        }
                    }
                ]
            }
        ]
    });
    let path = dir.join("git.json");
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap())
        .expect("failed to write dictionary");
    path
}

fn suggest(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_suggest"))
        .args(args)
        .output()
        .expect("failed to run suggest")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// complete
// ---------------------------------------------------------------------------

#[test]
fn complete_lists_matching_subcommands() {
    let dir = TempDir::new("complete_subcommands");
    let dictionary = write_git_dictionary(&dir);

    let output = suggest(&["complete", "-d", dictionary.to_str().unwrap(), "git", "c"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        stdout_lines(&output),
        vec!["git commit\tRecord changes", "git checkout"]
    );
}

#[test]
fn complete_static_values_after_key() {
    let dir = TempDir::new("complete_static");
    let dictionary = write_git_dictionary(&dir);

    let output = suggest(&[
        "complete",
        "-d",
        dictionary.to_str().unwrap(),
        "--line",
        "git commit --cleanup ",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        stdout_lines(&output),
        vec!["git commit --cleanup strip", "git commit --cleanup default"]
    );
}

#[cfg(unix)]
#[test]
fn complete_dynamic_values_are_loaded_before_answering() {
    let dir = TempDir::new("complete_dynamic");
    let dictionary = write_git_dictionary(&dir);

    let output = suggest(&[
        "complete",
        "-d",
        dictionary.to_str().unwrap(),
        "--cwd",
        dir.path().to_str().unwrap(),
        "--trailing-space",
        "git",
        "checkout",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        stdout_lines(&output),
        vec!["git checkout main", "git checkout feature"]
    );
}

#[test]
fn complete_json_output() {
    let dir = TempDir::new("complete_json");
    let dictionary = write_git_dictionary(&dir);

    let output = suggest(&[
        "complete",
        "-d",
        dictionary.to_str().unwrap(),
        "--format",
        "json",
        "git",
        "com",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let suggestions = json.as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["text"], "git commit");
    assert_eq!(suggestions[0]["kind"], "command");
    assert_eq!(suggestions[0]["description"], "Record changes");
}

#[test]
fn complete_contains_mode_from_config() {
    let dir = TempDir::new("complete_config");
    let dictionary = write_git_dictionary(&dir);
    let config = dir.join("suggest.yml");
    fs::write(
        &config,
        format!(
            "version: \"1.0\"\ndictionaries:\n  - {}\nmatching:\n  mode: contains\n",
            dictionary.display()
        ),
    )
    .unwrap();

    let output = suggest(&["complete", "-c", config.to_str().unwrap(), "git", "out"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_lines(&output), vec!["git checkout"]);
}

#[test]
fn complete_unknown_command_prints_nothing() {
    let dir = TempDir::new("complete_unknown");
    let dictionary = write_git_dictionary(&dir);

    let output = suggest(&["complete", "-d", dictionary.to_str().unwrap(), "cargo", "b"]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn complete_without_dictionaries_fails() {
    let output = suggest(&["complete", "git", "c"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no dictionaries"));
}

#[test]
fn complete_reports_broken_dictionary() {
    let dir = TempDir::new("complete_broken");
    let path = dir.join("broken.json");
    fs::write(&path, r#"{"keys":["broken"],"platforms":["all"],"name":"broken"}"#).unwrap();

    let output = suggest(&["complete", "-d", path.to_str().unwrap(), "broken", ""]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("parameters"));
}

#[cfg(unix)]
#[test]
fn complete_survives_failing_source() {
    let dir = TempDir::new("complete_failing_source");
    let json = serde_json::json!({
        "keys": ["tool"],
        "platforms": ["all"],
        "name": "tool",
        "parameters": [
            { "keys": ["--verbose"], "name": "Verbose", "type": "flag" },
            {
                "name": "Target",
                "type": "value",
                "source": { "name": "Targets", "kind": "dynamic", "command": "exit 7" }
            }
        ]
    });
    let path = dir.join("tool.json");
    fs::write(&path, json.to_string()).unwrap();

    let output = suggest(&["complete", "-d", path.to_str().unwrap(), "tool", "--v"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_lines(&output), vec!["tool --verbose"]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Dynamic sources unavailable"));
}

// ---------------------------------------------------------------------------
// validate / list
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_good_dictionaries() {
    let dir = TempDir::new("validate_ok");
    write_git_dictionary(&dir);

    let output = suggest(&["validate", dir.path().to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let lines = stdout_lines(&output);
    assert_eq!(lines[0], "ok      git");
    assert_eq!(lines[1], "1 dictionaries checked, 0 problems");
}

#[test]
fn validate_rejects_duplicate_keys() {
    let dir = TempDir::new("validate_duplicate");
    let json = serde_json::json!({
        "keys": ["tool"],
        "platforms": ["linux"],
        "name": "tool",
        "parameters": [
            { "keys": ["-v"], "name": "Verbose", "type": "flag" },
            { "keys": ["-v"], "name": "Version", "type": "flag" }
        ]
    });
    fs::write(dir.join("tool.json"), json.to_string()).unwrap();

    let output = suggest(&["validate", dir.path().to_str().unwrap()]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("invalid tool"), "{stdout}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("duplicate key `-v`"));
}

#[test]
fn list_prints_names_and_keys() {
    let dir = TempDir::new("list");
    let dictionary = write_git_dictionary(&dir);

    let output = suggest(&["list", dictionary.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        stdout_lines(&output),
        vec!["git [git]  Distributed version control"]
    );
}
