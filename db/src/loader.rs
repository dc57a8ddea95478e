//! Dictionary database loading with builder pattern and fallback chains.
//!
//! Provides [`DictionaryDatabase`] for in-memory dictionary lookup and
//! [`DatabaseBuilder`] for constructing a database from multiple sources with
//! automatic fallback.
//!
//! # Loading patterns
//!
//! ```no_run
//! use command_suggest_db::DictionaryDatabase;
//!
//! // Load a directory of JSON/YAML dictionary files
//! let db = DictionaryDatabase::from_dir("dictionaries/").unwrap();
//! assert!(db.get("git").is_some());
//!
//! // Load a single dictionary file
//! let db = DictionaryDatabase::from_file("dictionaries/git.yaml").unwrap();
//!
//! // Use the builder for a fallback chain
//! let db = DictionaryDatabase::builder()
//!     .from_dir("/etc/suggest/dictionaries/")
//!     .from_file("git.json")
//!     .build()
//!     .unwrap();
//! ```
//!
//! Files are parsed by extension: `.json` with `serde_json`, `.yaml` and
//! `.yml` with `serde_yaml`. Loading does not validate; validation happens
//! when a dictionary is initialized.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use command_suggest_core::Dictionary;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{DatabaseError, Result};

/// Describes where a [`DictionaryDatabase`] was loaded from.
#[derive(Debug, Clone)]
pub enum DatabaseSource {
    /// Loaded from a single dictionary file.
    File(PathBuf),
    /// Loaded from a directory of dictionary files.
    Directory(PathBuf),
    /// Assembled in memory.
    Memory,
    /// Loaded via a fallback chain of multiple sources.
    Multiple(Vec<DatabaseSource>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> Option<Format> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "json" => Some(Format::Json),
        "yaml" | "yml" => Some(Format::Yaml),
        _ => None,
    }
}

/// Returns `true` if `path` has a dictionary file extension.
pub fn is_dictionary_file(path: &Path) -> bool {
    format_of(path).is_some()
}

/// Parses one dictionary file.
///
/// # Errors
///
/// Returns [`DatabaseError::UnsupportedFormat`] for unknown extensions, or
/// [`DatabaseError::InFile`] wrapping the I/O or parse failure.
pub fn load_dictionary(path: impl AsRef<Path>) -> Result<Dictionary> {
    let path = path.as_ref();
    let format =
        format_of(path).ok_or_else(|| DatabaseError::UnsupportedFormat(path.to_path_buf()))?;

    let parse = || -> Result<Dictionary> {
        let reader = BufReader::new(File::open(path)?);
        Ok(match format {
            Format::Json => serde_json::from_reader(reader)?,
            Format::Yaml => serde_yaml::from_reader(reader)?,
        })
    };

    let dictionary = parse().map_err(|source| DatabaseError::InFile {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;
    debug!(path = %path.display(), dictionary = %dictionary.name, "Loaded dictionary");
    Ok(dictionary)
}

/// In-memory collection of dictionaries, indexed by name and by command key.
///
/// Key lookups ignore ASCII case, matching how the suggestion engine selects
/// a dictionary for a command word.
///
/// # Examples
///
/// ```no_run
/// use command_suggest_db::DictionaryDatabase;
///
/// let db = DictionaryDatabase::from_dir("dictionaries/").unwrap();
/// println!("Loaded {} dictionaries", db.len());
///
/// if let Some(git) = db.get("GIT") {
///     println!("git has {} top-level parameters", git.parameters.len());
/// }
///
/// for dictionary in db.iter() {
///     println!("  {} {:?}", dictionary.name, dictionary.keys);
/// }
/// ```
#[derive(Debug)]
pub struct DictionaryDatabase {
    dictionaries: BTreeMap<String, Dictionary>,
    keys: HashMap<String, String>,
    source: DatabaseSource,
}

impl DictionaryDatabase {
    /// Returns a new [`DatabaseBuilder`] for configuring a fallback chain.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    fn with_source(source: DatabaseSource) -> Self {
        Self {
            dictionaries: BTreeMap::new(),
            keys: HashMap::new(),
            source,
        }
    }

    /// Creates an empty database to be filled with [`insert`](Self::insert).
    pub fn in_memory() -> Self {
        Self::with_source(DatabaseSource::Memory)
    }

    /// Loads a single dictionary file.
    ///
    /// # Errors
    ///
    /// See [`load_dictionary`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut db = Self::with_source(DatabaseSource::File(path.to_path_buf()));
        db.insert(load_dictionary(path)?);
        Ok(db)
    }

    /// Loads every `*.json`, `*.yaml` and `*.yml` file of a directory.
    ///
    /// Files are parsed in parallel; other files are ignored. The first
    /// failing file aborts the load.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the directory cannot be read, or
    /// the error of the first file that fails to load.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() && is_dictionary_file(&file_path) {
                files.push(file_path);
            }
        }
        files.sort();

        let loaded: Vec<Dictionary> = files
            .par_iter()
            .map(load_dictionary)
            .collect::<Result<_>>()?;

        let mut db = Self::with_source(DatabaseSource::Directory(path.to_path_buf()));
        for dictionary in loaded {
            db.insert(dictionary);
        }
        Ok(db)
    }

    /// Loads a directory or a single file, depending on what `path` is.
    ///
    /// # Errors
    ///
    /// See [`from_dir`](Self::from_dir) and [`from_file`](Self::from_file).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_file(path)
        }
    }

    /// Inserts a dictionary, replacing any existing one with the same name.
    ///
    /// Returns the replaced dictionary.
    pub fn insert(&mut self, dictionary: Dictionary) -> Option<Dictionary> {
        let name = dictionary.name.clone();
        let replaced = self.remove(&name);
        if replaced.is_some() {
            warn!(dictionary = %name, "Replacing dictionary with the same name");
        }
        for key in &dictionary.keys {
            if let Some(owner) = self.keys.insert(key.to_lowercase(), name.clone()) {
                warn!(key = %key, previous = %owner, dictionary = %name, "Command key claimed twice");
            }
        }
        self.dictionaries.insert(name, dictionary);
        replaced
    }

    /// Removes a dictionary by name.
    pub fn remove(&mut self, name: &str) -> Option<Dictionary> {
        let removed = self.dictionaries.remove(name)?;
        self.keys.retain(|_, owner| owner != name);
        Some(removed)
    }

    /// Looks up the dictionary selected by a command word, ignoring case.
    pub fn get(&self, command: &str) -> Option<&Dictionary> {
        let name = self.keys.get(&command.to_lowercase())?;
        self.dictionaries.get(name)
    }

    /// Looks up a dictionary by its name.
    pub fn get_by_name(&self, name: &str) -> Option<&Dictionary> {
        self.dictionaries.get(name)
    }

    /// Returns `true` if a dictionary handles `command`.
    pub fn contains(&self, command: &str) -> bool {
        self.get(command).is_some()
    }

    /// Returns the number of dictionaries.
    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    /// Returns `true` if the database holds no dictionaries.
    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }

    /// Iterates dictionaries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Dictionary> {
        self.dictionaries.values()
    }

    /// Consumes the database, returning dictionaries in name order.
    pub fn into_dictionaries(self) -> Vec<Dictionary> {
        self.dictionaries.into_values().collect()
    }

    /// Returns a reference to the source metadata.
    pub fn source(&self) -> &DatabaseSource {
        &self.source
    }
}

/// Builder for constructing a [`DictionaryDatabase`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`DatabaseError::NoSourcesAvailable`] is returned.
///
/// # Example
///
/// ```no_run
/// use command_suggest_db::DictionaryDatabase;
///
/// let db = DictionaryDatabase::builder()
///     .from_dir("/opt/suggest/dictionaries/")
///     .from_file("/opt/suggest/git.yaml")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct DatabaseBuilder {
    sources: Vec<DatabaseSource>,
}

impl DatabaseBuilder {
    /// Creates a new builder with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory of dictionary files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::Directory(path.into()));
        self
    }

    /// Adds a single dictionary file as a source.
    pub fn from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::File(path.into()));
        self
    }

    /// Attempts to load dictionaries from configured sources in order.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NoSourcesAvailable`] when no source loads.
    pub fn build(self) -> Result<DictionaryDatabase> {
        let all_sources = self.sources.clone();

        for source in &self.sources {
            let result = match source {
                DatabaseSource::Directory(path) => DictionaryDatabase::from_dir(path),
                DatabaseSource::File(path) => DictionaryDatabase::from_file(path),
                DatabaseSource::Memory | DatabaseSource::Multiple(_) => continue,
            };

            match result {
                Ok(mut db) => {
                    db.source = DatabaseSource::Multiple(all_sources);
                    return Ok(db);
                }
                Err(err) => debug!(source = ?source, error = %err, "Dictionary source failed"),
            }
        }

        Err(DatabaseError::NoSourcesAvailable)
    }
}
