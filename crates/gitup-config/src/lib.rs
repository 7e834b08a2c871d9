//! Configuration file loading.
//!
//! The config file is INI-like: `[section]` headers group `key=value` lines,
//! `#` starts a comment. A `[defaults]` section supplies base values; the
//! section named on the command line overrides them.

use std::path::{Path, PathBuf};

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("section [{0}] not found in configuration file")]
    SectionNotFound(String),

    #[error("section [{section}] is missing required key '{key}'")]
    MissingKey { section: String, key: String },

    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Settings for one configured repository.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// URL path of the repository on the host.
    pub repository: String,
    pub branch: String,
    /// Directory the tree is materialised into.
    pub target: PathBuf,
    /// Directory where remote-state files live.
    pub work_directory: PathBuf,
    pub verbosity: u8,
}

impl Settings {
    /// Load `section` from the file at `path`, with `[defaults]` applied first.
    pub fn load(path: impl AsRef<Path>, section: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file = path.display().to_string();

        let mut builder = Builder::default();
        apply_section(&text, &file, "defaults", &mut builder)?;
        if !apply_section(&text, &file, section, &mut builder)? {
            return Err(ConfigError::SectionNotFound(section.to_owned()));
        }
        builder.finish(section)
    }
}

#[derive(Default)]
struct Builder {
    host: Option<String>,
    port: Option<u16>,
    repository: Option<String>,
    branch: Option<String>,
    target: Option<PathBuf>,
    work_directory: Option<PathBuf>,
    verbosity: Option<u8>,
}

impl Builder {
    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "host" => self.host = Some(value.to_owned()),
            "port" => {
                self.port = Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_owned(),
                    message: format!("{value:?} is not a port number"),
                })?)
            }
            "repository" => self.repository = Some(value.to_owned()),
            "branch" => self.branch = Some(value.to_owned()),
            "target" => self.target = Some(PathBuf::from(value)),
            "work_directory" => self.work_directory = Some(PathBuf::from(value)),
            "verbosity" => {
                self.verbosity = Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_owned(),
                    message: format!("{value:?} is not a verbosity level"),
                })?)
            }
            // Unrecognised keys are ignored so configs can carry annotations.
            _ => {}
        }
        Ok(())
    }

    fn finish(self, section: &str) -> Result<Settings, ConfigError> {
        let missing = |key: &str| ConfigError::MissingKey {
            section: section.to_owned(),
            key: key.to_owned(),
        };
        Ok(Settings {
            host: self.host.ok_or_else(|| missing("host"))?,
            port: self.port.unwrap_or(443),
            repository: self.repository.ok_or_else(|| missing("repository"))?,
            branch: self.branch.ok_or_else(|| missing("branch"))?,
            target: self.target.ok_or_else(|| missing("target"))?,
            work_directory: self.work_directory.ok_or_else(|| missing("work_directory"))?,
            verbosity: self.verbosity.unwrap_or(1),
        })
    }
}

/// Feed the key/value lines of `[name]` into `builder`.
///
/// Returns whether the section was present at all.
fn apply_section(
    text: &str,
    file: &str,
    name: &str,
    builder: &mut Builder,
) -> Result<bool, ConfigError> {
    let mut in_section = false;
    let mut found = false;

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let header = header.strip_suffix(']').ok_or_else(|| ConfigError::Parse {
                file: file.to_owned(),
                line: index + 1,
                message: "unterminated section header".into(),
            })?;
            in_section = header.trim() == name;
            found |= in_section;
            continue;
        }

        if !in_section {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Parse {
            file: file.to_owned(),
            line: index + 1,
            message: format!("expected key=value, got {line:?}"),
        })?;
        builder.set(key.trim(), value.trim())?;
    }

    Ok(found)
}
