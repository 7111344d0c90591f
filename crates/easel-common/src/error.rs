//! Error types for easel tooling.

use miette::{Diagnostic, NamedSource, SourceOffset, SourceSpan};
use std::path::PathBuf;

/// Main error type for easel tooling (CLI, config, file import).
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum EaselError {
    /// Filesystem access failed
    #[error("failed to access {}", path.display())]
    #[diagnostic(code(easel::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parse error with source location
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    /// Configuration error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl EaselError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// JSON parse error carrying the offending source so reports can point at it.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[error("failed to parse {name}: {message}")]
#[diagnostic(code(easel::parse))]
pub struct ParseError {
    name: String,
    message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    err_location: SourceSpan,
    #[help]
    advice: Option<String>,
}

impl ParseError {
    /// Build a report from a serde_json failure over `contents`.
    pub fn json(name: impl Into<String>, contents: impl Into<String>, err: &serde_json::Error) -> Self {
        let name = name.into();
        let contents = contents.into();
        let offset = if err.line() == 0 {
            SourceOffset::from(0)
        } else {
            SourceOffset::from_location(&contents, err.line(), err.column())
        };
        let advice = match err.classify() {
            serde_json::error::Category::Eof => {
                Some("the document ends early; check for a truncated export".to_string())
            }
            serde_json::error::Category::Data => {
                Some("the JSON is well formed but is not a design document".to_string())
            }
            _ => None,
        };
        Self {
            message: err.to_string(),
            src: NamedSource::new(name.clone(), contents),
            name,
            err_location: SourceSpan::new(offset, 0),
            advice,
        }
    }

    /// Byte offset of the error within the source.
    pub fn location(&self) -> usize {
        self.err_location.offset()
    }
}

/// Configuration loading/saving errors
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    #[diagnostic(code(config::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {}", path.display())]
    #[diagnostic(code(config::write))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} is not valid KDL", path.display())]
    #[diagnostic(code(config::kdl))]
    Kdl {
        path: PathBuf,
        #[source]
        source: kdl::KdlError,
    },

    #[error("invalid value for {key}: {message}")]
    #[diagnostic(code(config::invalid_value))]
    InvalidValue { key: &'static str, message: String },

    #[error("could not determine a platform directory for {what}")]
    #[diagnostic(
        code(config::no_platform_dir),
        help("pass an explicit path instead")
    )]
    NoPlatformDir { what: &'static str },
}
