//! Error types for package conversion
//!
//! Every variant is fatal for the package being converted. Declarations
//! that reference plugins or loaders the registry does not know are not
//! errors; see [`crate::translate::UnknownReference`].

use std::path::PathBuf;

use thiserror::Error;

use crate::node::Location;

/// Errors that abort the conversion of a single package
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The legacy manifest is structurally invalid
    #[error("Malformed manifest: {message}{}", at_location(.location))]
    MalformedManifest {
        message: String,
        location: Option<Location>,
    },

    /// An existing project document disagrees with the generated one
    #[error(
        "Schema mismatch at '{path}': existing document has a {existing}, generated document has a {additive}"
    )]
    SchemaMismatch {
        path: String,
        existing: &'static str,
        additive: &'static str,
    },

    /// Copying archive entries to disk failed
    #[error("Failed to extract resources to {}: {source}", .destination.display())]
    ResourceExtractionFailed {
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The package or archive layout cannot be converted
    #[error("Invalid archive structure: {0}")]
    ArchiveStructure(String),

    /// Filesystem access failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive container could not be read or written
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A YAML document could not be read or written
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON document could not be written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker pool could not be started
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ConvertError {
    pub(crate) fn malformed(message: impl Into<String>, location: Option<Location>) -> Self {
        Self::MalformedManifest {
            message: message.into(),
            location,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

fn at_location(location: &Option<Location>) -> String {
    match location {
        Some(location) => format!(" at {location}"),
        None => String::new(),
    }
}
