//! Deliter Core Library
//!
//! Converts legacy mod packages (a zip archive carrying a `manifest.json`
//! of plugin/loader declarations) into `project.yaml` documents, extracting
//! the archive's bundled resources alongside.

pub mod archive;
pub mod error;
pub mod extract;
pub mod manifest;
pub mod merge;
pub mod node;
pub mod orchestration;
pub mod package;
pub mod project;
pub mod registry;
pub mod translate;

/// Re-exports of commonly used types
pub mod prelude {
    // Errors
    pub use crate::error::ConvertError;

    // Document tree
    pub use crate::node::{Location, Mapping, Node, NodeKind, Scalar, ScalarStyle};

    // Registry
    pub use crate::registry::{Registry, RegistryEntry, load_registry, parse_registry_str};

    // Translation and merging
    pub use crate::merge::merge;
    pub use crate::translate::{ConversionResult, Translator, UnknownReference};

    // Archive handling
    pub use crate::archive::LegacyArchive;
    pub use crate::extract::ExtractionStats;
    pub use crate::project::HostPaths;

    // Orchestration
    pub use crate::orchestration::{
        ConvertOptions, Converter, PackageOutcome, PackageReport, RunReport, SkipReason,
    };
}
