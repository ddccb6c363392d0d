//! Conversion orchestration
//!
//! Walks the plugins directory, decides which packages are convertible,
//! and drives each one through translation, merging, extraction, and
//! archive finalization. Packages are independent and run in parallel.

pub mod converter;
pub mod report;

pub use converter::{ConvertOptions, Converter, Preview, default_host_paths};
pub use report::{
    ConversionSummary, PackageOutcome, PackageReport, RunReport, RunSummary, SkipReason,
};
