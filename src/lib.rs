#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod bundle;
pub mod config;
pub mod dev;
pub mod error;
pub mod filter;
pub mod models;
pub mod parser;
pub mod paths;
pub mod resolver;

pub use bundle::{BundleFile, BundleSource, ChunkGraph, ChunkInfo};
pub use config::PluginOptions;
pub use error::{ManifestError, ManifestResult};
pub use models::{EmitFile, InputScript, Manifest, ManifestVersion, ParseResult};
pub use parser::{ManifestParser, ManifestSchema};
pub use paths::{PathResolver, ProjectRoot};
pub use resolver::{ResourceExposure, resolve_exposure};
