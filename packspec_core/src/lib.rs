//! packspec Core
//!
//! Contract-test interpreter for packspec specifications.
//! A specification is a YAML sequence of one-line features; this crate
//! parses each feature, resolves it against a scope of imported packages
//! and reports whether the declared call or property read behaves as stated.

pub mod config;
pub mod dereference;
pub mod error;
pub mod executor;
pub mod feature;
pub mod loader;
pub mod reporter;
pub mod scope;
pub mod types;

pub use config::RunnerConfig;
pub use error::{PackspecError, Result};
pub use executor::SpecExecutor;
pub use feature::{Feature, FeatureParser};
pub use loader::{SpecLoader, Specification, Stats};
pub use reporter::{ConsoleReporter, Failure, Recorder, Reporter};
pub use scope::{Extension, ExtensionRegistry, Package, PackageRegistry, Scope};
pub use types::{Class, Function, Instance, Mapping, Value};
