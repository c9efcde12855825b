//! Format-agnostic configuration patch and merge engine.
//!
//! `confmerge` updates configuration files in place while preserving what
//! the user already had: an old file is folded into a new one structurally
//! (keep old-only entries, keep or overwrite shared values), then a list of
//! typed edit instructions — set, increment, decrement, remove, keep — is
//! applied, and the result replaces the destination atomically.
//!
//! The same pipeline serves three syntaxes through one in-memory model:
//! flat `key=value` option files, sectioned INI profiles, and Windows
//! Registry Editor exports (including live keys via `reg.exe`).
//!
//! # Example
//!
//! ```no_run
//! use confmerge::{ConfigEntry, Format, MergeTask, Operation};
//!
//! # fn main() -> anyhow::Result<()> {
//! MergeTask::new(Format::Options, "app-2.0.conf")
//!     .old("app-1.0.conf")
//!     .dest("app.conf")
//!     .entry(ConfigEntry::new("telemetry").with_operation(Operation::Remove))
//!     .run()?;
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod entry;
pub mod error;
pub mod exec;
pub mod fileset;
pub mod format;
pub mod merge;
pub mod model;
pub mod registry;
pub mod task;

pub use entry::{ConfigEntry, LookupType, Operation, Unit, ValueType};
pub use error::{EntryError, MergeError};
pub use fileset::Fileset;
pub use format::{Format, FormatOptions};
pub use merge::{PatchFlags, VariableResolver, apply_entries, structural_patch};
pub use model::{ConfigModel, KeyValues, Section};
pub use registry::RegistrySource;
pub use task::{MergeTask, RegistryMergeTask, run_batch};
