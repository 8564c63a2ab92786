//! Layered configuration loading
//!
//! Built on the `config` crate: struct defaults, then files, then
//! environment variables. String values of the form `file://<path>` are
//! replaced by the trimmed contents of `<path>`, which keeps secrets out of
//! config files and environment variables.

mod error;
mod file_ref;
mod loader;

pub use error::ConfigLoaderError;
pub use file_ref::resolve_file_refs;
pub use loader::ConfigLoader;
