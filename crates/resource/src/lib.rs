//! Resource providers for quire.
//!
//! [`FilesystemResourceProvider`] serves template PDFs, images and imported
//! configurations from a base directory. The in-memory provider from
//! `quire-traits` is re-exported so callers need a single import.

mod filesystem;

pub use filesystem::FilesystemResourceProvider;
pub use quire_traits::InMemoryResourceProvider;
