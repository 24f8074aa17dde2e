//! Compiled translation catalogs (`.qm` files)
//!
//! This crate reads and writes the binary catalog format used by Qt-style
//! translators: a 16-byte magic marker followed by tagged blocks holding the
//! language, dependencies, a hash index, the message records, an optional
//! context lookup table and the plural-selection rules.
//!
//! # Overview
//!
//! 1. **Reader** - Decodes a catalog buffer into a [`Catalog`] of entries
//! 2. **Releaser** - Sorts records, elides fields shared with same-hash neighbours
//!    and writes the block stream
//! 3. **Release policy** - Decides which entries are written and tallies a [`ConversionReport`]
//! 4. **Numerus rules** - Per-language plural bytecode and form counts
//!
//! # Example
//!
//! ```ignore
//! use qm_catalog::{Catalog, ReleaseOptions, TranslationEntry, load_catalog, save_catalog};
//!
//! let mut catalog = Catalog::new();
//! catalog
//!     .with_language("de_DE")
//!     .with_entry(TranslationEntry::new("Main", "Quit", "Beenden"));
//!
//! let released = save_catalog(&catalog, &ReleaseOptions::new())?;
//! let loaded = load_catalog(&released.bytes)?;
//! assert_eq!(loaded.entries[0].translation(), "Beenden");
//! ```

pub mod catalog;
pub mod error;
pub mod format;
pub mod loader;
pub mod numerus;
pub mod options;
pub mod reader;
pub mod release;
pub mod report;
pub mod writer;


pub use catalog::{Catalog, EntryType, TranslationEntry};
pub use error::{QmError, QmResult};
pub use format::{BlockTag, FieldTag, Prefix, elf_hash};
pub use loader::{CatalogFormat, read_catalog_file, write_catalog_file};
pub use numerus::{BuiltinNumerus, NumerusInfo, NumerusProvider, numerus_form};
pub use options::{ReleaseOptions, SaveMode};
pub use reader::{ContextIndex, DecodedFile, decode, load_catalog, load_catalog_with, read_catalog};
pub use release::{Released, save_catalog, save_catalog_with};
pub use report::ConversionReport;
pub use writer::Releaser;
