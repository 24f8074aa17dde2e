use std::fs;
use std::path::Path;

use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{QmError, QmResult};
use crate::options::ReleaseOptions;
use crate::reader::load_catalog;
use crate::release::{Released, save_catalog};

/// File kinds a catalog can be read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    /// Compiled binary catalog
    Qm,
    /// `Catalog` serialized with serde_json
    Json,
}

impl CatalogFormat {
    /// Picks the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> QmResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("qm") => Ok(CatalogFormat::Qm),
            Some("json") => Ok(CatalogFormat::Json),
            _ => Err(QmError::UnsupportedInput(format!(
                "'{}' is neither a .qm nor a .json file",
                path.display()
            ))),
        }
    }
}

/// Load a catalog from a `.qm` or `.json` file
///
/// # Errors
/// - Unknown file extension
/// - File read errors
/// - Malformed compiled catalog or invalid JSON
pub fn read_catalog_file(path: &Path) -> QmResult<Catalog> {
    let format = CatalogFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "reading catalog");
    match format {
        CatalogFormat::Qm => {
            let data = fs::read(path)?;
            load_catalog(&data)
        }
        CatalogFormat::Json => {
            let content = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        }
    }
}

/// Write a catalog to a `.qm` or `.json` file
///
/// JSON output is pretty-printed. For `.qm` output the catalog is released
/// with `options` and the report is returned; JSON output yields `None`.
pub fn write_catalog_file(
    path: &Path,
    catalog: &Catalog,
    options: &ReleaseOptions,
) -> QmResult<Option<Released>> {
    let format = CatalogFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "writing catalog");
    match format {
        CatalogFormat::Qm => {
            let released = save_catalog(catalog, options)?;
            fs::write(path, &released.bytes)?;
            Ok(Some(released))
        }
        CatalogFormat::Json => {
            let content = serde_json::to_string_pretty(catalog)?;
            fs::write(path, content)?;
            Ok(None)
        }
    }
}
