//! Release policy: which catalog entries become records, and how.
//!
//! Obsolete and vanished entries are never written. In id-based mode entries
//! without an id are dropped. Unfinished entries without a translation are
//! dropped as untranslated unless an untranslated prefix is configured (or the
//! catalog is id-based), in which case empty translations are replaced with
//! `prefix + source text`. Every drop is counted in the [`ConversionReport`].

use tracing::debug;

use crate::catalog::{Catalog, EntryType, TranslationEntry};
use crate::error::QmResult;
use crate::numerus::{BuiltinNumerus, NumerusProvider};
use crate::options::ReleaseOptions;
use crate::report::ConversionReport;
use crate::writer::Releaser;

/// A compiled catalog and the report of how it was produced.
#[derive(Debug, Clone)]
pub struct Released {
    pub bytes: Vec<u8>,
    pub report: ConversionReport,
}

/// Compiles a catalog with the built-in plural rules.
pub fn save_catalog(catalog: &Catalog, options: &ReleaseOptions) -> QmResult<Released> {
    save_catalog_with(catalog, options, &BuiltinNumerus)
}

pub fn save_catalog_with(
    catalog: &Catalog,
    options: &ReleaseOptions,
    provider: &dyn NumerusProvider,
) -> QmResult<Released> {
    let mut releaser = Releaser::new(&catalog.language_code);
    if !catalog.numerus_rules.is_empty() {
        releaser.set_numerus_rules(&catalog.numerus_rules);
    } else if let Some(info) = provider.numerus_info(&catalog.language_code) {
        releaser.set_numerus_rules(&info.rules);
    }

    let mut report = ConversionReport::new();
    let fill_untranslated = options.id_based || !options.untranslated_prefix.is_empty();

    for entry in catalog.entries() {
        if !entry.is_persisted_type() {
            continue;
        }
        if options.id_based && entry.id.is_empty() {
            report.missing_ids += 1;
            continue;
        }
        if entry.entry_type == EntryType::Unfinished {
            if entry.translation().is_empty() && !fill_untranslated {
                report.untranslated += 1;
                continue;
            }
            if options.ignore_unfinished {
                continue;
            }
            report.unfinished += 1;
        } else {
            report.finished += 1;
        }

        let translations = translations_for(entry, fill_untranslated, &options.untranslated_prefix);

        if options.id_based {
            if !entry.context.is_empty() || !entry.comment.is_empty() {
                report.dropped_data += 1;
            }
            releaser.insert_id_based(entry, translations);
        } else {
            // The comment is only worth keeping when it disambiguates.
            let force_comment = entry.comment.is_empty()
                || entry.context.is_empty()
                || catalog.contains_stripped(entry);
            releaser.insert(entry, translations, force_comment);
        }
    }

    releaser.set_dependencies(&catalog.dependencies);
    releaser.squeeze(options.save_mode)?;
    for warning in releaser.warnings() {
        report.add_warning(warning.clone());
    }

    let mut bytes = Vec::new();
    releaser.save(&mut bytes)?;

    debug!(
        finished = report.finished,
        unfinished = report.unfinished,
        untranslated = report.untranslated,
        missing_ids = report.missing_ids,
        dropped_data = report.dropped_data,
        warnings = report.warnings.len(),
        "released catalog"
    );

    Ok(Released { bytes, report })
}

/// The translations a record is written with.
fn translations_for(entry: &TranslationEntry, fill_untranslated: bool, prefix: &str) -> Vec<String> {
    let mut translations = entry.translations.clone();
    if translations.is_empty() {
        translations.push(String::new());
    }
    if entry.entry_type == EntryType::Unfinished && fill_untranslated {
        for translation in translations.iter_mut().filter(|t| t.is_empty()) {
            *translation = format!("{}{}", prefix, entry.source_text);
        }
    }
    translations
}
