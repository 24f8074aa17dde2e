use serde::{Deserialize, Serialize};

/// Lifecycle state of a translation entry.
///
/// Only `Finished` and `Unfinished` entries are ever written to a compiled catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Finished,
    #[default]
    Unfinished,
    Obsolete,
    Vanished,
}

/// One translatable message and its translations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TranslationEntry {
    #[serde(default)]
    pub context: String,

    pub source_text: String,

    #[serde(default)]
    pub comment: String,

    /// One element for singular messages, one per plural form otherwise.
    #[serde(default)]
    pub translations: Vec<String>,

    #[serde(default)]
    pub id: String,

    #[serde(default, rename = "type")]
    pub entry_type: EntryType,

    #[serde(default)]
    pub is_plural: bool,
}

impl TranslationEntry {
    pub fn new(context: &str, source_text: &str, translation: &str) -> Self {
        TranslationEntry {
            context: context.to_owned(),
            source_text: source_text.to_owned(),
            translations: vec![translation.to_owned()],
            ..Default::default()
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_owned();
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_owned();
        self
    }

    pub fn with_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    /// Replaces the translations with one string per plural form and marks
    /// the entry plural when there is more than one.
    pub fn with_translations(mut self, translations: Vec<String>) -> Self {
        self.is_plural = translations.len() > 1;
        self.translations = translations;
        self
    }

    /// The first translation, or an empty string when there is none.
    pub fn translation(&self) -> &str {
        self.translations.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_persisted_type(&self) -> bool {
        matches!(self.entry_type, EntryType::Finished | EntryType::Unfinished)
    }
}

/// The complete set of entries plus locale metadata for one translation file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Catalog {
    #[serde(default)]
    pub language_code: String,

    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Locale plural-selection bytecode, carried through unmodified.
    #[serde(default)]
    pub numerus_rules: Vec<u8>,

    #[serde(default)]
    pub entries: Vec<TranslationEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    pub fn with_language(&mut self, language_code: &str) -> &mut Self {
        self.language_code = language_code.to_owned();
        self
    }

    pub fn with_dependencies(&mut self, dependencies: Vec<String>) -> &mut Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_entry(&mut self, entry: TranslationEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn push(&mut self, entry: TranslationEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranslationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, context: &str, source_text: &str, comment: &str) -> Option<&TranslationEntry> {
        self.entries.iter().find(|e| {
            e.context == context && e.source_text == source_text && e.comment == comment
        })
    }

    /// Whether some entry (in any lifecycle state) has the same context and
    /// source text as `entry` and no comment.
    pub fn contains_stripped(&self, entry: &TranslationEntry) -> bool {
        self.entries.iter().any(|e| {
            e.source_text == entry.source_text && e.context == entry.context && e.comment.is_empty()
        })
    }
}
