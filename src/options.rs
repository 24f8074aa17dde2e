use serde::{Deserialize, Serialize};

/// How much of each record the writer keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Every record carries its full (context, source text, comment) triple.
    #[default]
    Everything,
    /// Fields shared with same-hash neighbours are elided and a context
    /// lookup table is added.
    Stripped,
}

/// Settings for turning a catalog into a compiled file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReleaseOptions {
    #[serde(default)]
    pub save_mode: SaveMode,

    /// Key records by entry id instead of (context, source text, comment).
    #[serde(default)]
    pub id_based: bool,

    /// When non-empty, unfinished entries with empty translations are kept
    /// with `prefix + source text` as their translation.
    #[serde(default)]
    pub untranslated_prefix: String,

    /// Skip unfinished entries entirely.
    #[serde(default)]
    pub ignore_unfinished: bool,

    #[serde(default)]
    pub verbose: bool,
}

impl ReleaseOptions {
    pub fn new() -> Self {
        ReleaseOptions::default()
    }

    pub fn with_save_mode(mut self, save_mode: SaveMode) -> Self {
        self.save_mode = save_mode;
        self
    }

    pub fn with_id_based(mut self, id_based: bool) -> Self {
        self.id_based = id_based;
        self
    }

    pub fn with_untranslated_prefix(mut self, prefix: &str) -> Self {
        self.untranslated_prefix = prefix.to_owned();
        self
    }

    pub fn with_ignore_unfinished(mut self, ignore_unfinished: bool) -> Self {
        self.ignore_unfinished = ignore_unfinished;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
