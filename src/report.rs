use serde::Serialize;

/// Non-fatal outcome of a release: what was written, what was dropped and why.
///
/// Policy drops (missing IDs, untranslated entries, excess context data) and
/// format limitations (oversized context pool) never abort a save; they are
/// collected here for the caller to inspect or print.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub finished: usize,
    pub unfinished: usize,
    pub untranslated: usize,
    pub missing_ids: usize,
    pub dropped_data: usize,
    pub warnings: Vec<String>,
}

impl ConversionReport {
    pub fn new() -> Self {
        ConversionReport::default()
    }

    pub fn generated(&self) -> usize {
        self.finished + self.unfinished
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Renders the report as diagnostic lines.
    ///
    /// Drop counts and warnings are always included; the generation summary
    /// only when `verbose` is set.
    pub fn messages(&self, verbose: bool) -> Vec<String> {
        let mut lines = Vec::new();
        if self.missing_ids > 0 {
            lines.push(format!(
                "Dropped {} message(s) which had no ID.",
                self.missing_ids
            ));
        }
        if self.dropped_data > 0 {
            lines.push(format!(
                "Excess context/disambiguation dropped from {} message(s).",
                self.dropped_data
            ));
        }
        lines.extend(self.warnings.iter().cloned());
        if verbose {
            lines.push(format!(
                "    Generated {} translation(s) ({} finished and {} unfinished)",
                self.generated(),
                self.finished,
                self.unfinished
            ));
            if self.untranslated > 0 {
                lines.push(format!(
                    "    Ignored {} untranslated source text(s)",
                    self.untranslated
                ));
            }
        }
        lines
    }
}
