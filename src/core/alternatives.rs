use std::collections::BTreeSet;

use serde::Serialize;

use super::strategy::fixed_alternatives;
use super::types::{AltCategory, AlternativesAllocation, StrategyKey};

/// Adjust-dialog lifecycle. The draft only exists while the dialog is up, so
/// there is nothing to apply once it is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "draft", rename_all = "lowercase")]
pub enum BreakdownDialog {
    #[default]
    Closed,
    Open(AlternativesAllocation),
    Editing(AlternativesAllocation),
}

impl BreakdownDialog {
    pub fn draft(&self) -> Option<&AlternativesAllocation> {
        match self {
            BreakdownDialog::Closed => None,
            BreakdownDialog::Open(draft) | BreakdownDialog::Editing(draft) => Some(draft),
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, BreakdownDialog::Closed)
    }

    pub fn can_apply(&self) -> bool {
        self.draft().is_some_and(AlternativesAllocation::is_committable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ApplyRejected {
    #[error("the adjustment dialog is not open")]
    NotOpen,
    #[error("alternatives must total 100%, draft totals {total}%")]
    NotCommittable { total: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlternativesBreakdownModel {
    custom: Option<AlternativesAllocation>,
    hidden: BTreeSet<AltCategory>,
    dialog: BreakdownDialog,
}

impl AlternativesBreakdownModel {
    pub fn with_custom(custom: Option<AlternativesAllocation>) -> Self {
        Self {
            custom,
            ..Self::default()
        }
    }

    /// Last committed custom mapping, if one was ever applied.
    pub fn custom(&self) -> Option<&AlternativesAllocation> {
        self.custom.as_ref()
    }

    pub fn dialog(&self) -> &BreakdownDialog {
        &self.dialog
    }

    pub fn load_for_strategy(&self, key: StrategyKey) -> AlternativesAllocation {
        fixed_alternatives(key)
            .or(self.custom)
            .unwrap_or(AlternativesAllocation::ZERO)
    }

    pub fn total(&self, key: StrategyKey) -> f64 {
        self.load_for_strategy(key).total()
    }

    /// Opens the dialog on a fresh copy of the committed custom mapping, or
    /// on zeros if nothing was committed yet. Reopening discards any draft.
    pub fn open_dialog(&mut self) {
        self.dialog = BreakdownDialog::Open(self.custom.unwrap_or(AlternativesAllocation::ZERO));
    }

    /// Returns `false` when the dialog is closed.
    pub fn edit_draft(&mut self, category: AltCategory, raw: &str) -> bool {
        let mut draft = match self.dialog {
            BreakdownDialog::Closed => return false,
            BreakdownDialog::Open(draft) | BreakdownDialog::Editing(draft) => draft,
        };
        draft.update_category(category, raw);
        self.dialog = BreakdownDialog::Editing(draft);
        true
    }

    pub fn cancel_dialog(&mut self) {
        self.dialog = BreakdownDialog::Closed;
    }

    pub fn apply_dialog(&mut self) -> Result<AlternativesAllocation, ApplyRejected> {
        let draft = *self.dialog.draft().ok_or(ApplyRejected::NotOpen)?;
        if !draft.is_committable() {
            return Err(ApplyRejected::NotCommittable {
                total: draft.total(),
            });
        }
        self.custom = Some(draft);
        self.dialog = BreakdownDialog::Closed;
        Ok(draft)
    }

    /// Flips chart visibility for one category. Returns whether it is now
    /// hidden. Stored values and totals are unaffected.
    pub fn toggle_category_visibility(&mut self, category: AltCategory) -> bool {
        if self.hidden.remove(&category) {
            false
        } else {
            self.hidden.insert(category);
            true
        }
    }

    pub fn is_hidden(&self, category: AltCategory) -> bool {
        self.hidden.contains(&category)
    }

    pub fn hidden(&self) -> impl Iterator<Item = AltCategory> + '_ {
        self.hidden.iter().copied()
    }
}
