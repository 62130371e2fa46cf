use std::collections::BTreeSet;

/// Sidebar interaction mode. A selection only exists while selecting, so a
/// non-empty selection in browsing mode cannot be expressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Browsing,
    Selecting { selected_keys: BTreeSet<String> },
}

/// What a click on a conversation row should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowAction {
    /// Browsing: open the conversation.
    Load(String),
    /// Selecting: membership flipped; `selected` is the new membership.
    Toggled { key: String, selected: bool },
}

impl SelectionState {
    pub fn is_selecting(&self) -> bool {
        matches!(self, Self::Selecting { .. })
    }

    /// Enters selection mode with an empty selection, discarding anything stale.
    pub fn enter_selection(&mut self) {
        *self = Self::Selecting {
            selected_keys: BTreeSet::new(),
        };
    }

    /// Flips membership of `key`. Returns the new membership, or `None` when
    /// not selecting.
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        match self {
            Self::Browsing => None,
            Self::Selecting { selected_keys } => {
                if selected_keys.remove(key) {
                    Some(false)
                } else {
                    selected_keys.insert(key.to_string());
                    Some(true)
                }
            }
        }
    }

    pub fn cancel(&mut self) {
        *self = Self::Browsing;
    }

    /// A successful deletion always ends selection mode.
    pub fn deletion_succeeded(&mut self) {
        *self = Self::Browsing;
    }

    /// Dispatches a row click according to the current mode.
    pub fn click(&mut self, key: &str) -> RowAction {
        match self.toggle(key) {
            Some(selected) => RowAction::Toggled {
                key: key.to_string(),
                selected,
            },
            None => RowAction::Load(key.to_string()),
        }
    }

    pub fn selected_keys(&self) -> impl Iterator<Item = &str> {
        let keys = match self {
            Self::Browsing => None,
            Self::Selecting { selected_keys } => Some(selected_keys),
        };
        keys.into_iter().flatten().map(String::as_str)
    }

    pub fn is_selected(&self, key: &str) -> bool {
        match self {
            Self::Browsing => false,
            Self::Selecting { selected_keys } => selected_keys.contains(key),
        }
    }

    pub fn selected_count(&self) -> usize {
        match self {
            Self::Browsing => 0,
            Self::Selecting { selected_keys } => selected_keys.len(),
        }
    }
}
