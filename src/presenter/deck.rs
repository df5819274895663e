//! Deck of names shown one at a time, advanced on tap or on a detected bell.

use serde::{Deserialize, Serialize};

/// Colours assigned to entries by insertion position.
pub const PALETTE: [&str; 15] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2",
    "#F8B739", "#52B788", "#FF8FA3", "#6C5CE7", "#00B894", "#FDCB6E", "#E17055",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckEntry {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default)]
pub struct Deck {
    entries: Vec<DeckEntry>,
    current: usize,
}

impl Deck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a deck from raw names; blank names are skipped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut deck = Self::new();
        for name in names {
            deck.add(name.as_ref());
        }
        deck
    }

    /// Append a trimmed name. Returns false when the name is blank.
    pub fn add(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let color = PALETTE[self.entries.len() % PALETTE.len()];
        self.entries.push(DeckEntry {
            name: name.to_string(),
            color: color.to_string(),
        });
        true
    }

    /// Remove the entry at `index`, keeping the cursor on the same entry
    /// where possible.
    pub fn remove(&mut self, index: usize) -> Option<DeckEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index);
        if index < self.current {
            self.current -= 1;
        }
        if self.current >= self.entries.len() {
            self.current = 0;
        }
        Some(removed)
    }

    /// Move to the next entry, wrapping to the first after the last.
    pub fn advance(&mut self) -> Option<&DeckEntry> {
        if self.entries.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.entries.len();
        self.entries.get(self.current)
    }

    pub fn current(&self) -> Option<&DeckEntry> {
        self.entries.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn entries(&self) -> &[DeckEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position counter such as `"2 / 5"`; empty for an empty deck.
    pub fn counter_label(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        format!("{} / {}", self.current + 1, self.entries.len())
    }
}
