use std::collections::BTreeMap;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::position::{OptionId, Position};

/// The chosen option for each position, at most one per position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(BTreeMap<Position, OptionId>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose `option` for `position`, returning whichever option it replaced.
    pub fn choose(&mut self, position: Position, option: OptionId) -> Option<OptionId> {
        self.0.insert(position, option)
    }

    /// Remove the choice for `position`, returning it if there was one.
    pub fn clear(&mut self, position: Position) -> Option<OptionId> {
        self.0.remove(&position)
    }

    /// Required positions that have no choice yet.
    pub fn missing_required(&self) -> Vec<Position> {
        Position::required()
            .filter(|p| !self.0.contains_key(p))
            .collect()
    }

    /// Are all required positions filled?
    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            selected: self.0.len(),
            total: Position::ALL.len(),
        }
    }
}

impl Deref for Selection {
    type Target = BTreeMap<Position, OptionId>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// How many positions have been voted on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub selected: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        self.selected as f64 / self.total as f64 * 100.0
    }

    /// e.g. "2 of 3 positions voted".
    pub fn text(&self) -> String {
        format!("{} of {} positions voted", self.selected, self.total)
    }
}
