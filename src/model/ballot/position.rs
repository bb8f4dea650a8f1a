use std::fmt::{Display, Formatter};
use std::str::FromStr;

use log::warn;
use rocket::request::FromParam;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A votable office or measure on the ballot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    President,
    Senate,
    Proposition,
}

impl Position {
    /// Every position on the ballot, in ballot order.
    pub const ALL: [Position; 3] = [Self::President, Self::Senate, Self::Proposition];

    /// Must this position be filled before the ballot can be submitted?
    pub fn is_required(self) -> bool {
        match self {
            Self::President | Self::Senate => true,
            Self::Proposition => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::President => "president",
            Self::Senate => "senate",
            Self::Proposition => "proposition",
        }
    }

    /// Heading shown for this position when reviewing.
    pub fn title(self) -> &'static str {
        match self {
            Self::President => "President",
            Self::Senate => "U.S. Senate",
            Self::Proposition => "Proposition 15",
        }
    }

    /// The required positions.
    pub fn required() -> impl Iterator<Item = Position> {
        Self::ALL.into_iter().filter(|p| p.is_required())
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown position `{0}`")]
pub struct UnknownPosition(pub String);

impl FromStr for Position {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPosition(s.to_string()))
    }
}

impl<'a> FromParam<'a> for Position {
    type Error = UnknownPosition;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

/// Identifier of a candidate or answer within a position, e.g. `johnson`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(String);

impl OptionId {
    /// Wrap a raw identifier. Blank identifiers are not options.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display labels for every option the ballot knows about.
const LABELS: &[(Position, &str, &str)] = &[
    (Position::President, "johnson", "Sarah Johnson (Democratic)"),
    (Position::President, "williams", "Michael Williams (Republican)"),
    (Position::President, "davis", "Robert Davis (Independent)"),
    (Position::Senate, "martinez", "Maria Martinez (Democratic)"),
    (Position::Senate, "thompson", "James Thompson (Republican)"),
    (Position::Proposition, "yes", "YES"),
    (Position::Proposition, "no", "NO"),
];

/// The human-readable name of an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "label", rename_all = "lowercase")]
pub enum OptionLabel {
    Known(&'static str),
    /// No label is registered; the raw identifier is shown instead.
    Unknown(String),
}

impl OptionLabel {
    pub fn resolve(position: Position, option: &OptionId) -> Self {
        LABELS
            .iter()
            .find(|(p, id, _)| *p == position && *id == option.as_str())
            .map(|(_, _, label)| Self::Known(label))
            .unwrap_or_else(|| {
                warn!("No display label for {position} option `{option}`");
                Self::Unknown(option.to_string())
            })
    }

    /// Every known option for a position, in ballot order.
    pub fn options(position: Position) -> impl Iterator<Item = (&'static str, &'static str)> {
        LABELS
            .iter()
            .filter(move |(p, _, _)| *p == position)
            .map(|(_, id, label)| (*id, *label))
    }
}

impl Display for OptionLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(label) => f.write_str(label),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str) -> OptionId {
        OptionId::new(id).unwrap()
    }

    #[test]
    fn only_president_and_senate_are_required() {
        let required: Vec<_> = Position::required().collect();
        assert_eq!(vec![Position::President, Position::Senate], required);
    }

    #[test]
    fn positions_parse_from_their_names() {
        for position in Position::ALL {
            assert_eq!(Ok(position), position.as_str().parse());
        }
        assert_eq!(
            Err(UnknownPosition("governor".to_string())),
            "governor".parse::<Position>()
        );
    }

    #[test]
    fn blank_option_ids_are_rejected() {
        assert_eq!(None, OptionId::new(""));
        assert_eq!(None, OptionId::new("   "));
        assert_eq!("davis", option("davis").as_str());
    }

    #[test]
    fn known_options_resolve_to_labels() {
        assert_eq!(
            OptionLabel::Known("Sarah Johnson (Democratic)"),
            OptionLabel::resolve(Position::President, &option("johnson"))
        );
        assert_eq!(
            "James Thompson (Republican)",
            OptionLabel::resolve(Position::Senate, &option("thompson")).to_string()
        );
        assert_eq!(
            "YES",
            OptionLabel::resolve(Position::Proposition, &option("yes")).to_string()
        );
    }

    #[test]
    fn unknown_options_fall_back_to_the_raw_id() {
        let label = OptionLabel::resolve(Position::President, &option("write-in"));
        assert_eq!(OptionLabel::Unknown("write-in".to_string()), label);
        assert_eq!("write-in", label.to_string());

        // Labels are per position.
        assert!(matches!(
            OptionLabel::resolve(Position::Senate, &option("johnson")),
            OptionLabel::Unknown(_)
        ));
    }

    #[test]
    fn options_are_listed_per_position() {
        let senate: Vec<_> = OptionLabel::options(Position::Senate)
            .map(|(id, _)| id)
            .collect();
        assert_eq!(vec!["martinez", "thompson"], senate);
    }
}
