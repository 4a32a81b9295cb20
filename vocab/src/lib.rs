//! Domain vocabularies for the artifact card scanner.
//!
//! The scanner core never hard-codes game strings: everything it fuzzy-matches
//! against (set names, slot names, stat names, character keys) comes from a
//! [`Vocabulary`] loaded once at startup. A bundled English vocabulary is
//! provided for the common case; alternative vocabularies can be loaded from
//! JSON with the same schema.

use anyhow::{Context, Result};

/// Whether a stat is a flat value or a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
	Flat,
	Percent,
}

/// A domain key paired with the canonical display string shown on the card.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Entry {
	pub key: String,
	pub display: String,
}

/// A stat key with its display string and unit.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StatEntry {
	pub key: String,
	pub display: String,
	pub unit: Unit,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Vocabulary {
	pub sets: Vec<Entry>,
	pub slots: Vec<Entry>,
	pub main_stats: Vec<StatEntry>,
	pub sub_stats: Vec<StatEntry>,
	/// Character keys are matched directly (the card shows "Equipped: <name>").
	pub characters: Vec<String>,
	/// Returned when no usable location text was recognized.
	pub default_character: String,
}

const BUNDLED_EN: &str = include_str!("../data/genshin_en.json");

impl Vocabulary {
	pub fn from_json(json: &str) -> Result<Self> {
		serde_json::from_str(json).context("parse vocabulary JSON")
	}

	/// The bundled English vocabulary.
	pub fn default_en() -> Self {
		Self::from_json(BUNDLED_EN).expect("bundled vocabulary is valid")
	}

	pub fn main_stat_unit(&self, key: &str) -> Option<Unit> {
		self.main_stats.iter().find(|s| s.key == key).map(|s| s.unit)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bundled_vocabulary_loads() {
		let v = Vocabulary::default_en();
		assert_eq!(v.slots.len(), 5);
		assert_eq!(v.sub_stats.len(), 10);
		assert!(v.characters.contains(&v.default_character));
	}

	#[test]
	fn vocabulary_json_round_trip() {
		let v = Vocabulary::default_en();
		let json = serde_json::to_string(&v).unwrap();
		let back = Vocabulary::from_json(&json).unwrap();
		assert_eq!(back.sets.len(), v.sets.len());
		assert_eq!(back.main_stat_unit("hp_"), Some(Unit::Percent));
		assert_eq!(back.main_stat_unit("eleMas"), Some(Unit::Flat));
	}
}
