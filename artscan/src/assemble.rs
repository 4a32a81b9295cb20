//! Final record assembly.
//!
//! Resolver outputs are combined into one [`ParsedArtifactRecord`]. Ambiguous
//! set/slot/main-stat matches stay candidate sets for the caller to confirm;
//! forcing a pick here would hide recognition problems instead of surfacing
//! them.

use vocab::{Unit, Vocabulary};

use crate::parse::{
    resolve_key, resolve_level, resolve_location, resolve_locked, resolve_main_stat_values,
    resolve_rarity, resolve_substats, KeyCandidates, StatValue, SubStat,
};
use crate::region::{RegionName, RegionOutputs};
use crate::segment::CardSegments;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Location {
    NotEquipped,
    Character(String),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MainStat {
    /// Candidate keys; narrowed by unit agreement with the parsed value when
    /// possible, otherwise passed through untouched.
    pub keys: KeyCandidates,
    pub value: f64,
    pub unit: Unit,
}

/// The finished record for one screenshot. Immutable after assembly; storage
/// and presentation are someone else's concern.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ParsedArtifactRecord {
    pub rarity: u8,
    pub set: KeyCandidates,
    pub slot: KeyCandidates,
    pub main_stat: MainStat,
    pub level: Option<u8>,
    pub sub_stats: Vec<SubStat>,
    pub location: Location,
    pub locked: bool,
}

pub fn assemble(
    segments: &CardSegments,
    outputs: &RegionOutputs,
    vocab: &Vocabulary,
) -> ParsedArtifactRecord {
    let rarity = outputs
        .buffer(RegionName::Rarity)
        .map(resolve_rarity)
        .unwrap_or(1);

    // Set matching uses only the first recognized line; the second line (the
    // set-piece count) only adds noise.
    let set_texts = &outputs.texts(RegionName::Set)[..1];
    let set_pairs: Vec<(&str, &str)> = vocab
        .sets
        .iter()
        .map(|e| (e.key.as_str(), e.display.as_str()))
        .collect();
    let set = resolve_key(set_texts, &set_pairs);

    // Slot and main-stat text regions overlap in practice (the recognizer
    // merges neighboring lines), so both feed both resolutions.
    let header_texts = outputs.texts_of(&[RegionName::Slot, RegionName::MainStat]);
    let slot_pairs: Vec<(&str, &str)> = vocab
        .slots
        .iter()
        .map(|e| (e.key.as_str(), e.display.as_str()))
        .collect();
    let slot = resolve_key(&header_texts, &slot_pairs);

    let main_pairs: Vec<(&str, &str)> = vocab
        .main_stats
        .iter()
        .map(|e| (e.key.as_str(), e.display.as_str()))
        .collect();
    let main_keys = resolve_key(&header_texts, &main_pairs);
    // Values come from the dedicated value region only: the placeholder
    // substitution would turn stat-name text like "HP" into a fake number.
    let values = resolve_main_stat_values(outputs.texts(RegionName::MainStatValue));
    let main_stat = pick_main_stat(main_keys, &values, vocab);

    let sub_stats = resolve_substats(outputs.texts(RegionName::SubStats), &vocab.sub_stats);

    let level = resolve_level(outputs.texts(RegionName::Level));

    // Equip detection: banner color signal is primary, the recognized
    // "equipped" substring is OR'd in as a secondary signal.
    let location_texts = outputs.texts(RegionName::Location);
    let equipped = segments.has_equip_banner
        || location_texts
            .iter()
            .any(|t| t.to_lowercase().contains("equipped"));
    let location = if equipped {
        Location::Character(resolve_location(
            location_texts,
            &vocab.characters,
            &vocab.default_character,
        ))
    } else {
        Location::NotEquipped
    };

    let locked = outputs
        .buffer(RegionName::Lock)
        .map(resolve_locked)
        .unwrap_or(false);

    ParsedArtifactRecord {
        rarity,
        set,
        slot,
        main_stat,
        level,
        sub_stats,
        location,
        locked,
    }
}

/// Narrow main-stat candidates by unit agreement with the parsed values.
///
/// "HP" as a display string matches both the flat and the percent stat; the
/// value's unit is what disambiguates them. When no value parsed at all, the
/// candidate set is left as-is and the value defaults to zero.
fn pick_main_stat(keys: KeyCandidates, values: &[StatValue], vocab: &Vocabulary) -> MainStat {
    for unit in [Unit::Percent, Unit::Flat] {
        let narrowed: KeyCandidates = keys
            .iter()
            .filter(|k| vocab.main_stat_unit(k) == Some(unit))
            .cloned()
            .collect();
        if narrowed.is_empty() {
            continue;
        }
        if let Some(v) = values.iter().find(|v| v.unit == unit) {
            return MainStat {
                keys: narrowed,
                value: v.value,
                unit,
            };
        }
    }

    MainStat {
        keys,
        value: values.first().map(|v| v.value).unwrap_or(0.0),
        unit: values.first().map(|v| v.unit).unwrap_or(Unit::Flat),
    }
}
