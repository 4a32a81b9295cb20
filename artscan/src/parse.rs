//! Fuzzy resolution of recognized text into typed domain keys and values.
//!
//! Recognition output is noisy: characters drop, punctuation mutates, lines
//! merge. Every resolver here degrades instead of failing: unmatched keys
//! come back as an ambiguous tie set, unmatched locations fall back to the
//! default character, and numeric parsing skips what it cannot read.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use vocab::{StatEntry, Unit};

use crate::buffer::{palette, PixelBuffer};
use crate::histogram::{color_histogram, find_histogram_range, Axis};

/// Keys tied at the global minimum edit distance. Ties are preserved, never
/// arbitrarily broken; ambiguity is the caller's to resolve.
pub type KeyCandidates = BTreeSet<String>;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W").expect("regex"));
static LEADING_NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\W+").expect("regex"));
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9%,.]").expect("regex"));
static PERCENT_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[,.]+\d)%").expect("regex"));
static FLAT_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[,.]\d{3}|\d{2,3})").expect("regex"));
static MULTI_DOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").expect("regex"));
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("regex"));

fn clean(text: &str) -> String {
    NON_WORD.replace_all(text, "").into_owned()
}

/// Parse a number that uses `,` or repeated dots as a decimal point.
fn parse_decimal(raw: &str) -> Option<f64> {
    let normalized = MULTI_DOT.replace_all(&raw.replace(',', "."), ".").into_owned();
    normalized.parse().ok()
}

/// Parse a flat value whose `,`/`.` are thousands separators.
fn parse_flat(raw: &str) -> Option<f64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Edit-distance voting over every text x candidate pair.
///
/// Candidates are `(key, display)` pairs. Display names of three characters
/// or fewer use case-insensitive substring containment instead of edit
/// distance, which is unreliable for very short tokens. The returned set is
/// non-empty unless `texts` is empty or no candidate produced a distance.
pub fn resolve_key(texts: &[String], candidates: &[(&str, &str)]) -> KeyCandidates {
    let mut min = usize::MAX;
    let mut best = KeyCandidates::new();

    for text in texts {
        let cleaned = clean(text);
        for (key, display) in candidates {
            let dist = if display.len() <= 3 {
                if text.to_lowercase().contains(&display.to_lowercase()) {
                    0
                } else {
                    continue;
                }
            } else {
                levenshtein::levenshtein(&cleaned, &clean(display))
            };

            if dist < min {
                min = dist;
                best.clear();
            }
            if dist == min {
                best.insert((*key).to_string());
            }
        }
    }
    best
}

/// A main-stat value candidate with the unit its pattern implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatValue {
    pub value: f64,
    pub unit: Unit,
}

/// Extract main-stat value candidates from recognized text.
///
/// Characters outside `[0-9%,.]` are replaced with the digit `1` (not
/// removed); this placeholder substitution is a long-standing quirk the
/// numeric patterns were tuned against. The percentage pattern is tried
/// before the flat pattern and both may contribute; priority is the
/// assembler's call.
pub fn resolve_main_stat_values(texts: &[String]) -> Vec<StatValue> {
    let mut results = Vec::new();
    for text in texts {
        let text = PLACEHOLDER.replace_all(text, "1");

        if let Some(m) = PERCENT_VALUE.captures(&text) {
            if let Some(value) = parse_decimal(&m[1]) {
                results.push(StatValue {
                    value,
                    unit: Unit::Percent,
                });
            }
        }
        if let Some(m) = FLAT_VALUE.captures(&text) {
            if let Some(value) = parse_flat(&m[1]) {
                results.push(StatValue {
                    value,
                    unit: Unit::Flat,
                });
            }
        }
    }
    results
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SubStat {
    pub key: String,
    pub value: f64,
}

/// The card never shows more than four sub-stats.
pub const MAX_SUBSTATS: usize = 4;

/// Scan every line for `<display> + <number>` per known sub-stat key, with a
/// trailing `%` required for percent stats. Collects all matches and
/// truncates to four; extra matches are never an error.
pub fn resolve_substats(texts: &[String], vocabulary: &[StatEntry]) -> Vec<SubStat> {
    let mut matches = Vec::new();
    for text in texts {
        let text = LEADING_NON_WORD.replace(text, "").replace('\n', "");

        for entry in vocabulary {
            let display = regex::escape(&entry.display);
            let pattern = match entry.unit {
                Unit::Percent => format!(r"(?i){display}\s*\+\s*(\d+[.,]+\d)%"),
                Unit::Flat => format!(r"(?i){display}\s*\+\s*(\d+,\d+|\d+)($|\s)"),
            };
            let Ok(re) = Regex::new(&pattern) else {
                continue;
            };
            if let Some(m) = re.captures(&text) {
                let value = match entry.unit {
                    Unit::Percent => parse_decimal(&m[1]),
                    Unit::Flat => parse_flat(&m[1]),
                };
                if let Some(value) = value {
                    matches.push(SubStat {
                        key: entry.key.clone(),
                        value,
                    });
                }
            }
        }
    }
    matches.truncate(MAX_SUBSTATS);
    matches
}

/// Distance assigned to the default character so it wins whenever nothing
/// recognizable is closer.
const DEFAULT_LOCATION_DISTANCE: usize = 8;

/// Fuzzy-match recognized location text against character keys.
///
/// The recognizer usually returns "Equipped: Name"; anything up to and
/// including the first colon is stripped. Always returns exactly one key --
/// the default character acts as a fixed-distance fallback.
pub fn resolve_location(texts: &[String], characters: &[String], default_key: &str) -> String {
    let mut min = DEFAULT_LOCATION_DISTANCE;
    let mut best = default_key.to_string();

    for text in texts {
        if text.is_empty() {
            continue;
        }
        let text = match text.find(':') {
            Some(i) => &text[i + 1..],
            None => text.as_str(),
        };
        if text.is_empty() {
            continue;
        }
        let cleaned = clean(text);

        for key in characters {
            let dist = levenshtein::levenshtein(&cleaned, key);
            if dist < min {
                min = dist;
                best = key.clone();
            }
        }
    }
    best
}

/// Count rarity stars in the (color, non-thresholded) rarity region.
///
/// The star band is located from the row histogram at a 0.3-relative range,
/// the crop's own column histogram is thresholded at half its max, and each
/// contiguous above-threshold run counts as one star.
pub fn resolve_rarity(rarity_buffer: &PixelBuffer) -> u8 {
    let band = palette::star_band();
    let rows = color_histogram(rarity_buffer, band, Axis::Row);
    let (top, bot) = find_histogram_range(&rows, 0.3);
    let stars = rarity_buffer.crop(0, rarity_buffer.width(), top as u32, bot as u32 + 1);

    let cols = color_histogram(&stars, band, Axis::Col);
    let max = cols.iter().copied().max().unwrap_or(0);
    let cutoff = max as f32 * 0.5;

    let mut count = 0u8;
    let mut on_star = false;
    for &v in &cols {
        if max > 0 && v as f32 > cutoff {
            if !on_star {
                count += 1;
                on_star = true;
            }
        } else {
            on_star = false;
        }
    }
    count.clamp(1, 5)
}

/// Coarse lock-icon presence detector: enough rows with enough lock-colored
/// pixels. Not pixel-exact by design.
pub fn resolve_locked(lock_buffer: &PixelBuffer) -> bool {
    let rows = color_histogram(lock_buffer, palette::lock_band(), Axis::Row);
    rows.iter().filter(|&&v| v > 5).count() > 5
}

/// Artifact level from the level-badge text ("+16" or similar). Clamped to
/// the game's 0..=20 range; `None` when no digits were recognized.
pub fn resolve_level(texts: &[String]) -> Option<u8> {
    for text in texts {
        if let Some(m) = DIGITS.find(text) {
            if let Ok(level) = m.as_str().parse::<u8>() {
                return Some(level.min(20));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{palette, Color, PixelBuffer};

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|v| v.to_string()).collect()
    }

    fn substat_vocab() -> Vec<StatEntry> {
        vocab::Vocabulary::default_en().sub_stats
    }

    #[test]
    fn resolve_key_preserves_ties() {
        let candidates = [
            ("Adventurer", "Adventurer"),
            ("Berserker", "Berserker"),
            ("PaleFlame", "Pale Flame"),
        ];
        let keys = resolve_key(&s(&["Adventurer", "Berserker"]), &candidates);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("Adventurer"));
        assert!(keys.contains("Berserker"));
    }

    #[test]
    fn resolve_key_tolerates_noise() {
        let candidates = [("flower", "Flower of Life"), ("plume", "Plume of Death")];
        let keys = resolve_key(&s(&["Fl0wer of Lite"]), &candidates);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["flower"]);
    }

    #[test]
    fn short_display_names_use_containment() {
        let candidates = [("hp", "HP"), ("eleMas", "Elemental Mastery")];
        let keys = resolve_key(&s(&["hp 4780"]), &candidates);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["hp"]);
    }

    #[test]
    fn empty_texts_give_empty_candidates() {
        assert!(resolve_key(&[], &[("a", "Something")]).is_empty());
    }

    #[test]
    fn main_stat_values_percent_and_flat() {
        // Both patterns may contribute; the percent hit comes first and the
        // flat pattern still picks up the leading digits.
        let values = resolve_main_stat_values(&s(&["46.6%"]));
        assert_eq!(values[0], StatValue { value: 46.6, unit: Unit::Percent });
        assert_eq!(values[1].unit, Unit::Flat);

        let values = resolve_main_stat_values(&s(&["4,780"]));
        assert_eq!(values, vec![StatValue { value: 4780.0, unit: Unit::Flat }]);
    }

    #[test]
    fn main_stat_values_placeholder_quirk() {
        // Stray characters become the digit 1, not nothing.
        let values = resolve_main_stat_values(&s(&["abc"]));
        assert_eq!(values, vec![StatValue { value: 111.0, unit: Unit::Flat }]);
    }

    #[test]
    fn substats_unit_aware() {
        let subs = resolve_substats(
            &s(&["HP +1,234", "Crit Rate +12.3%"]),
            &substat_vocab(),
        );
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0], SubStat { key: "hp".into(), value: 1234.0 });
        assert_eq!(subs[1], SubStat { key: "critRate_".into(), value: 12.3 });
    }

    #[test]
    fn substats_truncate_to_four() {
        let lines = s(&["HP +12", "ATK +12", "DEF +12", "Elemental Mastery +12", "HP +13"]);
        let subs = resolve_substats(&lines, &substat_vocab());
        assert_eq!(subs.len(), MAX_SUBSTATS);
    }

    #[test]
    fn location_strips_colon_prefix_and_falls_back() {
        let characters = s(&["Kaeya", "Keqing", "Traveler"]);
        assert_eq!(
            resolve_location(&s(&["Equipped: Kaeya"]), &characters, "Traveler"),
            "Kaeya"
        );
        assert_eq!(resolve_location(&s(&[""]), &characters, "Traveler"), "Traveler");
        assert_eq!(resolve_location(&[], &characters, "Traveler"), "Traveler");
    }

    fn star_buffer(stars: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::filled(100, 40, Color::WHITE);
        for i in 0..stars {
            let x0 = 10 + i * 14;
            for y in 10..20 {
                for x in x0..x0 + 8 {
                    buf.set_color(x, y, palette::STAR_GOLD);
                }
            }
        }
        buf
    }

    #[test]
    fn rarity_counts_contiguous_star_runs() {
        assert_eq!(resolve_rarity(&star_buffer(5)), 5);
        assert_eq!(resolve_rarity(&star_buffer(3)), 3);
        // No stars at all clamps to 1.
        assert_eq!(resolve_rarity(&star_buffer(0)), 1);
        // More runs than the game allows clamps to 5.
        assert_eq!(resolve_rarity(&star_buffer(6)), 5);
    }

    #[test]
    fn lock_detector_needs_enough_rows() {
        let mut buf = PixelBuffer::filled(30, 20, Color::WHITE);
        for y in 5..15 {
            for x in 5..15 {
                buf.set_color(x, y, palette::LOCK_ICON);
            }
        }
        assert!(resolve_locked(&buf));
        assert!(!resolve_locked(&PixelBuffer::filled(30, 20, Color::WHITE)));
    }

    #[test]
    fn level_from_badge_text() {
        assert_eq!(resolve_level(&s(&["+16"])), Some(16));
        assert_eq!(resolve_level(&s(&["", "+20"])), Some(20));
        assert_eq!(resolve_level(&s(&["99"])), Some(20));
        assert_eq!(resolve_level(&s(&["no digits"])), None);
    }
}
