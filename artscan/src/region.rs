//! Per-region processing recipes and the recognition dispatcher.
//!
//! Each semantic field of the card has one immutable [`RegionSpec`] declaring
//! how its sub-buffer is prepared (crop window, threshold, bounding-box
//! extraction, scaling) and whether text recognition is required. Preparation
//! is a short sequential CPU phase; recognition for all regions is issued as
//! one parallel fan-out and the dispatcher joins when every call settles.

use rayon::prelude::*;

use crate::buffer::{Color, PixelBuffer};
use crate::debug::{record, DebugSink};
use crate::segment::CardSegments;

/// External text-recognition collaborator.
///
/// Implementations swallow their own errors and return an empty list, which
/// the dispatcher treats as "no text" rather than a fatal condition. The
/// engine's timeouts are its own responsibility.
pub trait TextRecognizer: Sync {
    fn recognize(&self, buffer: &PixelBuffer, options: &RecognizeOptions) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognizeOptions {
    pub region: RegionName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionName {
    Name,
    Slot,
    MainStat,
    MainStatValue,
    Rarity,
    Level,
    Lock,
    SubStats,
    Set,
    Location,
}

/// Which segmented sub-buffer a region reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentId {
    NameCard,
    MainStatCard,
    SubStats,
    Set,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractColor {
    White,
    Black,
}

impl ExtractColor {
    fn color(self) -> Color {
        match self {
            ExtractColor::White => Color::WHITE,
            ExtractColor::Black => Color::BLACK,
        }
    }
}

/// Declarative recipe for one region. Declared once, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct RegionSpec {
    pub name: RegionName,
    pub source: SegmentId,
    /// Vertical window as fractions of the source height.
    pub start: f32,
    pub end: f32,
    /// Horizontal crop fraction; `crop_right` keeps the right side instead.
    pub crop: f32,
    pub crop_right: bool,
    pub binarize: bool,
    pub invert: bool,
    pub threshold: u8,
    pub extract_box: bool,
    pub extract_color: ExtractColor,
    pub padding: u32,
    pub scale: bool,
    pub scale_factor: f32,
    pub ocr: bool,
}

impl RegionSpec {
    const fn text(
        name: RegionName,
        source: SegmentId,
        start: f32,
        end: f32,
        crop: f32,
        invert: bool,
        threshold: u8,
    ) -> Self {
        Self {
            name,
            source,
            start,
            end,
            crop,
            crop_right: false,
            binarize: true,
            invert,
            threshold,
            extract_box: true,
            extract_color: ExtractColor::Black,
            padding: 10,
            scale: false,
            scale_factor: 1.0,
            ocr: true,
        }
    }
}

/// The fixed region table. Left margin of 5px avoids the card border.
pub const REGION_SPECS: [RegionSpec; 10] = [
    RegionSpec::text(RegionName::Name, SegmentId::NameCard, 0.0, 1.0, 1.0, true, 160),
    RegionSpec::text(RegionName::Slot, SegmentId::MainStatCard, 0.0, 0.2, 0.8, true, 160),
    RegionSpec {
        scale: true,
        scale_factor: 2.0,
        ..RegionSpec::text(RegionName::MainStat, SegmentId::MainStatCard, 0.4, 0.55, 0.5, true, 150)
    },
    RegionSpec {
        scale: true,
        scale_factor: 2.0,
        ..RegionSpec::text(
            RegionName::MainStatValue,
            SegmentId::MainStatCard,
            0.525,
            0.775,
            0.5,
            true,
            160,
        )
    },
    // Rarity stays in color: the star band is counted, not read.
    RegionSpec {
        binarize: false,
        extract_box: false,
        ocr: false,
        ..RegionSpec::text(RegionName::Rarity, SegmentId::MainStatCard, 0.775, 0.95, 0.4, true, 128)
    },
    RegionSpec {
        scale: true,
        scale_factor: 2.0,
        extract_color: ExtractColor::White,
        padding: 0,
        ..RegionSpec::text(RegionName::Level, SegmentId::SubStats, 0.03, 0.275, 0.2, true, 128)
    },
    // Lock icon sits at the top-right of the sub-stat block; color histogram
    // presence check only.
    RegionSpec {
        binarize: false,
        extract_box: false,
        ocr: false,
        crop_right: true,
        padding: 0,
        ..RegionSpec::text(RegionName::Lock, SegmentId::SubStats, 0.03, 0.275, 0.8, true, 128)
    },
    RegionSpec::text(RegionName::SubStats, SegmentId::SubStats, 0.275, 1.0, 1.0, false, 160),
    RegionSpec::text(RegionName::Set, SegmentId::Set, 0.0, 1.0, 1.0, false, 160),
    RegionSpec::text(RegionName::Location, SegmentId::Location, 0.0, 1.0, 1.0, false, 160),
];

/// Prepared buffer plus recognized text for one region.
#[derive(Debug, Clone)]
pub struct RegionOutput {
    pub name: RegionName,
    pub buffer: PixelBuffer,
    /// Never empty: a region without text yields a single empty string.
    pub texts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RegionOutputs(pub(crate) Vec<RegionOutput>);

impl RegionOutputs {
    pub fn texts(&self, name: RegionName) -> &[String] {
        static EMPTY: [String; 0] = [];
        self.0
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.texts.as_slice())
            .unwrap_or(&EMPTY)
    }

    pub fn buffer(&self, name: RegionName) -> Option<&PixelBuffer> {
        self.0.iter().find(|r| r.name == name).map(|r| &r.buffer)
    }

    /// Concatenated text lines of several regions, in declaration order.
    pub fn texts_of(&self, names: &[RegionName]) -> Vec<String> {
        names
            .iter()
            .flat_map(|&n| self.texts(n).iter().cloned())
            .collect()
    }
}

/// Apply a spec's recipe to its source segment.
fn prepare_region(spec: &RegionSpec, segments: &CardSegments) -> PixelBuffer {
    let source = match spec.source {
        SegmentId::NameCard => &segments.name_card,
        SegmentId::MainStatCard => &segments.main_stat_card,
        SegmentId::SubStats => &segments.sub_stats,
        SegmentId::Set => &segments.set,
        SegmentId::Location => &segments.location,
    };
    let w = source.width();
    let h = source.height();

    let (x1, x2) = if spec.crop_right {
        ((spec.crop * w as f32).floor() as u32, w)
    } else {
        (5.min(w), (spec.crop * w as f32).floor() as u32)
    };
    let y1 = (spec.start * h as f32).floor() as u32;
    let y2 = (spec.end * h as f32).floor() as u32;
    let mut buf = source.crop(x1, x2, y1, y2);

    if spec.binarize {
        buf.threshold(spec.invert, spec.threshold);
    }

    if spec.extract_box {
        let extracted = buf.bounding_box_of_color(spec.extract_color.color(), spec.padding);
        // A failed extraction (no matching pixel) keeps the pre-extraction
        // buffer so recognition still sees something.
        if !extracted.is_empty() {
            buf = extracted;
        }
    }

    if spec.scale {
        buf = buf.scale(spec.scale_factor);
    }

    buf
}

/// Prepare every region sequentially, then fan out recognition in parallel
/// and join when all calls settle. A slow or failed call delays only the
/// final join, never the other regions.
pub fn dispatch(
    segments: &CardSegments,
    recognizer: &(impl TextRecognizer + ?Sized),
    mut debug: Option<&mut DebugSink>,
) -> RegionOutputs {
    let prepared: Vec<(RegionSpec, PixelBuffer)> = REGION_SPECS
        .iter()
        .map(|spec| (*spec, prepare_region(spec, segments)))
        .collect();

    if debug.is_some() {
        for (spec, buf) in &prepared {
            record(&mut debug, &format!("region_{:?}", spec.name), buf);
        }
    }

    let outputs = prepared
        .into_par_iter()
        .map(|(spec, buffer)| {
            let texts = if spec.ocr {
                recognizer.recognize(&buffer, &RecognizeOptions { region: spec.name })
            } else {
                vec![String::new()]
            };
            let mut texts: Vec<String> =
                texts.into_iter().map(|t| t.replace('\n', "")).collect();
            if texts.is_empty() {
                texts.push(String::new());
            }
            RegionOutput {
                name: spec.name,
                buffer,
                texts,
            }
        })
        .collect();

    RegionOutputs(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Color, PixelBuffer};
    use crate::segment::segment_card;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStub {
        calls: AtomicUsize,
    }

    impl TextRecognizer for CountingStub {
        fn recognize(&self, _buffer: &PixelBuffer, options: &RecognizeOptions) -> Vec<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match options.region {
                RegionName::Name => vec!["Royal\nFlora".to_string()],
                RegionName::Set => vec![],
                _ => vec!["x".to_string()],
            }
        }
    }

    fn segments() -> crate::segment::CardSegments {
        let mut card = PixelBuffer::filled(200, 300, Color::new(120, 80, 60));
        for y in 120..300 {
            for x in 0..200 {
                card.set_color(x, y, crate::buffer::palette::CARD_BACKGROUND);
            }
        }
        segment_card(&card, None)
    }

    #[test]
    fn only_text_regions_invoke_the_recognizer() {
        let stub = CountingStub { calls: AtomicUsize::new(0) };
        let outputs = dispatch(&segments(), &stub, None);
        let expected = REGION_SPECS.iter().filter(|s| s.ocr).count();
        assert_eq!(stub.calls.load(Ordering::SeqCst), expected);
        // Non-OCR regions synthesize a single empty string.
        assert_eq!(outputs.texts(RegionName::Rarity).to_vec(), vec![String::new()]);
        assert_eq!(outputs.texts(RegionName::Lock).to_vec(), vec![String::new()]);
    }

    #[test]
    fn newlines_stripped_and_empty_lists_normalized() {
        let stub = CountingStub { calls: AtomicUsize::new(0) };
        let outputs = dispatch(&segments(), &stub, None);
        assert_eq!(outputs.texts(RegionName::Name).to_vec(), vec!["RoyalFlora".to_string()]);
        // Empty recognizer result becomes a single empty string.
        assert_eq!(outputs.texts(RegionName::Set).to_vec(), vec![String::new()]);
    }

    #[test]
    fn every_region_keeps_a_buffer() {
        let stub = CountingStub { calls: AtomicUsize::new(0) };
        let outputs = dispatch(&segments(), &stub, None);
        for spec in &REGION_SPECS {
            assert!(outputs.buffer(spec.name).is_some(), "missing {:?}", spec.name);
        }
    }

    #[test]
    fn texts_of_concatenates_in_order() {
        let stub = CountingStub { calls: AtomicUsize::new(0) };
        let outputs = dispatch(&segments(), &stub, None);
        let combined = outputs.texts_of(&[RegionName::Slot, RegionName::MainStat]);
        assert_eq!(combined.len(), 2);
    }
}
