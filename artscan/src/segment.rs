//! Card layout segmentation.
//!
//! The card is decomposed top-down into named sub-buffers using color
//! coverage and edge activity, never fixed pixel coordinates. Every step
//! consumes the previous remainder:
//!
//! screenshot -> card (vertical crop)
//!            -> header / body (background coverage boundary)
//!            -> name card / main-stat card (edge-activity boundary)
//!            -> sub-stats / set+location (equip banner, else green peak)
//!            -> set / location (fixed offset from name-card height)

use crate::buffer::{palette, PixelBuffer};
use crate::debug::{record, DebugSink};
use crate::histogram::{
    color_histogram, find_batched_peak_row, find_boundary_row, find_histogram_range, greenness,
    Axis, BOUNDARY_SKIP_ROWS,
};

/// Background coverage required for a row to count as the start of the body.
const BODY_COVERAGE: f32 = 0.8;

/// Batch height (rows) for the green set-text peak search.
const GREEN_BATCH: u32 = 20;

/// Named sub-buffers of one card. Each is an independent owned buffer; the
/// recognition fan-out never shares pixels between regions.
#[derive(Debug, Clone)]
pub struct CardSegments {
    pub card: PixelBuffer,
    pub name_card: PixelBuffer,
    pub main_stat_card: PixelBuffer,
    pub sub_stats: PixelBuffer,
    pub set: PixelBuffer,
    pub location: PixelBuffer,
    /// Whether the equip-banner color band was present in the body. Primary
    /// signal for the equipped flag.
    pub has_equip_banner: bool,
}

pub fn segment_card(image: &PixelBuffer, mut debug: Option<&mut DebugSink>) -> CardSegments {
    let card = vertically_crop_card(image);
    record(&mut debug, "card", &card);

    // Header/body split: first row covered by the card background.
    let body_top = find_boundary_row(
        &card,
        palette::card_background_band(),
        BODY_COVERAGE,
        BOUNDARY_SKIP_ROWS,
    );
    // 0 means not found; header and body then both alias the whole card and
    // downstream resolution degrades instead of failing.
    let (header, body) = if body_top == 0 {
        log::warn!("no header/body boundary found; treating card as one section");
        (card.clone(), card.clone())
    } else {
        (
            card.crop(0, card.width(), 0, body_top),
            card.crop(0, card.width(), body_top, card.height()),
        )
    };
    record(&mut debug, "header", &header);
    record(&mut debug, "body", &body);

    // Name/main-stat split inside the header.
    let name_bottom = header_name_split(&header);
    let name_card = header.crop(0, header.width(), 0, name_bottom);
    let main_stat_card = header.crop(0, header.width(), name_bottom, header.height());
    record(&mut debug, "name_card", &name_card);
    record(&mut debug, "main_stat_card", &main_stat_card);

    // Sub-stats / set+location split inside the body. Prefer the equip
    // banner; shift up by one name-height so the set line stays with the
    // set+location block. Without a banner, fall back to the green-text peak.
    let name_height = name_card.height();
    let equip_hist = color_histogram(&body, palette::equip_band(), Axis::Row);
    let has_equip_banner = equip_hist.iter().any(|&c| c > body.width() / 2);
    let split = if has_equip_banner {
        let (equip_top, _) = find_histogram_range(&equip_hist, 0.5);
        (equip_top as u32).saturating_sub(name_height)
    } else {
        let green_row = find_batched_peak_row(&body, GREEN_BATCH, greenness);
        green_row.saturating_sub(name_height / 4)
    };

    let sub_stats = body.crop(0, body.width(), 0, split);
    let set_location = body.crop(0, body.width(), split, body.height());
    record(&mut debug, "sub_stats", &sub_stats);
    record(&mut debug, "set_location", &set_location);

    // Set / location split: the location line is one name-card height tall.
    let set_height = set_location.height().saturating_sub(name_height);
    let set = set_location.crop(0, set_location.width(), 0, set_height);
    let location = set_location.crop(0, set_location.width(), set_height, set_location.height());
    record(&mut debug, "set", &set);
    record(&mut debug, "location", &location);

    CardSegments {
        card,
        name_card,
        main_stat_card,
        sub_stats,
        set,
        location,
        has_equip_banner,
    }
}

/// Crop the screenshot to the horizontal extent of the card, located from the
/// per-column background-color histogram.
fn vertically_crop_card(image: &PixelBuffer) -> PixelBuffer {
    let hist = color_histogram(image, palette::card_background_band(), Axis::Col);
    let (x1, x2) = find_histogram_range(&hist, 0.7);
    if x2 <= x1 {
        log::warn!("card background not found; keeping full width");
        return image.clone();
    }
    image.crop(x1 as u32, x2 as u32 + 1, 0, image.height())
}

/// Boundary between the name banner and the stat area, found from edge
/// activity: the name text forms an edge-dense band near the top of the
/// header, and activity drops in the gap below it.
fn header_name_split(header: &PixelBuffer) -> u32 {
    // Fallback when the header is too flat to segment (synthetic images,
    // recognition of partial captures).
    let fallback = header.height() / 5;
    if header.is_empty() {
        return fallback;
    }

    let mut bw = header.clone();
    bw.threshold(false, 200);
    let edges = bw.edge_magnitude();

    // Only consider the top of the header; the stat text below would
    // otherwise dominate the histogram.
    let top = edges.crop(0, edges.width(), 0, (edges.height() * 2) / 5);
    let hist = color_histogram(&top, crate::buffer::Color::WHITE.band(0), Axis::Row);
    let (first, last) = find_histogram_range(&hist, 0.3);
    if last <= first {
        return fallback;
    }
    // Just below the name text band.
    let pad = ((last - first) as u32 / 4).max(2);
    ((last as u32) + pad).min(header.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{palette, Color, PixelBuffer};

    fn fill_rect(buf: &mut PixelBuffer, x: std::ops::Range<u32>, y: std::ops::Range<u32>, c: Color) {
        for yy in y {
            for xx in x.clone() {
                buf.set_color(xx, yy, c);
            }
        }
    }

    /// Header on top, card background from 40% down, green set text near the
    /// bottom of the body.
    fn synthetic_card() -> PixelBuffer {
        let mut buf = PixelBuffer::filled(200, 300, Color::new(120, 80, 60));
        fill_rect(&mut buf, 0..200, 120..300, palette::CARD_BACKGROUND);
        fill_rect(&mut buf, 20..120, 204..212, palette::GREEN_TEXT);
        buf
    }

    #[test]
    fn splits_header_from_body_at_background_boundary() {
        let segments = segment_card(&synthetic_card(), None);
        let header_h = segments.name_card.height() + segments.main_stat_card.height();
        assert_eq!(header_h, 120);
        assert!(!segments.has_equip_banner);
    }

    #[test]
    fn green_peak_splits_substats_from_set() {
        let segments = segment_card(&synthetic_card(), None);
        // The set block must contain the green text rows (absolute 204..212).
        let body_top = 120;
        let sub_h = segments.sub_stats.height();
        assert!(body_top + sub_h <= 204, "sub-stats overlap set text");
        assert!(segments.set.height() > 0);
        assert!(segments.location.height() > 0);
    }

    #[test]
    fn equip_banner_preferred_over_green_peak() {
        let mut card = synthetic_card();
        // Equip banner across the bottom rows of the body.
        fill_rect(&mut card, 0..200, 270..300, palette::EQUIP_BANNER);
        let segments = segment_card(&card, None);
        assert!(segments.has_equip_banner);
        // Split sits one name-height above the banner and the remaining
        // blocks tile the rest of the body.
        let body_top = 120;
        let set_loc_top = body_top + segments.sub_stats.height();
        assert!(set_loc_top < 270);
        assert_eq!(
            set_loc_top + segments.set.height() + segments.location.height(),
            300
        );
    }

    #[test]
    fn missing_boundary_degrades_to_whole_card() {
        // No background band anywhere.
        let buf = PixelBuffer::filled(100, 150, Color::new(10, 10, 10));
        let segments = segment_card(&buf, None);
        assert_eq!(segments.card.width(), 100);
        let header_h = segments.name_card.height() + segments.main_stat_card.height();
        assert_eq!(header_h, 150);
    }

    #[test]
    fn debug_sink_collects_segments() {
        let mut sink = crate::debug::DebugSink::new();
        segment_card(&synthetic_card(), Some(&mut sink));
        for name in ["card", "header", "body", "name_card", "sub_stats", "set", "location"] {
            assert!(sink.get(name).is_some(), "missing debug image {name}");
        }
    }
}
