//! Artifact card scanner core.
//!
//! Turns a screenshot of an in-game item card into a typed
//! [`ParsedArtifactRecord`]: the card is segmented into named sub-regions,
//! each region is prepared and handed to an external text recognizer (all
//! regions in parallel), and the noisy recognized text is resolved against
//! domain vocabularies by edit-distance voting.
//!
//! Nothing in the pipeline is fatal: partial, misaligned or ambiguous
//! recognition degrades into tie sets and fallback defaults that the caller
//! surfaces for user correction.

mod buffer;
pub use buffer::*;
mod histogram;
pub use histogram::*;
mod debug;
pub use debug::DebugSink;
mod segment;
pub use segment::{segment_card, CardSegments};
mod region;
pub use region::{
    dispatch, RecognizeOptions, RegionName, RegionOutputs, RegionSpec, TextRecognizer,
    REGION_SPECS,
};
mod parse;
pub use parse::*;
mod assemble;
pub use assemble::*;

pub use vocab::{Unit, Vocabulary};

/// Pipeline facade: vocabulary plus configuration.
pub struct Scanner {
    vocab: vocab::Vocabulary,
    debug: bool,
}

/// Result of one pipeline run. `debug` is only populated when the scanner
/// was configured to collect intermediate images.
pub struct ScanOutput {
    pub record: ParsedArtifactRecord,
    pub debug: Option<DebugSink>,
}

impl Scanner {
    pub fn new(vocab: vocab::Vocabulary) -> Self {
        Self {
            vocab,
            debug: false,
        }
    }

    /// Collect named intermediate buffers for visual inspection.
    pub fn with_debug_images(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Process one decoded screenshot.
    ///
    /// Sequential segmentation, one parallel recognition fan-out, sequential
    /// resolution and assembly. Buffers are never shared across the
    /// concurrent recognition calls; the join after the fan-out is the only
    /// synchronization point. Batch processing is the caller's loop over
    /// independent `scan` runs.
    pub fn scan(
        &self,
        image: &PixelBuffer,
        recognizer: &(impl TextRecognizer + ?Sized),
    ) -> ScanOutput {
        let mut sink = self.debug.then(DebugSink::new);

        let segments = segment_card(image, sink.as_mut());
        let outputs = dispatch(&segments, recognizer, sink.as_mut());
        let record = assemble(&segments, &outputs, &self.vocab);

        ScanOutput {
            record,
            debug: sink,
        }
    }
}
