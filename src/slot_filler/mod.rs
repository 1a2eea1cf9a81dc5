pub mod crf_slot_filler;
mod crf_utils;
pub mod feature_processor;
pub mod features;
pub mod sequence;

pub use self::crf_slot_filler::{CrfSlotFiller, SlotFillerPayloads, SlotLanguageModel};
pub use self::feature_processor::SequenceFeatureProcessor;

use crate::errors::*;

/// Token attributes of one sequence with their expected labels
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedFeatures {
    pub features: Vec<Vec<(String, f32)>>,
    pub labels: Vec<String>,
}

/// Raw sequence learner (CRF-like). Models are opaque bytes.
pub trait CrfTagger: Send + Sync {
    fn train(&mut self, sequences: &[TaggedFeatures]) -> Result<Vec<u8>>;

    fn load(&mut self, model: &[u8]) -> Result<()>;

    /// Returns the most likely label of each token with its marginal probability
    fn tag(&self, features: &[Vec<(String, f32)>]) -> Result<Vec<(String, f32)>>;
}
