//! Conversational lead-ins for in-scope replies

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Phrases prepended to a talking point. Each carries its own trailing
/// separator so the point can be appended directly.
pub const LEAD_IN_PHRASES: &[&str] = &[
    "Absolutely, ",
    "Great question. ",
    "I can help with that. ",
    "Let me share this with you: ",
    "Here's what I can tell you: ",
];

/// Source of lead-in choices. Implementations return an index below `count`.
pub trait LeadInPicker: Send + Sync {
    fn pick(&mut self, count: usize) -> usize;
}

/// Uniform random choice
pub struct RandomLeadIn<R = StdRng> {
    rng: R,
}

impl RandomLeadIn<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl<R: Rng + Send + Sync> RandomLeadIn<R> {
    #[allow(dead_code)] // Seeded RNGs in tests
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send + Sync> LeadInPicker for RandomLeadIn<R> {
    fn pick(&mut self, count: usize) -> usize {
        self.rng.gen_range(0..count)
    }
}

/// Always picks the same phrase (wrapped into range)
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedLeadIn(pub usize);

#[cfg(test)]
impl LeadInPicker for FixedLeadIn {
    fn pick(&mut self, count: usize) -> usize {
        self.0 % count
    }
}

/// Resolve a picker's choice to a phrase
pub fn choose(picker: &mut dyn LeadInPicker) -> &'static str {
    let index = picker.pick(LEAD_IN_PHRASES.len());
    LEAD_IN_PHRASES
        .get(index)
        .copied()
        .unwrap_or(LEAD_IN_PHRASES[0])
}
