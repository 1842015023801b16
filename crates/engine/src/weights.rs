use serde::{Deserialize, Serialize};

/// Per-dimension multipliers combined with each evidence record's base score
/// to produce its composite ranking score. Supplied by the caller as a
/// baseline and never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankerWeights {
    pub diff: f32,
    pub stack_frame: f32,
    pub definition: f32,
    pub reference: f32,
    pub keyword: f32,
    pub working_set: f32,
    /// Per-frame decay factor for stack-trace evidence, in `0..1`; the
    /// effective weight is `stack_frame * (1 - decay)^depth`.
    pub stack_depth_decay: f32,
}

impl Default for RerankerWeights {
    fn default() -> Self {
        Self {
            diff: 100.0,
            stack_frame: 80.0,
            definition: 70.0,
            reference: 60.0,
            keyword: 50.0,
            working_set: 40.0,
            stack_depth_decay: 0.15,
        }
    }
}

/// Per-intent weight overrides: absolute replacement values, not deltas.
/// `None` means "keep the caller-supplied base value" — an observable
/// distinction from "explicitly set to the base value", hence the option
/// fields rather than sentinel numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightModifiers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_frame: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_set: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_depth_decay: Option<f32>,
}

impl WeightModifiers {
    /// Overlay onto `base`, returning a fresh record. Named fields replace
    /// the base value; everything else copies through unchanged.
    #[must_use]
    pub fn apply(&self, base: &RerankerWeights) -> RerankerWeights {
        RerankerWeights {
            diff: self.diff.unwrap_or(base.diff),
            stack_frame: self.stack_frame.unwrap_or(base.stack_frame),
            definition: self.definition.unwrap_or(base.definition),
            reference: self.reference.unwrap_or(base.reference),
            keyword: self.keyword.unwrap_or(base.keyword),
            working_set: self.working_set.unwrap_or(base.working_set),
            stack_depth_decay: self.stack_depth_decay.unwrap_or(base.stack_depth_decay),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
