//! Preference schema: turns raw questionnaire answers into preference vectors.
//!
//! Each attribute is scaled to `[0, 1]` by its declared maximum and then
//! multiplied by its weight, so attributes that matter more for compatibility
//! contribute larger distances. Unanswered attributes become
//! [`MISSING_SENTINEL`].

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, MatchResult};
use crate::types::MISSING_SENTINEL;

/// One named questionnaire attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceAttribute {
    pub name: String,
    /// Largest valid raw answer. Answers fall in `0..=max`.
    pub max: f64,
    /// Multiplier applied after normalization.
    pub weight: f64,
}

impl PreferenceAttribute {
    #[must_use]
    pub fn new(name: impl Into<String>, max: f64, weight: f64) -> Self {
        Self {
            name: name.into(),
            max,
            weight,
        }
    }
}

/// Ordered attribute list. Vector position `i` corresponds to attribute `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceSchema {
    attributes: Vec<PreferenceAttribute>,
}

impl PreferenceSchema {
    /// Build a schema, rejecting attributes with a non-positive maximum or a
    /// negative weight.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::InvalidConfig` naming the bad attribute.
    pub fn new(attributes: Vec<PreferenceAttribute>) -> MatchResult<Self> {
        if attributes.is_empty() {
            return Err(MatchError::InvalidConfig {
                field: "schema.attributes".into(),
                value: "[]".into(),
                reason: "schema needs at least one attribute".into(),
            });
        }
        for attribute in &attributes {
            if !(attribute.max.is_finite() && attribute.max > 0.0) {
                return Err(MatchError::InvalidConfig {
                    field: format!("schema.{}.max", attribute.name),
                    value: attribute.max.to_string(),
                    reason: "must be a positive finite number".into(),
                });
            }
            if !(attribute.weight.is_finite() && attribute.weight >= 0.0) {
                return Err(MatchError::InvalidConfig {
                    field: format!("schema.{}.weight", attribute.name),
                    value: attribute.weight.to_string(),
                    reason: "must be a non-negative finite number".into(),
                });
            }
        }
        Ok(Self { attributes })
    }

    /// The eight-attribute roommate questionnaire.
    #[must_use]
    pub fn default_roommate() -> Self {
        Self {
            attributes: vec![
                PreferenceAttribute::new("smoking", 1.0, 2.0),
                PreferenceAttribute::new("cleanliness", 4.0, 1.9),
                PreferenceAttribute::new("sleep_schedule", 2.0, 1.7),
                PreferenceAttribute::new("guest_frequency", 2.0, 1.5),
                PreferenceAttribute::new("pets", 2.0, 1.5),
                PreferenceAttribute::new("noise_level", 2.0, 1.9),
                PreferenceAttribute::new("sharing_common_items", 2.0, 1.3),
                PreferenceAttribute::new("dietary_preference", 4.0, 1.0),
            ],
        }
    }

    #[must_use]
    pub fn attributes(&self) -> &[PreferenceAttribute] {
        &self.attributes
    }

    /// Vector length produced by [`encode`](Self::encode).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.attributes.len()
    }

    /// Encode raw answers (`None` = unanswered) into a preference vector.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::InvalidVectorSize` when `answers` does not have one
    /// entry per attribute, and `MatchError::InvalidPreference` for an answer
    /// outside `0..=max`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self, answers: &[Option<f64>]) -> MatchResult<Vec<f32>> {
        if answers.len() != self.attributes.len() {
            return Err(MatchError::InvalidVectorSize {
                user_id: "<answers>".into(),
                expected: self.attributes.len(),
                found: answers.len(),
            });
        }
        self.attributes
            .iter()
            .zip(answers)
            .map(|(attribute, answer)| match *answer {
                None => Ok(MISSING_SENTINEL),
                Some(value) if value.is_finite() && (0.0..=attribute.max).contains(&value) => {
                    Ok((value / attribute.max * attribute.weight) as f32)
                }
                Some(value) => Err(MatchError::InvalidPreference {
                    attribute: attribute.name.clone(),
                    value,
                    max: attribute.max,
                }),
            })
            .collect()
    }
}

impl Default for PreferenceSchema {
    fn default() -> Self {
        Self::default_roommate()
    }
}
