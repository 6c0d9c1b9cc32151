//! Simulation outputs.
//!
//! Trajectories are filled one period at a time and never carry unfilled
//! trailing entries: a path that stops early is simply shorter.

use serde::{Deserialize, Serialize};

/// Expected-path trajectory produced by the deterministic integrators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Temperature anomaly per period.
    pub temperature: Vec<f64>,
    /// Emission per period.
    pub emission: Vec<f64>,
    /// Drift distortion per period.
    pub drift_distortion: Vec<f64>,
    /// Distorted climate-model probabilities per period.
    pub climate_probabilities: Vec<Vec<f64>>,
    /// Distorted damage-model probabilities per period.
    ///
    /// In a two-regime run only the periods before the switch are recorded.
    pub damage_probabilities: Vec<Vec<f64>>,
    /// Marginal value of emission per period, when requested.
    ///
    /// In a two-regime run only the periods before the switch are recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marginal_value: Option<Vec<f64>>,
    /// Per-step jump probability, for runs confined to the pre-jump region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_probability: Option<Vec<f64>>,
    /// First period integrated with the post-threshold policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_period: Option<usize>,
    /// Last period integrated with the pre-threshold policy. `None` when the
    /// run switched before its first period or never switched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<usize>,
}

impl Trajectory {
    pub(crate) fn with_capacity(periods: usize, marginal_value: bool) -> Self {
        Self {
            temperature: Vec::with_capacity(periods),
            emission: Vec::with_capacity(periods),
            drift_distortion: Vec::with_capacity(periods),
            climate_probabilities: Vec::with_capacity(periods),
            damage_probabilities: Vec::with_capacity(periods),
            marginal_value: marginal_value.then(|| Vec::with_capacity(periods)),
            jump_probability: None,
            switch_period: None,
            threshold: None,
        }
    }

    /// Number of recorded periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.temperature.len()
    }

    /// Returns true if no period was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temperature.is_empty()
    }
}

/// Uncertainty-decomposition path: emission, level and the log ratio of
/// marginal values against a baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecompositionPath {
    /// Emission per period.
    pub emission: Vec<f64>,
    /// Temperature anomaly per period.
    pub temperature: Vec<f64>,
    /// `log(ME_new / ME_baseline) * 1000` per period.
    pub ratio: Vec<f64>,
}

/// One Monte Carlo realization of the jump process.
///
/// All sequences have `periods + 1` entries unless the path was truncated at
/// a policy-domain boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McPath {
    /// Temperature anomaly per period.
    pub temperature: Vec<f64>,
    /// Accumulated temperature per period.
    pub accumulated: Vec<f64>,
    /// Emission per period.
    pub emission: Vec<f64>,
    /// Realized damage model, from the jump period onward.
    pub damage_loc: Vec<Option<usize>>,
    /// Realized climate model, from the jump period onward (extended variant).
    pub climate_loc: Vec<Option<usize>>,
    /// Climate model drawn at time 0 (base variant).
    pub initial_climate: Option<usize>,
    /// Period at which the path stopped because a policy was queried outside
    /// its domain.
    pub truncated_at: Option<usize>,
}

impl McPath {
    /// Number of recorded periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.temperature.len()
    }

    /// Returns true if no period was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temperature.is_empty()
    }

    /// Period at which the jump was realized, if any.
    #[must_use]
    pub fn jump_period(&self) -> Option<usize> {
        self.damage_loc.iter().position(Option::is_some)
    }

    /// Realized damage model, if a jump occurred.
    #[must_use]
    pub fn realized_damage(&self) -> Option<usize> {
        self.damage_loc.iter().flatten().next().copied()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.temperature.truncate(len);
        self.accumulated.truncate(len);
        self.emission.truncate(len);
        self.damage_loc.truncate(len);
        self.climate_loc.truncate(len);
        self.truncated_at = Some(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trajectory_len_tracks_temperature() {
        let mut t = Trajectory::with_capacity(4, true);
        assert!(t.is_empty());
        t.temperature.push(1.0);
        assert_eq!(t.len(), 1);
        assert!(t.marginal_value.is_some());
        assert!(Trajectory::with_capacity(4, false).marginal_value.is_none());
    }

    #[test]
    fn optional_fields_are_skipped_when_absent() {
        let json = serde_json::to_value(Trajectory::default()).unwrap();
        assert!(json.get("switch_period").is_none());
        assert!(json.get("temperature").is_some());
    }

    #[test]
    fn mc_path_reports_jump() {
        let path = McPath {
            temperature: vec![1.0, 1.6, 2.0, 2.1],
            accumulated: vec![0.0; 4],
            emission: vec![0.0; 4],
            damage_loc: vec![None, Some(3), Some(3), Some(3)],
            climate_loc: vec![None; 4],
            initial_climate: Some(0),
            truncated_at: None,
        };
        assert_eq!(path.jump_period(), Some(1));
        assert_eq!(path.realized_damage(), Some(3));

        let mut short = path;
        short.truncate(2);
        assert_eq!(short.len(), 2);
        assert_eq!(short.damage_loc.len(), 2);
        assert_eq!(short.truncated_at, Some(2));
    }
}
