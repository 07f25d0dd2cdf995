//! Sparse discrete distributions over CTMC states.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sparse map from state index to a non-negative weight.
///
/// Used for firing kernels; a kernel's weights sum to one. Serializes as a
/// JSON object keyed by state index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution {
    weights: BTreeMap<usize, f64>,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// All mass on `state`.
    pub fn point(state: usize) -> Self {
        let mut d = Self::new();
        d.set(state, 1.0);
        d
    }

    pub fn set(&mut self, state: usize, weight: f64) {
        self.weights.insert(state, weight);
    }

    /// Add `weight` to the weight already at `state`.
    pub fn add(&mut self, state: usize, weight: f64) {
        *self.weights.entry(state).or_insert(0.0) += weight;
    }

    pub fn get(&self, state: usize) -> f64 {
        self.weights.get(&state).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, state: usize) -> bool {
        self.weights.contains_key(&state)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// `(state, weight)` pairs in ascending state order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.weights.iter().map(|(s, w)| (*s, *w))
    }

    /// States carrying a positive weight.
    pub fn support(&self) -> impl Iterator<Item = usize> + '_ {
        self.weights.iter().filter(|(_, w)| **w > 0.0).map(|(s, _)| *s)
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Scale weights to sum to one. Returns false (and leaves the weights
    /// untouched) when the total is not positive.
    pub fn normalize(&mut self) -> bool {
        let total = self.sum();
        if !(total > 0.0 && total.is_finite()) {
            return false;
        }
        for w in self.weights.values_mut() {
            *w /= total;
        }
        true
    }

    /// Every weight is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.weights.values().all(|w| w.is_finite() && *w >= 0.0)
    }
}

impl FromIterator<(usize, f64)> for Distribution {
    fn from_iter<I: IntoIterator<Item = (usize, f64)>>(iter: I) -> Self {
        let mut d = Distribution::new();
        for (state, weight) in iter {
            d.add(state, weight);
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_mass() {
        let d = Distribution::point(3);
        assert_eq!(d.get(3), 1.0);
        assert_eq!(d.get(2), 0.0);
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn add_accumulates() {
        let d: Distribution = [(1, 0.25), (2, 0.5), (1, 0.25)].into_iter().collect();
        assert_eq!(d.get(1), 0.5);
        assert!((d.sum() - 1.0).abs() < 1e-15);
    }

    #[test]
    fn normalize_rescales() {
        let mut d: Distribution = [(0, 2.0), (4, 6.0)].into_iter().collect();
        assert!(d.normalize());
        assert_eq!(d.get(0), 0.25);
        assert_eq!(d.get(4), 0.75);

        let mut empty = Distribution::new();
        assert!(!empty.normalize());
    }

    #[test]
    fn support_skips_zero_weights() {
        let d: Distribution = [(0, 0.0), (1, 1.0)].into_iter().collect();
        assert_eq!(d.support().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn validity() {
        assert!(Distribution::point(0).is_valid());
        let mut bad = Distribution::new();
        bad.set(0, -0.5);
        assert!(!bad.is_valid());
        bad.set(0, f64::NAN);
        assert!(!bad.is_valid());
    }

    #[test]
    fn json_is_keyed_by_state() {
        let d: Distribution = [(2, 0.5), (7, 0.5)].into_iter().collect();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"2":0.5,"7":0.5}"#);
        let back: Distribution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
