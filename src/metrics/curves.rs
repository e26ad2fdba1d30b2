use serde::{Serialize, Deserialize};

use super::statistics::{mean, median};

/// Per-episode score curves over a trailing window.
///
/// Entry `i` of `running_mean` / `running_median` covers episodes
/// `max(0, i + 1 - window)..=i`, so early entries use a shorter window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCurves {
    pub window: usize,
    pub raw: Vec<f32>,
    pub running_mean: Vec<f32>,
    pub running_median: Vec<f32>,
}

impl ScoreCurves {
    pub fn new(scores: &[f32], window: usize) -> Self {
        let window = window.max(1);
        let mut running_mean = Vec::with_capacity(scores.len());
        let mut running_median = Vec::with_capacity(scores.len());

        for idx in 0..scores.len() {
            let start = (idx + 1).saturating_sub(window);
            let slice = &scores[start..=idx];
            running_mean.push(mean(slice));
            running_median.push(median(slice));
        }

        ScoreCurves {
            window,
            raw: scores.to_vec(),
            running_mean,
            running_median,
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// First episode (1-based) whose running mean strictly exceeds
    /// `threshold`, with that mean
    pub fn success_point(&self, threshold: f32) -> Option<(usize, f32)> {
        self.running_mean
            .iter()
            .position(|&m| m > threshold)
            .map(|idx| (idx + 1, self.running_mean[idx]))
    }
}
