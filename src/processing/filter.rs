//! Trimmed-mean smoothing of sensor windows
//!
//! Each sensor keeps the N most recent raw samples. The stable reading is,
//! per axis, the mean of the window after dropping its single lowest and
//! single highest value, which rejects isolated spikes from the board.

use crate::core::{RawSample, StableVector};
use std::collections::VecDeque;
use thiserror::Error;

/// Smallest window that leaves at least one sample after trimming
pub const MIN_FILTER_LENGTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter length {length} is too short, at least {MIN_FILTER_LENGTH} samples are needed")]
    WindowTooShort { length: usize },
    #[error("filter window not primed: {have} of {need} samples")]
    NotPrimed { have: usize, need: usize },
}

/// Fixed-capacity ring of the most recent samples of one sensor
#[derive(Debug, Clone)]
pub struct FilterWindow {
    samples: VecDeque<RawSample>,
    capacity: usize,
}

impl FilterWindow {
    pub fn new(capacity: usize) -> Result<Self, FilterError> {
        if capacity < MIN_FILTER_LENGTH {
            return Err(FilterError::WindowTooShort { length: capacity });
        }

        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a sample, evicting the oldest one once the window is full
    pub fn push(&mut self, sample: RawSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn is_primed(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawSample> {
        self.samples.iter()
    }
}

/// Mean of `values` without their single minimum and single maximum
pub fn trimmed_mean_of(values: &[f64]) -> Result<f64, FilterError> {
    if values.len() < MIN_FILTER_LENGTH {
        return Err(FilterError::WindowTooShort { length: values.len() });
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let kept = &sorted[1..sorted.len() - 1];
    Ok(kept.iter().sum::<f64>() / kept.len() as f64)
}

/// Reduce a primed window to one stable vector. The window is left untouched.
pub fn trimmed_mean(window: &FilterWindow) -> Result<StableVector, FilterError> {
    if !window.is_primed() {
        return Err(FilterError::NotPrimed {
            have: window.len(),
            need: window.capacity(),
        });
    }

    let xs: Vec<f64> = window.iter().map(|s| s.x as f64).collect();
    let ys: Vec<f64> = window.iter().map(|s| s.y as f64).collect();
    let zs: Vec<f64> = window.iter().map(|s| s.z as f64).collect();

    Ok(StableVector::new(
        trimmed_mean_of(&xs)?,
        trimmed_mean_of(&ys)?,
        trimmed_mean_of(&zs)?,
    ))
}
