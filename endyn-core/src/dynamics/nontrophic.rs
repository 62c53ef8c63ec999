//! Non-trophic interaction layers as seen by the dynamics.

use crate::params::{FunctionalForm, Layer};
use crate::FloatValue;
use ndarray::Array2;

/// A layer with at least one link and a non-zero intensity.
#[derive(Debug, Clone)]
pub(crate) struct ActiveLayer {
    pub links: Array2<bool>,
    pub intensity: FloatValue,
    pub form: FunctionalForm,
    /// Sources acting on each receiver, in increasing order.
    pub sources: Vec<Vec<usize>>,
}

impl ActiveLayer {
    pub fn new(layer: &Layer) -> Self {
        let sources = layer
            .links
            .outer_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, l)| **l)
                    .map(|(k, _)| k)
                    .collect()
            })
            .collect();
        Self {
            links: layer.links.clone(),
            intensity: layer.intensity,
            form: layer.functional_form.clone(),
            sources,
        }
    }

    /// Interaction pressure on receiver `i`, scanning the full row.
    pub fn pressure_dense(&self, i: usize, b: &[FloatValue]) -> FloatValue {
        let mut sum = 0.0;
        for (k, bk) in b.iter().enumerate() {
            if self.links[[i, k]] {
                sum += bk;
            }
        }
        self.intensity * sum
    }

    /// Interaction pressure on receiver `i`, visiting only its sources.
    pub fn pressure_sparse(&self, i: usize, b: &[FloatValue]) -> FloatValue {
        let mut sum = 0.0;
        for &k in &self.sources[i] {
            sum += b[k];
        }
        self.intensity * sum
    }
}
