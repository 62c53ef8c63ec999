//! Producer growth models.

use crate::FloatValue;
use ndarray::{Array1, Array2};
use std::fmt::Debug;

/// A producer growth flavour, dispatched dynamically by the generic evaluator.
pub(crate) trait ProducerGrowth: Debug + Send + Sync {
    /// Intrinsic growth rate `r_i`, temperature included.
    fn growth_rate(&self, i: usize) -> FloatValue;

    /// Net growth `G_i` of producer `i` given its (possibly facilitated) intrinsic rate.
    fn growth(&self, i: usize, r: FloatValue, b: &[FloatValue], n: &[FloatValue]) -> FloatValue;

    /// Nutrient derivatives given the net growth of every species.
    fn nutrients(&self, _growth: &[FloatValue], _n: &[FloatValue], _dn: &mut [FloatValue]) {}
}

/// `G_i = r_i B_i (1 - Σ_j s_ij B_j / K_i)`
#[derive(Debug, Clone)]
pub(crate) struct Logistic {
    pub growth_rate: Array1<FloatValue>,
    pub carrying_capacity: Array1<FloatValue>,
    pub competition: Array2<FloatValue>,
}

impl ProducerGrowth for Logistic {
    fn growth_rate(&self, i: usize) -> FloatValue {
        self.growth_rate[i]
    }

    fn growth(&self, i: usize, r: FloatValue, b: &[FloatValue], _n: &[FloatValue]) -> FloatValue {
        let mut sum = 0.0;
        for (j, bj) in b.iter().enumerate() {
            sum += self.competition[[i, j]] * bj;
        }
        r * b[i] * (1.0 - sum / self.carrying_capacity[i])
    }
}

/// `G_i = r_i B_i min_l N_l / (K_il + N_l)`, with
/// `dN_l = D_l (S_l - N_l) - Σ_i c_il G_i`.
#[derive(Debug, Clone)]
pub(crate) struct NutrientIntake {
    pub growth_rate: Array1<FloatValue>,
    pub turnover: Array1<FloatValue>,
    pub supply: Array1<FloatValue>,
    pub concentration: Array2<FloatValue>,
    pub half_saturation: Array2<FloatValue>,
}

impl NutrientIntake {
    #[inline]
    pub fn limitation(&self, i: usize, n: &[FloatValue]) -> FloatValue {
        n.iter()
            .enumerate()
            .map(|(l, nl)| nl / (self.half_saturation[[i, l]] + nl))
            .fold(FloatValue::INFINITY, FloatValue::min)
    }
}

impl ProducerGrowth for NutrientIntake {
    fn growth_rate(&self, i: usize) -> FloatValue {
        self.growth_rate[i]
    }

    fn growth(&self, i: usize, r: FloatValue, b: &[FloatValue], n: &[FloatValue]) -> FloatValue {
        r * b[i] * self.limitation(i, n)
    }

    fn nutrients(&self, growth: &[FloatValue], n: &[FloatValue], dn: &mut [FloatValue]) {
        for (l, nl) in n.iter().enumerate() {
            let mut uptake = 0.0;
            for (i, gi) in growth.iter().enumerate() {
                uptake += self.concentration[[i, l]] * gi;
            }
            dn[l] = self.turnover[l] * (self.supply[l] - nl) - uptake;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Growth {
    Logistic(Logistic),
    NutrientIntake(NutrientIntake),
}

impl Growth {
    pub fn into_dyn(self) -> Box<dyn ProducerGrowth> {
        match self {
            Growth::Logistic(g) => Box::new(g),
            Growth::NutrientIntake(g) => Box::new(g),
        }
    }
}
