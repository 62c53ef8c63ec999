//! Consumer functional responses.
//!
//! Every flavour produces the same two quantities for a consumer `i` and a resource `j`:
//! the biomass flow leaving `j` towards `i` per unit time, and the efficiency with which
//! `i` assimilates it.

use super::nontrophic::ActiveLayer;
use crate::FloatValue;
use ndarray::{Array1, Array2};
use std::fmt::Debug;

/// Per-evaluation inputs shared by every link.
pub(crate) struct ResponseContext<'a> {
    pub trophic: &'a Array2<bool>,
    /// Interference term `I_i` of each consumer.
    pub interference: &'a [FloatValue],
    /// Refuge layer and the refuge pressure on each prey.
    pub refuge: Option<(&'a ActiveLayer, &'a [FloatValue])>,
}

/// A functional response flavour, dispatched dynamically by the generic evaluator.
pub(crate) trait FunctionalResponse: Debug + Send + Sync {
    /// Intraspecific interference coefficient `c_i`, zero when the flavour has none.
    fn interference(&self, i: usize) -> FloatValue;

    /// Part of the response shared by every resource of consumer `i`.
    fn denominator(&self, i: usize, b: &[FloatValue], ctx: &ResponseContext) -> FloatValue;

    /// Biomass flowing from resource `j` to consumer `i`, before assimilation.
    fn flow(
        &self,
        i: usize,
        j: usize,
        b: &[FloatValue],
        denominator: FloatValue,
        ctx: &ResponseContext,
    ) -> FloatValue;

    fn efficiency(&self, i: usize, j: usize) -> FloatValue;
}

/// Bioenergetic response:
/// `F_ij = ω_ij B_j^h / (B0_i^h + I_i B0_i^h + Σ_k ω_ik B_k^h)`,
/// consumer `i` gains `x_i y_i B_i F_ij` from `j`.
#[derive(Debug, Clone)]
pub(crate) struct Bioenergetic {
    pub metabolism: Array1<FloatValue>,
    pub max_consumption: Array1<FloatValue>,
    pub half_saturation: Array1<FloatValue>,
    pub interference: Array1<FloatValue>,
    pub hill: FloatValue,
    pub preferences: Array2<FloatValue>,
    pub efficiency: Array2<FloatValue>,
}

impl FunctionalResponse for Bioenergetic {
    fn interference(&self, i: usize) -> FloatValue {
        self.interference[i]
    }

    fn denominator(&self, i: usize, b: &[FloatValue], ctx: &ResponseContext) -> FloatValue {
        let b0h = self.half_saturation[i].powf(self.hill);
        let mut sum = 0.0;
        for (k, bk) in b.iter().enumerate() {
            if ctx.trophic[[i, k]] {
                sum += self.preferences[[i, k]] * bk.powf(self.hill);
            }
        }
        b0h + ctx.interference[i] * b0h + sum
    }

    fn flow(
        &self,
        i: usize,
        j: usize,
        b: &[FloatValue],
        denominator: FloatValue,
        _ctx: &ResponseContext,
    ) -> FloatValue {
        let f = self.preferences[[i, j]] * b[j].powf(self.hill) / denominator;
        self.metabolism[i] * self.max_consumption[i] * b[i] * f / self.efficiency[[i, j]]
    }

    fn efficiency(&self, i: usize, j: usize) -> FloatValue {
        self.efficiency[[i, j]]
    }
}

/// Classic (Holling) response:
/// `F_ij = ω_ij a_ij B_j^h / (1 + I_i + Σ_k ω_ik a_ik h_ik B_k^h) / M_i`,
/// consumer `i` takes `B_i F_ij` from `j`.
#[derive(Debug, Clone)]
pub(crate) struct Classic {
    pub attack_rate: Array2<FloatValue>,
    pub handling_time: Array2<FloatValue>,
    pub body_mass: Array1<FloatValue>,
    pub interference: Array1<FloatValue>,
    pub hill: FloatValue,
    pub preferences: Array2<FloatValue>,
    pub efficiency: Array2<FloatValue>,
}

impl Classic {
    /// Attack rate, reduced by the refuges protecting the prey.
    #[inline]
    pub fn attack(&self, i: usize, j: usize, ctx: &ResponseContext) -> FloatValue {
        let a = self.attack_rate[[i, j]];
        match ctx.refuge {
            Some((layer, pressure)) => layer.form.apply(a, pressure[j]),
            None => a,
        }
    }
}

impl FunctionalResponse for Classic {
    fn interference(&self, i: usize) -> FloatValue {
        self.interference[i]
    }

    fn denominator(&self, i: usize, b: &[FloatValue], ctx: &ResponseContext) -> FloatValue {
        let mut sum = 0.0;
        for (k, bk) in b.iter().enumerate() {
            if ctx.trophic[[i, k]] {
                sum += self.preferences[[i, k]]
                    * self.attack(i, k, ctx)
                    * self.handling_time[[i, k]]
                    * bk.powf(self.hill);
            }
        }
        1.0 + ctx.interference[i] + sum
    }

    fn flow(
        &self,
        i: usize,
        j: usize,
        b: &[FloatValue],
        denominator: FloatValue,
        ctx: &ResponseContext,
    ) -> FloatValue {
        let f = self.preferences[[i, j]] * self.attack(i, j, ctx) * b[j].powf(self.hill)
            / denominator
            / self.body_mass[i];
        b[i] * f
    }

    fn efficiency(&self, i: usize, j: usize) -> FloatValue {
        self.efficiency[[i, j]]
    }
}

/// Linear response: `F_ij = α_i ω_ij B_j`, consumer `i` takes `B_i F_ij` from `j`.
#[derive(Debug, Clone)]
pub(crate) struct Linear {
    pub consumption_rate: Array1<FloatValue>,
    pub preferences: Array2<FloatValue>,
    pub efficiency: Array2<FloatValue>,
}

impl FunctionalResponse for Linear {
    fn interference(&self, _i: usize) -> FloatValue {
        0.0
    }

    fn denominator(&self, _i: usize, _b: &[FloatValue], _ctx: &ResponseContext) -> FloatValue {
        1.0
    }

    fn flow(
        &self,
        i: usize,
        j: usize,
        b: &[FloatValue],
        _denominator: FloatValue,
        _ctx: &ResponseContext,
    ) -> FloatValue {
        let f = self.consumption_rate[i] * self.preferences[[i, j]] * b[j];
        b[i] * f
    }

    fn efficiency(&self, i: usize, j: usize) -> FloatValue {
        self.efficiency[[i, j]]
    }
}

/// The flavour in use, with its coefficients.
#[derive(Debug, Clone)]
pub(crate) enum Response {
    Bioenergetic(Bioenergetic),
    Classic(Classic),
    Linear(Linear),
}

impl Response {
    pub fn into_dyn(self) -> Box<dyn FunctionalResponse> {
        match self {
            Response::Bioenergetic(r) => Box::new(r),
            Response::Classic(r) => Box::new(r),
            Response::Linear(r) => Box::new(r),
        }
    }
}
