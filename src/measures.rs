//! Stability and functioning measures of simulated communities.
//!
//! Point measures work on a biomass vector. [`Window`] averages them over the last saved
//! time steps of a [`Solution`].

use endyn_core::errors::{EndynError, EndynResult};
use endyn_core::params::trophic_levels;
use endyn_core::simulate::Solution;
use endyn_core::FloatValue;
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use serde::Serialize;

/// Indices of the species whose biomass is above the threshold.
pub fn alive_species(biomass: &[FloatValue], threshold: FloatValue) -> Vec<usize> {
    biomass
        .iter()
        .enumerate()
        .filter(|(_, b)| **b > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Number of species whose biomass is above the threshold.
pub fn richness(biomass: &[FloatValue], threshold: FloatValue) -> usize {
    biomass.iter().filter(|b| **b > threshold).count()
}

pub fn total_biomass(biomass: &[FloatValue]) -> FloatValue {
    biomass.iter().sum()
}

/// Relative biomass of each species, all zero for an empty community.
fn proportions(biomass: &[FloatValue]) -> impl Iterator<Item = FloatValue> + '_ {
    let total = total_biomass(biomass);
    biomass
        .iter()
        .map(move |b| if total > 0.0 { b / total } else { 0.0 })
}

/// Shannon entropy `-Σ p ln p` of the relative biomasses.
pub fn shannon_diversity(biomass: &[FloatValue]) -> FloatValue {
    -proportions(biomass)
        .filter(|p| *p > 0.0)
        .map(|p| p * p.ln())
        .sum::<FloatValue>()
}

/// Inverse Simpson index `1 / Σ p²`, the effective number of species.
///
/// Zero for an empty community.
pub fn simpson(biomass: &[FloatValue]) -> FloatValue {
    let concentration: FloatValue = proportions(biomass).map(|p| p * p).sum();
    if concentration > 0.0 {
        1.0 / concentration
    } else {
        0.0
    }
}

/// Pielou evenness: Shannon diversity over its maximum `ln S` for the `S` living species.
///
/// Zero when fewer than two species are alive.
pub fn evenness(biomass: &[FloatValue]) -> FloatValue {
    let s = richness(biomass, 0.0);
    if s < 2 {
        return 0.0;
    }
    shannon_diversity(biomass) / (s as FloatValue).ln()
}

/// Variability of the community and of its species over a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoefficientOfVariation {
    /// Of the total biomass.
    pub community: FloatValue,
    /// Of each species, averaged with weights proportional to their mean biomass.
    pub species_mean: FloatValue,
    /// Community variance over the variance it would have if species fluctuated in unison,
    /// between 0 (perfect compensation) and 1 (perfect synchrony).
    pub synchrony: FloatValue,
}

/// Trophic levels of the living part of the food web.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrophicStructure {
    pub max: FloatValue,
    pub mean: FloatValue,
    /// Mean weighted by the species biomass.
    pub weighted_mean: FloatValue,
}

/// The last saved time steps of a solution.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    solution: &'a Solution,
    /// Species × time.
    biomass: Array2<FloatValue>,
}

impl<'a> Window<'a> {
    /// The last `last` saved time steps.
    pub fn last(solution: &'a Solution, last: usize) -> EndynResult<Self> {
        let n = solution.n_timesteps();
        if last == 0 || last > n {
            return Err(EndynError::Argument {
                context: "measure window".to_string(),
                message: format!(
                    "cannot take the last {} time steps out of {}",
                    last, n
                ),
            });
        }
        let biomass = solution.biomass().slice(s![.., n - last..]).to_owned();
        Ok(Self { solution, biomass })
    }

    /// Every saved time step.
    pub fn all(solution: &'a Solution) -> EndynResult<Self> {
        Self::last(solution, solution.n_timesteps())
    }

    pub fn n_timesteps(&self) -> usize {
        self.biomass.ncols()
    }

    /// Biomass of every species at each step, as a contiguous vector.
    fn steps(&self) -> impl Iterator<Item = Vec<FloatValue>> + '_ {
        self.biomass.axis_iter(Axis(1)).map(|col| col.to_vec())
    }

    fn mean_over_steps(&self, measure: impl Fn(&[FloatValue]) -> FloatValue) -> FloatValue {
        self.steps().map(|b| measure(&b)).sum::<FloatValue>() / self.n_timesteps() as FloatValue
    }

    fn final_step(&self) -> Vec<FloatValue> {
        self.biomass.column(self.n_timesteps() - 1).to_vec()
    }

    /// Mean number of living species.
    pub fn richness(&self, threshold: FloatValue) -> FloatValue {
        self.mean_over_steps(|b| richness(b, threshold) as FloatValue)
    }

    /// Mean fraction of the species still alive.
    pub fn persistence(&self, threshold: FloatValue) -> FloatValue {
        match self.biomass.nrows() {
            0 => 0.0,
            n => self.richness(threshold) / n as FloatValue,
        }
    }

    /// Species alive at the end of the window.
    pub fn alive_species(&self, threshold: FloatValue) -> Vec<usize> {
        alive_species(&self.final_step(), threshold)
    }

    pub fn total_biomass(&self) -> FloatValue {
        self.mean_over_steps(total_biomass)
    }

    /// Mean biomass of each species.
    pub fn species_biomass(&self) -> Array1<FloatValue> {
        self.biomass
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(self.biomass.nrows()))
    }

    pub fn shannon_diversity(&self) -> FloatValue {
        self.mean_over_steps(shannon_diversity)
    }

    pub fn simpson(&self) -> FloatValue {
        self.mean_over_steps(simpson)
    }

    pub fn evenness(&self) -> FloatValue {
        self.mean_over_steps(evenness)
    }

    /// Smallest and largest biomass of each species.
    pub fn min_max(&self) -> (Array1<FloatValue>, Array1<FloatValue>) {
        let fold = |init: FloatValue, f: fn(FloatValue, FloatValue) -> FloatValue| {
            self.biomass
                .map_axis(Axis(1), |row| row.iter().copied().fold(init, f))
        };
        (
            fold(FloatValue::INFINITY, FloatValue::min),
            fold(FloatValue::NEG_INFINITY, FloatValue::max),
        )
    }

    /// Population standard deviations use the whole window.
    pub fn coefficient_of_variation(&self) -> CoefficientOfVariation {
        let total: Array1<FloatValue> = self.biomass.sum_axis(Axis(0));
        let (total_mean, total_sd) = mean_sd(total.view());

        let means = self.species_biomass();
        let sds: Array1<FloatValue> = self
            .biomass
            .axis_iter(Axis(0))
            .map(|row| mean_sd(row).1)
            .collect();

        let ratio = |a: FloatValue, b: FloatValue| if b > 0.0 { a / b } else { 0.0 };
        let sum_means = means.sum();
        let species_mean: FloatValue = means
            .iter()
            .zip(sds.iter())
            .map(|(m, sd)| ratio(*m, sum_means) * ratio(*sd, *m))
            .sum();
        let sum_sds = sds.sum();
        CoefficientOfVariation {
            community: ratio(total_sd, total_mean),
            species_mean,
            synchrony: ratio(total_sd * total_sd, sum_sds * sum_sds),
        }
    }

    /// Inverse of the coefficient of variation of the total biomass.
    ///
    /// Infinite for a constant, non-empty community and zero for a community
    /// extinct over the whole window.
    pub fn temporal_stability(&self) -> FloatValue {
        let total: Array1<FloatValue> = self.biomass.sum_axis(Axis(0));
        let (mean, sd) = mean_sd(total.view());
        stability(mean, sd)
    }

    /// Trophic levels of the species alive at the end of the window, computed on the food
    /// web restricted to them.
    ///
    /// Needs the model to be retained in the solution. All zero when every species is extinct.
    pub fn trophic_structure(&self, threshold: FloatValue) -> EndynResult<TrophicStructure> {
        let model = self.solution.get_model().ok_or_else(|| EndynError::Argument {
            context: "trophic structure".to_string(),
            message: "the solution was computed without retaining its model".to_string(),
        })?;
        let trophic = model.trophic().ok_or_else(|| EndynError::Argument {
            context: "trophic structure".to_string(),
            message: "the model has no food web".to_string(),
        })?;
        let biomass = self.final_step();
        let alive = alive_species(&biomass, threshold);
        if alive.is_empty() {
            return Ok(TrophicStructure {
                max: 0.0,
                mean: 0.0,
                weighted_mean: 0.0,
            });
        }
        let sub = Array2::from_shape_fn((alive.len(), alive.len()), |(i, j)| {
            trophic[[alive[i], alive[j]]]
        });
        let levels = trophic_levels(&sub)?;
        let weights: Vec<FloatValue> = alive.iter().map(|i| biomass[*i]).collect();
        Ok(TrophicStructure {
            max: levels.iter().copied().fold(FloatValue::NEG_INFINITY, FloatValue::max),
            mean: levels.mean().unwrap_or(0.0),
            weighted_mean: levels
                .iter()
                .zip(&weights)
                .map(|(l, w)| l * w)
                .sum::<FloatValue>()
                / total_biomass(&weights),
        })
    }
}

fn mean_sd(values: ArrayView1<FloatValue>) -> (FloatValue, FloatValue) {
    let mean = values.mean().unwrap_or(0.0);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<FloatValue>()
        / values.len().max(1) as FloatValue;
    (mean, var.sqrt())
}

fn stability(mean: FloatValue, sd: FloatValue) -> FloatValue {
    if sd > 0.0 {
        mean / sd
    } else if mean > 0.0 {
        FloatValue::INFINITY
    } else {
        0.0
    }
}
