//! Non-trophic interaction layers.

use super::{check_shape, producers};
use crate::ids;
use endyn_core::framework::{Blueprint, CheckFailure, CheckResult, ComponentId};
use endyn_core::params::{FunctionalForm, InteractionKind, ModelParameters};
use endyn_core::FloatValue;
use ndarray::{Array2, Axis};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// How the links of a layer are obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerLinks {
    /// `links[i, j]` if `j` acts on `i`.
    Matrix(Array2<bool>),
    /// Exactly `n` links drawn uniformly among the potential ones.
    Number { n: usize, seed: u64 },
    /// A fraction of the potential links, rounded to the nearest feasible number.
    Connectance { c: FloatValue, seed: u64 },
}

/// Whether a layer only holds reciprocal links.
fn is_symmetric(kind: InteractionKind) -> bool {
    matches!(
        kind,
        InteractionKind::Competition | InteractionKind::Interference
    )
}

/// Links the layer may hold given the food web, row = receiver.
///
/// - competition: between two distinct producers,
/// - facilitation: any species towards a different producer,
/// - interference: between two distinct consumers sharing a prey,
/// - refuge: a producer towards a different species with predators.
pub(crate) fn potential_links(
    kind: InteractionKind,
    model: &ModelParameters,
) -> Result<Array2<bool>, CheckFailure> {
    let field = layer_field(kind);
    let trophic = model
        .trophic()
        .ok_or_else(|| CheckFailure::new(field, "no food web in the model"))?;
    let producers = producers(model, field)?;
    let n = producers.len();
    let has_predators: Vec<bool> = trophic
        .axis_iter(Axis(1))
        .map(|col| col.iter().any(|a| *a))
        .collect();
    let share_prey = |i: usize, j: usize| (0..n).any(|k| trophic[[i, k]] && trophic[[j, k]]);
    Ok(Array2::from_shape_fn((n, n), |(i, j)| {
        i != j
            && match kind {
                InteractionKind::Competition => producers[i] && producers[j],
                InteractionKind::Facilitation => producers[i],
                InteractionKind::Interference => !producers[i] && !producers[j] && share_prey(i, j),
                InteractionKind::Refuge => has_predators[i] && producers[j],
            }
    }))
}

fn layer_field(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Competition => "competition_links",
        InteractionKind::Facilitation => "facilitation_links",
        InteractionKind::Interference => "interference_links",
        InteractionKind::Refuge => "refuge_links",
    }
}

pub(crate) fn check_layer_links(
    kind: InteractionKind,
    model: &ModelParameters,
    links: &Array2<bool>,
) -> CheckResult {
    let field = layer_field(kind);
    let potential = potential_links(kind, model)?;
    check_shape(field, links.dim(), potential.dim())?;
    for ((i, j), link) in links.indexed_iter() {
        if *link && !potential[[i, j]] {
            let names = model.species_names();
            return Err(CheckFailure::new(
                field,
                format!(
                    "{} cannot act on {} through {}",
                    names.get(j).map_or("?", String::as_str),
                    names.get(i).map_or("?", String::as_str),
                    kind
                ),
            ));
        }
    }
    Ok(())
}

pub(crate) fn check_intensity(field: &str, intensity: FloatValue) -> CheckResult {
    if !intensity.is_finite() || intensity < 0.0 {
        return Err(CheckFailure::new(
            field,
            format!("intensity {} must be finite and non-negative", intensity),
        ));
    }
    Ok(())
}

/// Draw `n` links among the potential ones. Symmetric layers draw reciprocal pairs.
fn draw(
    kind: InteractionKind,
    potential: &Array2<bool>,
    n: usize,
    seed: u64,
) -> Result<Array2<bool>, CheckFailure> {
    let field = layer_field(kind);
    let symmetric = is_symmetric(kind);
    let candidates: Vec<(usize, usize)> = potential
        .indexed_iter()
        .filter(|((i, j), p)| **p && (!symmetric || i < j))
        .map(|(ij, _)| ij)
        .collect();
    let draws = if symmetric {
        if n % 2 != 0 {
            return Err(CheckFailure::new(
                field,
                format!("{} links are reciprocal, {} is odd", kind, n),
            ));
        }
        n / 2
    } else {
        n
    };
    if draws > candidates.len() {
        return Err(CheckFailure::new(
            field,
            format!(
                "cannot draw {} links out of {} potential ones",
                n,
                potential.iter().filter(|p| **p).count()
            ),
        ));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut links = Array2::from_elem(potential.dim(), false);
    for index in sample(&mut rng, candidates.len(), draws) {
        let (i, j) = candidates[index];
        links[[i, j]] = true;
        if symmetric {
            links[[j, i]] = true;
        }
    }
    Ok(links)
}

/// One non-trophic layer over the food web.
///
/// Intensity and functional form default to the process-wide multiplex defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NontrophicLayer {
    pub kind: InteractionKind,
    pub links: LayerLinks,
    pub intensity: Option<FloatValue>,
    pub functional_form: Option<FunctionalForm>,
}

impl NontrophicLayer {
    pub fn new(kind: InteractionKind, links: LayerLinks) -> Self {
        Self {
            kind,
            links,
            intensity: None,
            functional_form: None,
        }
    }

    pub fn matrix(kind: InteractionKind, links: Array2<bool>) -> Self {
        Self::new(kind, LayerLinks::Matrix(links))
    }

    pub fn random(kind: InteractionKind, n: usize, seed: u64) -> Self {
        Self::new(kind, LayerLinks::Number { n, seed })
    }

    pub fn connectance(kind: InteractionKind, c: FloatValue, seed: u64) -> Self {
        Self::new(kind, LayerLinks::Connectance { c, seed })
    }

    pub fn with_intensity(mut self, intensity: FloatValue) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn with_functional_form(mut self, form: FunctionalForm) -> Self {
        self.functional_form = Some(form);
        self
    }

    fn compute(&self, model: &ModelParameters) -> Result<Array2<bool>, CheckFailure> {
        match &self.links {
            LayerLinks::Matrix(links) => Ok(links.clone()),
            LayerLinks::Number { n, seed } => {
                draw(self.kind, &potential_links(self.kind, model)?, *n, *seed)
            }
            LayerLinks::Connectance { c, seed } => {
                let potential = potential_links(self.kind, model)?;
                let total = potential.iter().filter(|p| **p).count();
                let n = if is_symmetric(self.kind) {
                    2 * ((c * (total / 2) as FloatValue).round() as usize)
                } else {
                    (c * total as FloatValue).round() as usize
                };
                draw(self.kind, &potential, n, *seed)
            }
        }
    }
}

impl Blueprint<ModelParameters> for NontrophicLayer {
    fn component(&self) -> ComponentId {
        match self.kind {
            InteractionKind::Competition => ids::COMPETITION_LAYER,
            InteractionKind::Facilitation => ids::FACILITATION_LAYER,
            InteractionKind::Interference => ids::INTERFERENCE_LAYER,
            InteractionKind::Refuge => ids::REFUGE_LAYER,
        }
    }

    fn name(&self) -> &'static str {
        match self.links {
            LayerLinks::Matrix(_) => "NontrophicLayer::Matrix",
            LayerLinks::Number { .. } => "NontrophicLayer::Number",
            LayerLinks::Connectance { .. } => "NontrophicLayer::Connectance",
        }
    }

    fn early_check(&self) -> CheckResult {
        let field = layer_field(self.kind);
        if let LayerLinks::Connectance { c, .. } = self.links {
            if !(0.0..=1.0).contains(&c) {
                return Err(CheckFailure::new(
                    field,
                    format!("connectance {} must lie within [0, 1]", c),
                ));
            }
        }
        if let Some(intensity) = self.intensity {
            check_intensity(field, intensity)?;
        }
        Ok(())
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        check_layer_links(self.kind, model, &self.compute(model)?)
    }

    fn expand(&self, model: &mut ModelParameters) {
        let links = self.compute(model).expect("late_check accepted this model");
        let n = model.richness();
        let network = model
            .network
            .as_mut()
            .expect("potential links were drawn from the food web");
        let layer = network.layer_mut(self.kind, n);
        layer.links = links;
        if let Some(intensity) = self.intensity {
            layer.intensity = intensity;
        }
        if let Some(form) = &self.functional_form {
            layer.functional_form = form.clone();
        }
        debug!(kind = %self.kind, n_links = layer.n_links(), "Filled non-trophic layer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprints::Foodweb;
    use crate::model::Model;
    use endyn_core::errors::EndynError;
    use endyn_core::framework::PropertyValue;
    use ndarray::array;

    /// Two producers (s1, s2) eaten by two consumers (s3, s4), s4 also eating s3.
    fn web() -> Model {
        let mut model = Model::new();
        model
            .add(Foodweb::matrix(array![
                [false, false, false, false],
                [false, false, false, false],
                [true, true, false, false],
                [true, false, true, false],
            ]))
            .unwrap();
        model
    }

    #[test]
    fn potential_links_by_kind() {
        let model = web();
        let params = model.parameters();
        let competition = potential_links(InteractionKind::Competition, params).unwrap();
        assert_eq!(competition.iter().filter(|l| **l).count(), 2);
        assert!(competition[[0, 1]] && competition[[1, 0]]);

        let facilitation = potential_links(InteractionKind::Facilitation, params).unwrap();
        assert_eq!(facilitation.iter().filter(|l| **l).count(), 6);

        let interference = potential_links(InteractionKind::Interference, params).unwrap();
        assert!(interference[[2, 3]] && interference[[3, 2]]);
        assert_eq!(interference.iter().filter(|l| **l).count(), 2);

        // s1, s2 and s3 have predators, refuges are producers.
        let refuge = potential_links(InteractionKind::Refuge, params).unwrap();
        assert!(refuge[[0, 1]] && refuge[[1, 0]] && refuge[[2, 0]] && refuge[[2, 1]]);
        assert!(!refuge[[3, 0]] && !refuge[[0, 0]]);
        assert_eq!(refuge.iter().filter(|l| **l).count(), 4);
    }

    #[test]
    fn first_layer_upgrades_the_network() {
        let mut model = web();
        assert!(!model.parameters().network.as_ref().unwrap().is_multiplex());
        model
            .add(NontrophicLayer::random(InteractionKind::Facilitation, 3, 42).with_intensity(0.5))
            .unwrap();
        let network = model.parameters().network.as_ref().unwrap();
        assert!(network.is_multiplex());
        let layer = network.layer(InteractionKind::Facilitation).unwrap();
        assert_eq!(layer.n_links(), 3);
        assert_eq!(layer.intensity, 0.5);
        assert_eq!(network.layer(InteractionKind::Competition).unwrap().n_links(), 0);
        assert_eq!(
            model.get("facilitation_intensity").unwrap(),
            PropertyValue::Scalar(0.5)
        );
    }

    #[test]
    fn random_layers_are_reproducible() {
        let draw_with = |seed| {
            let mut model = web();
            model
                .add(NontrophicLayer::random(InteractionKind::Facilitation, 3, seed))
                .unwrap();
            let links = model.get("facilitation_links").unwrap();
            links
        };
        assert_eq!(draw_with(7), draw_with(7));
    }

    #[test]
    fn symmetric_layers_draw_pairs() {
        let mut model = web();
        assert!(matches!(
            model.add(NontrophicLayer::random(InteractionKind::Competition, 1, 0)),
            Err(EndynError::LateCheck { .. })
        ));
        model
            .add(NontrophicLayer::connectance(InteractionKind::Competition, 1.0, 0))
            .unwrap();
        let links = model.get("competition_links").unwrap();
        assert_eq!(
            links,
            PropertyValue::Adjacency(array![
                [false, true, false, false],
                [true, false, false, false],
                [false, false, false, false],
                [false, false, false, false],
            ])
        );
    }

    #[test]
    fn ineligible_links_are_rejected() {
        let mut model = web();
        let mut links = Array2::from_elem((4, 4), false);
        links[[3, 0]] = true;
        let err = model
            .add(NontrophicLayer::matrix(InteractionKind::Refuge, links))
            .unwrap_err();
        assert!(matches!(err, EndynError::LateCheck { .. }));
        assert!(!model.has_component(ids::REFUGE_LAYER));

        assert!(matches!(
            model.add(NontrophicLayer::random(InteractionKind::Interference, 4, 1)),
            Err(EndynError::LateCheck { .. })
        ));
        assert!(matches!(
            model.add(
                NontrophicLayer::random(InteractionKind::Interference, 2, 1).with_intensity(-1.0)
            ),
            Err(EndynError::EarlyCheck { .. })
        ));
    }
}
