use super::{check_shape, check_unique, species_index};
use crate::ids;
use endyn_core::framework::{Blueprint, Brought, CheckFailure, CheckResult, ComponentId};
use endyn_core::params::{ModelParameters, Network, SPECIES, TROPHIC};
use ndarray::Array2;

/// The species of the community, identified by their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    labels: Vec<String>,
}

impl Species {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: names.into_iter().map(Into::into).collect(),
        }
    }

    /// `n` species labelled `s1` to `sn`.
    pub fn count(n: usize) -> Self {
        Self::names((1..=n).map(|i| format!("s{}", i)))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Blueprint<ModelParameters> for Species {
    fn component(&self) -> ComponentId {
        ids::SPECIES
    }

    fn name(&self) -> &'static str {
        "Species"
    }

    fn early_check(&self) -> CheckResult {
        if self.labels.is_empty() {
            return Err(CheckFailure::new("labels", "a community needs at least one species"));
        }
        check_unique("labels", self.labels.iter().map(String::as_str))
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        if model.topology.has_node_compartment(SPECIES) {
            return Err(CheckFailure::new("labels", "species are already defined"));
        }
        Ok(())
    }

    fn expand(&self, model: &mut ModelParameters) {
        model
            .topology
            .add_node_compartment(SPECIES, &self.labels)
            .expect("labels checked before expansion");
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FoodwebSource {
    Matrix(Array2<bool>),
    /// Consumer label and the labels of its resources.
    Lists(Vec<(String, Vec<String>)>),
}

/// Trophic links between species. Entry `(i, j)` of the adjacency matrix is `true`
/// when species `i` eats species `j`.
///
/// Implies the [`Species`] when they are missing: counted from the matrix size, or named
/// after the labels of the adjacency lists in order of appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Foodweb {
    source: FoodwebSource,
}

impl Foodweb {
    pub fn matrix(adjacency: Array2<bool>) -> Self {
        Self {
            source: FoodwebSource::Matrix(adjacency),
        }
    }

    /// Build from integer entries, anything non-zero being a link.
    pub fn from_integers(adjacency: &Array2<i64>) -> Self {
        Self::matrix(adjacency.mapv(|v| v != 0))
    }

    pub fn from_lists<I, K, P, S>(lists: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: FoodwebSource::Lists(
                lists
                    .into_iter()
                    .map(|(k, p)| (k.into(), p.into_iter().map(Into::into).collect()))
                    .collect(),
            ),
        }
    }

    fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = vec![];
        if let FoodwebSource::Lists(lists) = &self.source {
            for (consumer, resources) in lists {
                for label in std::iter::once(consumer).chain(resources) {
                    if !labels.contains(label) {
                        labels.push(label.clone());
                    }
                }
            }
        }
        labels
    }

    fn adjacency(&self, model: &ModelParameters) -> Result<Array2<bool>, CheckFailure> {
        let n = model.richness();
        match &self.source {
            FoodwebSource::Matrix(a) => {
                check_shape("adjacency", a.dim(), (n, n))?;
                Ok(a.clone())
            }
            FoodwebSource::Lists(lists) => {
                let mut a = Array2::from_elem((n, n), false);
                for (consumer, resources) in lists {
                    let i = species_index(model, "adjacency", consumer)?;
                    for resource in resources {
                        a[[i, species_index(model, "adjacency", resource)?]] = true;
                    }
                }
                Ok(a)
            }
        }
    }
}

impl Blueprint<ModelParameters> for Foodweb {
    fn component(&self) -> ComponentId {
        ids::FOODWEB
    }

    fn name(&self) -> &'static str {
        match self.source {
            FoodwebSource::Matrix(_) => "Foodweb::Matrix",
            FoodwebSource::Lists(_) => "Foodweb::Lists",
        }
    }

    fn brought(&self) -> Vec<Brought<ModelParameters>> {
        let species = match &self.source {
            FoodwebSource::Matrix(a) => Species::count(a.nrows()),
            FoodwebSource::Lists(_) => Species::names(self.labels()),
        };
        vec![Brought::implied(species)]
    }

    fn early_check(&self) -> CheckResult {
        match &self.source {
            FoodwebSource::Matrix(a) => {
                if a.nrows() != a.ncols() {
                    return Err(CheckFailure::new(
                        "adjacency",
                        format!("matrix must be square, received {:?}", a.dim()),
                    ));
                }
                Ok(())
            }
            FoodwebSource::Lists(lists) => {
                check_unique("adjacency", lists.iter().map(|(k, _)| k.as_str()))?;
                for (consumer, resources) in lists {
                    check_unique(consumer, resources.iter().map(String::as_str))?;
                }
                Ok(())
            }
        }
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        self.adjacency(model).map(|_| ())
    }

    fn expand(&self, model: &mut ModelParameters) {
        let adjacency = self
            .adjacency(model)
            .expect("adjacency checked before expansion");
        model
            .topology
            .add_edge_type(TROPHIC, (SPECIES, SPECIES))
            .and_then(|_| model.topology.add_edges(TROPHIC, &adjacency))
            .expect("species compartment checked before expansion");
        model.network = Some(Network::foodweb(adjacency));
    }
}
