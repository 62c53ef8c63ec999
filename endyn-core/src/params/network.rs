//! Trophic and multiplex networks.

use crate::aliasing::AliasingSystem;
use crate::errors::{EndynError, EndynResult};
use crate::FloatValue;
use ndarray::Array2;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Kind of a non-trophic interaction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum InteractionKind {
    /// Between producers: reduces the net growth of the receiver.
    Competition,
    /// From any species to a producer: increases the intrinsic growth of the receiver.
    Facilitation,
    /// Between predators sharing a prey: reduces their consumption.
    Interference,
    /// From a sessile species to a prey: protects the prey from its predators.
    Refuge,
}

impl InteractionKind {
    pub fn all() -> [InteractionKind; 4] {
        [
            InteractionKind::Competition,
            InteractionKind::Facilitation,
            InteractionKind::Interference,
            InteractionKind::Refuge,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            InteractionKind::Competition => "competition",
            InteractionKind::Facilitation => "facilitation",
            InteractionKind::Interference => "interference",
            InteractionKind::Refuge => "refuge",
        }
    }

    fn aliases() -> &'static AliasingSystem {
        static ALIASES: OnceLock<AliasingSystem> = OnceLock::new();
        ALIASES.get_or_init(|| {
            AliasingSystem::new(
                "interactions",
                [
                    ("competition", vec!["c", "comp"]),
                    ("facilitation", vec!["f", "fac", "facil"]),
                    ("interference", vec!["i", "interf"]),
                    ("refuge", vec!["r", "ref", "refs"]),
                ],
            )
            .expect("interaction aliases are unambiguous")
        })
    }

    /// Parse an interaction from any of its names, e.g. `"comp"` or `"competition"`.
    pub fn parse(reference: &str) -> EndynResult<Self> {
        let canonical = Self::aliases().standardize(reference)?;
        let kind = Self::all()
            .into_iter()
            .find(|k| k.name() == canonical)
            .expect("interaction aliases only map to interaction names");
        Ok(kind)
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type FormFn = dyn Fn(FloatValue, FloatValue) -> FloatValue + Send + Sync;

/// How a non-trophic interaction modifies the rate it acts on: `(x, dx) -> x'`,
/// where `x` is the unmodified rate and `dx` the interaction pressure.
#[derive(Clone)]
pub struct FunctionalForm {
    name: String,
    f: Arc<FormFn>,
}

impl FunctionalForm {
    /// Register a new form.
    ///
    /// The form is probed on a few inputs and rejected if it does not return finite values.
    pub fn new(
        name: &str,
        f: impl Fn(FloatValue, FloatValue) -> FloatValue + Send + Sync + 'static,
    ) -> EndynResult<Self> {
        for (x, dx) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.5, 2.0)] {
            let y = f(x, dx);
            if !y.is_finite() {
                return Err(EndynError::Argument {
                    context: format!("functional form {}", name),
                    message: format!("f({}, {}) = {} is not a finite number", x, dx, y),
                });
            }
        }
        Ok(Self {
            name: name.to_string(),
            f: Arc::new(f),
        })
    }

    /// Built-in forms, known to be well-behaved.
    fn builtin(name: &str, f: fn(FloatValue, FloatValue) -> FloatValue) -> Self {
        Self {
            name: name.to_string(),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn apply(&self, x: FloatValue, dx: FloatValue) -> FloatValue {
        (self.f)(x, dx)
    }
}

impl fmt::Debug for FunctionalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionalForm({})", self.name)
    }
}

impl PartialEq for FunctionalForm {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Serialize for FunctionalForm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Default intensity and functional form of one layer.
#[derive(Debug, Clone)]
pub struct LayerDefaults {
    pub intensity: FloatValue,
    pub functional_form: FunctionalForm,
}

/// Defaults shared by every non-trophic layer created without explicit values.
#[derive(Debug, Clone)]
pub struct MultiplexDefaults {
    pub competition: LayerDefaults,
    pub facilitation: LayerDefaults,
    pub interference: LayerDefaults,
    pub refuge: LayerDefaults,
}

impl MultiplexDefaults {
    pub fn get(&self, kind: InteractionKind) -> &LayerDefaults {
        match kind {
            InteractionKind::Competition => &self.competition,
            InteractionKind::Facilitation => &self.facilitation,
            InteractionKind::Interference => &self.interference,
            InteractionKind::Refuge => &self.refuge,
        }
    }
}

/// Process-wide multiplex defaults, initialised once.
pub fn multiplex_defaults() -> &'static MultiplexDefaults {
    static DEFAULTS: OnceLock<MultiplexDefaults> = OnceLock::new();
    DEFAULTS.get_or_init(|| MultiplexDefaults {
        competition: LayerDefaults {
            intensity: 1.0,
            functional_form: FunctionalForm::builtin("x * (1 - dx), floored at 0", |x, dx| {
                (x * (1.0 - dx)).max(0.0)
            }),
        },
        facilitation: LayerDefaults {
            intensity: 1.0,
            functional_form: FunctionalForm::builtin("x * (1 + dx)", |x, dx| x * (1.0 + dx)),
        },
        interference: LayerDefaults {
            intensity: 1.0,
            functional_form: FunctionalForm::builtin("x + dx", |x, dx| x + dx),
        },
        refuge: LayerDefaults {
            intensity: 1.0,
            functional_form: FunctionalForm::builtin("x / (1 + dx)", |x, dx| x / (1.0 + dx)),
        },
    })
}

/// One non-trophic layer. `links[i, j]` if species `j` acts on species `i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub links: Array2<bool>,
    pub intensity: FloatValue,
    pub functional_form: FunctionalForm,
}

impl Layer {
    /// A layer without any link, using the default intensity and form.
    pub fn empty(n_species: usize, kind: InteractionKind) -> Self {
        let defaults = multiplex_defaults().get(kind);
        Self {
            links: Array2::from_elem((n_species, n_species), false),
            intensity: defaults.intensity,
            functional_form: defaults.functional_form.clone(),
        }
    }

    pub fn n_links(&self) -> usize {
        self.links.iter().filter(|l| **l).count()
    }

    pub fn is_active(&self) -> bool {
        self.intensity != 0.0 && self.links.iter().any(|l| *l)
    }
}

/// The interaction network over species.
///
/// A network starts as a plain food web and is upgraded to a multiplex network the first
/// time a non-trophic layer is requested. The upgrade keeps the trophic layer and
/// creates every non-trophic layer empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Network {
    Foodweb {
        trophic: Array2<bool>,
    },
    Multiplex {
        trophic: Array2<bool>,
        layers: BTreeMap<InteractionKind, Layer>,
    },
}

impl Network {
    pub fn foodweb(trophic: Array2<bool>) -> Self {
        Network::Foodweb { trophic }
    }

    pub fn trophic(&self) -> &Array2<bool> {
        match self {
            Network::Foodweb { trophic } | Network::Multiplex { trophic, .. } => trophic,
        }
    }

    pub fn is_multiplex(&self) -> bool {
        matches!(self, Network::Multiplex { .. })
    }

    /// A non-trophic layer, `None` for plain food webs.
    pub fn layer(&self, kind: InteractionKind) -> Option<&Layer> {
        match self {
            Network::Foodweb { .. } => None,
            Network::Multiplex { layers, .. } => layers.get(&kind),
        }
    }

    /// A non-trophic layer carrying at least one link with non-zero intensity.
    pub fn active_layer(&self, kind: InteractionKind) -> Option<&Layer> {
        self.layer(kind).filter(|l| l.is_active())
    }

    /// Upgrade a food web into a multiplex network. No-op on multiplex networks.
    pub fn upgrade(&mut self, n_species: usize) {
        if let Network::Foodweb { trophic } = self {
            let trophic = std::mem::take(trophic);
            let layers = InteractionKind::all()
                .into_iter()
                .map(|kind| (kind, Layer::empty(n_species, kind)))
                .collect();
            *self = Network::Multiplex { trophic, layers };
        }
    }

    /// Mutable access to a non-trophic layer, upgrading the network first if needed.
    pub fn layer_mut(&mut self, kind: InteractionKind, n_species: usize) -> &mut Layer {
        self.upgrade(n_species);
        match self {
            Network::Multiplex { layers, .. } => layers
                .entry(kind)
                .or_insert_with(|| Layer::empty(n_species, kind)),
            Network::Foodweb { .. } => unreachable!("network was just upgraded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn upgrade_keeps_trophic_layer() {
        let trophic = array![[false, false], [true, false]];
        let mut network = Network::foodweb(trophic.clone());
        assert!(network.layer(InteractionKind::Refuge).is_none());

        network.layer_mut(InteractionKind::Competition, 2).links[[0, 1]] = true;
        assert!(network.is_multiplex());
        assert_eq!(network.trophic(), &trophic);
        for kind in InteractionKind::all() {
            let layer = network.layer(kind).unwrap();
            assert_eq!(layer.links.dim(), (2, 2));
            assert_eq!(layer.intensity, 1.0);
        }
        assert_eq!(network.layer(InteractionKind::Competition).unwrap().n_links(), 1);
        assert_eq!(network.layer(InteractionKind::Facilitation).unwrap().n_links(), 0);
        assert!(network.active_layer(InteractionKind::Facilitation).is_none());

        // Upgrading twice changes nothing.
        let before = network.clone();
        network.upgrade(2);
        assert_eq!(network, before);
    }

    #[test]
    fn default_forms() {
        let d = multiplex_defaults();
        assert_eq!(d.competition.functional_form.apply(2.0, 0.25), 1.5);
        assert_eq!(d.competition.functional_form.apply(2.0, 3.0), 0.0);
        assert_eq!(d.facilitation.functional_form.apply(2.0, 0.5), 3.0);
        assert_eq!(d.interference.functional_form.apply(2.0, 0.5), 2.5);
        assert_eq!(d.refuge.functional_form.apply(2.0, 1.0), 1.0);
    }

    #[test]
    fn forms_must_be_finite() {
        assert!(FunctionalForm::new("ok", |x, dx| x * dx).is_ok());
        let err = FunctionalForm::new("bad", |x, dx| x / dx).unwrap_err();
        assert!(matches!(err, EndynError::Argument { .. }));
    }

    #[test]
    fn parse_interaction() {
        assert_eq!(InteractionKind::parse("comp").unwrap(), InteractionKind::Competition);
        assert_eq!(InteractionKind::parse("r").unwrap(), InteractionKind::Refuge);
        assert!(InteractionKind::parse("mutualism").is_err());
    }

    #[test]
    fn every_alias_parses_to_its_own_kind() {
        for kind in InteractionKind::all() {
            assert_eq!(InteractionKind::parse(kind.name()).unwrap(), kind);
            assert_eq!(InteractionKind::parse(&kind.name()[..1]).unwrap(), kind);
        }
        assert_eq!(InteractionKind::parse("facil").unwrap(), InteractionKind::Facilitation);
        assert_eq!(InteractionKind::parse("interf").unwrap(), InteractionKind::Interference);
    }
}
