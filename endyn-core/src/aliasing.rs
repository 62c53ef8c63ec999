//! Bidirectional mapping between canonical keys and their user-facing aliases.
//!
//! Users refer to the same logical quantity under several names
//! (`"d"`, `"mortality"`, `"natural_death_rate"`).
//! An [`AliasingSystem`] resolves any of these references to a single canonical key.
//!
//! Ambiguities are configuration errors of the catalogue that defines the system,
//! so they are reported when the system is built and never during lookups.
//!
//! ```
//! use endyn_core::aliasing::AliasingSystem;
//!
//! let system = AliasingSystem::new(
//!     "rates",
//!     [("d", vec!["mortality", "natural_death_rate"]), ("r", vec!["growth_rate"])],
//! )
//! .unwrap();
//! assert_eq!(system.standardize("mortality").unwrap(), "d");
//! assert_eq!(system.shortest("d"), Some("d"));
//! ```

use crate::errors::{EndynError, EndynResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Order references so that the shortest form comes first.
fn by_length_then_lexicographic(a: &String, b: &String) -> Ordering {
    a.chars()
        .count()
        .cmp(&b.chars().count())
        .then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasingSystem {
    name: String,
    /// Canonical key -> every reference to it (itself included), shortest first.
    references: BTreeMap<String, Vec<String>>,
    /// Any reference -> canonical key.
    canonical: HashMap<String, String>,
}

impl AliasingSystem {
    /// Build a new system from `canonical -> [aliases]` entries.
    ///
    /// Fails if a reference is claimed by two canonical keys or twice by the same key.
    pub fn new<I, K, A, S>(name: &str, entries: I) -> EndynResult<Self>
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut system = Self {
            name: name.to_string(),
            references: BTreeMap::new(),
            canonical: HashMap::new(),
        };

        let entries: Vec<(String, Vec<String>)> = entries
            .into_iter()
            .map(|(k, aliases)| (k.into(), aliases.into_iter().map(Into::into).collect()))
            .collect();

        // Canonical keys are registered first so that an alias shadowing
        // another key is always caught, whatever the entry order.
        for (key, _) in &entries {
            system.claim(key, key)?;
            system.references.insert(key.clone(), vec![key.clone()]);
        }
        for (key, aliases) in entries {
            for alias in aliases {
                system.claim(&alias, &key)?;
                system.push_reference(&key, alias);
            }
        }
        Ok(system)
    }

    /// Return a new system with one extra alias for an existing canonical key.
    pub fn with_alias(&self, canonical: &str, alias: &str) -> EndynResult<Self> {
        if !self.references.contains_key(canonical) {
            return Err(self.unknown(canonical));
        }
        let mut system = self.clone();
        system.claim(alias, canonical)?;
        system.push_reference(canonical, alias.to_string());
        Ok(system)
    }

    fn claim(&mut self, reference: &str, key: &str) -> EndynResult<()> {
        match self.canonical.get(reference) {
            Some(existing) if existing == key => Err(EndynError::DuplicateAlias {
                system: self.name.clone(),
                reference: reference.to_string(),
                canonical: key.to_string(),
            }),
            Some(existing) => Err(EndynError::AmbiguousAlias {
                system: self.name.clone(),
                reference: reference.to_string(),
                first: existing.clone(),
                second: key.to_string(),
            }),
            None => {
                self.canonical.insert(reference.to_string(), key.to_string());
                Ok(())
            }
        }
    }

    fn push_reference(&mut self, key: &str, reference: String) {
        let refs = self.references.entry(key.to_string()).or_default();
        refs.push(reference);
        refs.sort_by(by_length_then_lexicographic);
    }

    fn unknown(&self, reference: &str) -> EndynError {
        EndynError::UnknownReference {
            system: self.name.clone(),
            reference: reference.to_string(),
            expected: self
                .references
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve any reference to its canonical key.
    pub fn standardize(&self, reference: &str) -> EndynResult<&str> {
        self.canonical
            .get(reference)
            .map(|s| s.as_str())
            .ok_or_else(|| self.unknown(reference))
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.canonical.contains_key(reference)
    }

    /// Check whether `reference` designates `canonical`.
    pub fn is(&self, reference: &str, canonical: &str) -> bool {
        self.canonical
            .get(reference)
            .is_some_and(|key| key == canonical)
    }

    /// All references to a canonical key, shortest first.
    pub fn references(&self, canonical: &str) -> Option<&[String]> {
        self.references.get(canonical).map(|v| v.as_slice())
    }

    /// The shortest reference to a canonical key, used for display.
    pub fn shortest(&self, canonical: &str) -> Option<&str> {
        self.references
            .get(canonical)
            .and_then(|refs| refs.first())
            .map(|s| s.as_str())
    }

    pub fn canonicals(&self) -> impl Iterator<Item = &str> {
        self.references.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> AliasingSystem {
        AliasingSystem::new(
            "rates",
            [
                ("d", Vec::<&str>::new()),
                ("r", Vec::new()),
                ("x", Vec::new()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn canonical_key_resolves_to_itself() {
        let system = rates();
        assert_eq!(system.standardize("d").unwrap(), "d");
        for key in ["d", "r", "x"] {
            let once = system.standardize(key).unwrap();
            assert_eq!(system.standardize(once).unwrap(), once);
        }
    }

    #[test]
    fn added_alias_resolves_and_ambiguity_is_rejected() {
        let system = rates().with_alias("d", "natural_death").unwrap();
        assert_eq!(system.standardize("natural_death").unwrap(), "d");

        let res = system.with_alias("r", "natural_death");
        match res {
            Err(EndynError::AmbiguousAlias { first, second, .. }) => {
                assert_eq!(first, "d");
                assert_eq!(second, "r");
            }
            other => panic!("expected ambiguity error, got {:?}", other),
        }
    }

    #[test]
    fn ambiguity_detected_at_construction() {
        let res = AliasingSystem::new(
            "rates",
            [("d", vec!["death"]), ("r", vec!["death"])],
        );
        assert!(matches!(res, Err(EndynError::AmbiguousAlias { .. })));

        // An alias shadowing another canonical key, whatever the order.
        let res = AliasingSystem::new("rates", [("d", vec!["r"]), ("r", vec![])]);
        assert!(matches!(res, Err(EndynError::AmbiguousAlias { .. })));
    }

    #[test]
    fn duplicates_detected_at_construction() {
        let res = AliasingSystem::new("rates", [("d", vec!["death", "death"])]);
        assert!(matches!(res, Err(EndynError::DuplicateAlias { .. })));

        let res = AliasingSystem::new("rates", [("d", vec!["d"])]);
        assert!(matches!(res, Err(EndynError::DuplicateAlias { .. })));
    }

    #[test]
    fn unknown_reference() {
        let err = rates().standardize("mortality").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown reference mortality in aliasing system rates, expected one of [d, r, x]"
        );
    }

    #[test]
    fn references_are_sorted_by_length_then_name() {
        let system = AliasingSystem::new(
            "rates",
            [("mortality", vec!["natural_death_rate", "d", "death"])],
        )
        .unwrap();
        assert_eq!(
            system.references("mortality").unwrap(),
            &["d", "death", "mortality", "natural_death_rate"]
        );
        assert_eq!(system.shortest("mortality"), Some("d"));
        assert!(system.is("death", "mortality"));
        assert!(!system.is("death", "d"));
    }
}
