//! Named arguments of blueprint constructors.
//!
//! Arguments may be given under any alias known to the aliasing system of the constructor,
//! e.g. `"B0"` for `"half_saturation_density"`.

use crate::blueprints::{LinkSource, RateSource};
use endyn_core::aliasing::AliasingSystem;
use endyn_core::errors::{EndynError, EndynResult};
use endyn_core::framework::PropertyValue;
use endyn_core::FloatValue;
use ndarray::Array2;
use std::collections::BTreeMap;

/// Arguments resolved to their canonical names, consumed one by one.
#[derive(Debug, Clone)]
pub struct Args {
    context: &'static str,
    /// Canonical name -> (name as given, value).
    values: BTreeMap<String, (String, PropertyValue)>,
}

impl Args {
    /// Resolve every argument name.
    ///
    /// Fails on unknown names, and when two arguments refer to the same field.
    pub fn parse<I, S>(context: &'static str, aliases: &AliasingSystem, args: I) -> EndynResult<Self>
    where
        I: IntoIterator<Item = (S, PropertyValue)>,
        S: AsRef<str>,
    {
        let mut values = BTreeMap::new();
        for (name, value) in args {
            let name = name.as_ref();
            let canonical = aliases
                .standardize(name)
                .map_err(|e| EndynError::Argument {
                    context: context.to_string(),
                    message: e.to_string(),
                })?
                .to_string();
            if let Some((previous, _)) = values.get(&canonical) {
                return Err(EndynError::Argument {
                    context: context.to_string(),
                    message: format!(
                        "{:?} and {:?} both refer to {}",
                        previous, name, canonical
                    ),
                });
            }
            values.insert(canonical, (name.to_string(), value));
        }
        Ok(Self { context, values })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Remove an argument, returning the name it was given under and its value.
    pub fn take(&mut self, canonical: &str) -> Option<(String, PropertyValue)> {
        self.values.remove(canonical)
    }

    /// Error for an argument of the wrong kind.
    pub fn mismatch(&self, given: &str, expected: &str, value: &PropertyValue) -> EndynError {
        EndynError::Argument {
            context: self.context.to_string(),
            message: format!("{:?} expects {}, received a {}", given, expected, value.kind()),
        }
    }

    pub fn take_scalar(&mut self, canonical: &str) -> EndynResult<Option<FloatValue>> {
        match self.take(canonical) {
            None => Ok(None),
            Some((_, PropertyValue::Scalar(v))) => Ok(Some(v)),
            Some((given, other)) => Err(self.mismatch(&given, "a number", &other)),
        }
    }

    pub fn take_matrix(&mut self, canonical: &str) -> EndynResult<Option<Array2<FloatValue>>> {
        match self.take(canonical) {
            None => Ok(None),
            Some((_, PropertyValue::Matrix(m))) => Ok(Some(m)),
            Some((given, other)) => Err(self.mismatch(&given, "a matrix", &other)),
        }
    }

    /// A per-species rate: a number for a flat rate, or one value per species.
    pub fn take_rates(&mut self, canonical: &str) -> EndynResult<Option<RateSource>> {
        match self.take(canonical) {
            None => Ok(None),
            Some((_, PropertyValue::Scalar(v))) => Ok(Some(RateSource::Flat(v))),
            Some((_, PropertyValue::Vector(v))) => Ok(Some(RateSource::Raw(v))),
            Some((given, other)) => Err(self.mismatch(&given, "a number or a vector", &other)),
        }
    }

    /// A per-link rate: a number for a flat rate, or a full matrix.
    pub fn take_links(&mut self, canonical: &str) -> EndynResult<Option<LinkSource>> {
        match self.take(canonical) {
            None => Ok(None),
            Some((_, PropertyValue::Scalar(v))) => Ok(Some(LinkSource::Flat(v))),
            Some((_, PropertyValue::Matrix(m))) => Ok(Some(LinkSource::Raw(m))),
            Some((given, other)) => Err(self.mismatch(&given, "a number or a matrix", &other)),
        }
    }

    /// Fail if any argument was left unused by the constructor.
    pub fn finish(self) -> EndynResult<()> {
        match self.values.values().next() {
            None => Ok(()),
            Some((given, _)) => Err(EndynError::Argument {
                context: self.context.to_string(),
                message: format!("unexpected argument {:?}", given),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> AliasingSystem {
        AliasingSystem::new(
            "test arguments",
            [("intensity", vec!["i0"]), ("hill_exponent", vec!["h"])],
        )
        .unwrap()
    }

    #[test]
    fn arguments_resolve_aliases() {
        let mut args = Args::parse(
            "test",
            &aliases(),
            [("i0", PropertyValue::Scalar(0.5)), ("hill_exponent", PropertyValue::Scalar(2.0))],
        )
        .unwrap();
        assert_eq!(args.take_scalar("intensity").unwrap(), Some(0.5));
        assert_eq!(args.take_scalar("intensity").unwrap(), None);
        assert_eq!(args.take_scalar("hill_exponent").unwrap(), Some(2.0));
        assert!(args.is_empty());
        args.finish().unwrap();
    }

    #[test]
    fn same_field_twice() {
        let err = Args::parse(
            "test",
            &aliases(),
            [("h", PropertyValue::Scalar(1.0)), ("hill_exponent", PropertyValue::Scalar(2.0))],
        )
        .unwrap_err();
        assert!(matches!(err, EndynError::Argument { .. }));
    }

    #[test]
    fn unknown_and_unused_arguments() {
        assert!(matches!(
            Args::parse("test", &aliases(), [("x", PropertyValue::Scalar(1.0))]),
            Err(EndynError::Argument { .. })
        ));
        let args = Args::parse("test", &aliases(), [("h", PropertyValue::Scalar(1.0))]).unwrap();
        assert!(matches!(args.finish(), Err(EndynError::Argument { .. })));
    }

    #[test]
    fn wrong_kind() {
        let mut args =
            Args::parse("test", &aliases(), [("h", PropertyValue::Text("two".to_string()))])
                .unwrap();
        assert!(matches!(
            args.take_scalar("hill_exponent"),
            Err(EndynError::Argument { .. })
        ));
    }
}
