//! Blueprints: unexpanded data for one component.

use super::component::ComponentId;
use std::fmt::Debug;

/// Failure of a blueprint check, before it is attributed to a component.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFailure {
    pub field: String,
    pub message: String,
}

impl CheckFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Convenience for "expected X, got Y" shape/size failures.
    pub fn mismatch(
        field: impl Into<String>,
        expected: impl Debug,
        received: impl Debug,
    ) -> Self {
        Self::new(
            field,
            format!("expected {:?}, received {:?}", expected, received),
        )
    }
}

pub type CheckResult = Result<(), CheckFailure>;

/// A sub-blueprint brought along by another blueprint.
pub enum Brought<V> {
    /// Must be added together with its parent.
    /// Adding it fails if its component is already present.
    Embedded(Box<dyn Blueprint<V>>),
    /// Only added if the component is missing from the model and from the batch.
    ///
    /// `blueprint` is `None` when the parent cannot build a default from its own data,
    /// which is only an error if something requires the component.
    Implied {
        component: ComponentId,
        blueprint: Option<Box<dyn Blueprint<V>>>,
    },
}

impl<V> Brought<V> {
    pub fn embedded(blueprint: impl Blueprint<V> + 'static) -> Self {
        Self::Embedded(Box::new(blueprint))
    }

    pub fn implied(blueprint: impl Blueprint<V> + 'static) -> Self {
        Self::Implied {
            component: blueprint.component(),
            blueprint: Some(Box::new(blueprint)),
        }
    }

    pub fn cannot_imply(component: ComponentId) -> Self {
        Self::Implied {
            component,
            blueprint: None,
        }
    }
}

/// The data needed to provide one component of a model `V`.
///
/// The framework calls the methods in this order:
/// [`brought`](Blueprint::brought), [`early_check`](Blueprint::early_check),
/// [`late_check`](Blueprint::late_check) then [`expand`](Blueprint::expand).
/// `expand` is only called once every check of the batch succeeded
/// and is the only method allowed to mutate the model.
pub trait Blueprint<V>: Debug {
    /// The component this blueprint provides.
    fn component(&self) -> ComponentId;

    /// Name of the blueprint type, remembered as provenance once expanded.
    fn name(&self) -> &'static str;

    /// Components needed by this particular blueprint,
    /// in addition to the requirements of its component.
    fn requires(&self) -> Vec<ComponentId> {
        vec![]
    }

    fn brought(&self) -> Vec<Brought<V>> {
        vec![]
    }

    /// Model-independent validation.
    fn early_check(&self) -> CheckResult {
        Ok(())
    }

    /// Validation against the model, including the effect of
    /// every blueprint expanded before this one in the batch.
    fn late_check(&self, _model: &V) -> CheckResult {
        Ok(())
    }

    fn expand(&self, model: &mut V);
}
