//! A dependency-checked aggregation engine.
//!
//! A model is assembled incrementally from *blueprints*. Each blueprint provides the data
//! of one *component* (a named role such as `"Foodweb"` or `"BodyMass"`), may bring other
//! blueprints along, and is validated before it is allowed to modify the model.
//!
//! Components and their relations (`requires`, `conflicts`) and exposed properties are
//! declared once in a [`Registry`], a runtime table shared by every model of the same type.
//!
//! Adding a batch of blueprints to a [`System`] runs the following steps:
//!
//! 1. flatten the embedded sub-blueprints into the batch,
//! 2. add implied blueprints for components still missing,
//! 3. reject conflicting components,
//! 4. reject unmet requirements,
//! 5. run every early (model-independent) check,
//! 6. order the batch so that dependencies expand first,
//! 7. late-check then expand each blueprint on a candidate copy of the model,
//! 8. commit the candidate and record which blueprint provided each component.
//!
//! No step before the commit touches the model, so a failing batch leaves it unchanged.

mod blueprint;
mod component;
mod property;
mod system;

pub use blueprint::{Blueprint, Brought, CheckFailure, CheckResult};
pub use component::{ComponentId, ComponentSpec, Registry, RegistryBuilder};
pub use property::{Getter, Property, PropertyValue, WriteCheck, WriteFn, Writer};
pub use system::System;
