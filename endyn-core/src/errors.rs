use thiserror::Error;

/// Error type for invalid operations.
///
/// Every failure of a model update, a property access or a simulation call is reported
/// through one of these variants. Variants carry the names of the offending
/// component, blueprint or field so that callers can build their own messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EndynError {
    #[error("{0}")]
    Error(String),

    /// Malformed call, raised before any blueprint exists.
    #[error("Invalid argument for {context}: {message}")]
    Argument { context: String, message: String },

    /// A blueprint-local invariant is violated. Raised before the model is touched.
    #[error("Invalid blueprint {blueprint} for component {component} (field {field}): {message}")]
    EarlyCheck {
        component: String,
        blueprint: String,
        field: String,
        message: String,
    },

    /// A blueprint is inconsistent with the model it is added to.
    #[error(
        "Blueprint {blueprint} for component {component} cannot be added to this model (field {field}): {message}"
    )]
    LateCheck {
        component: String,
        blueprint: String,
        field: String,
        message: String,
    },

    #[error("Blueprint {blueprint} requires component {required}, which is missing")]
    MissingRequiredComponent { blueprint: String, required: String },

    /// The required component could have been brought by an implying blueprint,
    /// but that blueprint cannot build it from its own data.
    #[error(
        "Blueprint {blueprint} requires component {required}, which is missing: implied by {implied_by} but it cannot be built from its data"
    )]
    MissingImpliedComponent {
        blueprint: String,
        required: String,
        implied_by: String,
    },

    /// A property was read or written without the component providing it.
    #[error("Property {property} requires component {component}, which is missing")]
    MissingComponent { property: String, component: String },

    #[error(
        "Component {component} (blueprint {blueprint}) conflicts with component {other} (blueprint {other_blueprint}): {reason}"
    )]
    ConflictingComponents {
        component: String,
        blueprint: String,
        other: String,
        other_blueprint: String,
        reason: String,
    },

    #[error("Component {component} is already provided by blueprint {existing}, cannot add {blueprint}")]
    ComponentAlreadyPresent {
        component: String,
        existing: String,
        blueprint: String,
    },

    #[error("Cannot write property {property}: {message}")]
    Write { property: String, message: String },

    #[error("Property {property} is read-only")]
    ReadOnlyProperty { property: String },

    #[error("Ambiguous reference {reference} in aliasing system {system}: claimed by both {first} and {second}")]
    AmbiguousAlias {
        system: String,
        reference: String,
        first: String,
        second: String,
    },

    #[error("Duplicate reference {reference} for {canonical} in aliasing system {system}")]
    DuplicateAlias {
        system: String,
        reference: String,
        canonical: String,
    },

    #[error("Unknown reference {reference} in aliasing system {system}, expected one of [{expected}]")]
    UnknownReference {
        system: String,
        reference: String,
        expected: String,
    },

    #[error("Invalid topology operation: {0}")]
    Topology(String),

    #[error("Invalid initial state ({field}): {message}")]
    InvalidInitialState { field: String, message: String },

    #[error("Integration failed at t={t}: {message}")]
    Integration { t: f64, message: String },
}

/// Convenience type for `Result<T, EndynError>`.
pub type EndynResult<T> = Result<T, EndynError>;
