use crate::timestep::Period;
use thiserror::Error;

/// Error type for invalid operations.
///
/// Build-time variants are reported by [`ModelBuilder::build`](crate::model::ModelBuilder::build)
/// before anything executes.
/// Addressing variants are raised while reading or writing a time-indexed array.
#[derive(Error, Debug)]
pub enum TempoError {
    #[error("{0}")]
    Error(String),
    #[error("Component error: {0}")]
    Component(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid time grid: {0}")]
    InvalidTimeGrid(String),

    #[error("Parameter '{parameter}' of component '{component}' is not bound to a variable, an external value or a default")]
    UnboundParameter { component: String, parameter: String },
    #[error("Parameter '{parameter}' of component '{component}' is bound more than once")]
    DuplicateBinding { component: String, parameter: String },
    #[error("Cyclic dependency between components: {}", .components.join(", "))]
    CyclicDependency { components: Vec<String> },
    #[error("Shape mismatch between '{producer}' and '{consumer}': {reason}")]
    ShapeMismatch {
        producer: String,
        consumer: String,
        reason: String,
    },
    #[error("A component named '{0}' has already been added")]
    DuplicateComponent(String),
    #[error("No component named '{0}'")]
    UnknownComponent(String),
    #[error("Component '{component}' has no parameter or variable named '{name}'")]
    UnknownVariable { component: String, name: String },
    #[error("Invalid definition in component '{component}': {reason}")]
    InvalidDefinition { component: String, reason: String },

    #[error("Period {period} is not part of the time grid of {target}")]
    NotFound { target: String, period: Period },
    #[error("Index {index} is out of range for {target} (length {len})")]
    OutOfRange {
        target: String,
        index: i64,
        len: usize,
    },
    #[error("{target} has {expected} dimensions but {got} were addressed")]
    DimensionMismatch {
        target: String,
        expected: usize,
        got: usize,
    },
    #[error("{target} has no value at ordinal {ordinal} (period {period}); it was read before being written")]
    UnsetValue {
        target: String,
        ordinal: usize,
        period: Period,
    },
    #[error("Parameter '{parameter}' of component '{component}' is read-only")]
    ReadOnlyParameter { component: String, parameter: String },

    #[error("The clock is already at its last period ({0})")]
    ClockFinished(Period),
}

/// Convenience type for `Result<T, TempoError>`.
pub type TempoResult<T> = Result<T, TempoError>;
