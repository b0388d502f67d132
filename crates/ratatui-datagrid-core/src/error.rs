use crate::storage::StorageError;

/// Errors surfaced by grid operations.
///
/// None of these are fatal to the grid: every operation that returns one leaves the grid in its
/// previous consistent state.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// A required input (row data, column specs) was not supplied.
    #[error("datagrid was not given {what}, which is required to render rows")]
    MissingInput { what: &'static str },

    /// An optional capability was used without being enabled.
    #[error("feature `{feature}` is not enabled; enable it in `GridConfig` to use it")]
    CapabilityMissing { feature: &'static str },

    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    #[error("unknown row `{0}`")]
    UnknownRow(String),

    #[error("unknown filter `{0}`")]
    UnknownFilter(String),

    /// The value's shape does not fit the filter kind (e.g. a date range for a checkbox filter).
    #[error("filter `{filter}` expects a {expected} value")]
    FilterValueMismatch {
        filter: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type GridResult<T> = Result<T, GridError>;
