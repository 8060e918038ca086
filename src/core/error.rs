use thiserror::Error;

/// Result type alias for route registration
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors surfaced while building the route table.
///
/// These are caller mistakes; none of them can occur once a `Router` is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("Malformed path '{0}': route paths must start with '/'")]
    MalformedPath(String),

    #[error("Duplicate tail wildcard '{name}' in route '{path}': '{existing}' is already bound at this position")]
    DuplicateTailWildcard {
        path: String,
        name: String,
        existing: String,
    },

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
}
