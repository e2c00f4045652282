use thiserror::Error;

/// Errors raised by repositories and data stores.
///
/// Store failures (`Database`, `Json`) are passed through untouched so callers
/// see the driver's own message and can match on it.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("instance has no value for primary key `{0}`")]
    MissingPrimaryKey(String),

    #[error("row is missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` is not a valid {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    #[error("column `{column}` has unsupported type {type_name}")]
    UnsupportedColumnType {
        column: String,
        type_name: String,
    },

    #[error("invalid repository configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} is not supported by this store")]
    Unsupported(&'static str),
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;
