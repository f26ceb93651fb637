use thiserror::Error;

/// Failure taxonomy shared by the core pipeline stages.
///
/// Structural failures (`EmptyInput`, `MissingDefaultRule`) are fatal to the
/// call that produced them. `Upstream` carries the tenant/file identifiers of
/// an already-failed input so callers can correlate across stages. Per-file
/// failures during batch extraction are logged and isolated, never raised
/// through this type.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("no bars to process for {tenant_id}/{file_id}")]
    EmptyInput { tenant_id: String, file_id: String },

    #[error("upstream failure for {tenant_id}/{file_id}: {message}")]
    Upstream {
        tenant_id: String,
        file_id: String,
        message: String,
    },

    #[error("rule set has no unconditional default rule")]
    MissingDefaultRule,

    #[error("rule label {label:?} is not in the valid label set")]
    UnknownLabel { label: String },

    #[error("unparseable condition for {key:?}: {raw:?}")]
    BadCondition { key: String, raw: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
