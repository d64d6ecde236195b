use thiserror::Error;

/// Errors raised by collaborators (storage, transport) and value codecs.
///
/// The public tier surface never returns these: they are logged and turned
/// into a `false` or default result. They surface directly only from the
/// [`DurableStorage`](crate::DurableStorage) and
/// [`Transport`](crate::Transport) traits and from the codec helpers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to encode or decode value for `{key}`: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("key `{0}` is not declared in the schema")]
    UnknownKey(String),

    #[error("template key `{0}` cannot be persisted")]
    TemplateKey(String),
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;

/// Serializes a typed value into the JSON representation stored by the tiers.
pub fn encode<T: serde::Serialize + ?Sized>(key: &str, value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|source| CacheError::Codec {
        key: key.to_string(),
        source,
    })
}

/// Deserializes a stored JSON value into the type requested by the caller.
pub fn decode<T: serde::de::DeserializeOwned>(key: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| CacheError::Codec {
        key: key.to_string(),
        source,
    })
}
