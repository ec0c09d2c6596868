//! Storage descriptors and object storage URI parsing.

use url::Url;

/// Where model or weight artifacts live, plus credential hints.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageSpec {
    /// Canonical object storage URI: `oci://n/<namespace>/b/<bucket>/o/<prefix>`.
    #[serde(default)]
    pub storageUri: String,

    /// Local path the artifact unpacks to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Decryption key hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub parameters: std::collections::BTreeMap<String, String>,
}

/// Coordinates parsed out of an object storage URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectStorageCoordinates {
    pub namespace: String,
    pub bucket: String,
    pub prefix: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum StorageError {
    #[fail(display = "storage URI '{}' could not be parsed", _0)]
    Unparseable(String),

    #[fail(display = "storage URI '{}' is not an object storage URI", _0)]
    NotObjectStorage(String),
}

/// Parse `oci://n/<namespace>/b/<bucket>/o/<prefix>` into its coordinates.
///
/// The prefix may span multiple path segments; it is rejoined with `/`.
pub fn parse_object_storage_uri(uri: &str) -> Result<ObjectStorageCoordinates, StorageError> {
    let parsed = Url::parse(uri).map_err(|_| StorageError::Unparseable(uri.to_string()))?;
    if parsed.scheme() != "oci" || parsed.host_str() != Some("n") {
        return Err(StorageError::NotObjectStorage(uri.to_string()));
    }
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [namespace, "b", bucket, "o", rest @ ..] if !rest.is_empty() => Ok(ObjectStorageCoordinates {
            namespace: namespace.to_string(),
            bucket: bucket.to_string(),
            prefix: rest.join("/"),
        }),
        _ => Err(StorageError::NotObjectStorage(uri.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_storage_uri() {
        let coords =
            parse_object_storage_uri("oci://n/idtenancy/b/models/o/llama-7b/weights").unwrap();
        assert_eq!(coords.namespace, "idtenancy");
        assert_eq!(coords.bucket, "models");
        assert_eq!(coords.prefix, "llama-7b/weights");
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(parse_object_storage_uri("s3://bucket/key").is_err());
        assert!(parse_object_storage_uri("oci://n/ns/x/bucket").is_err());
        assert!(parse_object_storage_uri("not a uri").is_err());
    }
}
