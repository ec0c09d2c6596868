use std::collections::BTreeMap;

/// Metadata carried by every stored object.
///
/// A thin rendition of kube object metadata: identity, labels, annotations,
/// owner references for cascading delete, and the resource version used for
/// optimistic concurrency. Cluster-scoped objects leave `namespace` empty.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ownerReferences: Vec<OwnerReference>,

    /// Server-assigned; carried forward on updates to avoid conflicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resourceVersion: Option<String>,

    /// Server-assigned identity, stable across updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ObjectMeta {
    pub fn named(name: &str, namespace: &str) -> ObjectMeta {
        ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(|s| s.as_str())
    }

    /// True when the annotation is present with the literal value `true`.
    pub fn annotation_is_true(&self, key: &str) -> bool {
        self.annotation(key) == Some("true")
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(|s| s.as_str())
    }

    /// True when some owner reference matches the given owner on uid, kind
    /// and name. UID equality protects against deleting adopted strangers
    /// that merely reuse a name.
    pub fn owned_by(&self, owner: &OwnerReference) -> bool {
        self.ownerReferences.iter().any(|or| {
            or.uid == owner.uid && or.kind == owner.kind && or.name == owner.name
        })
    }
}

/// A reference from a child object back to its owning object.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockOwnerDeletion: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_by_requires_uid_match() {
        let owner = OwnerReference {
            kind: "InferenceService".into(),
            name: "svc".into(),
            uid: "abc".into(),
            controller: Some(true),
            blockOwnerDeletion: Some(true),
        };
        let mut meta = ObjectMeta::named("svc-engine", "default");
        meta.ownerReferences.push(owner.clone());
        assert!(meta.owned_by(&owner));

        let stranger = OwnerReference { uid: "other".into(), ..owner.clone() };
        assert!(!meta.owned_by(&stranger));
    }
}
