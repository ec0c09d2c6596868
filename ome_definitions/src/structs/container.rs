use super::resources::Resources;

/// A single container in a pod.
///
/// Only the subset of the platform container API this control plane reads or
/// writes is modelled; anything else belongs to the workload templates that
/// pass through untouched.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct Container {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumeMounts: Vec<VolumeMount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub securityContext: Option<SecurityContext>,
}

impl Container {
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }

    /// Upsert an env var, keeping insertion order for new entries.
    pub fn set_env(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.env.iter_mut().find(|e| e.name == name) {
            existing.value = value.to_string();
        } else {
            self.env.push(EnvVar {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    /// Add an env var only when absent; pre-existing values win.
    pub fn add_env_if_absent(&mut self, name: &str, value: &str) {
        if self.env.iter().all(|e| e.name != name) {
            self.env.push(EnvVar {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn has_mount(&self, mount_path: &str) -> bool {
        self.volumeMounts.iter().any(|m| m.mountPath == mount_path)
    }

    /// GPU count from resource limits, falling back to requests.
    pub fn gpu_count(&self, resource_name: &str) -> Option<u64> {
        let resources = self.resources.as_ref()?;
        resources
            .limits
            .get(resource_name)
            .or_else(|| resources.requests.get(resource_name))
            .and_then(|q| q.parse().ok())
    }
}

/// A plain name/value environment variable.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct ContainerPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub containerPort: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct VolumeMount {
    pub name: String,
    pub mountPath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readOnly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subPath: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct SecurityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runAsUser: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct Capabilities {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_env_upserts() {
        let mut c = Container { name: "ome-container".into(), ..Default::default() };
        c.set_env("A", "1");
        c.set_env("B", "2");
        c.set_env("A", "3");
        assert_eq!(c.env.len(), 2);
        assert_eq!(c.env_value("A"), Some("3"));

        c.add_env_if_absent("A", "9");
        assert_eq!(c.env_value("A"), Some("3"));
    }

    #[test]
    fn gpu_count_prefers_limits() {
        let mut c = Container { name: "ome-container".into(), ..Default::default() };
        let mut res = Resources::default();
        res.requests.insert("nvidia.com/gpu".into(), "2".into());
        res.limits.insert("nvidia.com/gpu".into(), "4".into());
        c.resources = Some(res);
        assert_eq!(c.gpu_count("nvidia.com/gpu"), Some(4));
    }
}
