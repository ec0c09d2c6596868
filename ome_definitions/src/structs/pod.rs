use std::collections::BTreeMap;

use super::container::Container;
use super::meta::ObjectMeta;
use crate::constants::MAIN_CONTAINER_NAME;

/// The pod spec subset the control plane builds and mutates.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initContainers: Vec<Container>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodeSelector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Opaque affinity tree; overlaid wholesale, never merged field-wise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serviceAccountName: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priorityClassName: Option<String>,
}

impl PodSpec {
    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn container_mut(&mut self, name: &str) -> Option<&mut Container> {
        self.containers.iter_mut().find(|c| c.name == name)
    }

    /// The serving container: `ome-container` if present, else the first.
    pub fn main_container(&self) -> Option<&Container> {
        self.container(MAIN_CONTAINER_NAME)
            .or_else(|| self.containers.first())
    }

    pub fn main_container_mut(&mut self) -> Option<&mut Container> {
        if self.container(MAIN_CONTAINER_NAME).is_some() {
            return self.container_mut(MAIN_CONTAINER_NAME);
        }
        self.containers.first_mut()
    }

    pub fn init_container(&self, name: &str) -> Option<&Container> {
        self.initContainers.iter().find(|c| c.name == name)
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.volumes.iter().any(|v| v.name == name)
    }

    pub fn add_volume_if_absent(&mut self, volume: Volume) {
        if !self.has_volume(&volume.name) {
            self.volumes.push(volume);
        }
    }
}

/// A pod template embedded in workload objects.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

/// A bare pod as seen by the admission webhook.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct Volume {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emptyDir: Option<EmptyDirVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostPath: Option<HostPathVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configMap: Option<ConfigMapVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistentVolumeClaim: Option<PvcVolumeSource>,
}

impl Volume {
    pub fn empty_dir(name: &str) -> Volume {
        Volume {
            name: name.to_string(),
            emptyDir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }
    }

    pub fn memory_backed(name: &str) -> Volume {
        Volume {
            name: name.to_string(),
            emptyDir: Some(EmptyDirVolumeSource {
                medium: Some("Memory".to_string()),
                sizeLimit: None,
            }),
            ..Default::default()
        }
    }

    pub fn host_path(name: &str, path: &str) -> Volume {
        Volume {
            name: name.to_string(),
            hostPath: Some(HostPathVolumeSource {
                path: path.to_string(),
                type_: None,
            }),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct EmptyDirVolumeSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizeLimit: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct HostPathVolumeSource {
    pub path: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct ConfigMapVolumeSource {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct PvcVolumeSource {
    pub claimName: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readOnly: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct Toleration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}
