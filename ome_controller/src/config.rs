//! Controller configuration.
//!
//! The authoritative copy lives in the `ome/inferenceservice-config` config
//! map; each data key holds a JSON document. The CLI can also load the whole
//! structure from a YAML file for offline runs.

use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use ome_definitions::capacity::CapacityPool;
use ome_definitions::constants::{
    DeploymentMode, INFERENCESERVICE_CONFIG_MAP_NAME, OME_NAMESPACE,
};
use ome_definitions::structs::{ConfigMap, Toleration};

use super::store::Store;
use super::Result;

/// Environment switch for the legacy predictor migration; on unless set to
/// `false`.
pub const ENABLE_PREDICTOR_MIGRATION_ENV: &str = "ENABLE_PREDICTOR_MIGRATION";

/// Everything the defaulter, reconciler and webhooks need to know about the
/// cluster they run in.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ControllerConfig {
    /// Topology used when nothing on the service decides one.
    pub defaultDeploymentMode: DeploymentMode,

    /// DNS suffix of cluster-local services.
    pub clusterDomain: String,

    /// Domain under which external virtual hosts are published.
    pub ingressDomain: String,

    pub enablePredictorMigration: bool,

    pub modelInit: AgentConfig,

    pub servingSidecar: SidecarConfig,

    pub trainingSidecar: SidecarConfig,

    /// RDMA profiles by name; env vars iterate in key order, which keeps
    /// injection deterministic.
    pub rdmaProfiles: BTreeMap<String, RdmaProfile>,

    /// Scheduling profiles referenced by dedicated AI clusters.
    pub schedulingProfiles: BTreeMap<String, SchedulingProfile>,

    /// Cluster-available capacity per flavor.
    pub capacity: CapacityPool,
}

impl Default for ControllerConfig {
    fn default() -> ControllerConfig {
        ControllerConfig {
            defaultDeploymentMode: DeploymentMode::RawDeployment,
            clusterDomain: "cluster.local".to_string(),
            ingressDomain: "models.example.com".to_string(),
            enablePredictorMigration: true,
            modelInit: AgentConfig::default(),
            servingSidecar: SidecarConfig {
                image: "ome/serving-sidecar:latest".to_string(),
            },
            trainingSidecar: SidecarConfig {
                image: "ome/training-sidecar:latest".to_string(),
            },
            rdmaProfiles: default_rdma_profiles(),
            schedulingProfiles: BTreeMap::new(),
            capacity: CapacityPool::default(),
        }
    }
}

impl ControllerConfig {
    /// Load from a YAML file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<ControllerConfig> {
        let mut body = String::new();
        File::open(path)?.read_to_string(&mut body)?;
        let mut cfg: ControllerConfig = serde_yaml::from_str(&body)?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Load from the `ome/inferenceservice-config` config map.
    ///
    /// Each data key is an independent JSON document; absent keys keep their
    /// defaults. A malformed key is a hard error: admission must never run
    /// against a half-read configuration.
    pub fn from_store<S: Store>(store: &S) -> Result<ControllerConfig> {
        let cm: ConfigMap = store.get(OME_NAMESPACE, INFERENCESERVICE_CONFIG_MAP_NAME)?;
        Self::from_configmap(&cm)
    }

    pub fn from_configmap(cm: &ConfigMap) -> Result<ControllerConfig> {
        let mut cfg = ControllerConfig::default();
        if let Some(raw) = cm.data.get("deployment") {
            let d: DeploymentConfig = serde_json::from_str(raw)?;
            if let Some(mode) = d.defaultDeploymentMode {
                cfg.defaultDeploymentMode = mode;
            }
            if let Some(domain) = d.clusterDomain {
                cfg.clusterDomain = domain;
            }
            if let Some(domain) = d.ingressDomain {
                cfg.ingressDomain = domain;
            }
        }
        if let Some(raw) = cm.data.get("modelInit") {
            cfg.modelInit = serde_json::from_str(raw)?;
        }
        if let Some(raw) = cm.data.get("servingSidecar") {
            cfg.servingSidecar = serde_json::from_str(raw)?;
        }
        if let Some(raw) = cm.data.get("trainingSidecar") {
            cfg.trainingSidecar = serde_json::from_str(raw)?;
        }
        if let Some(raw) = cm.data.get("rdmaProfiles") {
            cfg.rdmaProfiles = serde_json::from_str(raw)?;
        }
        if let Some(raw) = cm.data.get("schedulingProfiles") {
            cfg.schedulingProfiles = serde_json::from_str(raw)?;
        }
        if let Some(raw) = cm.data.get("capacity") {
            cfg.capacity = serde_json::from_str(raw)?;
        }
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var(ENABLE_PREDICTOR_MIGRATION_ENV) {
            self.enablePredictorMigration = v != "false";
        }
    }
}

#[derive(Deserialize, Default)]
struct DeploymentConfig {
    #[serde(default)]
    defaultDeploymentMode: Option<DeploymentMode>,
    #[serde(default)]
    clusterDomain: Option<String>,
    #[serde(default)]
    ingressDomain: Option<String>,
}

/// Settings for the model download/decryption agent.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AgentConfig {
    pub image: String,
    pub authType: String,
    pub region: String,
    /// Directory the agent unpacks weights into.
    pub modelStoreDirectory: String,
    pub cpuRequest: String,
    pub cpuLimit: String,
    pub memoryRequest: String,
    pub memoryLimit: String,
}

impl Default for AgentConfig {
    fn default() -> AgentConfig {
        AgentConfig {
            image: "ome/model-agent:latest".to_string(),
            authType: "InstancePrincipal".to_string(),
            region: "us-ashburn-1".to_string(),
            modelStoreDirectory: "/mnt/model".to_string(),
            cpuRequest: "100m".to_string(),
            cpuLimit: "2".to_string(),
            memoryRequest: "200Mi".to_string(),
            memoryLimit: "4Gi".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct SidecarConfig {
    pub image: String,
}

/// An RDMA profile: env vars keyed by name (kept sorted by the map).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct RdmaProfile {
    pub env: BTreeMap<String, String>,
}

/// Baseline scheduling knobs a dedicated cluster can reference.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct SchedulingProfile {
    pub affinity: Option<serde_json::Value>,
    pub tolerations: Vec<Toleration>,
    pub nodeSelector: BTreeMap<String, String>,
    pub priorityClassName: Option<String>,
}

/// The `oci-roce` profile ships with the controller.
fn default_rdma_profiles() -> BTreeMap<String, RdmaProfile> {
    let mut env = BTreeMap::new();
    env.insert("HCOLL_ENABLE_MCAST_ALL".to_string(), "0".to_string());
    env.insert("NCCL_BUFFSIZE".to_string(), "16777216".to_string());
    env.insert("NCCL_CROSS_NIC".to_string(), "2".to_string());
    env.insert("NCCL_CUMEM_ENABLE".to_string(), "0".to_string());
    env.insert("NCCL_DEBUG".to_string(), "WARN".to_string());
    env.insert("NCCL_IB_GID_INDEX".to_string(), "3".to_string());
    env.insert("NCCL_IB_HCA".to_string(), "mlx5".to_string());
    env.insert("NCCL_IB_QPS_PER_CONNECTION".to_string(), "16".to_string());
    env.insert("NCCL_IB_SL".to_string(), "0".to_string());
    env.insert("NCCL_IB_SPLIT_DATA_ON_QPS".to_string(), "0".to_string());
    env.insert("NCCL_IB_TC".to_string(), "41".to_string());
    env.insert("NCCL_IB_TIMEOUT".to_string(), "22".to_string());
    env.insert("NCCL_IGNORE_CPU_AFFINITY".to_string(), "1".to_string());
    env.insert("NCCL_NET_PLUGIN".to_string(), "none".to_string());
    env.insert("NCCL_SOCKET_IFNAME".to_string(), "eth0".to_string());
    env.insert("NCCL_TOPO_FILE".to_string(), "/etc/nccl/topo.xml".to_string());
    env.insert("OMPI_MCA_btl".to_string(), "^openib".to_string());
    env.insert("OMPI_MCA_coll".to_string(), "^hcoll".to_string());
    env.insert("OMPI_MCA_pml".to_string(), "ucx".to_string());
    env.insert("RX_QUEUE_LEN".to_string(), "8192".to_string());
    env.insert("UCX_NET_DEVICES".to_string(), "mlx5_0:1".to_string());
    env.insert("UCX_TLS".to_string(), "rc,self,sm".to_string());

    let mut profiles = BTreeMap::new();
    profiles.insert("oci-roce".to_string(), RdmaProfile { env });
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rdma_profile_has_22_sorted_env_vars() {
        let cfg = ControllerConfig::default();
        let profile = cfg.rdmaProfiles.get("oci-roce").unwrap();
        assert_eq!(profile.env.len(), 22);
        let names: Vec<&String> = profile.env.keys().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn configmap_keys_override_defaults() {
        let mut cm = ConfigMap::default();
        cm.data.insert(
            "deployment".into(),
            r#"{"defaultDeploymentMode": "Serverless", "clusterDomain": "cluster.internal"}"#.into(),
        );
        cm.data.insert(
            "modelInit".into(),
            r#"{"image": "ome/model-agent:v2"}"#.into(),
        );
        let cfg = ControllerConfig::from_configmap(&cm).unwrap();
        assert_eq!(cfg.defaultDeploymentMode, DeploymentMode::Serverless);
        assert_eq!(cfg.clusterDomain, "cluster.internal");
        assert_eq!(cfg.modelInit.image, "ome/model-agent:v2");
        // untouched keys keep their defaults
        assert_eq!(cfg.servingSidecar.image, "ome/serving-sidecar:latest");
    }

    #[test]
    fn malformed_key_is_a_hard_error() {
        let mut cm = ConfigMap::default();
        cm.data.insert("modelInit".into(), "{not json".into());
        assert!(ControllerConfig::from_configmap(&cm).is_err());
    }
}
