//! Process-wide constants.
//!
//! Annotation keys, label keys, agent environment variable names, container
//! names and the closed enums shared by the defaulter, validator, reconciler
//! and webhooks. Everything here is defined exactly once; no other module may
//! redefine these identifiers.

use std::fmt;
use std::str::FromStr;

// ----------------------------------------------------------------------------
// Annotations on InferenceServices and pods
// ----------------------------------------------------------------------------

/// Pins the deployment topology; once set it is never overwritten.
pub const DEPLOYMENT_MODE_ANNOTATION: &str = "ome.io/deploymentMode";
/// Selects the autoscaler backend (`hpa`, `keda` or `external`).
pub const AUTOSCALER_CLASS_ANNOTATION: &str = "ome.io/autoscalerClass";
/// HPA metric (`cpu` or `memory`).
pub const METRICS_ANNOTATION: &str = "ome.io/metrics";
/// HPA target utilization, an integer in `[1,100]`.
pub const TARGET_UTILIZATION_ANNOTATION: &str = "ome.io/targetUtilizationPercentage";
/// Surfaced to the user after a legacy predictor migration.
pub const DEPRECATION_WARNING_ANNOTATION: &str = "ome.io/deprecation-warning";
/// Preserves the external virtual host while components remain active.
pub const INGRESS_DISABLE_CREATION_ANNOTATION: &str = "ome.io/ingress-disable-creation";

pub const INJECT_MODEL_INIT_ANNOTATION: &str = "ome.io/inject-model-init";
pub const INJECT_FINE_TUNED_ADAPTER_ANNOTATION: &str = "ome.io/inject-fine-tuned-adapter";
pub const INJECT_SERVING_SIDECAR_ANNOTATION: &str = "ome.io/inject-serving-sidecar";
pub const INJECT_TRAINING_SIDECAR_ANNOTATION: &str = "ome.io/inject-training-sidecar";
pub const FINE_TUNED_WEIGHT_STRATEGY_ANNOTATION: &str = "ome.io/fine-tuned-weight-ft-strategy";
pub const ENABLE_METRIC_AGGREGATION_ANNOTATION: &str = "ome.io/enable-metric-aggregation";
pub const ENABLE_PROMETHEUS_SCRAPING_ANNOTATION: &str = "ome.io/enable-prometheus-scraping";
pub const DEDICATED_AI_CLUSTER_ANNOTATION: &str = "ome.io/dedicated-ai-cluster";

/// Storage URI of the weights a pod serves; set by the workload reconciler.
pub const STORAGE_URI_ANNOTATION: &str = "ome.io/storage-uri";
pub const BASE_MODEL_NAME_ANNOTATION: &str = "ome.io/base-model-name";
pub const BASE_MODEL_TYPE_ANNOTATION: &str = "ome.io/base-model-type";
pub const BASE_MODEL_FORMAT_ANNOTATION: &str = "ome.io/base-model-format";
pub const BASE_MODEL_FORMAT_VERSION_ANNOTATION: &str = "ome.io/base-model-format-version";
pub const BASE_MODEL_DECRYPTION_KEY_ANNOTATION: &str = "ome.io/base-model-decryption-key-name";
pub const BASE_MODEL_DECRYPTION_SECRET_ANNOTATION: &str = "ome.io/base-model-decryption-secret-name";
pub const DISABLE_MODEL_DECRYPTION_ANNOTATION: &str = "ome.io/disable-model-decryption";
pub const AUTH_TYPE_ANNOTATION: &str = "ome.io/auth-type";
pub const COMPARTMENT_ID_ANNOTATION: &str = "ome.io/compartment-id";
pub const VAULT_ID_ANNOTATION: &str = "ome.io/vault-id";

/// Port and path of the main container's prometheus endpoint.
pub const APP_METRICS_PORT_ANNOTATION: &str = "prometheus.ome.io/port";
pub const APP_METRICS_PATH_ANNOTATION: &str = "prometheus.ome.io/path";

pub const RDMA_AUTO_INJECT_ANNOTATION: &str = "rdma.ome.io/auto-inject";
pub const RDMA_PROFILE_ANNOTATION: &str = "rdma.ome.io/profile";
pub const RDMA_CONTAINER_NAME_ANNOTATION: &str = "rdma.ome.io/container-name";

// Pod-level prometheus scrape annotations written by the metrics injector.
pub const PROMETHEUS_SCRAPE_ANNOTATION: &str = "prometheus.io/scrape";
pub const PROMETHEUS_PORT_ANNOTATION: &str = "prometheus.io/port";
pub const PROMETHEUS_PATH_ANNOTATION: &str = "prometheus.io/path";

// ----------------------------------------------------------------------------
// Labels
// ----------------------------------------------------------------------------

/// Marks a pod (or child object) as belonging to an InferenceService.
pub const INFERENCESERVICE_LABEL: &str = "ome.io/inferenceservice";
/// Marks a pod as belonging to a training job.
pub const TRAINING_JOB_LABEL: &str = "ome.io/trainingjob";
/// Component a child object serves (`engine`, `decoder`, `router`).
pub const COMPONENT_LABEL: &str = "ome.io/component";
/// Compartment tag applied by the dedicated-cluster scheduling injector.
pub const COMPARTMENT_LABEL: &str = "oci.oraclecloud.com/compartment";

// ----------------------------------------------------------------------------
// Container and object names
// ----------------------------------------------------------------------------

pub const MAIN_CONTAINER_NAME: &str = "ome-container";
pub const QUEUE_PROXY_CONTAINER_NAME: &str = "queue-proxy";
pub const MODEL_INIT_CONTAINER_NAME: &str = "model-init";
pub const FINE_TUNED_ADAPTER_CONTAINER_NAME: &str = "fine-tuned-adapter";
pub const SERVING_SIDECAR_CONTAINER_NAME: &str = "serving-sidecar";
pub const TRAINING_SIDECAR_CONTAINER_NAME: &str = "training-sidecar";

/// Namespace holding the controller's own configuration.
pub const OME_NAMESPACE: &str = "ome";
/// The authoritative config map consumed by the pod webhook.
pub const INFERENCESERVICE_CONFIG_MAP_NAME: &str = "inferenceservice-config";
/// Single data key of the per-service model config map.
pub const MODELS_CONFIG_KEY: &str = "models.json";

/// Name of the shared model volume injected into pods.
pub const MODEL_VOLUME_NAME: &str = "model-storage";
pub const RDMA_SHM_VOLUME_NAME: &str = "dshm";
pub const RDMA_DEVICE_VOLUME_NAME: &str = "devinf";
pub const RDMA_SHM_MOUNT_PATH: &str = "/dev/shm";
pub const RDMA_DEVICE_MOUNT_PATH: &str = "/dev/infiniband";

// ----------------------------------------------------------------------------
// Agent environment variable contract
// ----------------------------------------------------------------------------

pub const AGENT_AUTH_TYPE_ENV: &str = "OME_AGENT_AUTH_TYPE";
pub const AGENT_COMPARTMENT_ID_ENV: &str = "OME_AGENT_COMPARTMENT_ID";
pub const AGENT_VAULT_ID_ENV: &str = "OME_AGENT_VAULT_ID";
pub const AGENT_KEY_NAME_ENV: &str = "OME_AGENT_KEY_NAME";
pub const AGENT_SECRET_NAME_ENV: &str = "OME_AGENT_SECRET_NAME";
pub const AGENT_MODEL_NAME_ENV: &str = "OME_AGENT_MODEL_NAME";
pub const AGENT_MODEL_TYPE_ENV: &str = "OME_AGENT_MODEL_TYPE";
pub const AGENT_MODEL_FRAMEWORK_ENV: &str = "OME_AGENT_MODEL_FRAMEWORK";
pub const AGENT_TENSORRTLLM_VERSION_ENV: &str = "OME_AGENT_TENSORRTLLM_VERSION";
pub const AGENT_NUM_OF_GPU_ENV: &str = "OME_AGENT_NUM_OF_GPU";
pub const AGENT_LOCAL_PATH_ENV: &str = "OME_AGENT_LOCAL_PATH";
pub const AGENT_MODEL_STORE_DIRECTORY_ENV: &str = "OME_AGENT_MODEL_STORE_DIRECTORY";
pub const AGENT_REGION_ENV: &str = "OME_AGENT_REGION";
pub const AGENT_DISABLE_MODEL_DECRYPTION_ENV: &str = "OME_AGENT_DISABLE_MODEL_DECRYPTION";
pub const AGENT_MODEL_SOURCE_ENV: &str = "OME_AGENT_MODEL_SOURCE";
pub const AGENT_OBJECT_BUCKET_ENV: &str = "OME_AGENT_OBJECT_BUCKET_NAME";
pub const AGENT_OBJECT_NAMESPACE_ENV: &str = "OME_AGENT_OBJECT_NAMESPACE";
pub const AGENT_OBJECT_PREFIX_ENV: &str = "OME_AGENT_OBJECT_PREFIX";

/// Model name handed to the serving sidecar for PEFT-style adapters.
pub const PEFT_MODEL_NAME_ENV: &str = "PEFT_FT_MODEL_NAME";
pub const SERVED_MODEL_PATH_ENV: &str = "MODEL_PATH";

// Env vars set on the queue-proxy by the metrics aggregator.
pub const AGGREGATE_METRICS_PORT_ENV: &str = "AGGREGATE_PROMETHEUS_METRICS_PORT";
pub const APP_METRICS_PORT_ENV: &str = "APP_METRICS_PORT";
pub const APP_METRICS_PATH_ENV: &str = "APP_METRICS_PATH";

// ----------------------------------------------------------------------------
// Numeric defaults and platform caps
// ----------------------------------------------------------------------------

/// Aggregated metrics port opened on the queue-proxy.
pub const AGGREGATED_METRICS_PORT: u32 = 9088;
pub const DEFAULT_APP_METRICS_PORT: u32 = 8080;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_RDMA_PROFILE: &str = "oci-roce";
pub const GPU_RESOURCE_NAME: &str = "nvidia.com/gpu";
pub const DEFAULT_TARGET_UTILIZATION: u32 = 80;

/// Kube caps label values at 63 characters.
pub const MAX_LABEL_LENGTH: usize = 63;
/// Config map keys (and most object names) cap at 253.
pub const MAX_CONFIGMAP_KEY_LENGTH: usize = 253;

// ----------------------------------------------------------------------------
// Closed enums
// ----------------------------------------------------------------------------

/// The component kinds an InferenceService can declare.
///
/// `Predictor` only exists pre-migration; the defaulter rewrites it into an
/// `Engine` before anything else observes the service.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    #[serde(rename = "engine")]
    Engine,
    #[serde(rename = "decoder")]
    Decoder,
    #[serde(rename = "router")]
    Router,
    #[serde(rename = "predictor")]
    Predictor,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Engine => "engine",
            Component::Decoder => "decoder",
            Component::Router => "router",
            Component::Predictor => "predictor",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment topology, stored as an annotation on the InferenceService.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentMode {
    Serverless,
    RawDeployment,
    MultiNode,
    PDDisaggregated,
    MultiNodeRayVLLM,
    VirtualDeployment,
}

impl DeploymentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentMode::Serverless => "Serverless",
            DeploymentMode::RawDeployment => "RawDeployment",
            DeploymentMode::MultiNode => "MultiNode",
            DeploymentMode::PDDisaggregated => "PDDisaggregated",
            DeploymentMode::MultiNodeRayVLLM => "MultiNodeRayVLLM",
            DeploymentMode::VirtualDeployment => "VirtualDeployment",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMode {
    type Err = failure::Error;

    fn from_str(s: &str) -> Result<DeploymentMode, Self::Err> {
        match s {
            "Serverless" => Ok(DeploymentMode::Serverless),
            "RawDeployment" => Ok(DeploymentMode::RawDeployment),
            "MultiNode" => Ok(DeploymentMode::MultiNode),
            "PDDisaggregated" => Ok(DeploymentMode::PDDisaggregated),
            "MultiNodeRayVLLM" => Ok(DeploymentMode::MultiNodeRayVLLM),
            "VirtualDeployment" => Ok(DeploymentMode::VirtualDeployment),
            _ => bail!("unknown deployment mode '{}'", s),
        }
    }
}

/// Autoscaler backends selectable via annotation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoscalerClass {
    #[serde(rename = "hpa")]
    Hpa,
    #[serde(rename = "keda")]
    Keda,
    #[serde(rename = "external")]
    External,
}

impl FromStr for AutoscalerClass {
    type Err = failure::Error;

    fn from_str(s: &str) -> Result<AutoscalerClass, Self::Err> {
        match s {
            "hpa" => Ok(AutoscalerClass::Hpa),
            "keda" => Ok(AutoscalerClass::Keda),
            "external" => Ok(AutoscalerClass::External),
            _ => bail!("unknown autoscaler class '{}'", s),
        }
    }
}

/// Metrics the HPA backend understands.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleMetric {
    #[serde(rename = "cpu")]
    Cpu,
    #[serde(rename = "memory")]
    Memory,
}

impl ScaleMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            ScaleMetric::Cpu => "cpu",
            ScaleMetric::Memory => "memory",
        }
    }
}

impl FromStr for ScaleMetric {
    type Err = failure::Error;

    fn from_str(s: &str) -> Result<ScaleMetric, Self::Err> {
        match s {
            "cpu" => Ok(ScaleMetric::Cpu),
            "memory" => Ok(ScaleMetric::Memory),
            _ => bail!("unknown scale metric '{}'", s),
        }
    }
}

/// Fine-tune strategies, selecting the weight mount subpath.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FineTuneStrategy {
    #[serde(rename = "lora")]
    Lora,
    #[serde(rename = "tfew")]
    Tfew,
    #[serde(rename = "vanilla")]
    Vanilla,
}

impl FineTuneStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            FineTuneStrategy::Lora => "lora",
            FineTuneStrategy::Tfew => "tfew",
            FineTuneStrategy::Vanilla => "vanilla",
        }
    }
}

impl FromStr for FineTuneStrategy {
    type Err = failure::Error;

    fn from_str(s: &str) -> Result<FineTuneStrategy, Self::Err> {
        match s {
            "lora" => Ok(FineTuneStrategy::Lora),
            "tfew" => Ok(FineTuneStrategy::Tfew),
            "vanilla" => Ok(FineTuneStrategy::Vanilla),
            _ => bail!("unknown fine-tune strategy '{}'", s),
        }
    }
}

/// Outcome of checking one desired child object against the observed one.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckResult {
    Create,
    Update,
    Existed,
    Skipped,
    Delete,
    Unknown,
}
