/// Metadata common to every stored object
pub mod meta;
pub use self::meta::{ObjectMeta, OwnerReference};

/// Containers, env vars, mounts, security context
pub mod container;
pub use self::container::{
    Capabilities, Container, ContainerPort, EnvVar, SecurityContext, VolumeMount,
};

/// Pod specs, volumes and scheduling knobs
pub mod pod;
pub use self::pod::{
    EmptyDirVolumeSource, HostPathVolumeSource, Pod, PodSpec, PodTemplateSpec, Toleration, Volume,
};

/// Resource requests and limits
pub mod resources;
pub use self::resources::Resources;

/// Deployments and leader-worker sets
pub mod workload;
pub use self::workload::{
    Deployment, DeploymentSpec, LabelSelector, LeaderWorkerSet, LeaderWorkerSetSpec,
    LeaderWorkerTemplate,
};

/// Cluster-internal services
pub mod service;
pub use self::service::{Service, ServicePort, ServiceSpec};

/// Horizontal pod autoscalers
pub mod autoscaling;
pub use self::autoscaling::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec, MetricSpec,
    MetricTarget, ResourceMetricSource,
};

/// Pod disruption budgets
pub mod pdb;
pub use self::pdb::{PodDisruptionBudget, PodDisruptionBudgetSpec};

/// Role-based access control triple
pub mod rbac;
pub use self::rbac::{PolicyRule, Role, RoleBinding, RoleRef, ServiceAccount, Subject};

/// The user-facing virtual host object
pub mod virtualhost;
pub use self::virtualhost::{BackendRef, VirtualHost, VirtualHostSpec};

/// Config maps
pub mod configmap;
pub use self::configmap::ConfigMap;

/// Component specs on the InferenceService
pub mod component;
pub use self::component::{
    ComponentSpec, LeaderSpec, PredictorModel, PredictorSpec, RunnerSpec, WorkerSpec,
};
