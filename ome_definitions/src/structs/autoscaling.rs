use super::meta::ObjectMeta;

/// A horizontal pod autoscaler driving one component's workload.
///
/// ```yaml
/// spec:
///   scaleTargetRef:
///     kind: Deployment
///     name: svc-engine
///   minReplicas: 1
///   maxReplicas: 3
///   metrics:
///   - type: Resource
///     resource:
///       name: cpu
///       target:
///         type: Utilization
///         averageUtilization: 80
/// ```
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct HorizontalPodAutoscaler {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: HorizontalPodAutoscalerSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct HorizontalPodAutoscalerSpec {
    #[serde(default)]
    pub scaleTargetRef: CrossVersionObjectReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minReplicas: Option<u32>,
    #[serde(default)]
    pub maxReplicas: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<MetricSpec>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct CrossVersionObjectReference {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct MetricSpec {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceMetricSource>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct ResourceMetricSource {
    pub name: String,
    #[serde(default)]
    pub target: MetricTarget,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct MetricTarget {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub averageUtilization: Option<u32>,
}
