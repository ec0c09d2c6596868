//! The workload reconciler.
//!
//! One pass resolves the model and runtime, classifies the topology, builds
//! the desired child objects for every active component, converges the store
//! onto them and garbage-collects the rest. The pass is pure over (observed
//! state, desired state): repeated runs with no external changes produce zero
//! writes.

use ome_definitions::constants::{
    AutoscalerClass, Component, DeploymentMode, INGRESS_DISABLE_CREATION_ANNOTATION,
};
pub use ome_definitions::constants::CheckResult;
use ome_definitions::names;
use ome_definitions::runtime::ServingRuntimeSpec;
use ome_definitions::structs::{
    ConfigMap, Deployment, HorizontalPodAutoscaler, LeaderWorkerSet, PodDisruptionBudget, Role,
    RoleBinding, Service, ServiceAccount, VirtualHost,
};
use ome_definitions::{ClusterServingRuntime, InferenceService, ServingRuntime};

use crate::config::ControllerConfig;
use crate::events::EventRecorder;
use crate::modelconfig::{self, ModelConfigDelta};
use crate::resolve::{self, ResolvedModel};
use crate::store::{is_already_exists, is_not_found, Kind, Object, Store};
use crate::Result;

/// Workload and service builders
pub mod workload;
/// Cluster-internal services
pub mod service;
/// Autoscalers
pub mod autoscaler;
/// Disruption budgets
pub mod pdb;
/// RBAC triples
pub mod rbac;
/// The external virtual host
pub mod ingress;
/// Stale-child garbage collection
pub mod cleanup;

/// One checked child object and what happened to it.
#[derive(Clone, Debug)]
pub struct CheckOutcome {
    pub kind: Kind,
    pub name: String,
    pub result: CheckResult,
}

/// Everything one reconcile pass decided.
#[derive(Default)]
pub struct ReconcileOutcome {
    pub service: String,
    pub mode: Option<DeploymentMode>,
    pub checks: Vec<CheckOutcome>,
}

impl ReconcileOutcome {
    /// Number of mutations performed; zero means the pass was a no-op.
    pub fn writes(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| {
                c.result == CheckResult::Create
                    || c.result == CheckResult::Update
                    || c.result == CheckResult::Delete
            })
            .count()
    }
}

pub struct Reconciler<'a, S: Store> {
    pub store: &'a S,
    pub config: &'a ControllerConfig,
    pub events: &'a EventRecorder,
}

impl<'a, S: Store> Reconciler<'a, S> {
    pub fn new(store: &'a S, config: &'a ControllerConfig, events: &'a EventRecorder) -> Reconciler<'a, S> {
        Reconciler { store, config, events }
    }

    /// Run one reconcile pass for `(namespace, name)`.
    pub fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome {
            service: format!("{}/{}", namespace, name),
            ..Default::default()
        };

        let isvc = match self.store.try_get::<InferenceService>(namespace, name)? {
            Some(isvc) => isvc,
            None => {
                // deleted; owner references cascade the children
                debug!("{}/{} is gone, nothing to reconcile", namespace, name);
                return Ok(outcome);
            }
        };

        let mode = crate::mode::classify(&isvc, self.config.defaultDeploymentMode);
        outcome.mode = Some(mode);

        let model = match isvc.spec.model {
            Some(ref model_ref) => Some(resolve::resolve_model(self.store, namespace, &model_ref.name)?),
            None => None,
        };
        let runtime = self.resolve_runtime(&isvc, model.as_ref())?;

        let active = isvc.active_components();
        let mut engine_port = None;

        for component in &active {
            let spec = match isvc.component(*component) {
                Some(spec) => spec,
                None => continue,
            };
            let eff = workload::effective_component(*component, spec, runtime.as_ref());
            if *component == Component::Engine {
                engine_port = Some(eff.port);
            }

            let multi_node =
                mode == DeploymentMode::MultiNode && *component == Component::Engine && eff.worker_size > 0;
            if multi_node {
                let desired = workload::build_leader_worker_set(&isvc, &eff, model.as_ref());
                self.apply(desired, |a: &LeaderWorkerSet, b: &LeaderWorkerSet| a.spec == b.spec, &mut outcome)?;
                // the single-node workload must not linger after a topology switch
                let stale = workload::component_child_name(&isvc.metadata.name, *component);
                self.delete_if_exists::<Deployment>(namespace, &stale, &mut outcome)?;
            } else {
                let desired = workload::build_deployment(&isvc, &eff, model.as_ref());
                self.apply(desired, |a: &Deployment, b: &Deployment| a.spec == b.spec, &mut outcome)?;
                if *component == Component::Engine {
                    let stale = names::lws_name(&isvc.metadata.name);
                    self.delete_if_exists::<LeaderWorkerSet>(namespace, &stale, &mut outcome)?;
                }
            }

            let desired = service::build_service(&isvc, &eff);
            self.apply(desired, |a: &Service, b: &Service| a.spec == b.spec, &mut outcome)?;

            if autoscaler::autoscaler_class(&isvc) == AutoscalerClass::Hpa {
                let desired = autoscaler::build_hpa(&isvc, &eff, mode);
                self.apply(desired, autoscaler::hpa_same, &mut outcome)?;
            } else {
                // keda and external backends bring their own scaler objects
                let stale = workload::component_child_name(&isvc.metadata.name, *component);
                self.delete_if_exists::<HorizontalPodAutoscaler>(namespace, &stale, &mut outcome)?;
            }

            let desired = pdb::build_pdb(&isvc, &eff);
            self.apply(
                desired,
                |a: &PodDisruptionBudget, b: &PodDisruptionBudget| a.same_spec(b),
                &mut outcome,
            )?;

            if eff.service_account.is_some() {
                let desired = rbac::build_service_account(&isvc, &eff);
                self.apply(desired, |_: &ServiceAccount, _: &ServiceAccount| true, &mut outcome)?;
                let desired = rbac::build_role(&isvc, &eff);
                self.apply(desired, |a: &Role, b: &Role| a.rules == b.rules, &mut outcome)?;
                let desired = rbac::build_role_binding(&isvc, &eff);
                self.apply(
                    desired,
                    |a: &RoleBinding, b: &RoleBinding| a.roleRef == b.roleRef && a.subjects == b.subjects,
                    &mut outcome,
                )?;
            }
        }

        self.ensure_model_config(&isvc, model.as_ref(), &mut outcome)?;

        let ingress_disabled = isvc
            .metadata
            .annotation_is_true(INGRESS_DISABLE_CREATION_ANNOTATION);
        if !ingress_disabled && !active.is_empty() {
            let desired =
                ingress::build_virtual_host(&isvc, self.config, &active, engine_port.unwrap_or(8080));
            self.apply(desired, |a: &VirtualHost, b: &VirtualHost| a.spec == b.spec, &mut outcome)?;
        }

        cleanup::cleanup(self.store, &isvc, &active, ingress_disabled, &mut outcome.checks)?;

        Ok(outcome)
    }

    /// Runtime spec for the service: the named one, else the best match for
    /// the model, else none (a complete runner needs no runtime).
    fn resolve_runtime(
        &self,
        isvc: &InferenceService,
        model: Option<&ResolvedModel>,
    ) -> Result<Option<ServingRuntimeSpec>> {
        let namespace = &isvc.metadata.namespace;
        if let Some(ref runtime_ref) = isvc.spec.runtime {
            if let Some(model) = model {
                let validated =
                    resolve::validate_runtime(self.store, namespace, &runtime_ref.name, model)?;
                return Ok(Some(validated.spec));
            }
            if let Some(rt) = self.store.try_get::<ServingRuntime>(namespace, &runtime_ref.name)? {
                return Ok(Some(rt.spec));
            }
            if let Some(rt) = self.store.try_get::<ClusterServingRuntime>("", &runtime_ref.name)? {
                return Ok(Some(rt.spec));
            }
            bail!("runtime '{}' not found", runtime_ref.name);
        }
        if let Some(model) = model {
            match resolve::select_runtime(self.store, namespace, model) {
                Ok(selected) => return Ok(Some(selected.spec)),
                Err(e) => {
                    let engine_complete = isvc
                        .spec
                        .engine
                        .as_ref()
                        .map(|engine| engine.has_complete_runner())
                        .unwrap_or(false);
                    if engine_complete {
                        // a complete runner carries its own image; run without
                        warn!("{}: {}", isvc.metadata.name, e);
                        return Ok(None);
                    }
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// Converge the per-service model config map.
    fn ensure_model_config(
        &self,
        isvc: &InferenceService,
        model: Option<&ResolvedModel>,
        outcome: &mut ReconcileOutcome,
    ) -> Result<()> {
        let name = names::modelconfig_name(&isvc.metadata.name);
        let namespace = &isvc.metadata.namespace;

        let mut cm = match self.store.try_get::<ConfigMap>(namespace, &name)? {
            Some(cm) => cm,
            None => {
                let mut cm = ConfigMap::default();
                cm.metadata = ome_definitions::structs::ObjectMeta::named(&name, namespace);
                cm.metadata.ownerReferences = vec![isvc.owner_reference()];
                let created = self.store.create(&cm)?;
                self.record(outcome, Kind::ConfigMap, &name, CheckResult::Create);
                created
            }
        };

        let mut delta = ModelConfigDelta::default();
        if let Some(model) = model {
            delta
                .updated
                .insert(model.name.clone(), serde_json::to_value(&model.spec)?);
        }
        // entries for models the service no longer references are removed,
        // so a model swap does not accumulate stale names
        for existing in modelconfig::model_names(&cm)? {
            if !delta.updated.contains_key(&existing) {
                delta.deleted.push(existing);
            }
        }
        let before = cm.data.clone();
        modelconfig::process(&mut cm, &delta)?;
        if cm.data != before {
            self.store.update(&cm)?;
            self.record(outcome, Kind::ConfigMap, &name, CheckResult::Update);
        } else {
            self.record(outcome, Kind::ConfigMap, &name, CheckResult::Existed);
        }
        Ok(())
    }

    fn record(&self, outcome: &mut ReconcileOutcome, kind: Kind, name: &str, result: CheckResult) {
        match result {
            CheckResult::Create => self.events.event(&outcome.service, "Created", &format!("{} {}", kind, name)),
            CheckResult::Update => self.events.event(&outcome.service, "Updated", &format!("{} {}", kind, name)),
            CheckResult::Delete => self.events.event(&outcome.service, "Deleted", &format!("{} {}", kind, name)),
            _ => (),
        }
        outcome.checks.push(CheckOutcome { kind, name: name.to_string(), result });
    }

    /// Get-then-converge one desired object.
    ///
    /// `AlreadyExists` on create falls through to update; `NotFound` on
    /// update falls back to create. Anything else surfaces for requeue.
    fn apply<T, F>(&self, desired: T, same: F, outcome: &mut ReconcileOutcome) -> Result<()>
    where
        T: Object,
        F: Fn(&T, &T) -> bool,
    {
        let namespace = desired.metadata().namespace.clone();
        let name = desired.metadata().name.clone();

        match self.store.try_get::<T>(&namespace, &name)? {
            None => match self.store.create(&desired) {
                Ok(_) => self.record(outcome, T::KIND, &name, CheckResult::Create),
                Err(ref e) if is_already_exists(e) => {
                    // lost the race; converge onto whoever won
                    let existing = self.store.get::<T>(&namespace, &name)?;
                    self.converge(desired, existing, same, outcome)?;
                }
                Err(e) => return Err(e),
            },
            Some(existing) => self.converge(desired, existing, same, outcome)?,
        }
        Ok(())
    }

    fn converge<T, F>(
        &self,
        mut desired: T,
        existing: T,
        same: F,
        outcome: &mut ReconcileOutcome,
    ) -> Result<()>
    where
        T: Object,
        F: Fn(&T, &T) -> bool,
    {
        let name = desired.metadata().name.clone();
        if same(&desired, &existing) {
            self.record(outcome, T::KIND, &name, CheckResult::Existed);
            return Ok(());
        }
        // carry the observed resource version forward for a clean CAS
        {
            let meta = desired.metadata_mut();
            meta.resourceVersion = existing.metadata().resourceVersion.clone();
            meta.uid = existing.metadata().uid.clone();
        }
        match self.store.update(&desired) {
            Ok(_) => self.record(outcome, T::KIND, &name, CheckResult::Update),
            Err(ref e) if is_not_found(e) => {
                let meta = desired.metadata_mut();
                meta.resourceVersion = None;
                meta.uid = None;
                self.store.create(&desired)?;
                self.record(outcome, T::KIND, &name, CheckResult::Create);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn delete_if_exists<T: Object>(
        &self,
        namespace: &str,
        name: &str,
        outcome: &mut ReconcileOutcome,
    ) -> Result<()> {
        if self.store.try_get::<T>(namespace, name)?.is_none() {
            return Ok(());
        }
        match self.store.delete::<T>(namespace, name) {
            Ok(()) => self.record(outcome, T::KIND, name, CheckResult::Delete),
            Err(ref e) if is_not_found(e) => (),
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use ome_definitions::constants::DEPLOYMENT_MODE_ANNOTATION;
    use ome_definitions::structs::{ComponentSpec, LeaderSpec, ObjectMeta, RunnerSpec, WorkerSpec};

    fn reconciler_fixture() -> (MemStore, ControllerConfig, EventRecorder) {
        (MemStore::new(), ControllerConfig::default(), EventRecorder::new())
    }

    fn engine_only_isvc(name: &str) -> InferenceService {
        let mut isvc = InferenceService {
            metadata: ObjectMeta::named(name, "default"),
            ..Default::default()
        };
        isvc.metadata.annotations.insert(
            DEPLOYMENT_MODE_ANNOTATION.into(),
            DeploymentMode::RawDeployment.to_string(),
        );
        isvc.spec.engine = Some(ComponentSpec {
            runner: Some(RunnerSpec { image: Some("eng:v1".into()), ..Default::default() }),
            ..Default::default()
        });
        isvc
    }

    #[test]
    fn short_service_materialises_the_full_child_set() {
        let (store, config, events) = reconciler_fixture();
        store.create(&engine_only_isvc("svc")).unwrap();

        let outcome = Reconciler::new(&store, &config, &events)
            .reconcile("default", "svc")
            .unwrap();
        assert_eq!(outcome.mode, Some(DeploymentMode::RawDeployment));

        let dep: Deployment = store.get("default", "svc-engine").unwrap();
        assert_eq!(
            dep.spec.template.spec.main_container().unwrap().image.as_deref(),
            Some("eng:v1")
        );
        let _svc: Service = store.get("default", "svc-engine").unwrap();
        let hpa: HorizontalPodAutoscaler = store.get("default", "svc-engine").unwrap();
        assert_eq!(hpa.spec.minReplicas, Some(1));
        assert_eq!(hpa.spec.maxReplicas, 3);
        let resource = hpa.spec.metrics[0].resource.as_ref().unwrap();
        assert_eq!(resource.name, "cpu");
        assert_eq!(resource.target.averageUtilization, Some(80));
        let pdb: PodDisruptionBudget = store.get("default", "svc-engine").unwrap();
        assert_eq!(pdb.spec.maxUnavailable, Some(1));
        // no decoder or router children appeared
        assert!(store.try_get::<Deployment>("default", "svc-decoder").unwrap().is_none());
        assert!(store.try_get::<Deployment>("default", "svc-router").unwrap().is_none());
    }

    #[test]
    fn reconcile_is_idempotent() {
        let (store, config, events) = reconciler_fixture();
        store.create(&engine_only_isvc("svc")).unwrap();

        let reconciler = Reconciler::new(&store, &config, &events);
        let first = reconciler.reconcile("default", "svc").unwrap();
        assert!(first.writes() > 0);
        let second = reconciler.reconcile("default", "svc").unwrap();
        assert_eq!(second.writes(), 0, "second pass must be a no-op");
    }

    #[test]
    fn disaggregated_service_gets_engine_and_decoder_children() {
        let (store, config, events) = reconciler_fixture();
        let mut isvc = engine_only_isvc("svc");
        isvc.metadata.annotations.insert(
            DEPLOYMENT_MODE_ANNOTATION.into(),
            DeploymentMode::PDDisaggregated.to_string(),
        );
        isvc.spec.decoder = Some(ComponentSpec {
            runner: Some(RunnerSpec { image: Some("dec:v1".into()), ..Default::default() }),
            ..Default::default()
        });
        store.create(&isvc).unwrap();

        let outcome = Reconciler::new(&store, &config, &events)
            .reconcile("default", "svc")
            .unwrap();
        assert_eq!(outcome.mode, Some(DeploymentMode::PDDisaggregated));

        for suffix in &["svc-engine", "svc-decoder"] {
            assert!(store.try_get::<Deployment>("default", suffix).unwrap().is_some());
            assert!(store.try_get::<Service>("default", suffix).unwrap().is_some());
            assert!(store.try_get::<HorizontalPodAutoscaler>("default", suffix).unwrap().is_some());
            assert!(store.try_get::<PodDisruptionBudget>("default", suffix).unwrap().is_some());
        }
        assert!(store.try_get::<Deployment>("default", "svc-router").unwrap().is_none());
        assert!(store.try_get::<Service>("default", "svc-router").unwrap().is_none());
    }

    #[test]
    fn multi_node_engine_becomes_a_leader_worker_set() {
        let (store, config, events) = reconciler_fixture();
        let mut isvc = engine_only_isvc("svc");
        isvc.metadata.annotations.insert(
            DEPLOYMENT_MODE_ANNOTATION.into(),
            DeploymentMode::MultiNode.to_string(),
        );
        if let Some(engine) = isvc.spec.engine.as_mut() {
            engine.leader = Some(LeaderSpec::default());
            engine.worker = Some(WorkerSpec { size: Some(2), ..Default::default() });
        }
        store.create(&isvc).unwrap();

        Reconciler::new(&store, &config, &events)
            .reconcile("default", "svc")
            .unwrap();

        let lws: LeaderWorkerSet = store.get("default", "lws-svc").unwrap();
        assert_eq!(lws.spec.leaderWorkerTemplate.size, 3);
        assert!(store.try_get::<Deployment>("default", "svc-engine").unwrap().is_none());
    }

    #[test]
    fn dropping_the_decoder_cleans_up_its_children() {
        let (store, config, events) = reconciler_fixture();
        let mut isvc = engine_only_isvc("svc");
        isvc.metadata.annotations.insert(
            DEPLOYMENT_MODE_ANNOTATION.into(),
            DeploymentMode::PDDisaggregated.to_string(),
        );
        isvc.spec.decoder = Some(ComponentSpec {
            runner: Some(RunnerSpec { image: Some("dec:v1".into()), ..Default::default() }),
            ..Default::default()
        });
        store.create(&isvc).unwrap();

        let reconciler = Reconciler::new(&store, &config, &events);
        reconciler.reconcile("default", "svc").unwrap();
        assert!(store.try_get::<Deployment>("default", "svc-decoder").unwrap().is_some());

        let mut stored: InferenceService = store.get("default", "svc").unwrap();
        stored.spec.decoder = None;
        store.update(&stored).unwrap();

        reconciler.reconcile("default", "svc").unwrap();
        assert!(store.try_get::<Deployment>("default", "svc-decoder").unwrap().is_none());
        assert!(store.try_get::<Service>("default", "svc-decoder").unwrap().is_none());
        assert!(store.try_get::<HorizontalPodAutoscaler>("default", "svc-decoder").unwrap().is_none());
        // the engine keeps its children
        assert!(store.try_get::<Deployment>("default", "svc-engine").unwrap().is_some());
    }

    #[test]
    fn external_virtual_host_is_preserved_when_creation_is_disabled() {
        let (store, config, events) = reconciler_fixture();
        let mut isvc = engine_only_isvc("svc");
        isvc.metadata
            .annotations
            .insert(INGRESS_DISABLE_CREATION_ANNOTATION.into(), "true".into());
        let created = store.create(&isvc).unwrap();

        let reconciler = Reconciler::new(&store, &config, &events);
        reconciler.reconcile("default", "svc").unwrap();
        // nothing was created for the disabled ingress
        assert!(store.try_get::<VirtualHost>("default", "svc").unwrap().is_none());

        // a pre-existing host owned by the service survives while active
        let mut vh = VirtualHost::default();
        vh.metadata = ObjectMeta::named("svc", "default");
        vh.metadata.ownerReferences = vec![created.owner_reference()];
        store.create(&vh).unwrap();
        reconciler.reconcile("default", "svc").unwrap();
        assert!(store.try_get::<VirtualHost>("default", "svc").unwrap().is_some());

        // with no component left it is deleted
        let mut stored: InferenceService = store.get("default", "svc").unwrap();
        stored.spec.engine = None;
        store.update(&stored).unwrap();
        reconciler.reconcile("default", "svc").unwrap();
        assert!(store.try_get::<VirtualHost>("default", "svc").unwrap().is_none());
    }

    #[test]
    fn model_config_map_tracks_the_resolved_model() {
        use ome_definitions::basemodel::{BaseModelSpec, ClusterBaseModel, ModelFormat};
        use ome_definitions::runtime::{ClusterServingRuntime, ServingRuntimeSpec, SupportedModelFormat};
        use ome_definitions::ModelRef;

        let (store, config, events) = reconciler_fixture();
        store
            .create(&ClusterBaseModel {
                metadata: ObjectMeta::named("llama-7b", ""),
                spec: BaseModelSpec {
                    modelFormat: ModelFormat { name: "safetensors".into(), ..Default::default() },
                    ..Default::default()
                },
            })
            .unwrap();
        store
            .create(&ClusterServingRuntime {
                metadata: ObjectMeta::named("vllm", ""),
                spec: ServingRuntimeSpec {
                    supportedModelFormats: vec![SupportedModelFormat {
                        name: "safetensors".into(),
                        autoSelect: Some(true),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            })
            .unwrap();

        store
            .create(&ClusterBaseModel {
                metadata: ObjectMeta::named("mistral", ""),
                spec: BaseModelSpec {
                    modelFormat: ModelFormat { name: "safetensors".into(), ..Default::default() },
                    ..Default::default()
                },
            })
            .unwrap();

        let mut isvc = engine_only_isvc("svc");
        isvc.spec.model = Some(ModelRef { name: "llama-7b".into(), ..Default::default() });
        store.create(&isvc).unwrap();

        let reconciler = Reconciler::new(&store, &config, &events);
        reconciler.reconcile("default", "svc").unwrap();

        let cm: ConfigMap = store.get("default", "modelconfig-svc").unwrap();
        let body = cm.data.get("models.json").unwrap();
        assert!(body.contains("llama-7b"));

        // swapping the model reference prunes the stale entry
        let mut stored: InferenceService = store.get("default", "svc").unwrap();
        stored.spec.model = Some(ModelRef { name: "mistral".into(), ..Default::default() });
        store.update(&stored).unwrap();
        reconciler.reconcile("default", "svc").unwrap();

        let cm: ConfigMap = store.get("default", "modelconfig-svc").unwrap();
        let body = cm.data.get("models.json").unwrap();
        assert!(body.contains("mistral"));
        assert!(!body.contains("llama-7b"));

        // clearing the reference empties the map
        let mut stored: InferenceService = store.get("default", "svc").unwrap();
        stored.spec.model = None;
        store.update(&stored).unwrap();
        reconciler.reconcile("default", "svc").unwrap();

        let cm: ConfigMap = store.get("default", "modelconfig-svc").unwrap();
        assert_eq!(cm.data.get("models.json").map(|s| s.as_str()), Some("[]"));
    }
}
