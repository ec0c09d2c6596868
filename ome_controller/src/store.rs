//! The typed object store.
//!
//! The orchestration platform is out of scope; the control plane only assumes
//! a typed object store with optimistic concurrency, watches and
//! owner-reference cascading delete. `Store` is that assumption as a trait,
//! and `MemStore` is the in-process backing used by the CLI and the tests.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use ome_definitions::structs::ObjectMeta;
use ome_definitions::{
    BaseModel, CapacityReservation, ClusterBaseModel, ClusterServingRuntime, DedicatedAICluster,
    FineTunedWeight, InferenceService, ServingRuntime,
};
use ome_definitions::structs::{
    ConfigMap, Deployment, HorizontalPodAutoscaler, LeaderWorkerSet, Pod, PodDisruptionBudget,
    Role, RoleBinding, Service, ServiceAccount, VirtualHost,
};

use super::Result;

/// Every kind of object the control plane reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    InferenceService,
    BaseModel,
    ClusterBaseModel,
    ServingRuntime,
    ClusterServingRuntime,
    FineTunedWeight,
    DedicatedAICluster,
    CapacityReservation,
    Deployment,
    LeaderWorkerSet,
    Service,
    HorizontalPodAutoscaler,
    PodDisruptionBudget,
    VirtualHost,
    ConfigMap,
    ServiceAccount,
    Role,
    RoleBinding,
    PersistentVolumeClaim,
    Pod,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::InferenceService => "InferenceService",
            Kind::BaseModel => "BaseModel",
            Kind::ClusterBaseModel => "ClusterBaseModel",
            Kind::ServingRuntime => "ServingRuntime",
            Kind::ClusterServingRuntime => "ClusterServingRuntime",
            Kind::FineTunedWeight => "FineTunedWeight",
            Kind::DedicatedAICluster => "DedicatedAICluster",
            Kind::CapacityReservation => "CapacityReservation",
            Kind::Deployment => "Deployment",
            Kind::LeaderWorkerSet => "LeaderWorkerSet",
            Kind::Service => "Service",
            Kind::HorizontalPodAutoscaler => "HorizontalPodAutoscaler",
            Kind::PodDisruptionBudget => "PodDisruptionBudget",
            Kind::VirtualHost => "VirtualHost",
            Kind::ConfigMap => "ConfigMap",
            Kind::ServiceAccount => "ServiceAccount",
            Kind::Role => "Role",
            Kind::RoleBinding => "RoleBinding",
            Kind::PersistentVolumeClaim => "PersistentVolumeClaim",
            Kind::Pod => "Pod",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Kind> {
        let all = [
            Kind::InferenceService,
            Kind::BaseModel,
            Kind::ClusterBaseModel,
            Kind::ServingRuntime,
            Kind::ClusterServingRuntime,
            Kind::FineTunedWeight,
            Kind::DedicatedAICluster,
            Kind::CapacityReservation,
            Kind::Deployment,
            Kind::LeaderWorkerSet,
            Kind::Service,
            Kind::HorizontalPodAutoscaler,
            Kind::PodDisruptionBudget,
            Kind::VirtualHost,
            Kind::ConfigMap,
            Kind::ServiceAccount,
            Kind::Role,
            Kind::RoleBinding,
            Kind::PersistentVolumeClaim,
            Kind::Pod,
        ];
        all.iter().cloned().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A storable, serde-round-trippable object with metadata.
pub trait Object: Clone + Serialize + DeserializeOwned {
    const KIND: Kind;
    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;
}

macro_rules! impl_object {
    ($t:ty, $k:expr) => {
        impl Object for $t {
            const KIND: Kind = $k;
            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }
            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

impl_object!(InferenceService, Kind::InferenceService);
impl_object!(BaseModel, Kind::BaseModel);
impl_object!(ClusterBaseModel, Kind::ClusterBaseModel);
impl_object!(ServingRuntime, Kind::ServingRuntime);
impl_object!(ClusterServingRuntime, Kind::ClusterServingRuntime);
impl_object!(FineTunedWeight, Kind::FineTunedWeight);
impl_object!(DedicatedAICluster, Kind::DedicatedAICluster);
impl_object!(CapacityReservation, Kind::CapacityReservation);
impl_object!(Deployment, Kind::Deployment);
impl_object!(LeaderWorkerSet, Kind::LeaderWorkerSet);
impl_object!(Service, Kind::Service);
impl_object!(HorizontalPodAutoscaler, Kind::HorizontalPodAutoscaler);
impl_object!(PodDisruptionBudget, Kind::PodDisruptionBudget);
impl_object!(VirtualHost, Kind::VirtualHost);
impl_object!(ConfigMap, Kind::ConfigMap);
impl_object!(ServiceAccount, Kind::ServiceAccount);
impl_object!(Role, Kind::Role);
impl_object!(RoleBinding, Kind::RoleBinding);
impl_object!(Pod, Kind::Pod);

// All main errors that can happen against the store
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum StoreError {
    #[fail(display = "{} '{}' not found", _0, _1)]
    NotFound(String, String),

    #[fail(display = "{} '{}' already exists", _0, _1)]
    AlreadyExists(String, String),

    #[fail(display = "{} '{}' was modified concurrently", _0, _1)]
    Conflict(String, String),
}

/// `NotFound` is recoverable in most reconcile paths.
pub fn is_not_found(e: &super::Error) -> bool {
    match e.downcast_ref::<StoreError>() {
        Some(StoreError::NotFound(..)) => true,
        _ => false,
    }
}

pub fn is_already_exists(e: &super::Error) -> bool {
    match e.downcast_ref::<StoreError>() {
        Some(StoreError::AlreadyExists(..)) => true,
        _ => false,
    }
}

pub fn is_conflict(e: &super::Error) -> bool {
    match e.downcast_ref::<StoreError>() {
        Some(StoreError::Conflict(..)) => true,
        _ => false,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchOp {
    Added,
    Modified,
    Deleted,
}

/// A change notification; payloads are re-read from the store.
#[derive(Clone, Debug)]
pub struct WatchEvent {
    pub op: WatchOp,
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

/// The abstract operations the control plane needs from the platform.
pub trait Store {
    fn get<T: Object>(&self, namespace: &str, name: &str) -> Result<T>;
    fn try_get<T: Object>(&self, namespace: &str, name: &str) -> Result<Option<T>>;
    /// List a namespace; an empty namespace lists everything of that kind.
    fn list<T: Object>(&self, namespace: &str) -> Result<Vec<T>>;
    fn create<T: Object>(&self, obj: &T) -> Result<T>;
    fn update<T: Object>(&self, obj: &T) -> Result<T>;
    fn delete<T: Object>(&self, namespace: &str, name: &str) -> Result<()>;
    /// Metadata-only listing for heterogeneous cleanup.
    fn list_meta(&self, kind: Kind, namespace: &str) -> Result<Vec<ObjectMeta>>;
    fn delete_kind(&self, kind: Kind, namespace: &str, name: &str) -> Result<()>;
}

struct MemInner {
    objects: HashMap<Kind, BTreeMap<String, serde_json::Value>>,
    revision: u64,
    watchers: Vec<Sender<WatchEvent>>,
}

/// In-memory store with monotonic resource versions.
///
/// Mutations notify watchers and cascade deletes through owner references,
/// mirroring the platform's garbage collector.
pub struct MemStore {
    inner: Mutex<MemInner>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

fn meta_of(value: &serde_json::Value) -> ObjectMeta {
    value
        .get("metadata")
        .cloned()
        .and_then(|m| serde_json::from_value(m).ok())
        .unwrap_or_default()
}

impl MemStore {
    pub fn new() -> MemStore {
        MemStore {
            inner: Mutex::new(MemInner {
                objects: HashMap::new(),
                revision: 0,
                watchers: Vec::new(),
            }),
        }
    }

    pub fn watch(&self) -> Result<Receiver<WatchEvent>> {
        let (tx, rx) = channel();
        let mut inner = self.lock()?;
        inner.watchers.push(tx);
        Ok(rx)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<MemInner>> {
        self.inner.lock().map_err(|_| format_err!("store lock poisoned"))
    }

    /// Every stored object with its kind re-attached, for dumping.
    pub fn export(&self) -> Result<Vec<serde_json::Value>> {
        let inner = self.lock()?;
        let mut out = Vec::new();
        for (kind, objects) in &inner.objects {
            for value in objects.values() {
                let mut value = value.clone();
                if let serde_json::Value::Object(ref mut map) = value {
                    map.insert(
                        "kind".to_string(),
                        serde_json::Value::String(kind.to_string()),
                    );
                }
                out.push(value);
            }
        }
        Ok(out)
    }

    fn notify(inner: &mut MemInner, op: WatchOp, kind: Kind, namespace: &str, name: &str) {
        let event = WatchEvent {
            op,
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        inner.watchers.retain(|w| w.send(event.clone()).is_ok());
    }

    /// Remove one object and everything transitively owned by it.
    fn delete_locked(
        inner: &mut MemInner,
        kind: Kind,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        let removed = inner
            .objects
            .get_mut(&kind)
            .and_then(|m| m.remove(&key(namespace, name)));
        let removed = match removed {
            Some(v) => v,
            None => {
                return Err(StoreError::NotFound(kind.to_string(), name.to_string()).into());
            }
        };
        Self::notify(inner, WatchOp::Deleted, kind, namespace, name);

        let owner_uid = match meta_of(&removed).uid {
            Some(uid) => uid,
            None => return Ok(()),
        };

        // collect first: removing while iterating would invalidate the maps
        let mut orphans: Vec<(Kind, String, String)> = Vec::new();
        for (k, objects) in &inner.objects {
            for value in objects.values() {
                let meta = meta_of(value);
                let owned = meta
                    .ownerReferences
                    .iter()
                    .any(|or| or.uid == owner_uid);
                if owned {
                    orphans.push((*k, meta.namespace.clone(), meta.name.clone()));
                }
            }
        }
        for (k, ns, n) in orphans {
            debug!("cascading delete of {} {}/{}", k, ns, n);
            // the orphan may itself own objects
            let _ = Self::delete_locked(inner, k, &ns, &n);
        }
        Ok(())
    }
}

impl Default for MemStore {
    fn default() -> MemStore {
        MemStore::new()
    }
}

impl Store for MemStore {
    fn get<T: Object>(&self, namespace: &str, name: &str) -> Result<T> {
        self.try_get::<T>(namespace, name)?
            .ok_or_else(|| StoreError::NotFound(T::KIND.to_string(), name.to_string()).into())
    }

    fn try_get<T: Object>(&self, namespace: &str, name: &str) -> Result<Option<T>> {
        let inner = self.lock()?;
        let found = inner
            .objects
            .get(&T::KIND)
            .and_then(|m| m.get(&key(namespace, name)));
        match found {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    fn list<T: Object>(&self, namespace: &str) -> Result<Vec<T>> {
        let inner = self.lock()?;
        let mut out = Vec::new();
        if let Some(objects) = inner.objects.get(&T::KIND) {
            for value in objects.values() {
                if namespace.is_empty() || meta_of(value).namespace == namespace {
                    out.push(serde_json::from_value(value.clone())?);
                }
            }
        }
        Ok(out)
    }

    fn create<T: Object>(&self, obj: &T) -> Result<T> {
        let mut inner = self.lock()?;
        let meta = obj.metadata();
        let k = key(&meta.namespace, &meta.name);
        let exists = inner
            .objects
            .get(&T::KIND)
            .map(|m| m.contains_key(&k))
            .unwrap_or(false);
        if exists {
            return Err(StoreError::AlreadyExists(T::KIND.to_string(), meta.name.clone()).into());
        }
        let mut stored = obj.clone();
        inner.revision += 1;
        {
            let m = stored.metadata_mut();
            m.resourceVersion = Some(inner.revision.to_string());
            if m.uid.is_none() {
                m.uid = Some(Uuid::new_v4().to_string());
            }
        }
        let value = serde_json::to_value(&stored)?;
        inner
            .objects
            .entry(T::KIND)
            .or_insert_with(BTreeMap::new)
            .insert(k, value);
        let (ns, name) = (
            stored.metadata().namespace.clone(),
            stored.metadata().name.clone(),
        );
        Self::notify(&mut inner, WatchOp::Added, T::KIND, &ns, &name);
        Ok(stored)
    }

    fn update<T: Object>(&self, obj: &T) -> Result<T> {
        let mut inner = self.lock()?;
        let meta = obj.metadata();
        let k = key(&meta.namespace, &meta.name);
        let current = inner
            .objects
            .get(&T::KIND)
            .and_then(|m| m.get(&k))
            .cloned();
        let current = match current {
            Some(v) => v,
            None => {
                return Err(StoreError::NotFound(T::KIND.to_string(), meta.name.clone()).into());
            }
        };
        let current_meta = meta_of(&current);
        // a caller without a resourceVersion takes the latest; one with a
        // stale version loses the compare-and-swap
        if let Some(ref rv) = meta.resourceVersion {
            if current_meta.resourceVersion.as_ref() != Some(rv) {
                return Err(StoreError::Conflict(T::KIND.to_string(), meta.name.clone()).into());
            }
        }
        let mut stored = obj.clone();
        inner.revision += 1;
        {
            let m = stored.metadata_mut();
            m.resourceVersion = Some(inner.revision.to_string());
            if m.uid.is_none() {
                m.uid = current_meta.uid.clone();
            }
        }
        let value = serde_json::to_value(&stored)?;
        if let Some(m) = inner.objects.get_mut(&T::KIND) {
            m.insert(k, value);
        }
        let (ns, name) = (
            stored.metadata().namespace.clone(),
            stored.metadata().name.clone(),
        );
        Self::notify(&mut inner, WatchOp::Modified, T::KIND, &ns, &name);
        Ok(stored)
    }

    fn delete<T: Object>(&self, namespace: &str, name: &str) -> Result<()> {
        let mut inner = self.lock()?;
        Self::delete_locked(&mut inner, T::KIND, namespace, name)
    }

    fn list_meta(&self, kind: Kind, namespace: &str) -> Result<Vec<ObjectMeta>> {
        let inner = self.lock()?;
        let mut out = Vec::new();
        if let Some(objects) = inner.objects.get(&kind) {
            for value in objects.values() {
                let meta = meta_of(value);
                if namespace.is_empty() || meta.namespace == namespace {
                    out.push(meta);
                }
            }
        }
        Ok(out)
    }

    fn delete_kind(&self, kind: Kind, namespace: &str, name: &str) -> Result<()> {
        let mut inner = self.lock()?;
        Self::delete_locked(&mut inner, kind, namespace, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ome_definitions::structs::OwnerReference;

    fn isvc(name: &str) -> InferenceService {
        InferenceService {
            metadata: ObjectMeta::named(name, "default"),
            ..Default::default()
        }
    }

    #[test]
    fn create_get_update_delete() {
        let store = MemStore::new();
        let created = store.create(&isvc("svc")).unwrap();
        assert!(created.metadata.uid.is_some());
        let rv1 = created.metadata.resourceVersion.clone().unwrap();

        assert!(is_already_exists(&store.create(&isvc("svc")).unwrap_err()));

        let mut fetched: InferenceService = store.get("default", "svc").unwrap();
        fetched.metadata.annotations.insert("k".into(), "v".into());
        let updated = store.update(&fetched).unwrap();
        assert_ne!(updated.metadata.resourceVersion.clone().unwrap(), rv1);

        store.delete::<InferenceService>("default", "svc").unwrap();
        assert!(is_not_found(&store.get::<InferenceService>("default", "svc").unwrap_err()));
    }

    #[test]
    fn stale_update_conflicts() {
        let store = MemStore::new();
        let created = store.create(&isvc("svc")).unwrap();

        let mut fresh = created.clone();
        fresh.metadata.annotations.insert("a".into(), "1".into());
        store.update(&fresh).unwrap();

        // still carrying the original resourceVersion
        let mut stale = created;
        stale.metadata.annotations.insert("b".into(), "2".into());
        assert!(is_conflict(&store.update(&stale).unwrap_err()));
    }

    #[test]
    fn delete_cascades_to_owned_children() {
        let store = MemStore::new();
        let owner = store.create(&isvc("svc")).unwrap();

        let mut dep = Deployment::default();
        dep.metadata = ObjectMeta::named("svc-engine", "default");
        dep.metadata.ownerReferences.push(OwnerReference {
            kind: "InferenceService".into(),
            name: "svc".into(),
            uid: owner.metadata.uid.clone().unwrap(),
            controller: Some(true),
            blockOwnerDeletion: Some(true),
        });
        store.create(&dep).unwrap();

        store.delete::<InferenceService>("default", "svc").unwrap();
        assert!(store.try_get::<Deployment>("default", "svc-engine").unwrap().is_none());
    }

    #[test]
    fn watch_observes_mutations() {
        let store = MemStore::new();
        let rx = store.watch().unwrap();
        store.create(&isvc("svc")).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.op, WatchOp::Added);
        assert_eq!(event.kind, Kind::InferenceService);
        assert_eq!(event.name, "svc");
    }
}
