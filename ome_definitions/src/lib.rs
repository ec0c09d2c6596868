#![allow(renamed_and_removed_lints)]
#![allow(non_snake_case)]

#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate serde_yaml;
extern crate serde;

#[macro_use]
extern crate log;

extern crate regex;

extern crate hex;
extern crate sha2;
extern crate url;

#[macro_use] extern crate failure;

pub use failure::Error; //Fail
pub type Result<T> = std::result::Result<T, Error>;

/// Process-wide constants: annotation keys, labels, agent env vars, enums
pub mod constants;
pub use constants::{Component, DeploymentMode};

/// Deterministic child-object naming
pub mod names;

/// Version parsing with a total order
pub mod version;
pub use version::Version;

/// Structs for pod-shaped child objects
pub mod structs;

/// The InferenceService record
pub mod inferenceservice;
pub use inferenceservice::{InferenceService, InferenceServiceSpec, ModelRef, RuntimeRef};

/// Base model records (namespace and cluster scoped)
pub mod basemodel;
pub use basemodel::{BaseModel, BaseModelSpec, ClusterBaseModel, ModelFormat};

/// Serving runtime records (namespace and cluster scoped)
pub mod runtime;
pub use runtime::{ClusterServingRuntime, ServingRuntime, ServingRuntimeSpec, SupportedModelFormat};

/// Fine-tuned weight records
pub mod finetuned;
pub use finetuned::FineTunedWeight;

/// Dedicated AI cluster records
pub mod cluster;
pub use cluster::DedicatedAICluster;

/// Capacity reservations and the cluster capacity pool
pub mod capacity;
pub use capacity::{CapacityPool, CapacityReservation};

/// Object storage URI handling
pub mod storage;
pub use storage::StorageSpec;
