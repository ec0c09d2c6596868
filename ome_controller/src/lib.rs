#![recursion_limit = "1024"]
#![allow(renamed_and_removed_lints)]
#![allow(non_snake_case)]

#[macro_use]
extern crate serde_derive;
extern crate serde;
extern crate serde_yaml;
#[macro_use]
extern crate serde_json;

extern crate base64;
extern crate chrono;
extern crate regex;
extern crate uuid;
extern crate walkdir;

// parallel reconciles:
extern crate threadpool;

#[macro_use]
extern crate log;

#[macro_use] extern crate failure;

pub use failure::Error; //Fail
pub type Result<T> = std::result::Result<T, Error>;

extern crate ome_definitions;
pub use ome_definitions::{Component, DeploymentMode, InferenceService};

/// The typed object store abstraction and its in-memory backing
pub mod store;
pub use store::{MemStore, Object, Store};

/// Controller configuration from the inferenceservice config map
pub mod config;
pub use config::ControllerConfig;

/// Model and runtime resolution
pub mod resolve;

/// Deployment topology classification
pub mod mode;

/// Admission-time defaulting and predictor migration
pub mod defaulter;

/// Admission-time validation
pub mod validate;

/// Capacity reservation validation
pub mod capacity;

/// The per-service model config map delta manager
pub mod modelconfig;

/// Event recording for reconcile outcomes
pub mod events;

/// The workload reconciler
pub mod reconcile;

/// Admission webhooks: review plumbing, json patch, pod mutation
pub mod webhook;

/// The deduplicating worker queue driving reconciles
pub mod queue;

/// YAML-backed store loading for the CLI
pub mod store_io;
