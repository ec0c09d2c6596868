#[macro_use]
extern crate clap;
extern crate loggerv;
extern crate serde_json;
extern crate serde_yaml;

#[macro_use]
extern crate log;

#[macro_use]
extern crate failure;

extern crate ome_controller;
extern crate ome_definitions;

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process;
use std::sync::Arc;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

use ome_controller::config::ControllerConfig;
use ome_controller::defaulter::Defaulter;
use ome_controller::queue::{Controller, ControllerOptions};
use ome_controller::reconcile::Reconciler;
use ome_controller::store::MemStore;
use ome_controller::validate::Validator;
use ome_controller::webhook::{self, AdmissionReview};
use ome_controller::{events::EventRecorder, store_io, Result};
use ome_definitions::InferenceService;

fn main() {
    let matches = App::new("ome-controller")
        .version(crate_version!())
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .about("Inference-serving control plane core")
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Increase verbosity"),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .takes_value(true)
                .global(true)
                .help("Controller configuration YAML"),
        )
        .arg(
            Arg::with_name("store")
                .long("store")
                .takes_value(true)
                .global(true)
                .help("Directory of YAML objects backing the store"),
        )
        .subcommand(
            SubCommand::with_name("validate")
                .about("Validate an InferenceService manifest")
                .arg(Arg::with_name("file").short("f").takes_value(true).required(true)),
        )
        .subcommand(
            SubCommand::with_name("default")
                .about("Run admission defaulting and print the result")
                .arg(Arg::with_name("file").short("f").takes_value(true).required(true)),
        )
        .subcommand(
            SubCommand::with_name("mutate")
                .about("Answer a pod admission review from a JSON file")
                .arg(Arg::with_name("file").short("f").takes_value(true).required(true)),
        )
        .subcommand(
            SubCommand::with_name("reconcile")
                .about("Reconcile one service and print the check results")
                .arg(Arg::with_name("service").required(true).help("namespace/name"))
                .arg(Arg::with_name("dump").long("dump").help("Print the resulting store")),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Converge every stored service with the worker pool")
                .arg(Arg::with_name("workers").long("workers").takes_value(true))
                .arg(Arg::with_name("dump").long("dump").help("Print the resulting store")),
        )
        .get_matches();

    loggerv::init_with_verbosity(matches.occurrences_of("verbose") + 1).unwrap();

    if let Err(e) = dispatch(&matches) {
        error!("{}", e);
        for cause in e.iter_causes() {
            error!("caused by: {}", cause);
        }
        process::exit(1);
    }
}

fn load_config(matches: &ArgMatches) -> Result<ControllerConfig> {
    match matches.value_of("config") {
        Some(path) => ControllerConfig::from_file(Path::new(path)),
        None => Ok(ControllerConfig::default()),
    }
}

fn load_store(matches: &ArgMatches) -> Result<MemStore> {
    let store = MemStore::new();
    if let Some(dir) = matches.value_of("store") {
        let loaded = store_io::load_dir(&store, Path::new(dir))?;
        info!("loaded {} objects from {}", loaded, dir);
    }
    Ok(store)
}

fn read_file(path: &str) -> Result<String> {
    let mut body = String::new();
    File::open(path)?.read_to_string(&mut body)?;
    Ok(body)
}

fn dump_store(store: &MemStore) -> Result<()> {
    for value in store.export()? {
        println!("---");
        println!("{}", serde_yaml::to_string(&value)?);
    }
    Ok(())
}

fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("validate", Some(sub)) => {
            let config = load_config(matches)?;
            let store = load_store(matches)?;
            let body = read_file(sub.value_of("file").unwrap())?;
            let isvc: InferenceService = serde_yaml::from_str(&body)?;
            let warnings = Validator::new(&store, &config).validate(&isvc)?;
            for warning in warnings {
                warn!("{}", warning);
            }
            println!("{} is valid", isvc.metadata.name);
            Ok(())
        }
        ("default", Some(sub)) => {
            let config = load_config(matches)?;
            let store = load_store(matches)?;
            let body = read_file(sub.value_of("file").unwrap())?;
            let mut isvc: InferenceService = serde_yaml::from_str(&body)?;
            let warnings = Defaulter::new(&store, &config).apply(&mut isvc)?;
            for warning in warnings {
                warn!("{}", warning);
            }
            println!("{}", serde_yaml::to_string(&isvc)?);
            Ok(())
        }
        ("mutate", Some(sub)) => {
            let store = load_store(matches)?;
            let body = read_file(sub.value_of("file").unwrap())?;
            let review: AdmissionReview = serde_json::from_str(&body)?;
            let response = webhook::mutate_pod(&store, &review);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        ("reconcile", Some(sub)) => {
            let config = load_config(matches)?;
            let store = load_store(matches)?;
            let service = sub.value_of("service").unwrap();
            let mut parts = service.splitn(2, '/');
            let (namespace, name) = match (parts.next(), parts.next()) {
                (Some(ns), Some(n)) => (ns, n),
                _ => bail!("service must be namespace/name"),
            };
            let events = EventRecorder::new();
            let outcome = Reconciler::new(&store, &config, &events).reconcile(namespace, name)?;
            for check in &outcome.checks {
                println!("{:?} {} {}", check.result, check.kind, check.name);
            }
            if sub.is_present("dump") {
                dump_store(&store)?;
            }
            Ok(())
        }
        ("run", Some(sub)) => {
            let config = Arc::new(load_config(matches)?);
            let store = Arc::new(load_store(matches)?);
            let mut options = ControllerOptions::default();
            if let Some(workers) = sub.value_of("workers") {
                options.workers = workers.parse()?;
            }
            let controller = Controller::new(Arc::clone(&store), config, options);
            let watch = store.watch()?;
            controller.spawn_watcher(watch);
            controller.enqueue_all()?;
            controller.run_until_idle();
            info!("converged; {} events recorded", controller.events.recent().len());
            if sub.is_present("dump") {
                dump_store(&store)?;
            }
            Ok(())
        }
        _ => unreachable!(),
    }
}
