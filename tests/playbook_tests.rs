//! Tests for playbook plugins: building configurations, serving inventories
//! and capturing run output into execution logs.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use cephlcm::error::Error;
use cephlcm::hints::RawHint;
use cephlcm::models::{Execution, PlaybookConfiguration, Task};
use cephlcm::plugins::{create_playbook_configuration, Plugin, PluginExt, PluginRegistry};
use cephlcm::process::OptionValue;
use cephlcm::store::Store;

fn create(fixture: &Fixture, entry_point: &str, task_id: Option<&str>) -> Box<dyn Plugin> {
    let context = match task_id {
        Some(id) => fixture.bound(id),
        None => fixture.context(),
    };
    PluginRegistry::builtin()
        .create(entry_point, context)
        .expect("plugin")
}

/// Builds and stores a configuration, then a task and execution using it.
fn prepare_run(fixture: &Fixture, entry_point: &str) -> (PlaybookConfiguration, Task) {
    let plugin = create(fixture, entry_point, None);
    let record =
        create_playbook_configuration(plugin.as_ref(), "run", &cluster(true), &servers(2), &[])
            .unwrap();

    let mut execution = Execution::new("e1");
    execution.playbook_configuration_id = Some(record.model_id.clone());
    fixture.store.save_execution(&execution).unwrap();

    let task = Task::new("t1", "e1").with_playbook_configuration(&record.model_id);
    fixture.store.save_task(&task).unwrap();
    (record, task)
}

fn extra_vars(plugin: &mut Box<dyn Plugin>, task: &Task) -> Value {
    let command = plugin.compose_command(task).unwrap();
    match command.options.get("--extra-vars") {
        Some(OptionValue::Value(raw)) => serde_json::from_str(raw).unwrap(),
        other => panic!("no extra vars: {other:?}"),
    }
}

// ============================================================================
// Building Configurations
// ============================================================================

#[test]
fn build_requires_deployed_cluster() {
    let fixture = Fixture::new();
    let plugin = create(&fixture, "purge_cluster", None);

    let err = plugin
        .build_configuration(&cluster(false), &servers(1), &[])
        .unwrap_err();
    assert!(matches!(err, Error::ClusterNotDeployed { ref cluster } if cluster == "c1"));

    let config = plugin
        .build_configuration(&cluster(true), &servers(1), &[])
        .unwrap();
    assert!(!config.global_vars.is_empty());
    assert!(config.inventory.is_object());
}

#[test]
fn deploy_does_not_require_deployed_cluster() {
    let fixture = Fixture::new();
    let plugin = create(&fixture, "cluster_deploy", None);

    let config = plugin
        .build_configuration(&cluster(false), &servers(3), &[])
        .unwrap();
    assert_eq!(config.inventory["mons"].as_array().map(Vec::len), Some(3));
}

#[test]
fn end_to_end_purge_configuration() {
    let fixture = Fixture::new();
    let plugin = create(&fixture, "purge_cluster", None);
    let servers = vec![cephlcm::models::Server::new("s1").in_cluster("c1")];

    let config = plugin
        .build_configuration(&cluster(true), &servers, &[])
        .unwrap();

    assert_eq!(config.global_vars["fsid"], json!("c1"));
    assert_eq!(config.global_vars["cluster"], json!("ceph"));
    assert_eq!(
        config.global_vars["cluster_network"],
        config.global_vars["public_network"]
    );
}

#[test]
fn policy_is_checked_before_deployment_state() {
    let fixture = Fixture::new();
    let plugin = create(&fixture, "purge_cluster", None);
    let strangers = vec![cephlcm::models::Server::new("s9").in_cluster("c2")];

    let err = plugin
        .build_configuration(&cluster(false), &strangers, &[])
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let err = plugin
        .build_configuration(&cluster(true), &[], &[])
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn hints_are_validated() {
    let fixture = Fixture::new();
    let plugin = create(&fixture, "cluster_deploy", None);

    let err = plugin
        .build_configuration(
            &cluster(false),
            &servers(1),
            &[RawHint::new("no_such_hint", true)],
        )
        .unwrap_err();
    assert!(matches!(err, Error::Hints(_)));

    let config = plugin
        .build_configuration(
            &cluster(false),
            &servers(1),
            &[RawHint::new("dmcrypt", true)],
        )
        .unwrap();
    assert_eq!(config.global_vars["dmcrypt_journal_collocation"], json!(true));
}

#[test]
fn out_of_range_mon_count_is_rejected() {
    let fixture = Fixture::new();
    let plugin = create(&fixture, "cluster_deploy", None);

    for mon_count in [json!(-4), json!(u64::MAX)] {
        let err = plugin
            .build_configuration(
                &cluster(false),
                &servers(3),
                &[RawHint::new("mon_count", mon_count.clone())],
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "{mon_count}: {err}");
    }
}

#[test]
fn plugins_without_hints_ignore_raw_hints() {
    let fixture = Fixture::new();
    let plugin = create(&fixture, "purge_cluster", None);

    let config = plugin.build_configuration(
        &cluster(true),
        &servers(1),
        &[RawHint::new("anything", 1)],
    );
    assert!(config.is_ok());
}

#[test]
fn malformed_static_config_fails_at_construction() {
    let fixture = Fixture::new();
    fixture.write_plugin("purge_cluster", "install: {source: stable}\n");

    let err = PluginRegistry::builtin()
        .create("purge_cluster", fixture.context())
        .err()
        .expect("construction must fail");
    assert!(matches!(err, Error::ConfigLoad { .. }));
}

#[test]
fn created_configuration_is_persisted() {
    let fixture = Fixture::new();
    let plugin = create(&fixture, "cluster_deploy", None);

    let record =
        create_playbook_configuration(plugin.as_ref(), "deploy", &cluster(false), &servers(2), &[])
            .unwrap();

    let stored = fixture
        .store
        .find_playbook_configuration(&record.model_id)
        .unwrap()
        .unwrap();
    assert_eq!(stored, record);
    assert_eq!(stored.playbook_id, "cluster_deploy");
}

// ============================================================================
// Dynamic Inventory
// ============================================================================

#[test]
fn inventory_requires_configuration() {
    let fixture = Fixture::new();
    fixture.store.save_execution(&Execution::new("e1")).unwrap();
    fixture.store.save_task(&Task::new("t1", "e1")).unwrap();

    let plugin = create(&fixture, "purge_cluster", Some("t1"));
    let err = plugin.get_dynamic_inventory().unwrap_err();
    assert!(matches!(err, Error::UnknownConfiguration { ref task } if task == "t1"));

    // Misses are not remembered: once a configuration exists it is served.
    let builder = create(&fixture, "purge_cluster", None);
    let record =
        create_playbook_configuration(builder.as_ref(), "purge", &cluster(true), &servers(2), &[])
            .unwrap();
    let task = Task::new("t1", "e1").with_playbook_configuration(&record.model_id);
    fixture.store.save_task(&task).unwrap();

    let inventory = plugin.get_dynamic_inventory().unwrap();
    assert_eq!(inventory, Some(record.configuration.inventory));
}

#[test]
fn unbound_plugin_has_no_inventory() {
    let fixture = Fixture::new();
    let plugin = create(&fixture, "cluster_deploy", None);
    assert!(matches!(
        plugin.get_dynamic_inventory(),
        Err(Error::UnknownConfiguration { .. })
    ));
}

#[test]
fn configuration_is_found_through_execution() {
    let fixture = Fixture::new();
    let (record, _) = prepare_run(&fixture, "purge_cluster");
    // A task that only knows its execution.
    fixture.store.save_task(&Task::new("t2", "e1")).unwrap();

    let plugin = create(&fixture, "purge_cluster", Some("t2"));
    assert_eq!(
        plugin.get_dynamic_inventory().unwrap(),
        Some(record.configuration.inventory)
    );
}

#[test]
fn bound_configuration_is_memoized() {
    let fixture = Fixture::new();
    let (record, _) = prepare_run(&fixture, "purge_cluster");
    let plugin = create(&fixture, "purge_cluster", Some("t1"));
    let first = plugin.get_dynamic_inventory().unwrap();

    let mut changed = record.clone();
    changed.configuration.inventory = json!({"mons": []});
    fixture.store.save_playbook_configuration(&changed).unwrap();

    assert_eq!(plugin.get_dynamic_inventory().unwrap(), first);
}

// ============================================================================
// Command Composition
// ============================================================================

#[test]
fn playbook_command_line() {
    let fixture = Fixture::new();
    let (record, task) = prepare_run(&fixture, "cluster_deploy");
    let mut plugin = create(&fixture, "cluster_deploy", Some("t1"));

    let command = plugin.compose_command(&task).unwrap();
    let argv = command.commandline();

    assert_eq!(argv[0], "ansible-playbook");
    assert_eq!(&argv[1..3], &["--inventory-file", "/usr/bin/cephlcm-inventory"]);
    assert!(argv.contains(&"-vvv".to_string()));
    assert!(!argv.contains(&"--become".to_string()));
    assert_eq!(
        argv.last().map(String::as_str),
        Some(
            fixture
                .plugins_dir()
                .join("cluster_deploy/playbook.yaml")
                .to_str()
                .unwrap()
        )
    );
    assert_eq!(command.env["CEPHLCM_TASK_ID"], "t1");
    assert_eq!(command.env["CEPHLCM_ENTRY_POINT"], "cluster_deploy");

    let vars = extra_vars(&mut plugin, &task);
    let expected: Value = record
        .configuration
        .global_vars
        .clone()
        .into_iter()
        .collect::<serde_json::Map<_, _>>()
        .into();
    assert_eq!(vars, expected);
}

#[test]
fn compose_without_configuration_fails() {
    let fixture = Fixture::new();
    let mut plugin = create(&fixture, "cluster_deploy", None);
    let err = plugin.compose_command(&Task::new("t1", "e1")).unwrap_err();
    assert!(matches!(err, Error::UnknownConfiguration { .. }));
}

// ============================================================================
// Execution And Logs
// ============================================================================

#[test]
fn successful_run_logs_header_and_output() {
    let fixture = Fixture::new();
    fixture.executor.set_output(b"PLAY RECAP ok=3\n");
    let (_, task) = prepare_run(&fixture, "purge_cluster");
    let mut plugin = create(&fixture, "purge_cluster", Some("t1"));

    plugin.execute(&task, |process| process.wait()).unwrap();

    let log = String::from_utf8(fixture.store.read_execution_log("e1").unwrap()).unwrap();
    let lines: Vec<&str> = log.split('\n').collect();
    assert_eq!(lines[0], "");
    assert_eq!(lines[1], "");
    assert!(lines[2].contains(" Ansible commandline "));
    assert!(lines[3].starts_with("ansible-playbook --inventory-file"));
    assert!(lines[4].chars().all(|c| c == '='));
    assert!(log.ends_with("PLAY RECAP ok=3\n"));
}

#[test]
fn failed_run_logs_internal_error_and_output() {
    let fixture = Fixture::new();
    fixture.executor.set_output(b"fatal: [10.0.0.1]: UNREACHABLE!\n");
    let (_, task) = prepare_run(&fixture, "purge_cluster");
    let mut plugin = create(&fixture, "purge_cluster", Some("t1"));

    let err = plugin
        .execute(&task, |process| -> cephlcm::Result<()> {
            Err(Error::ProcessFailed {
                program: process.program().to_string(),
                code: 4,
            })
        })
        .unwrap_err();

    assert!(matches!(err, Error::ProcessFailed { code: 4, .. }));
    let log = String::from_utf8(fixture.store.read_execution_log("e1").unwrap()).unwrap();
    assert!(log.starts_with("\nInternal error\n\n"), "{log}");
    assert!(log.contains("Process 'ansible-playbook' failed with exit code 4"));
    assert!(log.ends_with("UNREACHABLE!\n"));
}

#[test]
fn log_failure_does_not_mask_run_error() {
    let fixture = Fixture::new();
    let (_, task) = prepare_run(&fixture, "purge_cluster");
    fixture.store.fail_log_writes(true);
    let mut plugin = create(&fixture, "purge_cluster", Some("t1"));

    let err = plugin
        .execute(&task, |_| -> cephlcm::Result<()> {
            Err(Error::Internal("ansible crashed".into()))
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "Internal error: ansible crashed");

    // A successful run stays successful too.
    plugin.execute(&task, |process| process.wait()).unwrap();
}

#[test]
fn fetch_directory_lives_for_one_run() {
    let fixture = Fixture::new();
    let (_, task) = prepare_run(&fixture, "cluster_deploy");
    let mut plugin = create(&fixture, "cluster_deploy", Some("t1"));

    plugin.execute(&task, |process| process.wait()).unwrap();

    let commands = fixture.executor.commands();
    let Some(OptionValue::Value(raw)) = commands[0].options.get("--extra-vars") else {
        panic!("no extra vars");
    };
    let vars: Value = serde_json::from_str(raw).unwrap();
    let fetch_dir = vars["fetch_directory"].as_str().unwrap().to_string();
    assert!(!std::path::Path::new(&fetch_dir).exists());
    assert_eq!(vars["fsid"], json!("c1"));
}

#[test]
fn fetch_directory_is_removed_after_failure() {
    let fixture = Fixture::new();
    let (_, task) = prepare_run(&fixture, "cluster_deploy");
    let mut plugin = create(&fixture, "cluster_deploy", Some("t1"));

    let result = plugin.execute(&task, |_| -> cephlcm::Result<()> {
        Err(Error::Internal("boom".into()))
    });
    assert!(result.is_err());

    let commands = fixture.executor.commands();
    let Some(OptionValue::Value(raw)) = commands[0].options.get("--extra-vars") else {
        panic!("no extra vars");
    };
    let vars: Value = serde_json::from_str(raw).unwrap();
    let fetch_dir = vars["fetch_directory"]
        .as_str()
        .expect("fetch directory passed to ansible");
    assert!(!std::path::Path::new(&fetch_dir).exists());
}
