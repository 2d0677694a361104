use std::io::Write;

use tpk_broker_memory::MemoryBroker;
use tpk_runtime::{converge, RunMode, RunSettings};
use tpk_schemas::EntityKind;

const TOPOLOGY: &str = r#"
groups:
  events:
    broadcast: true
    names: [events]
  orders:
    names: [order.created, order.paid]
    queues: { type: quorum }
    single_active_consumer: true
    bindings: events
  audit: [audit.log]
policies:
  - name: dlq-ttl
    pattern: "^dlq\\."
    definition: { message-ttl: 86400000 }
    priority: 1
"#;

const CREDENTIALS: &str = r#"
users:
  - username: admin
    password: admin-pw
    tags: [administrator]
  - username: svc
    password: svc-pw
    tags: [monitoring, management]
"#;

fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

#[test]
fn scenario_second_run_issues_no_mutations() {
    let topology = write_tmp(TOPOLOGY);
    let credentials = write_tmp(CREDENTIALS);
    let settings = RunSettings::new(vec![topology.path().to_path_buf()], credentials.path(), 42);
    let broker = MemoryBroker::new();

    let first = converge(&settings, &broker).unwrap();
    assert_eq!(first.kind(EntityKind::User).unwrap().creates.len(), 2);
    assert_eq!(first.kind(EntityKind::Policy).unwrap().creates.len(), 1);
    assert_eq!(first.kind(EntityKind::Queue).unwrap().creates.len(), 6);
    assert_eq!(first.kind(EntityKind::Exchange).unwrap().creates, vec!["//events"]);
    // audit.log binds through the default exchange: the queue declaration
    // already created it, so only the two `events` bindings are issued.
    assert_eq!(first.kind(EntityKind::Binding).unwrap().creates.len(), 2);
    assert_eq!(first.total_deletes(), 0);
    assert!(first.config_hash.is_some());

    broker.clear_calls();
    let second = converge(&settings, &broker).unwrap();
    assert!(second.is_converged());
    assert!(broker.calls().is_empty());
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.config_hash, second.config_hash);
}

#[test]
fn scenario_changed_seed_replaces_users_only() {
    let topology = write_tmp(TOPOLOGY);
    let credentials = write_tmp(CREDENTIALS);
    let broker = MemoryBroker::new();
    let path = vec![topology.path().to_path_buf()];

    converge(&RunSettings::new(path.clone(), credentials.path(), 1), &broker).unwrap();
    let reseeded = converge(&RunSettings::new(path, credentials.path(), 2), &broker).unwrap();

    let users = reseeded.kind(EntityKind::User).unwrap();
    assert_eq!(users.deletes.len(), 2);
    assert_eq!(users.creates.len(), 2);
    assert_eq!(reseeded.total_creates(), 2);
}

#[test]
fn scenario_plan_mode_reports_without_touching_the_broker() {
    let topology = write_tmp(TOPOLOGY);
    let credentials = write_tmp(CREDENTIALS);
    let settings = RunSettings::new(vec![topology.path().to_path_buf()], credentials.path(), 42)
        .with_mode(RunMode::Plan);
    let broker = MemoryBroker::new();

    let report = converge(&settings, &broker).unwrap();
    assert!(broker.calls().is_empty());
    assert_eq!(broker.state().count(EntityKind::Queue), 0);
    assert_eq!(report.mode, RunMode::Plan);
    assert_eq!(report.kind(EntityKind::Queue).unwrap().creates.len(), 6);
    assert_eq!(report.kind(EntityKind::Binding).unwrap().creates.len(), 2);
    assert!(report.kinds.iter().all(|k| !k.applied));
}

#[test]
fn scenario_report_never_carries_password_hashes() {
    let topology = write_tmp(TOPOLOGY);
    let credentials = write_tmp(CREDENTIALS);
    let settings = RunSettings::new(vec![topology.path().to_path_buf()], credentials.path(), 42);
    let broker = MemoryBroker::new();

    let report = converge(&settings, &broker).unwrap();
    let json = report.to_json_pretty().unwrap();
    let stored = broker.state().users["svc"].password_hash.clone();
    assert!(!json.contains(&stored));
    assert!(!json.contains("svc-pw"));
}
