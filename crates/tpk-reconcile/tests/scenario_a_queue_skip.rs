use tpk_reconcile::*;
use tpk_schemas::Queue;

fn q(name: &str) -> Queue {
    Queue::durable("/", name)
}

#[test]
fn scenario_a_creates_missing_queue_and_deletes_nothing() {
    let mut transient = q("c");
    transient.auto_delete = true;

    let plan = reconcile(&[q("a"), q("b")], vec![q("a"), transient, q("amq.x")]);

    assert_eq!(plan.creates, vec![q("b")]);
    assert!(plan.deletes.is_empty());
    assert_eq!(plan.unchanged, 1);

    let reasons: Vec<SkipReason> = plan.skipped.iter().map(|s| s.reason).collect();
    assert_eq!(reasons, vec![SkipReason::AutoDelete, SkipReason::BrokerInternal]);
}

#[test]
fn scenario_a_undeclared_managed_queue_is_deleted() {
    let plan = reconcile(&[q("a")], vec![q("a"), q("stale")]);
    assert_eq!(plan.deletes, vec![q("stale")]);
    assert!(plan.creates.is_empty());
}

#[test]
fn scenario_a_exclusive_queue_survives() {
    let mut exclusive = q("reply-to");
    exclusive.exclusive = true;
    let plan = reconcile::<Queue, Queue>(&[], vec![exclusive]);
    assert!(plan.deletes.is_empty());
    assert_eq!(plan.skipped[0].reason, SkipReason::Exclusive);
}
