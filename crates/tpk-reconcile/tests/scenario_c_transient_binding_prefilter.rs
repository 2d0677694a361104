use tpk_reconcile::*;
use tpk_schemas::{Binding, Queue};

#[test]
fn scenario_c_binding_into_auto_delete_queue_is_never_deleted() {
    let mut consumer_queue = Queue::durable("/", "tmp.consumer");
    consumer_queue.auto_delete = true;
    let queues = vec![Queue::durable("/", "orders"), consumer_queue];

    let observed = vec![
        Binding::to_queue("/", "events", "tmp.consumer", "tmp.consumer"),
        Binding::to_queue("/", "events", "orders", "orders"),
    ];
    let desired = vec![Binding::to_queue("/", "events", "orders", "orders")];

    let filtered = exclude_transient_bindings(observed, &queues);
    let plan = reconcile(&desired, filtered);

    assert!(plan.is_noop());
    assert!(plan
        .deletes
        .iter()
        .all(|b| b.destination != "tmp.consumer"));
}

#[test]
fn scenario_c_without_prefilter_the_binding_would_be_deleted() {
    let observed = vec![Binding::to_queue("/", "events", "tmp.consumer", "tmp.consumer")];
    let plan = reconcile::<Binding, Binding>(&[], observed);
    assert_eq!(plan.deletes.len(), 1);
}

#[test]
fn scenario_c_exclusive_destination_is_filtered_too() {
    let mut exclusive = Queue::durable("/", "rpc.reply");
    exclusive.exclusive = true;
    let kept = exclude_transient_bindings(
        vec![Binding::to_queue("/", "rpc", "rpc.reply", "rpc.reply")],
        &[exclusive],
    );
    assert!(kept.is_empty());
}
