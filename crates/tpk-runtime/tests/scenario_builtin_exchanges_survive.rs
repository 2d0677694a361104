use tpk_broker_memory::MemoryBroker;
use tpk_generate::DesiredTopology;
use tpk_runtime::{Orchestrator, RunMode};
use tpk_schemas::{Binding, BrokerOp, EntityKind, Exchange, ExchangeType, Queue};

#[test]
fn scenario_broker_owned_exchanges_are_never_listed_or_deleted() {
    let broker = MemoryBroker::new();
    broker.seed(Exchange::durable("/", "", ExchangeType::Direct));
    broker.seed(Exchange::durable("/", "amq.topic", ExchangeType::Topic));
    broker.seed(Exchange::durable("/", "amq.fanout", ExchangeType::Fanout));
    broker.seed(Exchange::durable("/", "stale", ExchangeType::Direct));

    let mut consumer = Queue::durable("/", "tmp.quotes");
    consumer.auto_delete = true;
    broker.seed(consumer);
    broker.seed(Binding::to_queue("/", "amq.topic", "tmp.quotes", "quotes.#"));

    let report = Orchestrator::new(&broker, RunMode::Apply)
        .run(&DesiredTopology::default())
        .unwrap();

    let deletes: Vec<String> = broker
        .calls()
        .iter()
        .filter(|c| c.op == BrokerOp::Delete)
        .map(|c| c.to_string())
        .collect();
    assert_eq!(deletes, vec!["delete exchange //stale"]);

    let exchanges = report.kind(EntityKind::Exchange).unwrap();
    assert_eq!(exchanges.observed, 1);
    assert_eq!(broker.state().count(EntityKind::Exchange), 3);
    assert!(broker.has_binding(&Binding::to_queue("/", "amq.topic", "tmp.quotes", "quotes.#")));
}
