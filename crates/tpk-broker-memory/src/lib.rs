//! Deterministic in-memory broker adapter.
//!
//! Design decisions (kept intentionally simple/deterministic):
//! - Storage is one `BTreeMap` per kind keyed by natural key, so every
//!   listing comes back in a stable order.
//! - Broker-like side effects:
//!     - declaring a queue adds its implicit default-exchange binding
//!     - deleting a queue or exchange drops every binding that references it
//!     - re-declaring a queue or exchange with different properties => 406
//!     - users and policies are overwritten on create
//!     - deleting something that does not exist => 404
//!     - binding from (or unbinding from) the default exchange => 403
//!     - declaring or deleting a built-in (`""`, `amq.*`) exchange => 403;
//!       seeded built-ins can be bound from but are never listed
//!     - binding with a missing source or destination => 404
//! - Users are listed with tags as a list, the way current brokers report them.
//! - Every create/delete call is recorded, including calls that fail.
//! - No randomness. No timestamps.
//!
//! Interior mutability (`RefCell`) because `BrokerAdapter` takes `&self`.
//! Single-threaded by construction; not `Sync`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

use tpk_schemas::{
    is_builtin_exchange, Binding, BrokerAdapter, BrokerError, BrokerOp, DestinationType, Entity,
    EntityKind, Exchange, ObservedEntity, ObservedUser, Policy, Queue, Tags, User,
};
use tracing::debug;

type NameKey = (String, String);
type BindingKey = (String, String, String, DestinationType, String);

const PRECONDITION_FAILED: u16 = 406;
const NOT_FOUND: u16 = 404;
const ACCESS_REFUSED: u16 = 403;

/// Broker contents, by kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrokerState {
    pub users: BTreeMap<String, User>,
    pub policies: BTreeMap<NameKey, Policy>,
    pub queues: BTreeMap<NameKey, Queue>,
    pub exchanges: BTreeMap<NameKey, Exchange>,
    pub bindings: BTreeMap<BindingKey, Binding>,
}

impl BrokerState {
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::User => self.users.len(),
            EntityKind::Policy => self.policies.len(),
            EntityKind::Queue => self.queues.len(),
            EntityKind::Exchange => self.exchanges.len(),
            EntityKind::Binding => self.bindings.len(),
        }
    }
}

/// One recorded mutation attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerCall {
    pub op: BrokerOp,
    pub kind: EntityKind,
    pub target: String,
}

impl fmt::Display for BrokerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.op, self.kind, self.target)
    }
}

/// One-shot failure: the first call matching `op`/`kind` (and `target`
/// when given) fails with `status`, then the injection is consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectedFailure {
    pub op: BrokerOp,
    pub kind: EntityKind,
    pub target: Option<String>,
    pub status: u16,
}

impl InjectedFailure {
    pub fn new(op: BrokerOp, kind: EntityKind) -> Self {
        Self {
            op,
            kind,
            target: None,
            status: 500,
        }
    }

    pub fn on(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    fn matches(&self, op: BrokerOp, kind: EntityKind, target: &str) -> bool {
        self.op == op
            && self.kind == kind
            && self.target.as_deref().map_or(true, |t| t == target)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBroker {
    state: RefCell<BrokerState>,
    calls: RefCell<Vec<BrokerCall>>,
    failure: RefCell<Option<InjectedFailure>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity as-is, bypassing broker semantics and the call log.
    /// For pre-seeding state a client did not create (transient queues,
    /// broker-internal names, drifted properties).
    pub fn seed(&self, entity: impl Into<Entity>) {
        let mut state = self.state.borrow_mut();
        match entity.into() {
            Entity::User(u) => {
                state.users.insert(u.name.clone(), u);
            }
            Entity::Policy(p) => {
                state.policies.insert(name_key(&p.vhost, &p.name), p);
            }
            Entity::Queue(q) => {
                state.queues.insert(name_key(&q.vhost, &q.name), q);
            }
            Entity::Exchange(e) => {
                state.exchanges.insert(name_key(&e.vhost, &e.name), e);
            }
            Entity::Binding(b) => {
                state.bindings.insert(binding_key(&b), b);
            }
        }
    }

    /// Arm a one-shot failure. Replaces any pending one.
    pub fn fail_once(&self, failure: InjectedFailure) {
        *self.failure.borrow_mut() = Some(failure);
    }

    pub fn state(&self) -> BrokerState {
        self.state.borrow().clone()
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn queue(&self, vhost: &str, name: &str) -> Option<Queue> {
        self.state
            .borrow()
            .queues
            .get(&name_key(vhost, name))
            .cloned()
    }

    pub fn has_binding(&self, binding: &Binding) -> bool {
        self.state
            .borrow()
            .bindings
            .contains_key(&binding_key(binding))
    }

    fn take_failure(
        &self,
        op: BrokerOp,
        kind: EntityKind,
        target: &str,
    ) -> Result<(), BrokerError> {
        let mut slot = self.failure.borrow_mut();
        match slot.as_ref() {
            Some(f) if f.matches(op, kind, target) => {
                let status = f.status;
                *slot = None;
                Err(rejected(op, kind, target, status, "injected failure"))
            }
            _ => Ok(()),
        }
    }

    fn record(&self, op: BrokerOp, entity: &Entity) -> String {
        let target = entity.label();
        debug!(%op, kind = %entity.kind(), %target, "memory broker call");
        self.calls.borrow_mut().push(BrokerCall {
            op,
            kind: entity.kind(),
            target: target.clone(),
        });
        target
    }
}

impl BrokerAdapter for MemoryBroker {
    fn list(&self, kind: EntityKind) -> Result<Vec<ObservedEntity>, BrokerError> {
        self.take_failure(BrokerOp::List, kind, "")?;
        let state = self.state.borrow();
        let out: Vec<ObservedEntity> = match kind {
            EntityKind::User => state
                .users
                .values()
                .map(|u| ObservedEntity::User(observed_user(u)))
                .collect(),
            EntityKind::Policy => state
                .policies
                .values()
                .cloned()
                .map(ObservedEntity::Policy)
                .collect(),
            EntityKind::Queue => state
                .queues
                .values()
                .cloned()
                .map(ObservedEntity::Queue)
                .collect(),
            EntityKind::Exchange => state
                .exchanges
                .values()
                .filter(|e| !is_builtin_exchange(&e.name))
                .cloned()
                .map(ObservedEntity::Exchange)
                .collect(),
            EntityKind::Binding => state
                .bindings
                .values()
                .cloned()
                .map(ObservedEntity::Binding)
                .collect(),
        };
        Ok(out)
    }

    fn create(&self, entity: &Entity) -> Result<(), BrokerError> {
        let op = BrokerOp::Create;
        let target = self.record(op, entity);
        self.take_failure(op, entity.kind(), &target)?;

        let mut state = self.state.borrow_mut();
        match entity {
            Entity::User(u) => {
                state.users.insert(u.name.clone(), u.clone());
            }
            Entity::Policy(p) => {
                state.policies.insert(name_key(&p.vhost, &p.name), p.clone());
            }
            Entity::Queue(q) => {
                let key = name_key(&q.vhost, &q.name);
                if let Some(existing) = state.queues.get(&key) {
                    if existing != q {
                        return Err(rejected(
                            op,
                            EntityKind::Queue,
                            &target,
                            PRECONDITION_FAILED,
                            "inequivalent arg for queue",
                        ));
                    }
                    return Ok(());
                }
                state.queues.insert(key, q.clone());
                let implicit =
                    Binding::to_queue(q.vhost.clone(), "", q.name.clone(), q.name.clone());
                state.bindings.insert(binding_key(&implicit), implicit);
            }
            Entity::Exchange(e) => {
                if is_builtin_exchange(&e.name) {
                    return Err(rejected(
                        op,
                        EntityKind::Exchange,
                        &target,
                        ACCESS_REFUSED,
                        "exchange name is reserved",
                    ));
                }
                let key = name_key(&e.vhost, &e.name);
                match state.exchanges.get(&key) {
                    Some(existing) if existing != e => {
                        return Err(rejected(
                            op,
                            EntityKind::Exchange,
                            &target,
                            PRECONDITION_FAILED,
                            "inequivalent arg for exchange",
                        ));
                    }
                    Some(_) => {}
                    None => {
                        state.exchanges.insert(key, e.clone());
                    }
                }
            }
            Entity::Binding(b) => {
                if b.source.is_empty() {
                    return Err(rejected(
                        op,
                        EntityKind::Binding,
                        &target,
                        ACCESS_REFUSED,
                        "operation not permitted on the default exchange",
                    ));
                }
                if !state.exchanges.contains_key(&name_key(&b.vhost, &b.source)) {
                    return Err(rejected(
                        op,
                        EntityKind::Binding,
                        &target,
                        NOT_FOUND,
                        "source exchange not found",
                    ));
                }
                let destination = name_key(&b.vhost, &b.destination);
                let destination_exists = match b.destination_type {
                    DestinationType::Queue => state.queues.contains_key(&destination),
                    DestinationType::Exchange => state.exchanges.contains_key(&destination),
                };
                if !destination_exists {
                    return Err(rejected(
                        op,
                        EntityKind::Binding,
                        &target,
                        NOT_FOUND,
                        "destination not found",
                    ));
                }
                state.bindings.insert(binding_key(b), b.clone());
            }
        }
        Ok(())
    }

    fn delete(&self, entity: &Entity) -> Result<(), BrokerError> {
        let op = BrokerOp::Delete;
        let target = self.record(op, entity);
        self.take_failure(op, entity.kind(), &target)?;

        let mut state = self.state.borrow_mut();
        let removed = match entity {
            Entity::User(u) => state.users.remove(&u.name).is_some(),
            Entity::Policy(p) => state
                .policies
                .remove(&name_key(&p.vhost, &p.name))
                .is_some(),
            Entity::Queue(q) => {
                let removed = state.queues.remove(&name_key(&q.vhost, &q.name)).is_some();
                if removed {
                    state.bindings.retain(|_, b| {
                        !(b.vhost == q.vhost
                            && b.destination_type == DestinationType::Queue
                            && b.destination == q.name)
                    });
                }
                removed
            }
            Entity::Exchange(e) => {
                if is_builtin_exchange(&e.name) {
                    return Err(rejected(
                        op,
                        EntityKind::Exchange,
                        &target,
                        ACCESS_REFUSED,
                        "exchange name is reserved",
                    ));
                }
                let removed = state
                    .exchanges
                    .remove(&name_key(&e.vhost, &e.name))
                    .is_some();
                if removed {
                    state.bindings.retain(|_, b| {
                        !(b.vhost == e.vhost
                            && (b.source == e.name
                                || (b.destination_type == DestinationType::Exchange
                                    && b.destination == e.name)))
                    });
                }
                removed
            }
            Entity::Binding(b) => {
                if b.source.is_empty() {
                    return Err(rejected(
                        op,
                        EntityKind::Binding,
                        &target,
                        ACCESS_REFUSED,
                        "operation not permitted on the default exchange",
                    ));
                }
                state.bindings.remove(&binding_key(b)).is_some()
            }
        };

        if removed {
            Ok(())
        } else {
            Err(rejected(op, entity.kind(), &target, NOT_FOUND, "Object Not Found"))
        }
    }
}

fn name_key(vhost: &str, name: &str) -> NameKey {
    (vhost.to_string(), name.to_string())
}

fn binding_key(b: &Binding) -> BindingKey {
    (
        b.vhost.clone(),
        b.source.clone(),
        b.destination.clone(),
        b.destination_type,
        b.properties_key.clone(),
    )
}

fn observed_user(u: &User) -> ObservedUser {
    ObservedUser {
        name: u.name.clone(),
        password_hash: u.password_hash.clone(),
        hashing_algorithm: u.hashing_algorithm.clone(),
        tags: Tags::List(u.tag_list().into_iter().map(str::to_string).collect()),
    }
}

fn rejected(
    op: BrokerOp,
    kind: EntityKind,
    target: &str,
    status: u16,
    reason: &str,
) -> BrokerError {
    BrokerError::Request {
        op,
        kind,
        target: target.to_string(),
        status,
        body: format!(r#"{{"error":"{status}","reason":"{reason}"}}"#),
    }
}
