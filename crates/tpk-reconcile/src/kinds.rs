//! Per-kind reconcile hooks.
//!
//! Skip rules:
//! - Queue: unnamed, `amq.` names, auto-delete, exclusive
//! - Binding: default-exchange source, `amq.` sources
//! - Exchange, Policy, User: never skipped

use tpk_schemas::{
    Binding, Entity, EntityKind, Exchange, ObservedEntity, ObservedUser, Policy, Queue,
    UnrecognizedEntity, User,
};

use crate::{Reconcilable, SkipReason};

const BROKER_NAMESPACE: &str = "amq.";

fn unrecognized(expected: EntityKind, found: &ObservedEntity) -> UnrecognizedEntity {
    UnrecognizedEntity {
        expected,
        found: found.kind(),
    }
}

impl Reconcilable for Queue {
    const KIND: EntityKind = EntityKind::Queue;
    type Observed = Queue;

    fn skip_reason(&self) -> Option<SkipReason> {
        if self.name.is_empty() {
            Some(SkipReason::Unnamed)
        } else if self.name.contains(BROKER_NAMESPACE) {
            Some(SkipReason::BrokerInternal)
        } else if self.auto_delete {
            Some(SkipReason::AutoDelete)
        } else if self.exclusive {
            Some(SkipReason::Exclusive)
        } else {
            None
        }
    }

    fn from_observed(entity: ObservedEntity) -> Result<Queue, UnrecognizedEntity> {
        match entity {
            ObservedEntity::Queue(q) => Ok(q),
            other => Err(unrecognized(Self::KIND, &other)),
        }
    }

    fn to_entity(&self) -> Entity {
        Entity::Queue(self.clone())
    }
}

impl Reconcilable for Binding {
    const KIND: EntityKind = EntityKind::Binding;
    type Observed = Binding;

    fn skip_reason(&self) -> Option<SkipReason> {
        if self.source.is_empty() {
            Some(SkipReason::DefaultExchange)
        } else if self.source.contains(BROKER_NAMESPACE) {
            Some(SkipReason::BrokerInternal)
        } else {
            None
        }
    }

    fn from_observed(entity: ObservedEntity) -> Result<Binding, UnrecognizedEntity> {
        match entity {
            ObservedEntity::Binding(b) => Ok(b),
            other => Err(unrecognized(Self::KIND, &other)),
        }
    }

    fn to_entity(&self) -> Entity {
        Entity::Binding(self.clone())
    }
}

impl Reconcilable for Exchange {
    const KIND: EntityKind = EntityKind::Exchange;
    type Observed = Exchange;

    fn from_observed(entity: ObservedEntity) -> Result<Exchange, UnrecognizedEntity> {
        match entity {
            ObservedEntity::Exchange(e) => Ok(e),
            other => Err(unrecognized(Self::KIND, &other)),
        }
    }

    fn to_entity(&self) -> Entity {
        Entity::Exchange(self.clone())
    }
}

impl Reconcilable for Policy {
    const KIND: EntityKind = EntityKind::Policy;
    type Observed = Policy;

    fn from_observed(entity: ObservedEntity) -> Result<Policy, UnrecognizedEntity> {
        match entity {
            ObservedEntity::Policy(p) => Ok(p),
            other => Err(unrecognized(Self::KIND, &other)),
        }
    }

    fn to_entity(&self) -> Entity {
        Entity::Policy(self.clone())
    }
}

impl Reconcilable for User {
    const KIND: EntityKind = EntityKind::User;
    // Tag lists are joined during `Into<User>`.
    type Observed = ObservedUser;

    fn from_observed(entity: ObservedEntity) -> Result<ObservedUser, UnrecognizedEntity> {
        match entity {
            ObservedEntity::User(u) => Ok(u),
            other => Err(unrecognized(Self::KIND, &other)),
        }
    }

    fn to_entity(&self) -> Entity {
        Entity::User(self.clone())
    }
}

/// Extract the typed observed values for `T` from an adapter listing.
pub fn observed_of<T: Reconcilable>(
    entities: Vec<ObservedEntity>,
) -> Result<Vec<T::Observed>, UnrecognizedEntity> {
    entities.into_iter().map(T::from_observed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpk_schemas::{ExchangeType, DEFAULT_VHOST};

    fn q(name: &str) -> Queue {
        Queue::durable(DEFAULT_VHOST, name)
    }

    #[test]
    fn queue_skip_rules() {
        assert_eq!(q("").skip_reason(), Some(SkipReason::Unnamed));
        assert_eq!(q("amq.gen-abc").skip_reason(), Some(SkipReason::BrokerInternal));
        assert_eq!(q("x.amq.y").skip_reason(), Some(SkipReason::BrokerInternal));

        let mut auto = q("c");
        auto.auto_delete = true;
        assert_eq!(auto.skip_reason(), Some(SkipReason::AutoDelete));

        let mut excl = q("d");
        excl.exclusive = true;
        assert_eq!(excl.skip_reason(), Some(SkipReason::Exclusive));

        assert!(!q("orders").skip());
    }

    #[test]
    fn binding_skip_rules() {
        assert_eq!(
            Binding::to_queue("/", "", "q", "q").skip_reason(),
            Some(SkipReason::DefaultExchange)
        );
        assert_eq!(
            Binding::to_queue("/", "amq.topic", "q", "q").skip_reason(),
            Some(SkipReason::BrokerInternal)
        );
        assert!(!Binding::to_queue("/", "events", "q", "q").skip());
    }

    #[test]
    fn exchanges_policies_users_never_skip() {
        assert!(!Exchange::durable("/", "amq.direct", ExchangeType::Direct).skip());
        let u = User {
            name: "guest".to_string(),
            password_hash: String::new(),
            hashing_algorithm: String::new(),
            tags: String::new(),
        };
        assert!(!u.skip());
    }

    #[test]
    fn observed_of_rejects_foreign_kinds() {
        let err = observed_of::<Queue>(vec![
            ObservedEntity::Queue(q("a")),
            ObservedEntity::Exchange(Exchange::durable("/", "x", ExchangeType::Fanout)),
        ])
        .unwrap_err();
        assert_eq!(err.expected, EntityKind::Queue);
        assert_eq!(err.found, EntityKind::Exchange);
    }
}
