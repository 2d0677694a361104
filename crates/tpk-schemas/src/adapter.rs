use crate::{BrokerError, Entity, EntityKind, ObservedEntity};

/// Broker state surface consumed by the reconciler.
///
/// Implementations issue one call per entity and never retry. Kind-specific
/// details (vhost, binding properties key, ...) travel inside the entity.
///
/// `list(EntityKind::Exchange)` reports user-declarable exchanges only: the
/// nameless default exchange and `amq.*` exchanges are owned by the broker
/// and are not listed.
pub trait BrokerAdapter {
    fn list(&self, kind: EntityKind) -> Result<Vec<ObservedEntity>, BrokerError>;
    fn create(&self, entity: &Entity) -> Result<(), BrokerError>;
    fn delete(&self, entity: &Entity) -> Result<(), BrokerError>;
}

impl<A: BrokerAdapter + ?Sized> BrokerAdapter for &A {
    fn list(&self, kind: EntityKind) -> Result<Vec<ObservedEntity>, BrokerError> {
        (**self).list(kind)
    }

    fn create(&self, entity: &Entity) -> Result<(), BrokerError> {
        (**self).create(entity)
    }

    fn delete(&self, entity: &Entity) -> Result<(), BrokerError> {
        (**self).delete(entity)
    }
}

impl<A: BrokerAdapter + ?Sized> BrokerAdapter for Box<A> {
    fn list(&self, kind: EntityKind) -> Result<Vec<ObservedEntity>, BrokerError> {
        (**self).list(kind)
    }

    fn create(&self, entity: &Entity) -> Result<(), BrokerError> {
        (**self).create(entity)
    }

    fn delete(&self, entity: &Entity) -> Result<(), BrokerError> {
        (**self).delete(entity)
    }
}
