use tpk_schemas::{Binding, BrokerAdapter, BrokerError, DestinationType, Queue};
use tracing::{debug, info};

use crate::{Reconcilable, ReconcilePlan, Skipped};

/// Deterministic per-kind diff:
/// - observed equal to some desired => unchanged
/// - observed matching the skip predicate => skipped, never deleted
/// - any other observed => delete
/// - desired absent from observed => create
///
/// Equality is the entity's `PartialEq`; for bindings that is the key tuple.
pub fn reconcile<T, U>(desired: &[T], observed_raw: Vec<U>) -> ReconcilePlan<T>
where
    T: Reconcilable,
    U: Into<T>,
{
    let observed: Vec<T> = observed_raw.into_iter().map(Into::into).collect();
    let mut plan = ReconcilePlan::empty(T::KIND);

    for current in &observed {
        if desired.contains(current) {
            plan.unchanged += 1;
        } else if let Some(reason) = current.skip_reason() {
            debug!(kind = %plan.kind, entity = ?current, %reason, "skip");
            plan.skipped.push(Skipped {
                entity: current.clone(),
                reason,
            });
        } else {
            plan.deletes.push(current.clone());
        }
    }

    for wanted in desired {
        if !observed.contains(wanted) {
            plan.creates.push(wanted.clone());
        }
    }

    plan
}

/// Drop observed bindings into queues that are auto-delete or exclusive.
///
/// Such queues belong to their consumers; their bindings come and go with
/// them. Destinations not present in `queues` are kept.
pub fn exclude_transient_bindings(bindings: Vec<Binding>, queues: &[Queue]) -> Vec<Binding> {
    bindings
        .into_iter()
        .filter(|b| {
            if b.destination_type != DestinationType::Queue {
                return true;
            }
            let transient = queues.iter().any(|q| {
                q.vhost == b.vhost && q.name == b.destination && (q.auto_delete || q.exclusive)
            });
            if transient {
                debug!(
                    source = %b.source,
                    destination = %b.destination,
                    "transient binding excluded"
                );
            }
            !transient
        })
        .collect()
}

/// Apply a plan: deletes in observed order, then creates in desired order.
/// The first failure aborts; nothing after it is attempted.
pub fn apply_plan<T, A>(adapter: &A, plan: &ReconcilePlan<T>) -> Result<(), BrokerError>
where
    T: Reconcilable,
    A: BrokerAdapter + ?Sized,
{
    for entity in &plan.deletes {
        let entity = entity.to_entity();
        info!(kind = %plan.kind, target = %entity.label(), "delete");
        adapter.delete(&entity)?;
    }
    for entity in &plan.creates {
        let entity = entity.to_entity();
        info!(kind = %plan.kind, target = %entity.label(), "create");
        adapter.create(&entity)?;
    }
    Ok(())
}
