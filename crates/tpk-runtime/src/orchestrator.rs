use chrono::Utc;
use tpk_config::{load_credentials, load_topology, CredentialSource, TopologyDocument};
use tpk_generate::{desired_topology, DesiredTopology};
use tpk_reconcile::{
    apply_plan, exclude_transient_bindings, observed_of, reconcile, Reconcilable, ReconcilePlan,
};
use tpk_schemas::{Binding, BrokerAdapter, EntityKind, Queue};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{KindReport, RunError, RunMode, RunReport, RunSettings};

/// Everything loaded from disk for one run.
#[derive(Clone, Debug)]
pub struct RunInputs {
    pub document: TopologyDocument,
    pub credentials: Vec<CredentialSource>,
    pub desired: DesiredTopology,
}

/// Load the topology and credentials named by `settings` and build the
/// desired state. Never touches the broker.
pub fn load_inputs(settings: &RunSettings) -> Result<RunInputs, RunError> {
    let document = load_topology(settings.topology_paths.as_slice())?;
    let credentials = load_credentials(&settings.credentials_path)?;
    let desired = desired_topology(&document, &credentials, settings.seed)?;
    Ok(RunInputs {
        document,
        credentials,
        desired,
    })
}

/// Load inputs, then run once against `adapter`.
pub fn converge<A: BrokerAdapter>(
    settings: &RunSettings,
    adapter: A,
) -> Result<RunReport, RunError> {
    let inputs = load_inputs(settings)?;
    let orchestrator = Orchestrator::new(adapter, settings.mode);
    let mut report = orchestrator.run(&inputs.desired)?;
    report.config_hash = Some(inputs.document.config_hash);
    Ok(report)
}

/// Drives the reconciler over every kind in the fixed order.
///
/// Each kind is listed immediately before it is reconciled, so bindings
/// see the implicit default-exchange bindings of queues declared earlier
/// in the same run.
pub struct Orchestrator<A> {
    adapter: A,
    mode: RunMode,
}

impl<A: BrokerAdapter> Orchestrator<A> {
    pub fn new(adapter: A, mode: RunMode) -> Self {
        Self { adapter, mode }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn run(&self, desired: &DesiredTopology) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, mode = %self.mode, "reconcile run started");

        let mut kinds = Vec::with_capacity(EntityKind::RECONCILE_ORDER.len());
        let mut queue_plan: Option<ReconcilePlan<Queue>> = None;

        for kind in EntityKind::RECONCILE_ORDER {
            let report = match kind {
                EntityKind::User => self.step(&desired.users)?.1,
                EntityKind::Policy => self.step(&desired.policies)?.1,
                EntityKind::Queue => {
                    let (plan, report) = self.step(&desired.queues)?;
                    queue_plan = Some(plan);
                    report
                }
                EntityKind::Exchange => self.step(&desired.exchanges)?.1,
                EntityKind::Binding => {
                    self.bindings_step(&desired.bindings, queue_plan.as_ref())?
                }
            };
            kinds.push(report);
        }

        let report = RunReport {
            run_id,
            mode: self.mode,
            config_hash: None,
            started_at,
            finished_at: Utc::now(),
            kinds,
        };
        info!(
            %run_id,
            creates = report.total_creates(),
            deletes = report.total_deletes(),
            skipped = report.total_skipped(),
            converged = report.is_converged(),
            "reconcile run finished"
        );
        Ok(report)
    }

    fn observed<T: Reconcilable>(&self) -> Result<Vec<T::Observed>, RunError> {
        let listed = self.adapter.list(T::KIND)?;
        Ok(observed_of::<T>(listed)?)
    }

    fn step<T: Reconcilable>(
        &self,
        desired: &[T],
    ) -> Result<(ReconcilePlan<T>, KindReport), RunError> {
        let observed = self.observed::<T>()?;
        self.settle(desired, observed)
    }

    /// Bindings into auto-delete or exclusive queues are dropped before the
    /// diff; queues are listed again for that, after their own step ran.
    fn bindings_step(
        &self,
        desired: &[Binding],
        queue_plan: Option<&ReconcilePlan<Queue>>,
    ) -> Result<KindReport, RunError> {
        let queues: Vec<Queue> = self.observed::<Queue>()?;
        let mut bindings = exclude_transient_bindings(self.observed::<Binding>()?, &queues);

        // A dry run declared nothing, so project the default-exchange
        // bindings the broker would have added for planned queues.
        if !self.mode.mutates() {
            if let Some(plan) = queue_plan {
                bindings.extend(plan.creates.iter().map(|q| {
                    Binding::to_queue(q.vhost.clone(), "", q.name.clone(), q.name.clone())
                }));
            }
        }

        Ok(self.settle(desired, bindings)?.1)
    }

    fn settle<T, U>(
        &self,
        desired: &[T],
        observed: Vec<U>,
    ) -> Result<(ReconcilePlan<T>, KindReport), RunError>
    where
        T: Reconcilable,
        U: Into<T>,
    {
        let observed_count = observed.len();
        let plan = reconcile(desired, observed);
        let mut report = KindReport::from_plan(&plan, desired.len(), observed_count);

        info!(
            kind = %plan.kind,
            creates = plan.creates.len(),
            deletes = plan.deletes.len(),
            skipped = plan.skipped.len(),
            unchanged = plan.unchanged,
            "planned"
        );

        if self.mode.mutates() && !plan.is_noop() {
            if let Err(e) = apply_plan(&self.adapter, &plan) {
                warn!(kind = %plan.kind, error = %e, "reconcile aborted");
                return Err(e.into());
            }
            report.applied = true;
        }
        Ok((plan, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tpk_schemas::{BrokerError, Entity, ObservedEntity, Policy};

    /// Records which kinds were listed and mutated, in call order.
    #[derive(Default)]
    struct KindTrace {
        log: RefCell<Vec<String>>,
        foreign_listing: bool,
    }

    impl BrokerAdapter for KindTrace {
        fn list(&self, kind: EntityKind) -> Result<Vec<ObservedEntity>, BrokerError> {
            self.log.borrow_mut().push(format!("list {kind}"));
            if self.foreign_listing && kind == EntityKind::Policy {
                return Ok(vec![ObservedEntity::Queue(Queue::durable("/", "x"))]);
            }
            Ok(Vec::new())
        }

        fn create(&self, entity: &Entity) -> Result<(), BrokerError> {
            self.log.borrow_mut().push(format!("create {}", entity.kind()));
            Ok(())
        }

        fn delete(&self, entity: &Entity) -> Result<(), BrokerError> {
            self.log.borrow_mut().push(format!("delete {}", entity.kind()));
            Ok(())
        }
    }

    fn desired() -> DesiredTopology {
        DesiredTopology {
            policies: vec![Policy {
                vhost: "/".to_string(),
                name: "p".to_string(),
                pattern: "^q".to_string(),
                definition: Default::default(),
                priority: 0,
                apply_to: Default::default(),
            }],
            queues: vec![Queue::durable("/", "q")],
            bindings: vec![Binding::to_queue("/", "ex", "q", "q")],
            ..DesiredTopology::default()
        }
    }

    #[test]
    fn kinds_are_listed_and_applied_in_reconcile_order() {
        let orchestrator = Orchestrator::new(KindTrace::default(), RunMode::Apply);
        let report = orchestrator.run(&desired()).unwrap();

        let log = orchestrator.adapter().log.borrow().clone();
        assert_eq!(
            log,
            vec![
                "list user",
                "list policy",
                "create policy",
                "list queue",
                "create queue",
                "list exchange",
                "list queue",
                "list binding",
                "create binding",
            ]
        );
        let order: Vec<EntityKind> = report.kinds.iter().map(|k| k.kind).collect();
        assert_eq!(order, EntityKind::RECONCILE_ORDER.to_vec());
    }

    #[test]
    fn plan_mode_lists_but_never_mutates() {
        let orchestrator = Orchestrator::new(KindTrace::default(), RunMode::Plan);
        let report = orchestrator.run(&desired()).unwrap();

        assert!(orchestrator
            .adapter()
            .log
            .borrow()
            .iter()
            .all(|l| l.starts_with("list ")));
        assert_eq!(report.total_creates(), 3);
        assert!(report.kinds.iter().all(|k| !k.applied));
    }

    #[test]
    fn plan_mode_projects_default_bindings_of_planned_queues() {
        let mut desired = desired();
        desired.bindings = vec![Binding::to_queue("/", "", "q", "q")];
        let orchestrator = Orchestrator::new(KindTrace::default(), RunMode::Plan);
        let report = orchestrator.run(&desired).unwrap();

        let bindings = report.kind(EntityKind::Binding).unwrap();
        assert!(bindings.creates.is_empty());
        assert_eq!(bindings.unchanged, 1);
    }

    #[test]
    fn foreign_entity_in_a_listing_is_unrecognized() {
        let adapter = KindTrace {
            foreign_listing: true,
            ..KindTrace::default()
        };
        let err = Orchestrator::new(adapter, RunMode::Apply)
            .run(&desired())
            .unwrap_err();
        assert!(matches!(err, RunError::Unrecognized(_)));
    }
}
