//! `tpk apply` / `tpk plan`.

use std::fs;

use anyhow::{Context, Result};
use serde_json::Value;
use tpk_broker_http::HttpBroker;
use tpk_config::{load_layered_yaml, resolve_broker_connection};
use tpk_runtime::{load_inputs, Orchestrator, RunMode, RunReport, RunSettings};
use tracing::info;

use super::ConvergeArgs;

pub fn run(args: ConvergeArgs, mode: RunMode) -> Result<()> {
    let settings =
        RunSettings::new(args.topology, args.credentials, args.seed).with_mode(mode);

    // Bad topology or credentials must fail before the broker is contacted.
    let inputs = load_inputs(&settings).context("loading topology and credentials failed")?;

    let broker_settings = match &args.settings {
        Some(path) => {
            load_layered_yaml(std::slice::from_ref(path))
                .with_context(|| format!("loading settings failed: {}", path.display()))?
                .config_json
        }
        None => Value::Null,
    };
    let conn = resolve_broker_connection(&broker_settings)
        .context("resolving broker connection failed")?;
    let broker = HttpBroker::new(&conn).context("building broker client failed")?;
    info!(broker = %broker.base_url(), %mode, "broker connection ready");

    let orchestrator = Orchestrator::new(broker, mode);
    let mut report = orchestrator
        .run(&inputs.desired)
        .with_context(|| format!("{} aborted", mode))?;
    report.config_hash = Some(inputs.document.config_hash.clone());

    print_summary(&report);

    if let Some(path) = &args.report {
        let json = report.to_json_pretty().context("serializing run report failed")?;
        fs::write(path, json)
            .with_context(|| format!("writing run report failed: {}", path.display()))?;
        println!("report={}", path.display());
    }

    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("run_id={}", report.run_id);
    println!("mode={}", report.mode);
    println!(
        "config_hash={}",
        report.config_hash.as_deref().unwrap_or("UNKNOWN")
    );
    for k in &report.kinds {
        println!(
            "kind={} desired={} observed={} unchanged={} creates={} deletes={} skipped={}",
            k.kind,
            k.desired,
            k.observed,
            k.unchanged,
            k.creates.len(),
            k.deletes.len(),
            k.skipped.len()
        );
        for target in &k.deletes {
            println!("  - {}", target);
        }
        for target in &k.creates {
            println!("  + {}", target);
        }
    }
    println!(
        "operations={}",
        report.total_creates() + report.total_deletes()
    );
}
