//! `tpk`: converge a broker onto a declarative topology.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tpk_runtime::RunMode;

use commands::ConvergeArgs;

#[derive(Parser)]
#[command(name = "tpk")]
#[command(about = "Topokeeper: declarative broker topology reconciler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the broker: list, diff, then delete and create until it
    /// matches the topology
    Apply(ConvergeArgs),

    /// Dry run: list and diff only, print what `apply` would change
    Plan(ConvergeArgs),

    /// Print the canonical merged topology and its hash
    ConfigHash {
        /// Layered YAML paths in merge order (base -> overlays)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Hash a password the way broker users are provisioned
    HashPassword {
        /// Plaintext password (prefer --password-env outside of local testing)
        #[arg(long, conflicts_with = "password_env")]
        password: Option<String>,

        /// Name of an env var holding the plaintext password
        #[arg(long = "password-env", conflicts_with = "password")]
        password_env: Option<String>,

        /// Salt seed; must match the seed given to apply/plan. Not needed
        /// with --check: the salt is read from the stored hash.
        #[arg(long, required_unless_present = "check")]
        seed: Option<u64>,

        /// Verify the password against this stored hash instead of printing one
        #[arg(long)]
        check: Option<String>,
    },
}

fn main() -> Result<()> {
    // dev-time convenience; real deployments export the variables
    dotenvy::from_filename(".env.local").ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Apply(args) => commands::converge::run(args, RunMode::Apply)?,
        Commands::Plan(args) => commands::converge::run(args, RunMode::Plan)?,

        Commands::ConfigHash { paths } => {
            let loaded = tpk_config::load_layered_yaml(paths.as_slice())?;
            tpk_config::TopologyDocument::from_loaded(&loaded)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::HashPassword {
            password,
            password_env,
            seed,
            check,
        } => {
            let plaintext = commands::read_password(password, password_env)?;
            match check {
                Some(stored) => {
                    if !tpk_generate::verify_password(&plaintext, &stored) {
                        anyhow::bail!("password does not match the given hash");
                    }
                    println!("verified=true");
                }
                None => {
                    let seed = seed.context("--seed is required unless --check is given")?;
                    let hash = tpk_generate::hash_password(&plaintext, seed);
                    println!("password_hash={}", hash);
                    println!(
                        "hashing_algorithm={}",
                        tpk_generate::password::SHA256_HASHING_ALGORITHM
                    );
                }
            }
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries only the key=value summary.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
