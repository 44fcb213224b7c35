use std::{io::IsTerminal, path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use fareguard::{
    FareguardError, Harness, HarnessOptions, LocalClient, MemoryTierResolver, RunLog,
    ScenarioKind, ServiceOptions, ShutdownHandle, SystemClock, Tier, mask_token,
};

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Scenario {
    /// One worker, a random identity per request.
    Sustained,
    /// One worker hammering a single identity.
    Burst,
    /// One worker per identity (up to five), rate split evenly.
    Distributed,
    /// 30 s sustained at 5/min, 5 s pause, 60 s burst at 10/s.
    Mixed,
}

impl From<Scenario> for ScenarioKind {
    fn from(value: Scenario) -> Self {
        match value {
            Scenario::Sustained => ScenarioKind::Sustained,
            Scenario::Burst => ScenarioKind::Burst,
            Scenario::Distributed => ScenarioKind::Distributed,
            Scenario::Mixed => ScenarioKind::Mixed,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "fareguard-stress",
    about = "Load simulation harness for fareguard"
)]
struct Args {
    #[arg(long, value_enum, default_value_t = Scenario::Burst)]
    scenario: Scenario,

    #[arg(long, default_value_t = 60)]
    duration_s: u64,

    /// Requests per second. Split across workers for `distributed`.
    #[arg(long, default_value_t = 10.0)]
    rps: f64,

    /// JSON list of `{ "token": ..., "permission_level": ... }`.
    #[arg(long)]
    users_file: Option<PathBuf>,

    /// Identities generated per tier when no users file is given.
    #[arg(long, default_value_t = 2)]
    demo_users_per_tier: usize,

    /// Service configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,

    /// Seeds the harness, and synthesis too unless the config sets its own seed.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    max_requests: Option<u64>,

    /// Append one line per request to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log: String,
}

fn demo_resolver(options: &ServiceOptions, per_tier: usize) -> MemoryTierResolver {
    let mut resolver = MemoryTierResolver::new(options.tiers);
    for tier in [Tier::Free, Tier::Plus, Tier::Pro] {
        for i in 0..per_tier.max(1) {
            resolver = resolver.with_identity(format!("demo-{tier}-token-{i:04}"), tier);
        }
    }
    resolver
}

fn print_breakdown(harness: &Harness<LocalClient>) {
    let mut admitted: Vec<_> = harness.stats().admitted_by_identity().into_iter().collect();
    admitted.sort();

    if admitted.is_empty() {
        return;
    }

    println!("admitted per identity:");
    for (token, count) in admitted {
        println!("  {}: {count}", mask_token(&token));
    }
}

fn service_options(args: &Args) -> Result<ServiceOptions, FareguardError> {
    let mut options = match &args.config {
        Some(path) => ServiceOptions::from_path(path)?,
        None => ServiceOptions::default(),
    };
    if options.seed.is_none() {
        options.seed = args.seed;
    }
    Ok(options)
}

/// Stops the harness on Ctrl-C, and on SIGTERM where available.
///
/// The SIGTERM handler is registered before this returns, so a `kill` sent
/// once the run has started always ends in a report.
fn watch_signals(shutdown: ShutdownHandle) -> Result<(), FareguardError> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let signal = tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|_| "interrupt"),
            _ = terminate.recv() => Ok("terminate"),
        };
        #[cfg(not(unix))]
        let signal = tokio::signal::ctrl_c().await.map(|_| "interrupt");

        match signal {
            Ok(signal) => {
                tracing::warn!(signal, "stopping, finishing in-flight requests");
                shutdown.shutdown();
            }
            Err(err) => tracing::error!(error = ?err, "failed to listen for shutdown signals"),
        }
    });

    Ok(())
}

async fn run(args: Args) -> Result<(), FareguardError> {
    let options = service_options(&args)?;

    let resolver = match &args.users_file {
        Some(path) => MemoryTierResolver::from_path(options.tiers, path)?,
        None => demo_resolver(&options, args.demo_users_per_tier),
    };
    let pool = resolver.tokens();
    if pool.is_empty() {
        return Err(FareguardError::EmptyIdentityPool);
    }

    let dispatcher = Arc::new(options.build_dispatcher(Arc::new(resolver), Arc::new(SystemClock))?);
    dispatcher
        .admission()
        .run_cleanup_loop_with_config(*options.cleanup_interval_ms);

    let log = match &args.log_file {
        Some(path) => RunLog::with_file(path)?,
        None => RunLog::in_memory(),
    };

    let harness = Harness::new(
        LocalClient::new(Arc::clone(&dispatcher)),
        pool,
        HarnessOptions {
            timeout: Duration::from_millis(args.timeout_ms),
            seed: args.seed,
            max_requests: args.max_requests,
            ..HarnessOptions::default()
        },
        log,
    )?;

    let scenario =
        ScenarioKind::from(args.scenario).into_scenario(Duration::from_secs(args.duration_s), args.rps)?;

    eprintln!(
        "fareguard-stress: scenario={} duration_s={} rps={} seed={} max_requests={:?}",
        scenario.name(),
        args.duration_s,
        args.rps,
        harness.master_seed(),
        args.max_requests
    );

    watch_signals(harness.shutdown_handle())?;

    let stats = harness.run(&scenario).await;
    dispatcher.admission().stop_cleanup_loop();

    println!("{stats}");
    print_breakdown(&harness);

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "stress run failed");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_seed_fills_missing_service_seed() {
        let args = Args::parse_from(["fareguard-stress", "--seed", "7"]);
        let options = service_options(&args).unwrap();
        assert_eq!(options.seed, Some(7));
    }

    #[test]
    fn config_seed_wins_over_cli_seed() {
        let path = std::env::temp_dir().join(format!("fareguard-stress-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "seed": 42 }"#).unwrap();

        let args = Args::parse_from([
            "fareguard-stress",
            "--seed",
            "7",
            "--config",
            path.to_str().unwrap(),
        ]);
        let options = service_options(&args).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(options.seed, Some(42));
    }

    #[test]
    fn no_seed_anywhere_stays_unseeded() {
        let args = Args::parse_from(["fareguard-stress"]);
        assert_eq!(service_options(&args).unwrap().seed, None);
    }
}
