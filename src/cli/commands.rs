//! CLI command implementations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use super::DemoArgs;
use crate::cache::{CacheStats, EntrySnapshot, Settlement, SuspendOptions, Suspense, SuspenseCache};
use crate::types::config::{Config, CONFIG_FILE};
use crate::SuspenseResult;

/// Writes a default configuration file into `path`.
pub async fn init(path: Option<PathBuf>) -> SuspenseResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join(CONFIG_FILE);

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }

    Config::default_config().save(&config_path)?;

    println!("Configuration created at: {}", config_path.display());
    Ok(())
}

/// Prints the effective configuration as TOML.
pub async fn config_cmd(path: &Path, config: &Config) -> SuspenseResult<()> {
    if path.exists() {
        println!("# Loaded from {}", path.display());
    } else {
        println!("# {} not found, showing defaults", path.display());
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Prints the version.
pub fn version() {
    println!("suspense {}", env!("CARGO_PKG_VERSION"));
}

#[derive(Debug, Serialize)]
struct DemoStep {
    operation: &'static str,
    outcome: String,
}

#[derive(Debug, Serialize)]
struct DemoReport {
    key: Vec<String>,
    steps: Vec<DemoStep>,
    entries: Vec<EntrySnapshot<String>>,
    stats: CacheStats,
}

impl DemoReport {
    fn record(&mut self, operation: &'static str, outcome: impl Into<String>) {
        let outcome = outcome.into();
        tracing::debug!(operation, outcome = %outcome, "Demo step");
        self.steps.push(DemoStep { operation, outcome });
    }
}

/// How long the demo waits before checking that an entry expired.
fn past_lifespan(lifespan_ms: u64) -> Duration {
    Duration::from_millis(lifespan_ms.saturating_add(10))
}

fn describe(outcome: &Suspense<String, String>) -> String {
    match outcome {
        Suspense::Ready(value) => format!("ready: {}", value),
        Suspense::Pending(handle) => format!("pending (entry {})", handle.entry_id()),
        Suspense::Failed(error) => format!("failed: {}", error),
    }
}

/// Runs suspend, coalescing, settlement, peek, preload, expiry and clear
/// against a resolver that sleeps for `delay_ms`.
pub async fn demo(args: DemoArgs, config: &Config) -> SuspenseResult<()> {
    let cache: SuspenseCache<String, String, String> = SuspenseCache::new(&config.cache)?;

    let delay = Duration::from_millis(args.delay_ms);
    let fail = args.fail;
    let resolver = move |key: Vec<String>| async move {
        tokio::time::sleep(delay).await;
        if fail {
            Err(format!("{} not found", key.join("/")))
        } else {
            Ok(format!("value of {}", key.join("/")))
        }
    };

    let mut options = SuspendOptions::new();
    if let Some(ms) = args.lifespan_ms {
        options = options.with_lifespan(Duration::from_millis(ms));
    }

    let key = args.key.clone();
    let mut report = DemoReport {
        key: key.clone(),
        steps: Vec::new(),
        entries: Vec::new(),
        stats: CacheStats::default(),
    };

    let first = cache.suspend(&resolver, key.clone(), options.clone());
    report.record("suspend", describe(&first));

    let second = cache.suspend(&resolver, key.clone(), options.clone());
    let coalesced = match (&first, &second) {
        (Suspense::Pending(a), Suspense::Pending(b)) => a.same_computation(b),
        _ => false,
    };
    report.record("suspend", format!("{} (coalesced: {})", describe(&second), coalesced));

    let settlement = match first {
        Suspense::Pending(handle) => handle.await,
        _ => Settlement::Fulfilled,
    };
    report.record("await", settlement.to_string());

    let settled = cache.suspend(&resolver, key.clone(), options.clone());
    report.record("suspend", describe(&settled));

    let peeked = cache
        .peek(&key)
        .map(|value| format!("some: {}", value))
        .unwrap_or_else(|| "none".to_string());
    report.record("peek", peeked);

    let preloaded = match cache.preload(&resolver, key.clone(), options.clone()) {
        Ok(()) => "ok".to_string(),
        Err(error) => format!("error: {}", error),
    };
    report.record("preload", preloaded);

    if let (Some(ms), Settlement::Fulfilled) = (args.lifespan_ms, settlement) {
        tokio::time::sleep(past_lifespan(ms)).await;
        let outcome = match cache.peek(&key) {
            Some(value) => format!("some: {}", value),
            None => "none (expired)".to_string(),
        };
        report.record("peek", outcome);
    }

    report.entries = cache.snapshot();
    report.stats = cache.stats();

    report.record("clear", format!("removed: {}", cache.clear(&key)));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Key: [{}]", report.key.join(", "));
    for step in &report.steps {
        println!("  {:<8} {}", step.operation, step.outcome);
    }
    println!();
    println!("Entries before clear:");
    for entry in &report.entries {
        println!(
            "  #{} [{}] {} (lifespan: {})",
            entry.id,
            entry.key.join(", "),
            entry.status,
            entry
                .lifespan_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "none".to_string())
        );
    }
    println!();
    println!(
        "Lookups: {} (hits: {}, misses: {}, coalesced: {}, rejections: {}, hit rate: {:.0}%)",
        report.stats.lookups(),
        report.stats.hits,
        report.stats.misses,
        report.stats.coalesced,
        report.stats.rejections,
        report.stats.hit_rate() * 100.0
    );

    Ok(())
}
