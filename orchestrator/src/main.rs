//! Simulated dashboard session
//!
//! Registers a small dashboard, drives every call through the orchestrator and
//! a resilient call wrapper backed by a flaky fake backend, then prints the
//! final session snapshot as JSON.

use clap::Parser;
use futures_util::future::join_all;
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use orchestrator::{CallPhase, CallSnapshot, Orchestrator, OrchestratorError};
use resilience::{RawError, ResilientCallWrapper};
use shared::{logging, session_info, session_warn, Clock, Priority, ResilienceSettings, TokioClock};

/// Dashboard buckets in drain order, with the section name used for call ids
const SECTIONS: [(&str, Priority); 4] = [
    ("summary", Priority::Critical),
    ("kpis", Priority::Important),
    ("charts", Priority::Secondary),
    ("exports", Priority::Background),
];

/// Runs a simulated dashboard session through the request orchestrator
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Simulates a prioritized, dependency-gated dashboard load")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Probability (0.0 - 1.0) that a simulated backend call fails with a 503
    #[arg(long, default_value = "0.2")]
    pub failure_rate: f64,

    /// Number of calls registered in each priority bucket
    #[arg(long, default_value = "3")]
    pub calls_per_bucket: usize,

    /// Override the deferred activation delay for background calls (milliseconds)
    #[arg(long)]
    pub defer_delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(Some(&args.log_level));

    let mut settings = ResilienceSettings::from_env()?;
    if let Some(delay) = args.defer_delay_ms {
        settings.defer_delay_ms = delay;
    }
    // Keep the simulation snappy regardless of production backoff defaults
    settings.base_delay_ms = settings.base_delay_ms.min(100);

    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    let orchestrator = Orchestrator::with_settings(clock.clone(), settings.clone());
    let wrapper = ResilientCallWrapper::<Value>::from_settings("dashboard", clock, &settings);

    register_dashboard(&orchestrator, args.calls_per_bucket.max(1)).await;
    let failure_rate = args.failure_rate.clamp(0.0, 1.0);

    loop {
        let ready: Vec<CallSnapshot> = orchestrator
            .snapshot()
            .await
            .calls
            .into_iter()
            .filter(|call| call.phase == CallPhase::Enabled)
            .collect();
        if ready.is_empty() {
            break;
        }

        join_all(
            ready
                .iter()
                .map(|call| run_one(&orchestrator, &wrapper, call, failure_rate)),
        )
        .await;
        orchestrator.log_progress().await;
    }

    let snapshot = orchestrator.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    orchestrator.teardown().await;
    Ok(())
}

async fn register_dashboard(orchestrator: &Orchestrator, calls_per_bucket: usize) {
    let mut previous: Option<&str> = None;
    for (section, priority) in SECTIONS {
        let dependencies: Vec<String> = previous.map(|p| format!("{p}-0")).into_iter().collect();
        for index in 0..calls_per_bucket {
            orchestrator
                .register_call(&format!("{section}-{index}"), priority, dependencies.clone())
                .await;
        }
        previous = Some(section);
    }
}

async fn run_one(
    orchestrator: &Orchestrator,
    wrapper: &ResilientCallWrapper<Value>,
    call: &CallSnapshot,
    failure_rate: f64,
) {
    let session = orchestrator.session_id();

    if call.priority == Priority::Background {
        let gate = orchestrator.deferred_gate().await;
        gate.defer();
        if gate.activated().await.is_err() {
            return;
        }
    }

    let key = wrapper.cache_key("fetch", &[json!(call.id)]);
    let id = call.id.clone();
    let operation = wrapper.with_retry_and_cache(
        &key,
        || simulated_backend(id.clone(), failure_rate),
        None,
        None,
    );

    match orchestrator.run_call(&call.id, operation).await {
        Ok(_) => {
            session_info!(session, call = %call.id, "✅ call resolved");
        }
        Err(OrchestratorError::Service(error)) => {
            session_warn!(
                session,
                call = %call.id,
                code = %error.code,
                "call failed after retries"
            );
        }
        Err(error) => {
            session_warn!(session, call = %call.id, "call not run: {}", error);
        }
    }
}

/// Fake backend with random latency and random 503s
async fn simulated_backend(id: String, failure_rate: f64) -> Result<Value, RawError> {
    let (latency_ms, fail) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(20..120), rng.gen_bool(failure_rate))
    };
    tokio::time::sleep(Duration::from_millis(latency_ms)).await;

    if fail {
        return Err(RawError::Http {
            status: 503,
            message: format!("{id} backend unavailable"),
        });
    }
    Ok(json!({ "id": id, "latencyMs": latency_ms }))
}
