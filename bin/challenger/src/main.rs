//! Challenger binary

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use xlayer_fp_audit::{AuditLog, get_global_auditor, init_global_auditor, sync_global_auditor};
use xlayer_fp_challenger::{
    ChallengeCoordinator, Config, GameResolver, InMemoryChallengeStore, InMemoryRootStore,
    Orchestrator, ProofBuilder, StateVerifier, SystemClock,
    chain::{
        L2RootFeed,
        rpc::{L1Client, RpcClient},
    },
};

/// How often pending challenges are reconciled, expired and resolved.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("X Layer fraud-proof challenger starting");

    let config = Config::from_env().context("loading configuration")?;
    config.validate().context("invalid configuration")?;
    let factory = config.dispute_game_factory.context("DISPUTE_GAME_FACTORY_ADDRESS is required")?;
    let oracle = config.output_oracle.context("OUTPUT_ORACLE_ADDRESS is required")?;

    init_global_auditor(config.audit_log_enable, config.audit_log_path.clone());
    let audit = get_global_auditor().map_or_else(AuditLog::disabled, |audit| audit.as_ref().clone());

    let pool = Arc::new(config.signer_pool().context("loading validator keys")?);

    info!(l1_rpc = %config.l1_rpc, l2_rpc = ?config.l2_rpc, "Endpoints");
    info!(%factory, %oracle, challenger = ?config.challenger, bond_wei = %config.bond_amount, "Contracts");
    info!(
        validators = pool.len(),
        fraud_quorum = config.quorum.fraud_threshold,
        defense_quorum = config.quorum.defense_threshold,
        selection = %config.quorum.selection,
        "Signer pool"
    );
    info!(
        unknown_root_policy = %config.unknown_root_policy,
        resolution_window_secs = config.resolution_window,
        max_concurrent = config.max_concurrent_challenges,
        audit = config.audit_log_enable,
        "Policy"
    );
    if config.challenger.is_none() {
        warn!("CHALLENGER_ADDRESS not set, mismatches will be reported but not challenged");
    }
    if pool.is_empty() {
        warn!("No validator keys configured, challenges cannot be resolved");
    }

    let clock = Arc::new(SystemClock);
    let l1 = Arc::new(
        L1Client::new(RpcClient::new(config.l1_rpc.clone()), factory, oracle)
            .with_confirmation_timeout(config.confirmation_timeout())
            .with_poll_interval(config.fetch_interval())
            .with_start_block(config.start_block),
    );
    let store = Arc::new(InMemoryChallengeStore::new());
    let verifier = Arc::new(StateVerifier::new(
        Arc::new(InMemoryRootStore::new(config.trusted_root_retention)),
        config.unknown_root_policy,
    ));
    let coordinator = Arc::new(
        ChallengeCoordinator::new(
            l1.clone(),
            store.clone(),
            verifier.clone(),
            clock.clone(),
            config.bond_amount,
            config.resolution_window(),
        )
        .with_audit(audit.clone()),
    );
    let builder = Arc::new(ProofBuilder::new(pool, config.quorum));
    let resolver = Arc::new(
        GameResolver::new(l1.clone(), store, verifier.clone(), builder, clock.clone())
            .with_audit(audit.clone()),
    );

    let mut orchestrator = Orchestrator::new(l1.clone(), l1, verifier, coordinator, clock)
        .with_resolver(resolver)
        .with_max_concurrent(config.max_concurrent_challenges)
        .with_audit(audit);
    if let Some(l2_rpc) = &config.l2_rpc {
        let feed = L2RootFeed::new(RpcClient::new(l2_rpc.clone()));
        orchestrator = orchestrator.with_root_feed(Arc::new(feed));
    }

    orchestrator.monitor_and_challenge(config.challenger).await.context("subscribing to proposals")?;

    let mut maintenance = interval(MAINTENANCE_INTERVAL);
    maintenance.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
            _ = maintenance.tick() => {
                let expired = orchestrator.evict_expired();
                if expired > 0 {
                    info!(expired, "Evicted expired challenges");
                }
                match orchestrator.reconcile().await {
                    Ok(report) => info!(
                        stale = report.stale.len(),
                        untracked = report.untracked.len(),
                        "Reconciled pending challenges"
                    ),
                    Err(e) => warn!(error = %e, "Reconciliation failed"),
                }
                if let Some(challenger) = config.challenger {
                    let resolved = orchestrator.resolve_pending(challenger).await;
                    if resolved > 0 {
                        info!(resolved, "Resolved challenges");
                    }
                }
            }
        }
    }

    info!("Shutting down");
    orchestrator.stop_monitoring().await;
    if let Err(e) = sync_global_auditor() {
        error!(error = %e, "Failed to sync audit log");
    }
    Ok(())
}
