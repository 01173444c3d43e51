//! Proposal monitoring loop
//!
//! [`Orchestrator`] subscribes to a [`ProposalSource`] and hands every
//! proposal to its own task, bounded by a semaphore, so one slow confirmation
//! never holds up delivery of the next event. Each task verifies the proposal
//! and, if it is invalid and a challenger account is configured, opens a game.

use std::{collections::HashSet, sync::Arc};

use alloy_primitives::Address;
use tokio::{
    sync::{Mutex, Semaphore},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, error, info, warn};
use xlayer_fp_audit::{AuditEntry, AuditLog, ChallengeStage};
use xlayer_fp_primitives::{GameId, OutputProposal, domain::placeholder_claim_root};

use crate::{
    chain::{
        ChainError, DisputeGameClient, ProposalSource, ProposalSubscription, SubscriptionHandle,
        TrustedRootSource,
    },
    clock::Clock,
    coordinator::{ChallengeCoordinator, ChallengeError},
    resolver::{GameResolver, ResolveError},
    verifier::{StateVerifier, UnknownRootPolicy, Verdict},
};

/// What happened to a single proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalOutcome {
    /// Claimed root matches the trusted one.
    Valid,
    /// No trusted root and the policy is fail-open.
    Unverified,
    /// Invalid, but no challenger account is configured.
    Detected,
    /// Invalid and a game was opened.
    Challenged(GameId),
    /// Invalid, and this output already has a challenge in flight or pending.
    Duplicate,
    /// Invalid, but opening the game failed.
    Failed,
}

/// Result of comparing local records with the factory's active games.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Tracked locally, no longer active on chain.
    pub stale: Vec<GameId>,
    /// Active on chain, not tracked locally.
    pub untracked: Vec<GameId>,
}

/// Per-proposal pipeline shared by every handler task.
#[derive(Debug, Clone)]
struct Pipeline {
    verifier: Arc<StateVerifier>,
    coordinator: Arc<ChallengeCoordinator>,
    root_feed: Option<Arc<dyn TrustedRootSource>>,
    audit: AuditLog,
}

impl Pipeline {
    async fn handle(
        &self,
        proposal: OutputProposal,
        challenger: Option<Address>,
    ) -> ProposalOutcome {
        let entry = AuditEntry::for_output(&proposal);
        self.audit.record(ChallengeStage::OutputObserved, &entry);
        debug!(
            output_index = proposal.output_index,
            l2_block_number = proposal.l2_block_number,
            claimed_root = %proposal.state_root,
            "Output proposed"
        );

        self.seed_root(&proposal).await;

        // Single lookup, so a concurrent feed write cannot split the verdict.
        let block = proposal.l2_block_number;
        let verdict = self.verifier.check(block, &proposal.state_root);
        let trusted = match verdict {
            Verdict::Valid => {
                debug!(output_index = proposal.output_index, "Output valid");
                return ProposalOutcome::Valid;
            }
            Verdict::Invalid { trusted } => Some(trusted),
            Verdict::Unknown => {
                warn!(
                    l2_block_number = block,
                    claimed_root = %proposal.state_root,
                    policy = %self.verifier.policy(),
                    "No trusted root for block"
                );
                if self.verifier.accepts(&verdict) {
                    self.audit.record(ChallengeStage::UnknownRoot, &entry);
                    return ProposalOutcome::Unverified;
                }
                None
            }
        };

        let claim_root =
            trusted.unwrap_or_else(|| placeholder_claim_root(block, &proposal.state_root));
        warn!(
            output_index = proposal.output_index,
            l2_block_number = block,
            claimed_root = %proposal.state_root,
            trusted_root = ?trusted,
            "State root mismatch"
        );
        let entry = entry.with_trusted_root(claim_root);
        self.audit.record(ChallengeStage::MismatchDetected, &entry);

        let Some(challenger) = challenger else {
            info!(output_index = proposal.output_index, "No challenger configured, skipping");
            return ProposalOutcome::Detected;
        };

        match self.coordinator.challenge_output(&proposal, challenger).await {
            Ok(game_id) => {
                info!(%game_id, output_index = proposal.output_index, "Challenge opened");
                ProposalOutcome::Challenged(game_id)
            }
            Err(ChallengeError::DuplicateChallenge { key }) => {
                info!(%key, "Output already challenged, skipping");
                self.audit.record(ChallengeStage::DuplicateSkipped, &entry);
                ProposalOutcome::Duplicate
            }
            Err(e) => {
                error!(output_index = proposal.output_index, error = %e, "Challenge failed");
                ProposalOutcome::Failed
            }
        }
    }

    /// Fetch the trusted root from the feed if the store has none yet.
    async fn seed_root(&self, proposal: &OutputProposal) {
        let Some(feed) = &self.root_feed else { return };
        let block = proposal.l2_block_number;
        if self.verifier.trusted_state_root(block).is_some() {
            return;
        }
        match feed.state_root(block).await {
            Ok(Some(root)) => self.verifier.set_trusted_state_root(block, root),
            Ok(None) => debug!(l2_block_number = block, "Trusted feed has not reached block"),
            Err(e) => warn!(l2_block_number = block, error = %e, "Trusted root fetch failed"),
        }
    }
}

#[derive(Debug)]
struct Running {
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

/// Drives detection and challenges, and owns the monitoring lifecycle.
#[derive(Debug)]
pub struct Orchestrator {
    source: Arc<dyn ProposalSource>,
    client: Arc<dyn DisputeGameClient>,
    clock: Arc<dyn Clock>,
    pipeline: Pipeline,
    resolver: Option<Arc<GameResolver>>,
    limit: Arc<Semaphore>,
    running: Mutex<Option<Running>>,
}

impl Orchestrator {
    /// Default bound on concurrently handled proposals.
    pub const DEFAULT_MAX_CONCURRENT: usize = 4;

    /// Orchestrator reading proposals from `source` and challenging through
    /// `coordinator`.
    pub fn new(
        source: Arc<dyn ProposalSource>,
        client: Arc<dyn DisputeGameClient>,
        verifier: Arc<StateVerifier>,
        coordinator: Arc<ChallengeCoordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            client,
            clock,
            pipeline: Pipeline {
                verifier,
                coordinator,
                root_feed: None,
                audit: AuditLog::disabled(),
            },
            resolver: None,
            limit: Arc::new(Semaphore::new(Self::DEFAULT_MAX_CONCURRENT)),
            running: Mutex::new(None),
        }
    }

    /// Fetch missing trusted roots from `feed` before verifying.
    pub fn with_root_feed(mut self, feed: Arc<dyn TrustedRootSource>) -> Self {
        self.pipeline.root_feed = Some(feed);
        self
    }

    /// Resolver used by [`Orchestrator::resolve_pending`].
    pub fn with_resolver(mut self, resolver: Arc<GameResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Bound on proposals handled at once, at least 1.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.limit = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    /// Record verification and challenge stages to `audit`.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.pipeline.audit = audit;
        self
    }

    /// Start monitoring. Proposals that fail verification are challenged from
    /// `challenger`; with `None` they are only logged.
    ///
    /// Returns `false` without doing anything if monitoring is already running.
    pub async fn monitor_and_challenge(
        &self,
        challenger: Option<Address>,
    ) -> Result<bool, ChainError> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            debug!("Monitoring already running");
            return Ok(false);
        }

        let subscription = self.source.subscribe().await?;
        let handle = subscription.handle();
        let policy = self.pipeline.verifier.policy();
        info!(
            challenger = ?challenger,
            unknown_root_policy = %policy,
            max_concurrent = self.limit.available_permits(),
            "Monitoring output proposals"
        );
        if policy == UnknownRootPolicy::FailOpen {
            warn!("Proposals for blocks without a trusted root are assumed valid");
        }

        let pipeline = self.pipeline.clone();
        let task = tokio::spawn(run(subscription, pipeline, self.limit.clone(), challenger));
        *running = Some(Running { handle, task });
        Ok(true)
    }

    /// Stop taking new proposals. Handlers already running finish on their own
    /// and their transactions are not cancelled. Returns `false` if monitoring
    /// was not running.
    pub async fn stop_monitoring(&self) -> bool {
        let Some(running) = self.running.lock().await.take() else {
            return false;
        };
        running.handle.cancel();
        info!("Monitoring stopped");
        true
    }

    /// Stop monitoring and wait for in-flight handlers to finish.
    pub async fn shutdown(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.handle.cancel();
        if let Err(e) = running.task.await {
            error!(error = %e, "Monitoring task failed");
        }
        info!("Monitoring shut down");
    }

    /// Whether the monitoring task is alive.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    /// Verify `proposal` and challenge it if needed, outside the monitoring loop.
    pub async fn handle_proposal(
        &self,
        proposal: OutputProposal,
        challenger: Option<Address>,
    ) -> ProposalOutcome {
        self.pipeline.handle(proposal, challenger).await
    }

    /// Compare pending records with the factory's active games.
    pub async fn reconcile(&self) -> Result<Reconciliation, ChainError> {
        let active: HashSet<GameId> = self.client.active_games().await?.into_iter().collect();
        let pending = self.pipeline.coordinator.store().pending();
        let tracked: HashSet<GameId> = pending.iter().map(|r| r.game_id).collect();

        let mut report = Reconciliation {
            stale: tracked.difference(&active).copied().collect(),
            untracked: active.difference(&tracked).copied().collect(),
        };
        report.stale.sort();
        report.untracked.sort();

        for game_id in &report.stale {
            warn!(%game_id, "Pending challenge no longer active on chain");
        }
        for game_id in &report.untracked {
            info!(%game_id, "Active game not tracked by this challenger");
        }
        Ok(report)
    }

    /// Retire records whose resolution window has closed and free outputs
    /// held after an uncertain `createGame`. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let store = self.pipeline.coordinator.store();
        let released = store.expire_holds(now);
        for key in &released {
            warn!(%key, "Hold on unconfirmed challenge expired");
        }
        let expired = store.evict_expired(now);
        for record in &expired {
            warn!(
                game_id = %record.game_id,
                output_index = record.output_index,
                deadline = record.deadline,
                "Challenge expired unresolved"
            );
            self.pipeline
                .audit
                .record(ChallengeStage::ChallengeExpired, &AuditEntry::for_record(record));
        }
        released.len() + expired.len()
    }

    /// Try to resolve every pending challenge opened by `challenger`.
    /// Returns how many were resolved. Does nothing without a resolver.
    pub async fn resolve_pending(&self, challenger: Address) -> usize {
        let Some(resolver) = &self.resolver else { return 0 };
        let mut resolved = 0;
        for record in self.pipeline.coordinator.store().pending() {
            if record.challenger != challenger {
                continue;
            }
            match resolver.resolve_challenger_wins(&record.game_id, challenger, None).await {
                Ok(_) => resolved += 1,
                Err(e @ ResolveError::NoValidatorsConfigured) => {
                    warn!(error = %e, "Skipping resolution");
                    break;
                }
                Err(e) => warn!(
                    game_id = %record.game_id,
                    terminal = e.is_terminal(),
                    error = %e,
                    "Resolution attempt failed"
                ),
            }
        }
        resolved
    }
}

async fn run(
    mut subscription: ProposalSubscription,
    pipeline: Pipeline,
    limit: Arc<Semaphore>,
    challenger: Option<Address>,
) {
    let mut tasks = JoinSet::new();
    while let Some(proposal) = subscription.recv().await {
        let Ok(permit) = limit.clone().acquire_owned().await else {
            break;
        };
        let pipeline = pipeline.clone();
        tasks.spawn(async move {
            let _permit = permit;
            pipeline.handle(proposal, challenger).await
        });
        while let Some(joined) = tasks.try_join_next() {
            log_join(joined);
        }
    }

    if !tasks.is_empty() {
        info!(in_flight = tasks.len(), "Waiting for in-flight proposals");
    }
    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
}

fn log_join(joined: Result<ProposalOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => debug!(?outcome, "Proposal handled"),
        Err(e) => error!(error = %e, "Proposal handler panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        prover::ProofBuilder,
        quorum::QuorumPolicy,
        roots::{InMemoryRootStore, RootStore},
        store::{ChallengeStore, InMemoryChallengeStore},
        test_utils::{
            CHALLENGER, ChannelSource, FACTORY, ManualClock, MockGameClient, StaticRoots, pool_of,
            proposal, record,
        },
    };
    use alloy_primitives::{B256, U256};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use xlayer_fp_primitives::decode;
    use tokio::sync::mpsc::UnboundedSender;

    struct Fixture {
        client: Arc<MockGameClient>,
        store: Arc<InMemoryChallengeStore>,
        verifier: Arc<StateVerifier>,
        clock: Arc<ManualClock>,
        tx: UnboundedSender<OutputProposal>,
        orchestrator: Orchestrator,
    }

    impl Fixture {
        async fn offer(&self, output: OutputProposal) -> ProposalOutcome {
            self.orchestrator.handle_proposal(output, Some(CHALLENGER)).await
        }

        fn resolver(&self, validators: usize) -> Arc<GameResolver> {
            let pool = Arc::new(pool_of(validators));
            let builder = Arc::new(ProofBuilder::new(pool, QuorumPolicy::default()));
            Arc::new(GameResolver::new(
                self.client.clone(),
                self.store.clone(),
                self.verifier.clone(),
                builder,
                self.clock.clone(),
            ))
        }
    }

    fn fixture(policy: UnknownRootPolicy) -> Fixture {
        let client = Arc::new(MockGameClient::new(FACTORY));
        let store = Arc::new(InMemoryChallengeStore::new());
        let verifier =
            Arc::new(StateVerifier::new(Arc::new(InMemoryRootStore::default()), policy));
        let clock = Arc::new(ManualClock::new(1_000));
        let coordinator = Arc::new(ChallengeCoordinator::new(
            client.clone(),
            store.clone(),
            verifier.clone(),
            clock.clone(),
            U256::from(100u64),
            Duration::from_secs(500),
        ));
        let (source, tx) = ChannelSource::new();
        let orchestrator = Orchestrator::new(
            Arc::new(source),
            client.clone(),
            verifier.clone(),
            coordinator,
            clock.clone(),
        );
        Fixture { client, store, verifier, clock, tx, orchestrator }
    }

    #[tokio::test]
    async fn test_mismatch_is_challenged() {
        let f = fixture(UnknownRootPolicy::FailOpen);
        f.verifier.set_trusted_state_root(100, B256::repeat_byte(0xaa));

        let outcome = f.offer(proposal(1, 100, B256::repeat_byte(0xbb))).await;
        let ProposalOutcome::Challenged(game_id) = outcome else {
            panic!("expected a challenge, got {outcome:?}");
        };
        let record = f.store.get(&game_id).unwrap();
        assert_eq!(record.claimed_state_root, B256::repeat_byte(0xbb));
        assert_eq!(record.trusted_claim_root, B256::repeat_byte(0xaa));
    }

    #[tokio::test]
    async fn test_unknown_root_fail_open() {
        let f = fixture(UnknownRootPolicy::FailOpen);
        let outcome = f.offer(proposal(2, 200, B256::repeat_byte(0xcc))).await;
        assert_eq!(outcome, ProposalOutcome::Unverified);
        assert!(f.client.create_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_root_fail_closed() {
        let f = fixture(UnknownRootPolicy::FailClosed);
        let outcome = f.offer(proposal(2, 200, B256::repeat_byte(0xcc))).await;
        assert!(matches!(outcome, ProposalOutcome::Challenged(_)));
        assert_eq!(f.client.create_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_detect_only_without_challenger() {
        let f = fixture(UnknownRootPolicy::FailOpen);
        f.verifier.set_trusted_state_root(100, B256::repeat_byte(0xaa));
        let output = proposal(1, 100, B256::repeat_byte(0xbb));
        let outcome = f.orchestrator.handle_proposal(output, None).await;
        assert_eq!(outcome, ProposalOutcome::Detected);
        assert!(f.client.create_calls().is_empty());
    }

    #[tokio::test]
    async fn test_valid_proposal_is_ignored() {
        let f = fixture(UnknownRootPolicy::FailClosed);
        f.verifier.set_trusted_state_root(100, B256::repeat_byte(0xaa));
        let outcome = f.offer(proposal(1, 100, B256::repeat_byte(0xaa))).await;
        assert_eq!(outcome, ProposalOutcome::Valid);
    }

    #[tokio::test]
    async fn test_root_feed_seeds_store() {
        let mut f = fixture(UnknownRootPolicy::FailOpen);
        let feed = StaticRoots::default();
        feed.0.lock().unwrap().push((300, B256::repeat_byte(0xaa)));
        f.orchestrator = f.orchestrator.with_root_feed(Arc::new(feed));

        let outcome = f.offer(proposal(3, 300, B256::repeat_byte(0xbb))).await;
        assert!(matches!(outcome, ProposalOutcome::Challenged(_)));
        assert_eq!(f.verifier.trusted_state_root(300), Some(B256::repeat_byte(0xaa)));
    }

    #[tokio::test]
    async fn test_redelivery_is_not_rechallenged() {
        let f = fixture(UnknownRootPolicy::FailOpen);
        f.verifier.set_trusted_state_root(100, B256::repeat_byte(0xaa));
        let output = proposal(1, 100, B256::repeat_byte(0xbb));

        f.orchestrator.handle_proposal(output, Some(CHALLENGER)).await;
        let again = f.orchestrator.handle_proposal(output, Some(CHALLENGER)).await;
        assert_eq!(again, ProposalOutcome::Duplicate);
        assert_eq!(f.client.create_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_redelivery_bonds_once() {
        let f = fixture(UnknownRootPolicy::FailOpen);
        f.verifier.set_trusted_state_root(100, B256::repeat_byte(0xaa));
        f.client.delay_create(Duration::from_millis(50));
        let output = proposal(1, 100, B256::repeat_byte(0xbb));

        let (a, b) = tokio::join!(
            f.orchestrator.handle_proposal(output, Some(CHALLENGER)),
            f.orchestrator.handle_proposal(output, Some(CHALLENGER)),
        );
        let challenged =
            [a, b].iter().filter(|o| matches!(o, ProposalOutcome::Challenged(_))).count();
        assert_eq!(challenged, 1);
        assert!([a, b].contains(&ProposalOutcome::Duplicate));
        assert_eq!(f.client.create_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_monitor_challenges_streamed_proposals() {
        let f = fixture(UnknownRootPolicy::FailOpen);
        f.verifier.set_trusted_state_root(100, B256::repeat_byte(0xaa));

        assert!(f.orchestrator.monitor_and_challenge(Some(CHALLENGER)).await.unwrap());
        assert!(!f.orchestrator.monitor_and_challenge(Some(CHALLENGER)).await.unwrap());
        assert!(f.orchestrator.is_running().await);

        let output = proposal(1, 100, B256::repeat_byte(0xbb));
        f.tx.send(output).unwrap();
        f.tx.send(output).unwrap();
        f.tx.send(proposal(2, 200, B256::repeat_byte(0xcc))).unwrap();
        drop(f.tx);

        // Source is exhausted, so the loop drains and exits on its own.
        tokio::time::timeout(Duration::from_secs(5), async {
            while f.orchestrator.is_running().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        f.orchestrator.shutdown().await;
        assert!(!f.orchestrator.is_running().await);
        assert_eq!(f.client.create_calls().len(), 1);
        assert_eq!(f.store.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_monitoring() {
        let f = fixture(UnknownRootPolicy::FailOpen);
        assert!(!f.orchestrator.stop_monitoring().await);
        f.orchestrator.monitor_and_challenge(None).await.unwrap();
        assert!(f.orchestrator.stop_monitoring().await);
        assert!(!f.orchestrator.is_running().await);
    }

    #[tokio::test]
    async fn test_reconcile() {
        let f = fixture(UnknownRootPolicy::FailOpen);
        let tracked = record(1, 100, 2_000);
        let gone = record(2, 200, 2_000);
        for r in [&tracked, &gone] {
            assert!(f.store.try_reserve(r.key()));
            f.store.commit(r.clone());
        }
        let foreign = B256::repeat_byte(0x77);
        f.client.set_active_games(vec![tracked.game_id, foreign]);

        let report = f.orchestrator.reconcile().await.unwrap();
        assert_eq!(report.stale, vec![gone.game_id]);
        assert_eq!(report.untracked, vec![foreign]);
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let f = fixture(UnknownRootPolicy::FailOpen);
        let r = record(1, 100, 1_500);
        assert!(f.store.try_reserve(r.key()));
        f.store.commit(r.clone());

        f.verifier.set_trusted_state_root(300, B256::repeat_byte(0xaa));
        f.client.fail_next_create(ChainError::Transport("connection reset".into()));
        let uncertain = proposal(3, 300, B256::repeat_byte(0xbb));
        assert_eq!(f.offer(uncertain).await, ProposalOutcome::Failed);

        assert_eq!(f.orchestrator.evict_expired(), 0);
        f.clock.set(1_500);
        assert_eq!(f.orchestrator.evict_expired(), 2);
        assert!(f.store.pending().is_empty());
        assert!(!f.store.contains_key(&uncertain.challenge_key()));
    }

    #[tokio::test]
    async fn test_resolve_pending() {
        let mut f = fixture(UnknownRootPolicy::FailOpen);
        assert_eq!(f.orchestrator.resolve_pending(CHALLENGER).await, 0);

        let resolver = f.resolver(2);
        f.orchestrator = f.orchestrator.with_resolver(resolver);

        f.verifier.set_trusted_state_root(100, B256::repeat_byte(0xaa));
        f.offer(proposal(1, 100, B256::repeat_byte(0xbb))).await;
        assert_eq!(f.orchestrator.resolve_pending(CHALLENGER).await, 1);
        assert!(f.store.pending().is_empty());
        assert_eq!(f.client.resolve_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_closed_resolution_waits_for_real_root() {
        let mut f = fixture(UnknownRootPolicy::FailClosed);
        let resolver = f.resolver(1);
        f.orchestrator = f.orchestrator.with_resolver(resolver);

        let claimed = B256::repeat_byte(0xcc);
        let ProposalOutcome::Challenged(game_id) = f.offer(proposal(2, 200, claimed)).await else {
            panic!("fail-closed should challenge an unknown block");
        };
        let placeholder = placeholder_claim_root(200, &claimed);
        assert_eq!(f.store.get(&game_id).unwrap().trusted_claim_root, placeholder);

        // Nothing trustworthy to sign yet.
        assert_eq!(f.orchestrator.resolve_pending(CHALLENGER).await, 0);
        assert!(f.client.resolve_calls().is_empty());
        assert!(f.store.get(&game_id).is_some());

        let real_root = B256::repeat_byte(0xaa);
        f.verifier.set_trusted_state_root(200, real_root);
        assert_eq!(f.orchestrator.resolve_pending(CHALLENGER).await, 1);

        let (_, resolved, proof_bytes) = &f.client.resolve_calls()[0];
        assert_eq!(*resolved, game_id);
        let proof = decode(proof_bytes).unwrap();
        assert_eq!(proof.post_state_root, real_root);
        assert_ne!(proof.post_state_root, placeholder);
    }

    /// Reports no root on the first lookup and a root on every later one, as
    /// if the feed wrote between two reads.
    #[derive(Debug, Default)]
    struct LateRoot {
        lookups: AtomicUsize,
    }

    impl RootStore for LateRoot {
        fn set_trusted_state_root(&self, _block: u64, _root: B256) {}

        fn trusted_state_root(&self, _block: u64) -> Option<B256> {
            (self.lookups.fetch_add(1, Ordering::SeqCst) > 0).then(|| B256::repeat_byte(0xaa))
        }

        fn len(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_verdict_uses_one_lookup() {
        let roots = Arc::new(LateRoot::default());
        let verifier = Arc::new(StateVerifier::new(roots.clone(), UnknownRootPolicy::FailOpen));
        let client = Arc::new(MockGameClient::new(FACTORY));
        let clock = Arc::new(ManualClock::new(1_000));
        let coordinator = Arc::new(ChallengeCoordinator::new(
            client.clone(),
            Arc::new(InMemoryChallengeStore::new()),
            verifier.clone(),
            clock.clone(),
            U256::from(100u64),
            Duration::from_secs(500),
        ));
        let (source, _tx) = ChannelSource::new();
        let orchestrator =
            Orchestrator::new(Arc::new(source), client.clone(), verifier, coordinator, clock);

        let output = proposal(1, 100, B256::repeat_byte(0xbb));
        let outcome = orchestrator.handle_proposal(output, Some(CHALLENGER)).await;
        assert_eq!(outcome, ProposalOutcome::Unverified);
        assert_eq!(roots.lookups.load(Ordering::SeqCst), 1);
        assert!(client.create_calls().is_empty());
    }
}
