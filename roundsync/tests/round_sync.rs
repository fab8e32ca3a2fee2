//! End-to-end behaviour of the round-sync controller on a virtual clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roundsync::coordinator::{RewardSubmission, WinnerSubmission};
use roundsync::net::discovery::NoDaemonLocator;
use roundsync::net::handle::SharedHandle;
use roundsync::net::traits::Multiaddr;
use roundsync::net::{MockConnector, MockPeerNetwork};
use roundsync::runtime::mock_runtime::MockRuntime;
use roundsync::{
    BlockOutcome, ConfigError, Coordinator, CoordinatorError, LocalCoordinator, PeerId,
    RewardLedger, RoundSyncController, SyncConfig, SyncError,
};

const ME: &str = "QmSelf";
const HOUR: Duration = Duration::from_secs(3600);

type Controller<C> = RoundSyncController<C, MockConnector, NoDaemonLocator, MockRuntime>;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn peer(id: &str) -> PeerId {
    PeerId::new(id).unwrap()
}

fn config() -> SyncConfig {
    SyncConfig::builder().max_round(10).build().unwrap()
}

async fn start<C: Coordinator>(config: SyncConfig, coordinator: C) -> Controller<C> {
    start_with(
        config,
        coordinator,
        SharedHandle::new(MockPeerNetwork::new(ME)),
        MockConnector::new(ME),
    )
    .await
}

async fn start_with<C: Coordinator>(
    config: SyncConfig,
    coordinator: C,
    handle: SharedHandle<MockPeerNetwork>,
    connector: MockConnector,
) -> Controller<C> {
    RoundSyncController::connect(
        config,
        coordinator,
        handle,
        connector,
        NoDaemonLocator,
        MockRuntime::new(),
    )
    .await
    .unwrap()
}

/// Reports a scripted sequence of rounds, then whatever the inner
/// coordinator says.
struct ScriptedRounds {
    inner: LocalCoordinator,
    rounds: Mutex<VecDeque<u64>>,
}

impl ScriptedRounds {
    fn new(round: u64) -> Self {
        Self {
            inner: LocalCoordinator::new(round, 0),
            rounds: Mutex::new(VecDeque::new()),
        }
    }

    fn script(&self, rounds: &[u64]) {
        self.rounds.lock().unwrap().extend(rounds.iter().copied());
    }
}

#[async_trait::async_trait]
impl Coordinator for ScriptedRounds {
    async fn register_peer(&self, peer: &PeerId) -> Result<(), CoordinatorError> {
        self.inner.register_peer(peer).await
    }

    async fn round_and_stage(&self) -> Result<(u64, u64), CoordinatorError> {
        let next = self.rounds.lock().unwrap().pop_front();
        match next {
            Some(round) => Ok((round, 0)),
            None => self.inner.round_and_stage().await,
        }
    }

    async fn submit_reward(
        &self,
        round: u64,
        channel: u64,
        amount: i64,
        peer: &PeerId,
    ) -> Result<(), CoordinatorError> {
        self.inner.submit_reward(round, channel, amount, peer).await
    }

    async fn submit_winners(
        &self,
        round: u64,
        winners: &[PeerId],
        peer: &PeerId,
    ) -> Result<(), CoordinatorError> {
        self.inner.submit_winners(round, winners, peer).await
    }
}

// Bootstrap

#[tokio::test]
async fn connect_registers_and_seeds_round() {
    let coord = Arc::new(LocalCoordinator::new(4, 2));
    let ctl = start(config(), Arc::clone(&coord)).await;

    assert_eq!(coord.registered_peers(), vec![peer(ME)]);
    assert_eq!(ctl.round_state().round, 4);
    assert_eq!(ctl.round_state().stage, 2);
    assert_eq!(ctl.peer_id(), &peer(ME));
}

#[tokio::test]
async fn connect_rejects_invalid_config() {
    let bad = SyncConfig {
        max_round: 0,
        ..SyncConfig::default()
    };
    let result = RoundSyncController::connect(
        bad,
        LocalCoordinator::new(0, 0),
        SharedHandle::new(MockPeerNetwork::new(ME)),
        MockConnector::new(ME),
        NoDaemonLocator,
        MockRuntime::new(),
    )
    .await;
    assert!(matches!(result, Err(SyncError::Config(ConfigError::ZeroMaxRound))));
}

#[tokio::test]
async fn connect_rejects_unrepresentable_timeout() {
    let huge = SyncConfig {
        train_timeout_secs: 1e20,
        ..SyncConfig::default()
    };
    let result = RoundSyncController::connect(
        huge,
        LocalCoordinator::new(0, 0),
        SharedHandle::new(MockPeerNetwork::new(ME)),
        MockConnector::new(ME),
        NoDaemonLocator,
        MockRuntime::new(),
    )
    .await;
    assert!(matches!(
        result,
        Err(SyncError::Config(ConfigError::IntervalOutOfRange {
            field: "train_timeout_secs",
            ..
        }))
    ));
}

#[tokio::test]
async fn connect_surfaces_coordinator_outage() {
    let coord = LocalCoordinator::new(0, 0);
    coord.fail_next_reads(1);
    let result = RoundSyncController::connect(
        config(),
        coord,
        SharedHandle::new(MockPeerNetwork::new(ME)),
        MockConnector::new(ME),
        NoDaemonLocator,
        MockRuntime::new(),
    )
    .await;
    assert!(matches!(result, Err(SyncError::Coordinator(CoordinatorError::Unavailable(_)))));
}

// Waiting for the next round

#[tokio::test]
async fn newer_remote_round_is_joined_without_sleeping() {
    let coord = Arc::new(LocalCoordinator::new(5, 0));
    let mut ctl = start(config(), Arc::clone(&coord)).await;
    coord.set_round(7, 1);

    assert_eq!(ctl.agent_block().await, BlockOutcome::Joined(7));
    assert_eq!(ctl.round_state().round, 7);
    assert_eq!(ctl.round_state().stage, 1);
    assert!(ctl.runtime().sleeps().is_empty());
}

#[tokio::test]
async fn equal_remote_round_is_joined() {
    let mut ctl = start(config(), LocalCoordinator::new(5, 0)).await;
    assert_eq!(ctl.agent_block().await, BlockOutcome::Joined(5));
    assert_eq!(ctl.round_state().round, 5);
}

#[tokio::test]
async fn final_round_returns_immediately() {
    let coord = Arc::new(LocalCoordinator::new(12, 0));
    let mut ctl = start(config(), Arc::clone(&coord)).await;
    coord.set_round(9, 0);

    assert_eq!(ctl.agent_block().await, BlockOutcome::FinalRound(9));
    assert_eq!(ctl.round_state().round, 12);
    assert!(ctl.runtime().sleeps().is_empty());
}

#[tokio::test]
async fn backoff_doubles_until_remote_catches_up() {
    let coord = Arc::new(ScriptedRounds::new(5));
    let mut ctl = start(config(), Arc::clone(&coord)).await;
    coord.script(&[3, 3, 3, 6]);

    assert_eq!(ctl.agent_block().await, BlockOutcome::Joined(6));
    assert_eq!(ctl.runtime().sleeps(), vec![secs(5), secs(10), secs(20)]);
}

#[tokio::test]
async fn backoff_caps_and_wait_times_out() {
    let config = SyncConfig::builder()
        .max_round(10)
        .max_check_interval(secs(20))
        .train_timeout(secs(100))
        .build()
        .unwrap();
    let coord = Arc::new(LocalCoordinator::new(5, 0));
    let mut ctl = start(config, Arc::clone(&coord)).await;
    coord.set_round(3, 0);

    assert_eq!(ctl.agent_block().await, BlockOutcome::TimedOut);
    assert_eq!(
        ctl.runtime().sleeps(),
        vec![secs(5), secs(10), secs(20), secs(20), secs(20), secs(20), secs(20)]
    );
    assert_eq!(ctl.round_state().round, 5);
}

#[tokio::test]
async fn each_wait_starts_from_base_interval() {
    let coord = Arc::new(ScriptedRounds::new(5));
    let mut ctl = start(config(), Arc::clone(&coord)).await;

    coord.script(&[3, 3, 5]);
    assert_eq!(ctl.agent_block().await, BlockOutcome::Joined(5));
    ctl.runtime().clear_sleeps();

    coord.script(&[4, 5]);
    assert_eq!(ctl.agent_block().await, BlockOutcome::Joined(5));
    assert_eq!(ctl.runtime().sleeps(), vec![secs(5)]);
}

#[tokio::test]
async fn coordinator_outage_is_retried_at_fixed_interval() {
    let coord = Arc::new(LocalCoordinator::new(5, 0));
    let mut ctl = start(config(), Arc::clone(&coord)).await;
    coord.fail_next_reads(3);
    coord.set_round(6, 0);

    assert_eq!(ctl.agent_block().await, BlockOutcome::Joined(6));
    assert_eq!(ctl.runtime().sleeps(), vec![secs(5); 3]);
}

// Peer network recovery

#[tokio::test]
async fn exhausted_reconnects_advance_round_by_one() {
    let coord = Arc::new(LocalCoordinator::new(5, 0));
    let handle = SharedHandle::new(MockPeerNetwork::new(ME));
    let mut ctl = start_with(
        config(),
        Arc::clone(&coord),
        handle.clone(),
        MockConnector::new(ME).always_failing(),
    )
    .await;
    handle.load().set_alive(false);
    coord.set_round(8, 0);

    assert_eq!(ctl.agent_block().await, BlockOutcome::ReconnectExhausted(6));
    assert_eq!(ctl.round_state().round, 6);
    assert_eq!(ctl.supervisor().connector().attempts(), 3);
    assert_eq!(ctl.runtime().sleeps(), vec![secs(5), secs(5)]);
}

#[tokio::test]
async fn reconnect_swaps_handle_then_joins() {
    let config = SyncConfig::builder()
        .max_round(10)
        .reconnect_settle(secs(2))
        .bootnodes(vec![Multiaddr::new("/dns/boot.example/tcp/4001").unwrap()])
        .build()
        .unwrap();
    let seed = Multiaddr::new("/ip4/10.0.0.1/tcp/31337").unwrap();
    let handle = SharedHandle::new(MockPeerNetwork::new(ME).with_initial_peers(vec![seed.clone()]));
    let coord = Arc::new(LocalCoordinator::new(5, 0));
    let mut ctl = start_with(
        config,
        Arc::clone(&coord),
        handle.clone(),
        MockConnector::new(ME).failing_first(1),
    )
    .await;
    let dead = handle.load();
    dead.set_alive(false);
    coord.set_round(7, 0);

    assert_eq!(ctl.agent_block().await, BlockOutcome::Joined(7));
    assert_eq!(ctl.runtime().sleeps(), vec![secs(5), secs(2)]);
    assert!(!Arc::ptr_eq(&dead, &ctl.handle().load()));

    let configs = ctl.supervisor().connector().configs();
    assert_eq!(configs.len(), 2);
    assert_eq!(
        configs[1].initial_peers,
        vec![seed, Multiaddr::new("/dns/boot.example/tcp/4001").unwrap()]
    );
}

// Reward submission hooks

fn ledger() -> RewardLedger {
    let mut ledger = RewardLedger::new();
    ledger.record(0, peer(ME), 0, vec![vec![1.0, 2.0], vec![0.0]]);
    ledger.record(0, peer("QmOther"), 0, vec![vec![10.0]]);
    ledger
}

#[tokio::test]
async fn rewards_are_submitted_once_period_elapsed() {
    let coord = Arc::new(LocalCoordinator::new(2, 0));
    let mut ctl = start(config(), Arc::clone(&coord)).await;
    let ledger = ledger();

    // Self total 3, positive so the signal is 4.
    assert!(!ctl.on_rewards_updated(&ledger, 1).await);
    assert_eq!(ctl.gate().accumulator().batched_signal(), 4.0);
    assert!(coord.reward_submissions().is_empty());

    ctl.runtime().advance(3 * HOUR + Duration::from_millis(1));
    assert!(ctl.on_rewards_updated(&ledger, 1).await);
    assert_eq!(
        coord.reward_submissions(),
        vec![RewardSubmission { round: 2, channel: 0, amount: 8, peer: peer(ME) }]
    );
    assert_eq!(
        coord.winner_submissions(),
        vec![WinnerSubmission { round: 2, winners: vec![peer("QmOther")], peer: peer(ME) }]
    );

    // Same window: accumulate but do not resubmit.
    assert!(!ctl.on_rewards_updated(&ledger, 1).await);
    assert_eq!(coord.reward_submissions().len(), 1);
    assert_eq!(ctl.gate().accumulator().batched_signal(), 4.0);
}

#[tokio::test]
async fn round_advance_retries_missed_submission() {
    let coord = Arc::new(LocalCoordinator::new(2, 0));
    let mut ctl = start(config(), Arc::clone(&coord)).await;
    let ledger = ledger();

    ctl.runtime().advance(4 * HOUR);
    coord.fail_next_writes(1);
    assert!(!ctl.on_rewards_updated(&ledger, 1).await);
    assert_eq!(ctl.gate().accumulator().batched_signal(), 4.0);

    coord.set_round(3, 0);
    assert_eq!(ctl.on_round_advanced(&ledger, 1).await, BlockOutcome::Joined(3));

    // The batched signal is reported as is, not accumulated a second time.
    assert_eq!(
        coord.reward_submissions(),
        vec![RewardSubmission { round: 3, channel: 0, amount: 4, peer: peer(ME) }]
    );
    assert!(!ctl.gate().accumulator().submitted_this_round());
    assert_eq!(ctl.round_state().round, 3);
}

#[tokio::test]
async fn round_advance_skips_submission_already_made() {
    let coord = Arc::new(LocalCoordinator::new(2, 0));
    let mut ctl = start(config(), Arc::clone(&coord)).await;
    let ledger = ledger();

    ctl.runtime().advance(4 * HOUR);
    assert!(ctl.on_rewards_updated(&ledger, 1).await);
    assert!(ctl.gate().accumulator().submitted_this_round());

    coord.set_round(3, 0);
    assert_eq!(ctl.on_round_advanced(&ledger, 1).await, BlockOutcome::Joined(3));
    assert_eq!(coord.reward_submissions().len(), 1);
    assert!(!ctl.gate().accumulator().submitted_this_round());
}

#[tokio::test]
async fn empty_ledger_votes_for_self() {
    let coord = Arc::new(LocalCoordinator::new(1, 0));
    let mut ctl = start(config(), Arc::clone(&coord)).await;

    ctl.runtime().advance(4 * HOUR);
    assert!(ctl.on_rewards_updated(&RewardLedger::new(), 3).await);
    assert_eq!(coord.reward_submissions()[0].amount, 0);
    assert_eq!(coord.winner_submissions()[0].winners, vec![peer(ME)]);
}
