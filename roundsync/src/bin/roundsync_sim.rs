use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use roundsync::core::identity::NodeIdentity;
use roundsync::prelude::*;
use roundsync::ConfigError;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!("Usage: roundsync_sim [config.json] [round_secs]");
    eprintln!();
    eprintln!("Without a config file a short five-round demo is run.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
    std::process::exit(2);
}

fn demo_config() -> Result<SyncConfig, ConfigError> {
    SyncConfig::builder()
        .check_interval(Duration::from_secs(1))
        .log_timeout(Duration::from_secs(2))
        .max_check_interval(Duration::from_secs(8))
        .reconnect_settle(Duration::from_millis(200))
        .submit_period_hours(2.0 / 3600.0)
        .max_round(5)
        .build()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.iter().any(|a| a == "-h" || a == "--help") || args.len() > 2 {
        usage();
    }

    let config = if args.is_empty() {
        demo_config().map_err(SyncError::from)
    } else {
        SyncConfig::from_json_file(PathBuf::from(args.remove(0)))
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let round_period = match args.first().map(|s| s.parse::<f64>()) {
        None => Duration::from_secs(3),
        Some(Ok(secs)) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
        Some(_) => usage(),
    };

    if let Err(e) = run(config, round_period).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(config: SyncConfig, round_period: Duration) -> Result<(), SyncError> {
    let mut seed = [7u8; 32];
    seed[..4].copy_from_slice(&std::process::id().to_le_bytes());
    let identity = NodeIdentity::from_seed(seed);
    let local = identity.peer_id().clone();
    let neighbours = [PeerId::new("QmNeighbourA")?, PeerId::new("QmNeighbourB")?];

    let coordinator = Arc::new(LocalCoordinator::new(0, 0));
    let ticker = {
        let coordinator = Arc::clone(&coordinator);
        let final_round = config.max_round.saturating_sub(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(round_period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if coordinator.advance_round() >= final_round {
                    break;
                }
            }
        })
    };

    let handle = SharedHandle::new(MockPeerNetwork::new(local.as_str()));
    let locator = SocketStatLocator::new(config.daemon_process.clone());
    let mut controller = RoundSyncController::connect(
        config,
        Arc::clone(&coordinator),
        handle,
        MockConnector::new(local.as_str()),
        locator,
        TokioRuntime::new(),
    )
    .await?;

    loop {
        let round = controller.round_state().round;
        let mut ledger = RewardLedger::new();
        ledger.record(0, local.clone(), 0, vec![vec![1.0, 0.5], vec![0.25]]);
        for (i, peer) in neighbours.iter().enumerate() {
            let reward = ((round + i as u64) % 3) as f64;
            ledger.record(0, peer.clone(), 0, vec![vec![reward]]);
        }
        controller.on_rewards_updated(&ledger, 1).await;

        if round >= controller.round_state().final_round() {
            break;
        }
        match controller.on_round_advanced(&ledger, 1).await {
            BlockOutcome::FinalRound(round) => {
                info!(round, "swarm reached its final round");
                break;
            }
            BlockOutcome::TimedOut => break,
            outcome => info!(?outcome, "round wait finished"),
        }
    }

    ticker.abort();
    info!(
        peer = %local,
        rounds = controller.round_state().round,
        rewards = coordinator.reward_submissions().len(),
        votes = coordinator.winner_submissions().len(),
        "simulation finished"
    );
    Ok(())
}
