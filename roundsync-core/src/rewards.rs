//! Reward aggregation
//!
//! The trainer records one reward per generation, grouped by batch, agent and
//! stage. Before submitting to the coordinator a participant collapses that
//! history into one scalar per agent and derives its own signal from it.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::traits::{BatchId, PeerId};

/// Rewards of one agent: batch id to the per-generation reward lists
pub type AgentRewards = BTreeMap<BatchId, Vec<Vec<f64>>>;

/// Rewards of one stage, keyed by agent
pub type StageRewards = BTreeMap<PeerId, AgentRewards>;

/// Total reward per agent
pub type SignalByAgent = BTreeMap<PeerId, f64>;

/// Reward history of a round: `stage -> agent -> batch -> [[reward]]`
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RewardLedger {
    stages: BTreeMap<u64, StageRewards>,
}

impl RewardLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the rewards of one generation batch
    pub fn record(&mut self, stage: u64, agent: PeerId, batch: BatchId, generations: Vec<Vec<f64>>) {
        self.stages
            .entry(stage)
            .or_default()
            .entry(agent)
            .or_default()
            .entry(batch)
            .or_default()
            .extend(generations);
    }

    /// Rewards of a single stage, if any were recorded
    pub fn stage(&self, stage: u64) -> Option<&StageRewards> {
        self.stages.get(&stage)
    }

    /// True when no stage has been recorded
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Sum every generation reward of every completed stage (`< current_stage`)
/// per agent. Stages missing from the ledger contribute nothing.
pub fn total_rewards_by_agent(ledger: &RewardLedger, current_stage: u64) -> SignalByAgent {
    let mut totals = SignalByAgent::new();
    for (_, stage) in ledger.stages.range(..current_stage) {
        for (agent, batches) in stage {
            let agent_total: f64 = batches
                .values()
                .flat_map(|generations| generations.iter())
                .map(|rewards| rewards.iter().sum::<f64>())
                .sum();
            *totals.entry(agent.clone()).or_insert(0.0) += agent_total;
        }
    }
    totals
}

/// Signal this node contributes for itself.
///
/// An empty map yields exactly `0`. Otherwise the node's own total (default
/// `0`) gets a `+1` bonus when strictly positive and is passed through as-is
/// when zero or negative.
pub fn my_signal(signal_by_agent: &SignalByAgent, self_id: &PeerId) -> f64 {
    if signal_by_agent.is_empty() {
        return 0.0;
    }
    let signal = signal_by_agent.get(self_id).copied().unwrap_or(0.0);
    if signal > 0.0 {
        signal + 1.0
    } else {
        signal
    }
}

/// Agent with the highest total.
///
/// Ties resolve to the first agent in ascending id order: the scan only
/// replaces the leader on a strictly greater value. Returns `None` for an
/// empty map.
pub fn select_winner(signal_by_agent: &SignalByAgent) -> Option<&PeerId> {
    let mut best: Option<(&PeerId, f64)> = None;
    for (agent, &signal) in signal_by_agent {
        match best {
            Some((_, leader)) if signal <= leader => {}
            _ => best = Some((agent, signal)),
        }
    }
    best.map(|(agent, _)| agent)
}
