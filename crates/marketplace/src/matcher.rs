//! Matcher (C7): cycle discovery over live intents, proposal generation,
//! matching runs, and canary A/B routing with automatic rollback.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::entities::{
    CanarySamples, CycleProposal, IntentStatus, MatchingRun, ProposalParticipant, ProposalStatus,
    SwapIntent,
};

#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    pub max_proposals: usize,
    /// Safety bound on cycle length independent of any one intent's own
    /// `max_cycle_length`, so a pathological graph can't blow up the search.
    pub global_max_cycle_depth: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_proposals: 50,
            global_max_cycle_depth: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CanaryThresholds {
    pub error_rate_bps: u32,
    pub timeout_rate_bps: u32,
    pub limited_rate_bps: u32,
    pub non_negative_delta_rate_bps: u32,
}

#[derive(Debug, Clone)]
pub struct CanaryState {
    pub rollback_active: bool,
    pub samples: CanarySamples,
}

impl CanaryState {
    pub fn new() -> Self {
        Self {
            rollback_active: false,
            samples: CanarySamples {
                error_rate_bps: 0,
                timeout_rate_bps: 0,
                limited_rate_bps: 0,
                non_negative_delta_rate_bps: 0,
            },
        }
    }

    /// Record one v2 run's observed rates and trip the rollback latch if
    /// any exceeds its threshold. Once tripped, stays tripped until an
    /// operator resets it out-of-band.
    pub fn record_v2_outcome(&mut self, samples: CanarySamples, thresholds: &CanaryThresholds) {
        self.samples = samples;
        if samples.error_rate_bps > thresholds.error_rate_bps
            || samples.timeout_rate_bps > thresholds.timeout_rate_bps
            || samples.limited_rate_bps > thresholds.limited_rate_bps
            || samples.non_negative_delta_rate_bps > thresholds.non_negative_delta_rate_bps
        {
            self.rollback_active = true;
        }
    }
}

struct Edge {
    to_intent_id: String,
    asset_key: String,
    value_usd: f64,
}

fn build_graph(intents: &[&SwapIntent]) -> HashMap<String, Vec<Edge>> {
    let mut graph: HashMap<String, Vec<Edge>> = HashMap::new();
    for i in intents {
        if i.status != IntentStatus::Active {
            continue;
        }
        let mut edges = Vec::new();
        for j in intents {
            if i.id == j.id || j.status != IntentStatus::Active {
                continue;
            }
            for asset in &j.offer {
                let offered_categories = asset.categories();
                if !i.want_spec.is_satisfied_by(asset, &offered_categories) {
                    continue;
                }
                if i.value_band.contains(asset.value_usd) && j.value_band.contains(asset.value_usd) {
                    edges.push(Edge {
                        to_intent_id: j.id.clone(),
                        asset_key: asset.asset_key(),
                        value_usd: asset.value_usd,
                    });
                    break;
                }
            }
        }
        graph.insert(i.id.clone(), edges);
    }
    graph
}

/// DFS enumeration of simple cycles `2..=bound`, where `bound` is the
/// smallest `max_cycle_length` among any intent reachable in the path so
/// far and the matcher's own global safety cap.
fn discover_cycles(
    intents_by_id: &HashMap<&str, &SwapIntent>,
    graph: &HashMap<String, Vec<Edge>>,
    global_max_depth: usize,
) -> Vec<Vec<(String, String, f64)>> {
    let mut found = Vec::new();
    let mut ids: Vec<&String> = graph.keys().collect();
    ids.sort();

    for start in &ids {
        let start_cap = intents_by_id[start.as_str()].trust_constraints.max_cycle_length as usize;
        let bound = start_cap.min(global_max_depth).max(2);
        let mut path = vec![(*start).clone()];
        let mut path_edges: Vec<(String, String, f64)> = Vec::new();
        dfs(
            start,
            start,
            graph,
            intents_by_id,
            bound,
            &mut path,
            &mut path_edges,
            &mut found,
        );
    }

    found
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    start: &str,
    current: &str,
    graph: &HashMap<String, Vec<Edge>>,
    intents_by_id: &HashMap<&str, &SwapIntent>,
    bound: usize,
    path: &mut Vec<String>,
    path_edges: &mut Vec<(String, String, f64)>,
    found: &mut Vec<Vec<(String, String, f64)>>,
) {
    if path.len() > bound {
        return;
    }
    let Some(edges) = graph.get(current) else {
        return;
    };
    for edge in edges {
        if edge.to_intent_id == start && path.len() >= 2 {
            let mut cycle = path_edges.clone();
            cycle.push((current.to_string(), edge.asset_key.clone(), edge.value_usd));
            found.push(cycle);
            continue;
        }
        if path.contains(&edge.to_intent_id) {
            continue;
        }
        let next_cap = intents_by_id[edge.to_intent_id.as_str()]
            .trust_constraints
            .max_cycle_length as usize;
        if path.len() + 1 > next_cap.min(bound) {
            continue;
        }
        path.push(edge.to_intent_id.clone());
        path_edges.push((current.to_string(), edge.asset_key.clone(), edge.value_usd));
        dfs(
            start,
            &edge.to_intent_id,
            graph,
            intents_by_id,
            bound,
            path,
            path_edges,
            found,
        );
        path.pop();
        path_edges.pop();
    }
}

pub struct MatchingResult {
    pub proposals: Vec<CycleProposal>,
    pub run: MatchingRun,
}

/// Run the matcher once over `intents`, producing up to `max_proposals`
/// cycle proposals scored by `(length asc, total |value_delta| asc,
/// lexicographic intent-id list asc)` for determinism.
pub fn run_matching(
    intents: &[&SwapIntent],
    partner_id: Option<&str>,
    config: &MatcherConfig,
    canary: &CanaryState,
    engine_version_if_routed: &str,
    now: DateTime<Utc>,
    mut id_factory: impl FnMut() -> String,
) -> MatchingResult {
    let engine_version = if canary.rollback_active {
        "v1"
    } else {
        engine_version_if_routed
    };

    let intents_by_id: HashMap<&str, &SwapIntent> =
        intents.iter().map(|i| (i.id.as_str(), *i)).collect();
    let graph = build_graph(intents);
    let mut cycles = discover_cycles(&intents_by_id, &graph, config.global_max_cycle_depth);

    cycles.sort_by(|a, b| {
        let len_cmp = a.len().cmp(&b.len());
        if len_cmp != std::cmp::Ordering::Equal {
            return len_cmp;
        }
        let delta_a: f64 = a.iter().map(|(_, _, v)| v.abs()).sum();
        let delta_b: f64 = b.iter().map(|(_, _, v)| v.abs()).sum();
        match delta_a.partial_cmp(&delta_b).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Equal => {
                let ids_a: Vec<&str> = a.iter().map(|(id, _, _)| id.as_str()).collect();
                let ids_b: Vec<&str> = b.iter().map(|(id, _, _)| id.as_str()).collect();
                ids_a.cmp(&ids_b)
            }
            other => other,
        }
    });

    let mut seen_intent_sets: Vec<Vec<String>> = Vec::new();
    let mut proposals = Vec::new();

    for cycle in cycles {
        if proposals.len() >= config.max_proposals {
            break;
        }
        let mut ids: Vec<String> = cycle.iter().map(|(id, _, _)| id.clone()).collect();
        ids.sort();
        if seen_intent_sets.contains(&ids) {
            continue;
        }

        let n = cycle.len();
        let mut participants = Vec::with_capacity(n);
        let mut value_closure_delta = 0.0;
        for (idx, (from_id, asset_key, value_usd)) in cycle.iter().enumerate() {
            let to_id = &cycle[(idx + 1) % n].0;
            let from_intent = intents_by_id[from_id.as_str()];
            let to_intent = intents_by_id[to_id.as_str()];
            participants.push(ProposalParticipant {
                intent_id: from_id.clone(),
                from: from_intent.actor.clone(),
                to: to_intent.actor.clone(),
                asset_key: asset_key.clone(),
                value_usd: *value_usd,
            });
            value_closure_delta += value_usd;
        }

        let expires_at = now + chrono::Duration::hours(1);
        proposals.push(CycleProposal {
            id: id_factory(),
            partner_id: partner_id.map(|p| p.to_string()),
            participants,
            expires_at,
            value_closure_delta,
            status: ProposalStatus::Live,
            created_at: now,
        });
        seen_intent_sets.push(ids);
    }

    let proposal_ids: Vec<String> = proposals.iter().map(|p| p.id.clone()).collect();
    let run = MatchingRun {
        run_id: id_factory(),
        selected_proposals_count: proposals.len(),
        stats: serde_json::json!({ "candidate_cycles_scored": proposal_ids.len() }),
        proposal_ids,
        engine_version: engine_version.to_string(),
        created_at: now,
    };

    MatchingResult { proposals, run }
}

/// Sweep live proposals past `expires_at` when `replace_existing=true`.
pub fn expire_superseded_proposals(proposals: &mut [CycleProposal], now: DateTime<Utc>) {
    for proposal in proposals.iter_mut() {
        if proposal.status == ProposalStatus::Live && proposal.expires_at <= now {
            proposal.status = ProposalStatus::Expired;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        AssetDescriptor, SettlementPreferences, TimeConstraints, TrustConstraints, ValueBand,
        WantSpec,
    };
    use swapgraph_core::ActorRef;

    fn asset(id: &str, value_usd: f64) -> AssetDescriptor {
        AssetDescriptor {
            platform: "steam".to_string(),
            app_id: "app1".to_string(),
            context_id: "ctx1".to_string(),
            asset_id: id.to_string(),
            value_usd,
            proof: None,
        }
    }

    fn intent(id: &str, actor_id: &str, offer_asset: &str, want_asset_key: &str, value_usd: f64) -> SwapIntent {
        let now = Utc::now();
        SwapIntent {
            id: id.to_string(),
            partner_id: None,
            actor: ActorRef::user(actor_id),
            offer: vec![asset(offer_asset, value_usd)],
            want_spec: WantSpec::Any {
                asset_keys: vec![want_asset_key.to_string()],
            },
            value_band: ValueBand {
                min_usd: value_usd - 5.0,
                max_usd: value_usd + 5.0,
                pricing_source: "internal".to_string(),
            },
            trust_constraints: TrustConstraints {
                max_cycle_length: 4,
                min_counterparty_reliability: 0.0,
            },
            time_constraints: TimeConstraints {
                expires_at: now + chrono::Duration::hours(1),
                urgency: "normal".to_string(),
            },
            settlement_preferences: SettlementPreferences { require_escrow: true },
            status: IntentStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn two_cycle_happy_path_produces_one_proposal() {
        let i1 = intent("i1", "u1", "asset_a", "steam:app1:ctx1:asset_b", 120.0);
        let i2 = intent("i2", "u2", "asset_b", "steam:app1:ctx1:asset_a", 120.0);
        let intents = vec![&i1, &i2];
        let config = MatcherConfig::default();
        let canary = CanaryState::new();
        let mut counter = 0;
        let result = run_matching(&intents, None, &config, &canary, "v1", Utc::now(), || {
            counter += 1;
            format!("id-{counter}")
        });
        assert_eq!(result.proposals.len(), 1);
        assert_eq!(result.proposals[0].participants.len(), 2);
    }

    #[test]
    fn rollback_active_forces_v1_regardless_of_requested_version() {
        let mut canary = CanaryState::new();
        canary.record_v2_outcome(
            CanarySamples {
                error_rate_bps: 9999,
                timeout_rate_bps: 0,
                limited_rate_bps: 0,
                non_negative_delta_rate_bps: 0,
            },
            &CanaryThresholds {
                error_rate_bps: 100,
                ..Default::default()
            },
        );
        assert!(canary.rollback_active);

        let i1 = intent("i1", "u1", "asset_a", "steam:app1:ctx1:asset_b", 120.0);
        let i2 = intent("i2", "u2", "asset_b", "steam:app1:ctx1:asset_a", 120.0);
        let intents = vec![&i1, &i2];
        let config = MatcherConfig::default();
        let mut counter = 0;
        let result = run_matching(&intents, None, &config, &canary, "v2", Utc::now(), || {
            counter += 1;
            format!("id-{counter}")
        });
        assert_eq!(result.run.engine_version, "v1");
    }

    #[test]
    fn expired_proposals_are_marked_expired_not_deleted() {
        let now = Utc::now();
        let mut proposals = vec![CycleProposal {
            id: "p1".to_string(),
            partner_id: None,
            participants: vec![],
            expires_at: now - chrono::Duration::minutes(1),
            value_closure_delta: 0.0,
            status: ProposalStatus::Live,
            created_at: now - chrono::Duration::hours(1),
        }];
        expire_superseded_proposals(&mut proposals, now);
        assert_eq!(proposals[0].status, ProposalStatus::Expired);
    }
}
