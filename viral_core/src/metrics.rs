//! Viral Coefficient Metrics
//! =========================
//!
//! Derives growth metrics from a referral graph snapshot:
//! - **k-factor**: referrals per user
//! - **Viral cycle time**: days from joining to a user's first referral
//! - **Chain depth**: length of referral chains from organic users
//! - **Network value**: damped Metcalfe approximation `n * log10(n)`
//!
//! Every calculation returns a fresh [`NetworkMetrics`] value stamped with the
//! context's current time; nothing is updated in place.

use crate::graph::ReferralGraph;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use viral_env::{EngineContext, Timestamp, UserId};

/// Metrics computed from one graph snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkMetrics {
    /// Referrals per user
    pub k_factor: f64,
    /// Accepted referrals / invitations sent
    pub conversion_rate: f64,
    pub invitations_per_user: f64,
    /// Fraction of users with at least one accepted referral
    pub active_referrer_rate: f64,
    /// Fraction of users marked churned
    pub churn_rate: f64,
    pub avg_chain_depth: f64,
    pub max_chain_depth: usize,
    /// Average days between joining and first accepted referral
    pub viral_cycle_time: f64,
    pub network_value_multiplier: f64,
    pub total_users: usize,
    pub total_referrals: usize,
    pub successful_referrals: usize,
    pub calculated_at: Timestamp,
}

impl NetworkMetrics {
    /// All-zero metrics, as reported for an empty graph.
    pub fn zero(calculated_at: Timestamp) -> Self {
        Self {
            k_factor: 0.0,
            conversion_rate: 0.0,
            invitations_per_user: 0.0,
            active_referrer_rate: 0.0,
            churn_rate: 0.0,
            avg_chain_depth: 0.0,
            max_chain_depth: 0,
            viral_cycle_time: 0.0,
            network_value_multiplier: 0.0,
            total_users: 0,
            total_referrals: 0,
            successful_referrals: 0,
            calculated_at,
        }
    }
}

// =============================================================================
// PURE CALCULATIONS
// =============================================================================

/// `total_referrals / total_users`, or 0 for an empty graph.
pub fn calculate_k_factor(graph: &ReferralGraph) -> f64 {
    ratio(graph.total_referrals(), graph.total_users())
}

/// Average days from joining to first accepted referral, over users who
/// referred anyone. 0 when nobody has.
pub fn calculate_viral_cycle_time(graph: &ReferralGraph) -> f64 {
    let mut first_referral: HashMap<&UserId, Timestamp> = HashMap::new();
    for edge in graph.edges() {
        first_referral
            .entry(&edge.from)
            .and_modify(|ts| *ts = (*ts).min(edge.timestamp))
            .or_insert(edge.timestamp);
    }

    let cycle_times: Vec<f64> = graph
        .nodes()
        .filter(|node| node.referral_count > 0)
        .filter_map(|node| {
            first_referral
                .get(&node.user_id)
                .map(|first| first.days_since(node.joined_at))
        })
        .collect();

    if cycle_times.is_empty() {
        return 0.0;
    }
    cycle_times.iter().sum::<f64>() / cycle_times.len() as f64
}

/// Damped Metcalfe value: 1 for zero or one user, else `n * log10(n)`.
pub fn network_value_multiplier(user_count: usize) -> f64 {
    if user_count <= 1 {
        return 1.0;
    }
    let n = user_count as f64;
    n * n.log10()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

// =============================================================================
// CALCULATOR
// =============================================================================

/// Computes [`NetworkMetrics`] stamped with the context clock.
pub struct ViralCoefficientCalculator {
    context: Arc<dyn EngineContext>,
}

impl ViralCoefficientCalculator {
    pub fn new(context: Arc<dyn EngineContext>) -> Self {
        Self { context }
    }

    /// See [`calculate_k_factor`].
    pub fn calculate_k_factor(&self, graph: &ReferralGraph) -> f64 {
        calculate_k_factor(graph)
    }

    /// Computes the full metrics bundle.
    ///
    /// `total_invitations_sent` of 0 means "unknown": conversion rate and
    /// invitations per user are then reported as 0.
    pub fn calculate_metrics(&self, graph: &ReferralGraph, total_invitations_sent: usize) -> NetworkMetrics {
        let calculated_at = self.context.now();
        if graph.is_empty() {
            return NetworkMetrics::zero(calculated_at);
        }

        let total_users = graph.total_users();
        let total_referrals = graph.total_referrals();

        let k_factor = calculate_k_factor(graph);
        let conversion_rate = ratio(total_referrals, total_invitations_sent);
        let invitations_per_user = ratio(total_invitations_sent, total_users);

        let active_referrers = graph.nodes().filter(|n| n.referral_count > 0).count();
        let churned = graph.nodes().filter(|n| n.churned).count();

        let chains = graph.referral_chains();
        let max_chain_depth = chains.iter().map(Vec::len).max().unwrap_or(0);
        let avg_chain_depth = if chains.is_empty() {
            0.0
        } else {
            chains.iter().map(Vec::len).sum::<usize>() as f64 / chains.len() as f64
        };

        NetworkMetrics {
            k_factor,
            conversion_rate,
            invitations_per_user,
            active_referrer_rate: ratio(active_referrers, total_users),
            churn_rate: ratio(churned, total_users),
            avg_chain_depth,
            max_chain_depth,
            viral_cycle_time: calculate_viral_cycle_time(graph),
            network_value_multiplier: network_value_multiplier(total_users),
            total_users,
            total_referrals,
            successful_referrals: total_referrals,
            calculated_at,
        }
    }

    /// Approximate growth rate: `k_factor / viral_cycle_time`.
    ///
    /// Returns 0 for a non-positive period, an empty graph, or a zero cycle
    /// time. This ignores overlapping cohorts and time-varying k.
    pub fn calculate_growth_rate(&self, graph: &ReferralGraph, period_days: f64) -> f64 {
        if period_days <= 0.0 || graph.is_empty() {
            return 0.0;
        }
        let cycle_time = calculate_viral_cycle_time(graph);
        if cycle_time == 0.0 {
            return 0.0;
        }
        calculate_k_factor(graph) / cycle_time
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Channel, Metadata};
    use approx::assert_relative_eq;
    use viral_env::SystemContext;

    fn calculator() -> ViralCoefficientCalculator {
        ViralCoefficientCalculator::new(Arc::new(SystemContext::new()))
    }

    fn t(days: f64) -> Timestamp {
        Timestamp::EPOCH.plus_days(days)
    }

    /// root (day 0) refers a (day 2) and b (day 4); a refers c (day 5)
    fn sample_graph() -> ReferralGraph {
        let mut g = ReferralGraph::empty();
        g.add_node("root".into(), None, t(0.0), Metadata::new());
        g.add_node("a".into(), Some("root".into()), t(2.0), Metadata::new());
        g.add_edge("root".into(), "a".into(), t(2.0), Channel::Email).unwrap();
        g.add_node("b".into(), Some("root".into()), t(4.0), Metadata::new());
        g.add_edge("root".into(), "b".into(), t(4.0), Channel::Social).unwrap();
        g.add_node("c".into(), Some("a".into()), t(5.0), Metadata::new());
        g.add_edge("a".into(), "c".into(), t(5.0), Channel::Link).unwrap();
        g
    }

    #[test]
    fn test_k_factor_empty() {
        assert_eq!(calculate_k_factor(&ReferralGraph::empty()), 0.0);
    }

    #[test]
    fn test_k_factor_one_organic_two_referred() {
        let mut g = ReferralGraph::empty();
        g.add_node("o".into(), None, t(0.0), Metadata::new());
        for id in ["x", "y"] {
            g.add_node(id.into(), Some("o".into()), t(1.0), Metadata::new());
            g.add_edge("o".into(), id.into(), t(1.0), Channel::Email).unwrap();
        }
        assert_relative_eq!(calculate_k_factor(&g), 2.0 / 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_two_user_scenario_k_factor() {
        let mut g = ReferralGraph::empty();
        g.add_node("u1".into(), None, t(0.0), Metadata::new());
        g.add_node("u2".into(), Some("u1".into()), t(1.0), Metadata::new());
        g.add_edge("u1".into(), "u2".into(), t(1.0), Channel::Email).unwrap();
        assert_eq!(calculate_k_factor(&g), 0.5);
    }

    #[test]
    fn test_viral_cycle_time() {
        // root: first referral at day 2 -> 2 days; a: joined day 2, referred day 5 -> 3 days
        assert_relative_eq!(calculate_viral_cycle_time(&sample_graph()), 2.5, epsilon = 1e-9);
        assert_eq!(calculate_viral_cycle_time(&ReferralGraph::empty()), 0.0);
    }

    #[test]
    fn test_network_value_multiplier() {
        assert_eq!(network_value_multiplier(0), 1.0);
        assert_eq!(network_value_multiplier(1), 1.0);
        assert_relative_eq!(network_value_multiplier(100), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_metrics_empty_graph_is_zero() {
        let metrics = calculator().calculate_metrics(&ReferralGraph::empty(), 10);
        assert_eq!(metrics.k_factor, 0.0);
        assert_eq!(metrics.total_users, 0);
        assert_eq!(metrics.max_chain_depth, 0);
        assert_eq!(metrics.network_value_multiplier, 0.0);
    }

    #[test]
    fn test_full_metrics() {
        let mut g = sample_graph();
        g.mark_churned("b");
        let metrics = calculator().calculate_metrics(&g, 6);

        assert_relative_eq!(metrics.k_factor, 0.75, epsilon = 1e-9);
        assert_relative_eq!(metrics.conversion_rate, 0.5, epsilon = 1e-9);
        assert_relative_eq!(metrics.invitations_per_user, 1.5, epsilon = 1e-9);
        assert_relative_eq!(metrics.active_referrer_rate, 0.5, epsilon = 1e-9);
        assert_relative_eq!(metrics.churn_rate, 0.25, epsilon = 1e-9);
        // chains: [root, a, c], [root, b]
        assert_eq!(metrics.max_chain_depth, 3);
        assert_relative_eq!(metrics.avg_chain_depth, 2.5, epsilon = 1e-9);
        assert_relative_eq!(metrics.viral_cycle_time, 2.5, epsilon = 1e-9);
        assert_relative_eq!(metrics.network_value_multiplier, 4.0 * 4f64.log10(), epsilon = 1e-9);
        assert_eq!(metrics.total_users, 4);
        assert_eq!(metrics.successful_referrals, 3);
    }

    #[test]
    fn test_metrics_without_invitation_count() {
        let metrics = calculator().calculate_metrics(&sample_graph(), 0);
        assert_eq!(metrics.conversion_rate, 0.0);
        assert_eq!(metrics.invitations_per_user, 0.0);
    }

    #[test]
    fn test_linear_chain_depth() {
        let mut g = ReferralGraph::empty();
        g.add_node("a".into(), None, t(0.0), Metadata::new());
        g.add_node("b".into(), Some("a".into()), t(1.0), Metadata::new());
        g.add_edge("a".into(), "b".into(), t(1.0), Channel::Email).unwrap();
        g.add_node("c".into(), Some("b".into()), t(2.0), Metadata::new());
        g.add_edge("b".into(), "c".into(), t(2.0), Channel::Email).unwrap();

        assert_eq!(calculator().calculate_metrics(&g, 0).max_chain_depth, 3);
    }

    #[test]
    fn test_growth_rate() {
        let calc = calculator();
        let g = sample_graph();

        assert_relative_eq!(calc.calculate_growth_rate(&g, 30.0), 0.75 / 2.5, epsilon = 1e-9);
        assert_eq!(calc.calculate_growth_rate(&g, 0.0), 0.0);
        assert_eq!(calc.calculate_growth_rate(&ReferralGraph::empty(), 30.0), 0.0);

        // Referral at the same instant as joining gives a zero cycle time
        let mut instant = ReferralGraph::empty();
        instant.add_node("a".into(), None, t(1.0), Metadata::new());
        instant.add_node("b".into(), Some("a".into()), t(1.0), Metadata::new());
        instant.add_edge("a".into(), "b".into(), t(1.0), Channel::Email).unwrap();
        assert_eq!(calc.calculate_growth_rate(&instant, 30.0), 0.0);
    }
}
