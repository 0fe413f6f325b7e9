//! Incremental construction of a [`ReferralGraph`].
//!
//! `GraphBuilder` owns one graph value. Each method checks its input against
//! the current graph before changing anything, so a caller never observes a
//! half-applied referral. A builder is not meant to be shared between
//! threads without external serialization.

use crate::error::GrowthResult;
use crate::event::ReferralEvent;
use crate::graph::{Channel, Metadata, ReferralGraph};
use crate::persona::Persona;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use viral_env::{EngineContext, Timestamp, UserId};

/// Diagnostic counts from a single pass over the graph's nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStatistics {
    pub total_users: usize,
    pub organic_users: usize,
    pub referred_users: usize,
    pub active_referrers: usize,
    pub churned_users: usize,
    pub total_referrals: usize,
}

/// Stateful wrapper that grows a referral graph from personas and events.
pub struct GraphBuilder {
    graph: ReferralGraph,
    context: Arc<dyn EngineContext>,
}

impl GraphBuilder {
    /// Creates a builder over an empty graph.
    pub fn new(context: Arc<dyn EngineContext>) -> Self {
        Self::with_graph(ReferralGraph::empty(), context)
    }

    /// Continues building on an existing graph.
    pub fn with_graph(graph: ReferralGraph, context: Arc<dyn EngineContext>) -> Self {
        Self { graph, context }
    }

    /// Adds personas as organic users joining now.
    ///
    /// Personas already present are left untouched. Returns how many were added.
    pub fn add_personas(&mut self, personas: &[Persona]) -> usize {
        let now = self.context.now();
        let mut added = 0;
        for persona in personas {
            if self.graph.contains(persona.id.as_str()) {
                debug!(user = %persona.id, "persona already in graph");
                continue;
            }
            self.graph
                .add_node(persona.id.clone(), None, now, persona.node_metadata());
            added += 1;
        }
        added
    }

    /// Folds accepted events into the graph.
    ///
    /// Events that were not accepted, or lack a referred user, are ignored.
    /// Events that would break the one-referrer-per-user rule are skipped.
    /// Returns how many events were applied.
    pub fn build_from_events(&mut self, events: &[ReferralEvent]) -> usize {
        let mut applied = 0;
        for event in events {
            if !event.is_accepted() {
                continue;
            }
            let Some(referred) = event.referred_user_id() else {
                continue;
            };

            match self.apply_referral(
                event.referrer_id.clone(),
                referred.clone(),
                event.join_time(),
                event.channel,
                event.metadata.clone(),
            ) {
                Ok(()) => applied += 1,
                Err(e) => warn!(event = %event.id, error = %e, "skipping referral event"),
            }
        }
        applied
    }

    /// Records a referral directly, adding the referred user if absent.
    pub fn add_referral(
        &mut self,
        referrer_id: UserId,
        referred_user_id: UserId,
        timestamp: Timestamp,
        channel: Channel,
    ) -> GrowthResult<()> {
        self.apply_referral(referrer_id, referred_user_id, timestamp, channel, Metadata::new())
    }

    fn apply_referral(
        &mut self,
        referrer_id: UserId,
        referred_user_id: UserId,
        timestamp: Timestamp,
        channel: Channel,
        metadata: Metadata,
    ) -> GrowthResult<()> {
        self.graph.check_edge(&referrer_id, &referred_user_id)?;

        if !self.graph.contains(referred_user_id.as_str()) {
            self.graph.add_node(
                referred_user_id.clone(),
                Some(referrer_id.clone()),
                timestamp,
                metadata,
            );
        }
        debug!(from = %referrer_id, to = %referred_user_id, %channel, "referral accepted");
        self.graph
            .add_edge(referrer_id, referred_user_id, timestamp, channel)
    }

    /// Marks a user as churned. Unknown or already churned users are a no-op.
    pub fn mark_as_churned(&mut self, user_id: &str) {
        if !self.graph.mark_churned(user_id) {
            debug!(user = user_id, "churn for unknown user ignored");
        }
    }

    /// Users referred by `user_id`, in arrival order.
    pub fn referred_users(&self, user_id: &str) -> Vec<UserId> {
        self.graph
            .outgoing_edges(user_id)
            .map(|edge| edge.to.clone())
            .collect()
    }

    /// The user's referrer, if any.
    pub fn referrer(&self, user_id: &str) -> Option<UserId> {
        self.graph.node(user_id).and_then(|n| n.referred_by.clone())
    }

    /// Path from the user's organic ancestor down to the user.
    ///
    /// Unknown users yield `[user_id]`.
    pub fn referral_chain(&self, user_id: &str) -> Vec<UserId> {
        let mut chain = vec![UserId::from(user_id)];
        let mut seen: HashSet<&str> = HashSet::from([user_id]);
        let mut current = self.graph.node(user_id);

        while let Some(parent) = current.and_then(|n| n.referred_by.as_ref()) {
            if !seen.insert(parent.as_str()) {
                warn!(user = user_id, "referral cycle detected while walking chain");
                break;
            }
            chain.insert(0, parent.clone());
            current = self.graph.node(parent.as_str());
        }
        chain
    }

    /// Recomputes diagnostic counts in one pass over the nodes.
    pub fn statistics(&self) -> GraphStatistics {
        let mut stats = GraphStatistics {
            total_users: self.graph.total_users(),
            total_referrals: self.graph.total_referrals(),
            ..Default::default()
        };
        for node in self.graph.nodes() {
            if node.is_organic() {
                stats.organic_users += 1;
            } else {
                stats.referred_users += 1;
            }
            if node.referral_count > 0 {
                stats.active_referrers += 1;
            }
            if node.churned {
                stats.churned_users += 1;
            }
        }
        stats
    }

    /// Current graph.
    pub fn graph(&self) -> &ReferralGraph {
        &self.graph
    }

    /// A snapshot that later builder calls will not affect.
    pub fn snapshot(&self) -> ReferralGraph {
        self.graph.clone()
    }

    /// Consumes the builder, returning the graph.
    pub fn into_graph(self) -> ReferralGraph {
        self.graph
    }
}
