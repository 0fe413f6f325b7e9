//! The referral graph: users as nodes, accepted referrals as edges.
//!
//! The graph keeps its aggregate counters (`total_users`, `total_referrals`,
//! `organic_users`) in step with its contents. Every mutator validates its
//! input before touching any state, so a rejected call leaves the graph
//! exactly as it was and callers never observe a half-applied update.
//! Snapshots are taken with `Clone`.

use crate::error::{GrowthError, GrowthResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;
use viral_env::{Timestamp, UserId};

/// Opaque key-value bag attached to nodes and events.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Channel through which an invitation was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Email,
    Social,
    Link,
    InApp,
    Other,
}

impl Channel {
    /// Returns every channel.
    pub fn all() -> [Channel; 5] {
        [
            Channel::Email,
            Channel::Social,
            Channel::Link,
            Channel::InApp,
            Channel::Other,
        ]
    }

    /// Returns the channel name.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Social => "social",
            Channel::Link => "link",
            Channel::InApp => "in-app",
            Channel::Other => "other",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "social" => Ok(Channel::Social),
            "link" => Ok(Channel::Link),
            "in-app" | "in_app" | "inapp" => Ok(Channel::InApp),
            "other" => Ok(Channel::Other),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

/// A user in the referral graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralNode {
    pub user_id: UserId,

    /// Referrer, or `None` for organic acquisition
    pub referred_by: Option<UserId>,

    pub joined_at: Timestamp,

    /// Accepted referrals made by this user (outgoing edge count)
    pub referral_count: u32,

    pub churned: bool,

    pub metadata: Metadata,
}

impl ReferralNode {
    /// True if the user joined without a referrer.
    pub fn is_organic(&self) -> bool {
        self.referred_by.is_none()
    }
}

/// One accepted referral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralEdge {
    pub from: UserId,
    pub to: UserId,
    pub timestamp: Timestamp,
    pub channel: Channel,
}

/// Users and referral edges with derived aggregate counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferralGraph {
    nodes: HashMap<UserId, ReferralNode>,

    /// Arrival order; used for tie-breaking
    edges: Vec<ReferralEdge>,

    total_users: usize,
    total_referrals: usize,
    organic_users: usize,
    last_updated: Timestamp,

    /// Users that already have an incoming edge
    #[serde(skip)]
    referred: HashSet<UserId>,

    /// Outgoing edge counts of referrers not yet added as nodes
    #[serde(skip)]
    dangling_referrals: HashMap<UserId, u32>,
}

impl ReferralGraph {
    /// Creates an empty graph.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a user.
    ///
    /// Callers must not add the same `user_id` twice. If they do, the node is
    /// overwritten; its accepted-referral count is carried over so the
    /// outgoing-edge invariant survives, and the organic counter is
    /// recomputed. Edges recorded from this user before it was a node are
    /// credited to its referral count.
    pub fn add_node(
        &mut self,
        user_id: UserId,
        referred_by: Option<UserId>,
        joined_at: Timestamp,
        metadata: Metadata,
    ) {
        let organic = referred_by.is_none();
        let node = ReferralNode {
            user_id: user_id.clone(),
            referred_by,
            joined_at,
            referral_count: self.dangling_referrals.remove(&user_id).unwrap_or(0),
            churned: false,
            metadata,
        };

        if let Some(old) = self.nodes.insert(user_id.clone(), node) {
            warn!(user = %user_id, "overwriting existing referral node");
            if old.is_organic() {
                self.organic_users -= 1;
            }
            if let Some(node) = self.nodes.get_mut(&user_id) {
                node.referral_count = old.referral_count;
            }
        }

        if organic {
            self.organic_users += 1;
        }
        self.total_users = self.nodes.len();
        self.touch(joined_at);
    }

    /// Records an accepted referral from `from` to `to`.
    ///
    /// A user can be referred at most once and never by themselves; if `to`
    /// is already a node its `referred_by` must equal `from`. The edge is
    /// recorded even when `from` is not a node; the count is then held back
    /// until `from` is added.
    pub fn add_edge(
        &mut self,
        from: UserId,
        to: UserId,
        timestamp: Timestamp,
        channel: Channel,
    ) -> GrowthResult<()> {
        self.check_edge(&from, &to)?;

        match self.nodes.get_mut(&from) {
            Some(referrer) => referrer.referral_count += 1,
            None => *self.dangling_referrals.entry(from.clone()).or_insert(0) += 1,
        }
        self.referred.insert(to.clone());
        self.edges.push(ReferralEdge {
            from,
            to,
            timestamp,
            channel,
        });
        self.total_referrals = self.edges.len();
        self.touch(timestamp);
        Ok(())
    }

    /// Checks whether an edge `from -> to` would be accepted, without mutating.
    pub fn check_edge(&self, from: &UserId, to: &UserId) -> GrowthResult<()> {
        if from == to {
            return Err(GrowthError::SelfReferral { user: to.clone() });
        }
        if self.referred.contains(to) {
            return Err(GrowthError::DuplicateReferral { user: to.clone() });
        }
        if let Some(node) = self.nodes.get(to) {
            if node.referred_by.as_ref() != Some(from) {
                return Err(GrowthError::ReferrerMismatch {
                    user: to.clone(),
                    expected: node.referred_by.clone(),
                    actual: from.clone(),
                });
            }
        }
        Ok(())
    }

    /// Marks a user as churned. Returns false for unknown users.
    pub fn mark_churned(&mut self, user_id: &str) -> bool {
        match self.nodes.get_mut(user_id) {
            Some(node) => {
                node.churned = true;
                true
            }
            None => false,
        }
    }

    /// Enumerates referral chains.
    ///
    /// Runs a depth-first walk from every organic user (oldest first) along
    /// outgoing edges in arrival order. A chain is emitted whenever the walk
    /// reaches a user with no outgoing edge to an unvisited user. The visited
    /// set is shared across all walks, so no user is entered twice even if
    /// the edges are malformed.
    pub fn referral_chains(&self) -> Vec<Vec<UserId>> {
        let mut children: HashMap<&UserId, Vec<&UserId>> = HashMap::new();
        for edge in &self.edges {
            children.entry(&edge.from).or_default().push(&edge.to);
        }

        let mut roots: Vec<&ReferralNode> = self.nodes.values().filter(|n| n.is_organic()).collect();
        roots.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        let mut visited: HashSet<&UserId> = HashSet::new();
        let mut chains = Vec::new();

        for root in roots {
            if !visited.insert(&root.user_id) {
                continue;
            }

            // Frame: (user, next child index, descended into any child)
            let mut stack: Vec<(&UserId, usize, bool)> = vec![(&root.user_id, 0, false)];
            let mut path: Vec<&UserId> = vec![&root.user_id];

            while let Some(frame) = stack.last_mut() {
                let kids = children.get(frame.0).map(Vec::as_slice).unwrap_or(&[]);
                let mut next = None;
                while frame.1 < kids.len() {
                    let candidate = kids[frame.1];
                    frame.1 += 1;
                    if visited.insert(candidate) {
                        next = Some(candidate);
                        break;
                    }
                }

                match next {
                    Some(child) => {
                        frame.2 = true;
                        path.push(child);
                        stack.push((child, 0, false));
                    }
                    None => {
                        if !frame.2 {
                            chains.push(path.iter().map(|id| (*id).clone()).collect());
                        }
                        stack.pop();
                        path.pop();
                    }
                }
            }
        }

        chains
    }

    /// Longest chain length, or 0 for an empty graph.
    pub fn depth(&self) -> usize {
        self.referral_chains().iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Accepted referrals per channel.
    pub fn channel_breakdown(&self) -> BTreeMap<Channel, usize> {
        let mut counts = BTreeMap::new();
        for edge in &self.edges {
            *counts.entry(edge.channel).or_insert(0) += 1;
        }
        counts
    }

    /// Lists every broken aggregate or edge invariant; empty when consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.total_users != self.nodes.len() {
            problems.push(format!(
                "total_users {} != node count {}",
                self.total_users,
                self.nodes.len()
            ));
        }
        if self.total_referrals != self.edges.len() {
            problems.push(format!(
                "total_referrals {} != edge count {}",
                self.total_referrals,
                self.edges.len()
            ));
        }
        let organic = self.nodes.values().filter(|n| n.is_organic()).count();
        if organic != self.organic_users {
            problems.push(format!("organic_users {} != organic nodes {}", self.organic_users, organic));
        }

        let mut outgoing: HashMap<&UserId, u32> = HashMap::new();
        let mut seen_targets: HashSet<&UserId> = HashSet::new();
        for edge in &self.edges {
            *outgoing.entry(&edge.from).or_insert(0) += 1;
            if !seen_targets.insert(&edge.to) {
                problems.push(format!("{} has more than one incoming edge", edge.to));
            }
            if let Some(node) = self.nodes.get(&edge.to) {
                if node.referred_by.as_ref() != Some(&edge.from) {
                    problems.push(format!("{} referred_by disagrees with edge from {}", edge.to, edge.from));
                }
            }
        }
        for node in self.nodes.values() {
            let expected = outgoing.get(&node.user_id).copied().unwrap_or(0);
            if node.referral_count != expected {
                problems.push(format!(
                    "{} referral_count {} != outgoing edges {}",
                    node.user_id, node.referral_count, expected
                ));
            }
        }

        problems
    }

    pub fn node(&self, user_id: &str) -> Option<&ReferralNode> {
        self.nodes.get(user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.nodes.contains_key(user_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ReferralNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[ReferralEdge] {
        &self.edges
    }

    /// Outgoing edges of `user_id` in arrival order.
    pub fn outgoing_edges<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a ReferralEdge> + 'a {
        self.edges.iter().filter(move |e| e.from.as_str() == user_id)
    }

    pub fn total_users(&self) -> usize {
        self.total_users
    }

    pub fn total_referrals(&self) -> usize {
        self.total_referrals
    }

    pub fn organic_users(&self) -> usize {
        self.organic_users
    }

    pub fn referred_users(&self) -> usize {
        self.total_users - self.organic_users
    }

    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn touch(&mut self, at: Timestamp) {
        self.last_updated = self.last_updated.max(at);
    }
}
