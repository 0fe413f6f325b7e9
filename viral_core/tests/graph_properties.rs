use proptest::prelude::*;
use viral_core::{
    acceptance_probability, Channel, GraphBuilder, Metadata, NetworkConfig, Persona, ReferralEvent,
    ReferralGraph, ViralCoefficientCalculator,
};
use viral_env::{SystemContext, Timestamp, UserId};

fn uid(i: usize) -> UserId {
    UserId::new(format!("u{}", i))
}

#[derive(Debug, Clone)]
enum GraphOp {
    Node { user: usize, referrer: Option<usize> },
    Edge { from: usize, to: usize },
}

fn graph_op() -> impl Strategy<Value = GraphOp> {
    prop_oneof![
        (0..12usize, proptest::option::of(0..12usize))
            .prop_map(|(user, referrer)| GraphOp::Node { user, referrer }),
        (0..12usize, 0..12usize).prop_map(|(from, to)| GraphOp::Edge { from, to }),
    ]
}

#[derive(Debug, Clone)]
enum BuilderOp {
    Persona(usize),
    Referral(usize, usize),
    Churn(usize),
}

fn builder_op() -> impl Strategy<Value = BuilderOp> {
    prop_oneof![
        (0..15usize).prop_map(BuilderOp::Persona),
        (0..15usize, 0..15usize).prop_map(|(a, b)| BuilderOp::Referral(a, b)),
        (0..15usize).prop_map(BuilderOp::Churn),
    ]
}

proptest! {
    #[test]
    fn prop_counters_track_contents(ops in proptest::collection::vec(graph_op(), 0..60)) {
        let mut graph = ReferralGraph::empty();

        for (step, op) in ops.into_iter().enumerate() {
            let at = Timestamp::from_millis(step as u64);
            match op {
                GraphOp::Node { user, referrer } => {
                    graph.add_node(uid(user), referrer.map(uid), at, Metadata::new());
                }
                GraphOp::Edge { from, to } => {
                    // Rejected edges must leave the graph untouched
                    let before = graph.clone();
                    if graph.add_edge(uid(from), uid(to), at, Channel::Link).is_err() {
                        prop_assert_eq!(&graph, &before);
                    }
                }
            }

            prop_assert_eq!(graph.total_users(), graph.nodes().count());
            prop_assert_eq!(graph.total_referrals(), graph.edges().len());
            prop_assert_eq!(
                graph.organic_users(),
                graph.nodes().filter(|n| n.referred_by.is_none()).count()
            );
        }
    }

    #[test]
    fn prop_builder_keeps_every_invariant(ops in proptest::collection::vec(builder_op(), 0..80)) {
        let mut builder = GraphBuilder::new(SystemContext::shared());

        for (step, op) in ops.into_iter().enumerate() {
            match op {
                BuilderOp::Persona(i) => {
                    builder.add_personas(&[Persona::new(uid(i))]);
                }
                BuilderOp::Referral(a, b) => {
                    let at = Timestamp::from_millis(step as u64);
                    let _ = builder.add_referral(uid(a), uid(b), at, Channel::Social);
                }
                BuilderOp::Churn(i) => builder.mark_as_churned(uid(i).as_str()),
            }

            let violations = builder.graph().invariant_violations();
            prop_assert!(violations.is_empty(), "{:?}", violations);
        }

        // Every chain starts at an organic user and each user ends at most one chain
        let chains = builder.graph().referral_chains();
        let mut leaves = std::collections::HashSet::new();
        for chain in &chains {
            let root = builder.graph().node(chain[0].as_str()).unwrap();
            prop_assert!(root.is_organic());
            prop_assert!(leaves.insert(chain.last().unwrap().clone()));
        }
    }

    #[test]
    fn prop_acceptance_never_exceeds_cap(
        multiplier in 0.0..1000.0f64,
        base in 0.0..=1.0f64,
        network_size in 0..10_000_000usize,
    ) {
        let config = NetworkConfig::builder()
            .social_proof_multiplier(multiplier)
            .base_acceptance_rate(base)
            .build()
            .unwrap();
        let p = acceptance_probability(&config, network_size);
        prop_assert!((0.0..=0.9).contains(&p));
    }

    #[test]
    fn prop_churn_is_idempotent(referred in 0..10usize, target in 0..12usize) {
        let mut builder = GraphBuilder::new(SystemContext::shared());
        builder.add_personas(&[Persona::new("root")]);
        for i in 0..referred {
            builder
                .add_referral("root".into(), uid(i), Timestamp::from_millis(i as u64), Channel::Email)
                .unwrap();
        }

        builder.mark_as_churned(uid(target).as_str());
        let once = builder.snapshot();
        builder.mark_as_churned(uid(target).as_str());
        prop_assert_eq!(builder.graph(), &once);
    }
}

#[test]
fn test_two_user_scenario() {
    let mut graph = ReferralGraph::empty();
    graph.add_node("u1".into(), None, Timestamp::from_days(0), Metadata::new());
    graph.add_node("u2".into(), Some("u1".into()), Timestamp::from_days(1), Metadata::new());
    graph
        .add_edge("u1".into(), "u2".into(), Timestamp::from_days(1), Channel::Email)
        .unwrap();

    let calc = ViralCoefficientCalculator::new(SystemContext::shared());
    assert_eq!(graph.total_users(), 2);
    assert_eq!(graph.total_referrals(), 1);
    assert_eq!(graph.organic_users(), 1);
    approx::assert_relative_eq!(calc.calculate_k_factor(&graph), 0.5);
}

#[test]
fn test_events_and_direct_referrals_agree() {
    let ctx = SystemContext::shared();
    let root = Persona::new("root");
    let pairs = [("root", "a"), ("root", "b"), ("a", "c")];

    let mut from_events = GraphBuilder::new(ctx.clone());
    from_events.add_personas(&[root.clone()]);
    let events: Vec<ReferralEvent> = pairs
        .iter()
        .enumerate()
        .map(|(i, (from, to))| {
            let mut e = ReferralEvent::sent(
                uuid::Uuid::nil(),
                (*from).into(),
                Timestamp::from_days(i as u64),
                Channel::Email,
            );
            e.accept((*to).into(), Timestamp::from_days(i as u64));
            e
        })
        .collect();
    from_events.build_from_events(&events);

    let mut direct = GraphBuilder::new(ctx);
    direct.add_personas(&[root]);
    for (i, (from, to)) in pairs.iter().enumerate() {
        direct
            .add_referral((*from).into(), (*to).into(), Timestamp::from_days(i as u64), Channel::Email)
            .unwrap();
    }

    assert_eq!(from_events.graph().total_users(), direct.graph().total_users());
    assert_eq!(from_events.graph().total_referrals(), direct.graph().total_referrals());
    assert_eq!(from_events.statistics(), direct.statistics());
    assert_eq!(from_events.referral_chain("c"), direct.referral_chain("c"));
}
