//! Property tests over random lifecycle event sequences.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use tether_core::{ContextId, FrameDescriptor, SourceLocation};
use tether_settings::{TetherSettings, TraceSettings};
use tether_trace::stitch::{render, splice};
use tether_trace::{
    BoundEnforcer, EdgeOutcome, LifecycleSink, QueuedCapture, Recorder, Registry, TraceEngine,
    TraceNode,
};

#[derive(Clone, Debug)]
enum Event {
    Create { id: u64, trigger: u64 },
    Destroy { id: u64 },
    Settle { id: u64, trigger: u64 },
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => (1..40u64, 0..40u64).prop_map(|(id, trigger)| Event::Create { id, trigger }),
        2 => (1..40u64).prop_map(|id| Event::Destroy { id }),
        2 => (1..40u64, 0..40u64).prop_map(|(id, trigger)| Event::Settle { id, trigger }),
    ]
}

fn frame() -> impl Strategy<Value = FrameDescriptor> {
    prop_oneof![
        3 => (0..6u32, 1..6u32).prop_map(|(f, line)| {
            FrameDescriptor::call(format!("fn_{f}"), SourceLocation::new("src/lib.rs", line, 1))
        }),
        1 => prop_oneof![Just("main"), Just("<unknown>"), Just("poll")]
            .prop_map(FrameDescriptor::native),
    ]
}

fn small_caps() -> TetherSettings {
    let mut settings = TetherSettings::default();
    settings.trace = TraceSettings {
        fan_out_cap: 3,
        join_cap: 5,
        depth_cap: 4,
    };
    settings
}

fn node(id: u64, text: &str) -> Arc<TraceNode> {
    TraceNode::new(ContextId::new(id).unwrap(), vec![FrameDescriptor::native(text)])
}

fn apply(sink: &dyn LifecycleSink, event: &Event) {
    match *event {
        Event::Create { id, trigger } => {
            sink.on_context_create(ContextId::new(id).unwrap(), ContextId::new(trigger));
        }
        Event::Destroy { id } => sink.on_context_destroy(ContextId::new(id).unwrap()),
        Event::Settle { id, trigger } => {
            sink.on_context_settle(ContextId::new(id).unwrap(), ContextId::new(trigger));
        }
    }
}

proptest! {
    #[test]
    fn registry_tracks_unmatched_creates(events in proptest::collection::vec(event(), 0..200)) {
        let engine = TraceEngine::with_capture(&small_caps(), Arc::new(QueuedCapture::new()));
        let mut live = HashSet::new();
        for event in &events {
            apply(&engine, event);
            match *event {
                Event::Create { id, .. } => { let _ = live.insert(id); }
                Event::Destroy { id } => { let _ = live.remove(&id); }
                Event::Settle { .. } => {}
            }
            prop_assert_eq!(engine.active_count(), live.len());
        }
    }

    #[test]
    fn bounds_hold_after_any_sequence(events in proptest::collection::vec(event(), 0..200)) {
        let settings = small_caps();
        let engine = TraceEngine::with_capture(&settings, Arc::new(QueuedCapture::new()));
        for event in &events {
            apply(&engine, event);
        }
        for id in 1..40 {
            let Some(node) = engine.node(ContextId::new(id).unwrap()) else { continue };
            prop_assert!(node.edge_count() <= settings.trace.fan_out_cap);
            prop_assert!(node.contributors().len() < settings.trace.join_cap);
            if node.is_disabled() {
                prop_assert_eq!(node.edge_count(), 0);
            }
        }
        // rendering any id terminates, cycles included
        for id in 1..40 {
            let _ = engine.render_hook(ContextId::new(id).unwrap(), &[]);
        }
        let _ = engine.dump_forest().to_string();
    }

    #[test]
    fn disabled_node_rejects_forever(extra in 1..20usize) {
        let recorder = Recorder::new(2, 10, BoundEnforcer::new(50));
        let nodes: Vec<_> = (1..=3 + extra as u64)
            .map(|n| TraceNode::new(ContextId::new(n).unwrap(), Vec::<FrameDescriptor>::new()))
            .collect();
        let root = &nodes[0];
        let _ = recorder.record_edge(root, &nodes[1]);
        let _ = recorder.record_edge(root, &nodes[2]);
        prop_assert_eq!(recorder.record_edge(root, &nodes[3]), EdgeOutcome::FanOutExceeded);
        for node in &nodes[1..] {
            prop_assert_eq!(recorder.record_edge(root, node), EdgeOutcome::Rejected);
        }
        prop_assert!(root.is_disabled());
        prop_assert_eq!(root.edge_count(), 0);
    }

    #[test]
    fn unknown_id_render_is_identity(frames in proptest::collection::vec(frame(), 0..12)) {
        let registry = Registry::new(Recorder::from_settings(&TraceSettings::default()));
        let _ = registry.create(ContextId::new(1).unwrap(), None, vec![FrameDescriptor::native("x")]);
        prop_assert_eq!(render(&registry, ContextId::new(2).unwrap(), &frames), frames);
    }

    #[test]
    fn full_overlap_has_no_net_growth(seq in proptest::collection::vec(frame(), 1..12)) {
        let mut output = seq.clone();
        splice(&mut output, &seq);
        prop_assert_eq!(output, seq);
    }

    #[test]
    fn splice_never_drops_sequence_frames(
        prefix in proptest::collection::vec(frame(), 0..8),
        seq in proptest::collection::vec(frame(), 1..8),
    ) {
        let mut output = prefix.clone();
        splice(&mut output, &seq);
        prop_assert!(output.ends_with(&seq));
        prop_assert!(output.len() <= prefix.len() + 1 + seq.len());
        let kept = output.len() - seq.len();
        prop_assert!(kept <= prefix.len() + 1);
    }

    #[test]
    fn deep_chains_stop_at_depth_cap(len in 2..400usize, depth_cap in 1..20usize) {
        let recorder = Recorder::new(10, depth_cap, BoundEnforcer::new(1_000));
        let chain: Vec<_> = (1..=len as u64)
            .map(|n| node(n + 1, "f"))
            .collect();
        for pair in chain.windows(2) {
            let _ = recorder.record_edge(&pair[0], &pair[1]);
        }
        let root = node(1, "root");
        let outcome = recorder.record_edge(&root, &chain[0]);
        prop_assert_eq!(outcome, EdgeOutcome::Inserted { reached: depth_cap.min(len) });

        let root_id = ContextId::new(1).unwrap();
        for (i, node) in chain.iter().enumerate() {
            prop_assert_eq!(node.contributors().contains(&root_id), i < depth_cap);
        }
    }
}
