//! End-to-end causality scenarios driven through a manual host.

#![allow(missing_docs)]

use std::sync::Arc;

use tether_core::{ContextId, FrameDescriptor, SourceLocation, render_frames};
use tether_settings::TetherSettings;
use tether_trace::{FrameCapture, HookAdapter, ManualHost, QueuedCapture, TraceEngine};

struct Harness {
    engine: TraceEngine,
    host: Arc<ManualHost>,
    capture: Arc<QueuedCapture>,
}

impl Harness {
    fn new(settings: &TetherSettings) -> Self {
        let capture = Arc::new(QueuedCapture::new());
        let engine =
            TraceEngine::with_capture(settings, Arc::clone(&capture) as Arc<dyn FrameCapture>);
        let host = Arc::new(ManualHost::new());
        engine
            .install(Arc::clone(&host) as Arc<dyn HookAdapter>)
            .unwrap();
        Self {
            engine,
            host,
            capture,
        }
    }

    fn create(&self, id: u64, trigger: u64, site: &str, line: u32) {
        self.capture.push(vec![at(site, line)]);
        self.host.create(id, trigger);
    }

    fn render(&self, id: u64) -> Vec<FrameDescriptor> {
        self.host.format_trace(id, &[])
    }
}

fn at(text: &str, line: u32) -> FrameDescriptor {
    FrameDescriptor::call(text, SourceLocation::new("src/app.rs", line, 5))
}

fn cid(n: u64) -> ContextId {
    ContextId::new(n).unwrap()
}

fn texts(frames: &[FrameDescriptor]) -> Vec<String> {
    frames
        .iter()
        .map(|f| {
            if f.is_boundary() {
                "|".to_owned()
            } else {
                f.text.clone()
            }
        })
        .collect()
}

#[test]
fn detached_parent_still_contributes() {
    let h = Harness::new(&TetherSettings::default());
    h.create(1, 0, "f1", 1);
    h.create(2, 1, "f2", 2);
    h.host.destroy(1);

    assert_eq!(texts(&h.render(2)), vec!["f2", "|", "f1"]);
    assert_eq!(h.engine.active_count(), 1);
}

#[test]
fn three_hop_chain_renders_newest_first() {
    let h = Harness::new(&TetherSettings::default());
    h.create(1, 0, "a", 10);
    h.create(5, 1, "b", 20);
    h.create(9, 5, "c", 30);

    assert_eq!(texts(&h.render(9)), vec!["c", "|", "b", "|", "a"]);
}

#[test]
fn settle_adds_history_after_creation() {
    let h = Harness::new(&TetherSettings::default());
    h.create(1, 0, "resolve_value", 1);
    h.create(2, 0, "then_callback", 2);
    assert_eq!(texts(&h.render(2)), vec!["then_callback"]);

    h.host.settle(2, 1);
    assert_eq!(
        texts(&h.render(2)),
        vec!["then_callback", "|", "resolve_value"]
    );
}

#[test]
fn late_settle_reaches_existing_grandchildren() {
    let h = Harness::new(&TetherSettings::default());
    h.create(1, 0, "origin", 1);
    h.create(2, 0, "middle", 2);
    h.create(3, 2, "leaf", 3);

    h.host.settle(2, 1);
    assert_eq!(texts(&h.render(3)), vec!["leaf", "|", "middle", "|", "origin"]);
}

#[test]
fn out_of_order_notifications_are_tolerated() {
    let h = Harness::new(&TetherSettings::default());
    h.host.destroy(7);
    h.host.settle(7, 3);
    h.create(2, 99, "orphan", 1);
    h.host.destroy(2);
    h.host.destroy(2);
    h.host.settle(2, 0);

    assert_eq!(h.engine.active_count(), 0);
    let raw = vec![at("unrelated", 5)];
    assert_eq!(h.host.format_trace(2, &raw), raw);
}

#[test]
fn adversarial_fan_out_is_bounded() {
    let h = Harness::new(&TetherSettings::default());
    h.create(1, 0, "loop_body", 1);
    for id in 2..2_000 {
        h.create(id, 1, "timer", 2);
    }

    let root = h.engine.node(cid(1)).unwrap();
    assert!(root.is_disabled());
    assert_eq!(root.edge_count(), 0);
    // the first timers were linked before the guard tripped
    assert_eq!(texts(&h.render(2)), vec!["timer", "|", "loop_body"]);
    assert_eq!(texts(&h.render(1_999)), vec!["timer"]);
}

#[test]
fn long_chain_keeps_newest_history() {
    let h = Harness::new(&TetherSettings::default());
    h.create(1, 0, "s1", 1);
    for id in 2..=200 {
        h.create(id, id - 1, &format!("s{id}"), u32::try_from(id).unwrap());
        h.host.destroy(id - 1);
    }

    let trace = h.render(200);
    let frames: Vec<_> = trace.iter().filter(|f| !f.is_boundary()).collect();
    assert_eq!(frames.len(), 49);
    assert_eq!(frames[0].text, "s200");
    assert_eq!(frames[48].text, "s152");
    assert_eq!(h.engine.active_count(), 1);
}

#[test]
fn shared_call_site_is_collapsed_at_boundary() {
    let h = Harness::new(&TetherSettings::default());
    h.capture.push(vec![at("spawn", 4), at("main", 1)]);
    h.host.create(1, 0);
    h.capture.push(vec![at("worker", 9), at("main", 1)]);
    h.host.create(2, 1);

    assert_eq!(
        texts(&h.render(2)),
        vec!["worker", "|", "spawn", "main"]
    );
}

#[test]
fn rendered_text_uses_boundary_lines() {
    let h = Harness::new(&TetherSettings::default());
    h.create(1, 0, "accept", 3);
    h.create(2, 1, "handle", 8);

    let text = render_frames(&h.render(2));
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "    at handle (src/app.rs:8:5)");
    assert!(lines[1].contains("----"));
    assert_eq!(lines[2], "    at accept (src/app.rs:3:5)");
}

#[test]
fn disable_freezes_everything() {
    let h = Harness::new(&TetherSettings::default());
    h.create(1, 0, "a", 1);
    h.create(2, 1, "b", 2);
    let before = h.render(2);

    h.engine.disable();
    h.create(3, 2, "c", 3);
    assert!(!h.host.is_installed());
    assert_eq!(h.engine.active_count(), 0);
    assert!(h.render(2).is_empty());
    assert_eq!(texts(&before), vec!["b", "|", "a"]);
}

#[test]
fn forest_reflects_lifecycle() {
    let h = Harness::new(&TetherSettings::default());
    h.create(1, 0, "a", 1);
    h.create(2, 1, "b", 2);
    h.create(3, 2, "c", 3);
    h.host.destroy(2);

    let forest = h.engine.dump_forest();
    assert_eq!(forest.roots.len(), 1);
    assert!(forest.find(cid(2)).unwrap().detached);
    let text = forest.to_string();
    assert!(text.starts_with("1 (frames: 1"));
    assert!(text.contains("[detached]"));
}

#[test]
fn concurrent_hosts_threads() {
    let h = Arc::new(Harness::new(&TetherSettings::default()));
    h.create(1, 0, "root", 1);

    let workers: Vec<_> = (0..4u64)
        .map(|t| {
            let h = Arc::clone(&h);
            std::thread::spawn(move || {
                for i in 0..100u64 {
                    let id = 10 + t * 1_000 + i;
                    h.host.create(id, 1);
                    let _ = h.host.format_trace(id, &[]);
                    h.host.destroy(id);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(h.engine.active_count(), 1);
    assert!(h.engine.node(cid(1)).unwrap().edge_count() <= 10);
}
