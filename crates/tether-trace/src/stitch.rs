//! Stack stitching.
//!
//! Renders one context's accumulated history as a single frame sequence:
//! the caller's frames first, then each contributing context from most to
//! least recent, separated by boundary markers.

use tether_core::{ContextId, FrameDescriptor};

use crate::node::ContributionMap;
use crate::registry::Registry;

/// Render the trace for `current` on top of `input`.
///
/// Returns `input` unchanged when `current` is not active.
pub fn render(
    registry: &Registry,
    current: ContextId,
    input: &[FrameDescriptor],
) -> Vec<FrameDescriptor> {
    match registry.get(current) {
        Some(node) => stitch(&node.accumulated(), input),
        None => input.to_vec(),
    }
}

/// Splice every sequence of `history` onto `input`, highest ID first.
pub fn stitch(history: &ContributionMap, input: &[FrameDescriptor]) -> Vec<FrameDescriptor> {
    let mut output = input.to_vec();
    for frames in history.values().rev() {
        splice(&mut output, frames);
    }
    output
}

/// Append `sequence` after a boundary marker, first dropping the output's
/// trailing frames that repeat the tail of `sequence`.
///
/// The boundary is omitted while the output is empty or already ends in
/// one. An empty sequence leaves the output untouched.
pub fn splice(output: &mut Vec<FrameDescriptor>, sequence: &[FrameDescriptor]) {
    if sequence.is_empty() {
        return;
    }
    for frame in sequence.iter().rev() {
        if !output.last().is_some_and(|last| last.same_call_site(frame)) {
            break;
        }
        let _ = output.pop();
    }
    if output.last().is_some_and(|last| !last.is_boundary()) {
        output.push(FrameDescriptor::boundary());
    }
    output.extend_from_slice(sequence);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::Recorder;
    use tether_core::{Frames, SourceLocation};
    use tether_settings::TraceSettings;

    fn cid(n: u64) -> ContextId {
        ContextId::new(n).unwrap()
    }

    fn at(text: &str, line: u32) -> FrameDescriptor {
        FrameDescriptor::call(text, SourceLocation::new("src/server.rs", line, 9))
    }

    fn texts(frames: &[FrameDescriptor]) -> Vec<&str> {
        frames.iter().map(|f| f.text.as_str()).collect()
    }

    fn history(entries: Vec<(u64, Vec<FrameDescriptor>)>) -> ContributionMap {
        entries
            .into_iter()
            .map(|(n, frames)| (cid(n), Frames::from(frames)))
            .collect()
    }

    #[test]
    fn unknown_context_is_identity() {
        let registry = Registry::new(Recorder::from_settings(&TraceSettings::default()));
        let input = vec![at("handler", 1), FrameDescriptor::native("main")];
        assert_eq!(render(&registry, cid(99), &input), input);
    }

    #[test]
    fn descending_id_order_with_boundaries() {
        let map = history(vec![
            (1, vec![at("a", 1)]),
            (9, vec![at("c", 9)]),
            (5, vec![at("b", 5)]),
        ]);
        let out = stitch(&map, &[]);
        assert_eq!(texts(&out), vec!["c", BOUNDARY, "b", BOUNDARY, "a"]);
        assert!(out[1].is_boundary());
        assert!(out[3].is_boundary());
    }

    #[test]
    fn input_frames_come_first() {
        let map = history(vec![(2, vec![at("spawned_at", 20)])]);
        let out = stitch(&map, &[at("current", 1)]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].text, "current");
        assert!(out[1].is_boundary());
        assert_eq!(out[2].text, "spawned_at");
    }

    #[test]
    fn full_overlap_collapses() {
        let seq = vec![at("poll", 3), at("run", 4)];
        let mut output = seq.clone();
        splice(&mut output, &seq);
        assert_eq!(output, seq);
    }

    #[test]
    fn partial_overlap_drops_only_the_shared_suffix() {
        let mut output = vec![at("current", 1), at("schedule", 2), at("run", 4)];
        splice(&mut output, &[at("callback", 7), at("schedule", 2), at("run", 4)]);
        assert_eq!(
            texts(&output),
            vec!["current", BOUNDARY, "callback", "schedule", "run"]
        );
    }

    #[test]
    fn mismatch_stops_dedup() {
        let mut output = vec![at("run", 4), at("x", 5)];
        splice(&mut output, &[at("run", 4)]);
        assert_eq!(texts(&output), vec!["run", "x", BOUNDARY, "run"]);
    }

    #[test]
    fn native_frames_collapse_by_text() {
        let seq = vec![FrameDescriptor::native("poll"), FrameDescriptor::native("main")];
        let mut output = seq.clone();
        splice(&mut output, &seq);
        assert_eq!(output, seq);

        let mut output = vec![FrameDescriptor::native("tick"), FrameDescriptor::native("main")];
        splice(&mut output, &[FrameDescriptor::native("spawn"), FrameDescriptor::native("main")]);
        assert_eq!(texts(&output), vec!["tick", BOUNDARY, "spawn", "main"]);
    }

    #[test]
    fn dedup_stops_at_boundary() {
        let mut output = vec![at("a", 1), FrameDescriptor::boundary(), at("b", 2)];
        splice(&mut output, &[at("a", 1), at("b", 2)]);
        assert_eq!(texts(&output), vec!["a", BOUNDARY, "a", "b"]);
    }

    #[test]
    fn empty_sequences_are_skipped() {
        let map = history(vec![(1, vec![]), (2, vec![at("b", 2)]), (3, vec![])]);
        let out = stitch(&map, &[]);
        assert_eq!(texts(&out), vec!["b"]);
    }

    #[test]
    fn render_does_not_mutate_input() {
        let registry = Registry::new(Recorder::from_settings(&TraceSettings::default()));
        let _ = registry.create(cid(1), None, vec![at("f1", 1)]);
        let input = vec![at("now", 50)];
        let snapshot = input.clone();
        let out = render(&registry, cid(1), &input);
        assert_eq!(input, snapshot);
        assert_eq!(texts(&out), vec!["now", BOUNDARY, "f1"]);
    }

    const BOUNDARY: &str = tether_core::frame::BOUNDARY_TEXT;
}
