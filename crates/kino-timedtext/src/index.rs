//! Interval index over the cues of a loaded track
//!
//! A centered interval tree. Each node owns the cues that contain its center
//! point, kept twice: by ascending start and by descending end. Cues ending at
//! or before the center go left, cues starting after it go right. A query
//! walks one root-to-leaf path and stops scanning each node's list at the
//! first cue that cannot contain `t`, so lookups cost O(log n + k) for k
//! overlapping cues no matter how long individual cues are.

use crate::error::{Error, Result};
use crate::types::Cue;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Node {
    center: f64,
    /// Positions into `cues`, ascending start
    by_start: Vec<usize>,
    /// Same positions, descending end
    by_end: Vec<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

/// Time-to-active-cues index for one track
#[derive(Debug, Clone)]
pub struct CaptionIndex {
    /// Cues sorted by start time (stable for equal starts)
    cues: Vec<Cue>,
    /// Tree arena, root at `root`
    nodes: Vec<Node>,
    root: Option<usize>,
    /// Latest end time in the track
    max_end: f64,
    /// Cue id to position in `cues`
    by_id: HashMap<String, usize>,
}

impl CaptionIndex {
    /// Build an index, validating cue invariants
    pub fn build(mut cues: Vec<Cue>) -> Result<Self> {
        if cues.is_empty() {
            return Err(Error::EmptyTrack);
        }

        for cue in &cues {
            let finite = cue.start_time.is_finite() && cue.end_time.is_finite();
            if !finite || cue.end_time <= cue.start_time {
                return Err(Error::InvalidCue {
                    cue_id: cue.id.clone(),
                    start_time: cue.start_time,
                    end_time: cue.end_time,
                });
            }
        }

        cues.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let mut by_id = HashMap::with_capacity(cues.len());
        for (pos, cue) in cues.iter().enumerate() {
            if by_id.insert(cue.id.clone(), pos).is_some() {
                return Err(Error::DuplicateCue(cue.id.clone()));
            }
        }

        let max_end = cues.iter().map(|c| c.end_time).fold(f64::NEG_INFINITY, f64::max);

        let mut nodes = Vec::new();
        let root = build_node(&cues, (0..cues.len()).collect(), &mut nodes);

        Ok(Self {
            cues,
            nodes,
            root,
            max_end,
            by_id,
        })
    }

    /// All cues with `start_time <= time < end_time`, in start order
    pub fn active_at(&self, time: f64) -> Vec<&Cue> {
        self.search(time).0.into_iter().map(|pos| &self.cues[pos]).collect()
    }

    /// Active positions in start order, plus the number of nodes and list
    /// entries examined
    fn search(&self, time: f64) -> (Vec<usize>, usize) {
        let mut found = Vec::new();
        let mut steps = 0;
        let mut next = self.root;

        while let Some(id) = next {
            let node = &self.nodes[id];
            steps += 1;
            if time < node.center {
                // Every cue here ends after the center, so only the start matters
                for &pos in &node.by_start {
                    steps += 1;
                    if self.cues[pos].start_time > time {
                        break;
                    }
                    found.push(pos);
                }
                next = node.left;
            } else {
                // Every cue here starts at or before the center
                for &pos in &node.by_end {
                    steps += 1;
                    if self.cues[pos].end_time <= time {
                        break;
                    }
                    found.push(pos);
                }
                next = node.right;
            }
        }

        found.sort_unstable();
        (found, steps)
    }

    /// Earliest cue start or end strictly after `time`
    pub fn next_boundary_after(&self, time: f64) -> Option<f64> {
        let upper = self.cues.partition_point(|c| c.start_time <= time);
        let next_start = self.cues.get(upper).map(|c| c.start_time);
        let next_end = self
            .active_at(time)
            .iter()
            .map(|c| c.end_time)
            .min_by(f64::total_cmp);

        match (next_start, next_end) {
            (Some(s), Some(e)) => Some(s.min(e)),
            (s, e) => s.or(e),
        }
    }

    /// Look up a cue by id
    pub fn cue(&self, id: &str) -> Option<&Cue> {
        self.by_id.get(id).map(|&pos| &self.cues[pos])
    }

    /// Cues in start order
    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Time span covered by the track
    pub fn span(&self) -> (f64, f64) {
        let start = self.cues.first().map(|c| c.start_time).unwrap_or(0.0);
        let end = if self.cues.is_empty() { 0.0 } else { self.max_end };
        (start, end)
    }
}

/// Build the subtree for `positions` (ascending, so ascending start) and
/// return its arena slot
fn build_node(cues: &[Cue], positions: Vec<usize>, nodes: &mut Vec<Node>) -> Option<usize> {
    if positions.is_empty() {
        return None;
    }

    // The median cue contains its own start, so the node is never empty and
    // each side holds at most half the positions
    let center = cues[positions[positions.len() / 2]].start_time;

    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut here = Vec::new();
    for pos in positions {
        let cue = &cues[pos];
        if cue.end_time <= center {
            left.push(pos);
        } else if cue.start_time > center {
            right.push(pos);
        } else {
            here.push(pos);
        }
    }

    let mut by_end = here.clone();
    by_end.sort_by(|&a, &b| cues[b].end_time.total_cmp(&cues[a].end_time));

    let slot = nodes.len();
    nodes.push(Node {
        center,
        by_start: here,
        by_end,
        left: None,
        right: None,
    });
    let left = build_node(cues, left, nodes);
    let right = build_node(cues, right, nodes);
    nodes[slot].left = left;
    nodes[slot].right = right;
    Some(slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(cues: &[&Cue]) -> Vec<String> {
        cues.iter().map(|c| c.id.clone()).collect()
    }

    fn overlapping() -> CaptionIndex {
        CaptionIndex::build(vec![
            Cue::new("c", 8.0, 9.0, "third"),
            Cue::new("long", 0.0, 20.0, "banner"),
            Cue::new("a", 1.0, 3.0, "first"),
            Cue::new("b", 2.0, 5.0, "second"),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_sorts_by_start() {
        let index = overlapping();
        let starts: Vec<f64> = index.cues().iter().map(|c| c.start_time).collect();
        assert_eq!(starts, vec![0.0, 1.0, 2.0, 8.0]);
        assert_eq!(index.span(), (0.0, 20.0));
    }

    #[test]
    fn test_overlapping_cues_form_a_set() {
        let index = overlapping();
        assert_eq!(ids(&index.active_at(2.5)), vec!["long", "a", "b"]);
        assert_eq!(ids(&index.active_at(3.0)), vec!["long", "b"]);
        assert_eq!(ids(&index.active_at(8.5)), vec!["long", "c"]);
        assert_eq!(ids(&index.active_at(19.0)), vec!["long"]);
        assert!(index.active_at(20.0).is_empty());
        assert!(index.active_at(-1.0).is_empty());
    }

    #[test]
    fn test_no_gaps_inside_interval() {
        let index = overlapping();
        let mut t = 2.0;
        while t < 5.0 {
            assert!(ids(&index.active_at(t)).contains(&"b".to_string()), "gap at {t}");
            t += 0.1;
        }
    }

    #[test]
    fn test_empty_outside_intervals() {
        let index = CaptionIndex::build(vec![
            Cue::new("a", 1.0, 2.0, "one"),
            Cue::new("b", 4.0, 6.0, "two"),
        ])
        .unwrap();
        for t in [0.0, 0.99, 2.0, 3.0, 3.99, 6.0, 100.0] {
            assert!(index.active_at(t).is_empty(), "unexpected cue at {t}");
        }
    }

    #[test]
    fn test_matches_linear_scan() {
        let cues: Vec<Cue> = (0..200)
            .map(|i| {
                let start = (i * 7 % 50) as f64 * 0.5;
                let len = 0.25 + (i % 5) as f64;
                Cue::new(format!("cue-{i}"), start, start + len, "text")
            })
            .collect();
        let index = CaptionIndex::build(cues.clone()).unwrap();

        let mut t = -1.0;
        while t < 32.0 {
            let mut expected: Vec<String> = cues
                .iter()
                .filter(|c| c.is_active_at(t))
                .map(|c| c.id.clone())
                .collect();
            let mut actual = ids(&index.active_at(t));
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected, "mismatch at {t}");
            t += 0.125;
        }
    }

    #[test]
    fn test_track_spanning_cue_keeps_queries_short() {
        let count: usize = 50_000;
        let mut cues: Vec<Cue> = (0..count)
            .map(|i| Cue::new(format!("line-{i}"), i as f64, i as f64 + 1.0, "text"))
            .collect();
        cues.push(Cue::new("music", 0.0, count as f64, "[music]"));
        let index = CaptionIndex::build(cues).unwrap();

        // Depth is logarithmic; allow the path plus the reported cues and
        // one stopping entry per node
        let bound = 4 * (usize::BITS - count.leading_zeros()) as usize + 8;
        for t in [10.5, 25_000.25, 49_990.5, 49_999.5] {
            let (found, steps) = index.search(t);
            assert_eq!(found.len(), 2, "at {t}");
            assert!(steps <= bound, "{steps} steps at {t}, bound {bound}");
        }
        assert_eq!(ids(&index.active_at(49_999.5)), vec!["music", "line-49999"]);
        assert!(index.active_at(count as f64).is_empty());
    }

    #[test]
    fn test_long_cues_match_linear_scan() {
        let mut cues: Vec<Cue> = (0..300)
            .map(|i| {
                let start = (i * 13 % 97) as f64 * 0.75;
                let len = if i % 17 == 0 { 60.0 } else { 0.5 + (i % 4) as f64 };
                Cue::new(format!("cue-{i}"), start, start + len, "text")
            })
            .collect();
        cues.push(Cue::new("whole", -1.0, 200.0, "banner"));
        let index = CaptionIndex::build(cues.clone()).unwrap();

        let mut t = -2.0;
        while t < 201.0 {
            let mut expected: Vec<String> =
                cues.iter().filter(|c| c.is_active_at(t)).map(|c| c.id.clone()).collect();
            let mut actual = ids(&index.active_at(t));
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected, "mismatch at {t}");
            t += 0.25;
        }
    }

    #[test]
    fn test_results_in_start_order() {
        let index = CaptionIndex::build(vec![
            Cue::new("late", 5.0, 6.0, ""),
            Cue::new("wide", 0.0, 100.0, ""),
            Cue::new("mid", 4.0, 50.0, ""),
            Cue::new("early", 1.0, 10.0, ""),
        ])
        .unwrap();
        assert_eq!(ids(&index.active_at(5.5)), vec!["wide", "early", "mid", "late"]);
    }

    #[test]
    fn test_rejects_invalid_tracks() {
        assert!(matches!(CaptionIndex::build(vec![]), Err(Error::EmptyTrack)));
        assert!(matches!(
            CaptionIndex::build(vec![Cue::new("x", 2.0, 2.0, "")]),
            Err(Error::InvalidCue { .. })
        ));
        assert!(matches!(
            CaptionIndex::build(vec![Cue::new("x", 0.0, 1.0, ""), Cue::new("x", 1.0, 2.0, "")]),
            Err(Error::DuplicateCue(_))
        ));
    }

    #[test]
    fn test_next_boundary() {
        let index = overlapping();
        assert_eq!(index.next_boundary_after(-5.0), Some(0.0));
        assert_eq!(index.next_boundary_after(2.5), Some(3.0));
        assert_eq!(index.next_boundary_after(5.0), Some(8.0));
        assert_eq!(index.next_boundary_after(9.0), Some(20.0));
        assert_eq!(index.next_boundary_after(20.0), None);
    }

    #[test]
    fn test_cue_lookup() {
        let index = overlapping();
        assert_eq!(index.cue("b").map(|c| c.content.as_str()), Some("second"));
        assert!(index.cue("zzz").is_none());
    }
}
