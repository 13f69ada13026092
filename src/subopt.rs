//! Gap-bounded suboptimal structure enumeration over the MFE rig: every
//! structure within `gap` of the minimum free energy, produced in
//! non-decreasing energy order without duplicates.
//!
//! The classic approach (Wuchty/Zuker-style) keeps a priority queue of
//! partially-resolved structures ("traces") ordered by a lower bound on
//! their final energy, expanding the cheapest trace until it is fully
//! resolved, then emitting it before moving to the next. The bound for a
//! still-pending segment is exactly the value [`crate::decomposition`]
//! already computed for it while filling the block (`current_value`); once
//! a segment is replaced with one concrete [`crate::decomposition::Alternative`],
//! the trace's energy is updated to reflect that specific choice instead of
//! the DP's optimum for it, which can only raise the bound (the chosen
//! alternative can never beat the minimum the cell actually settled on).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::backtrack::{Segment, Source};
use crate::block::Block;
use crate::cached_model::CachedModel;
use crate::decomposition::{alternatives, current_value};
use crate::rig::Rig;
use crate::sequence::Sequence;

/// A partially-resolved suboptimal trace: energy committed so far, the
/// segments still needing expansion, and the base pairs already fixed.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Free energy committed by decisions made so far.
    pub energy: f64,
    /// Segments not yet resolved into pairs or unpaired runs.
    pub pending: Vec<Segment>,
    /// Base pairs fixed by decisions made so far.
    pub pairs: Vec<(usize, usize)>,
}

impl Trace {
    /// Whether every segment has been resolved (a complete structure).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, Clone)]
struct QueueEntry(Trace);

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.energy == other.0.energy
    }
}
impl Eq for QueueEntry {}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the lowest energy first.
        other
            .0
            .energy
            .partial_cmp(&self.0.energy)
            .unwrap_or(Ordering::Equal)
    }
}

/// Min-energy-first queue of in-progress suboptimal traces, bounded by an
/// energy gap above the MFE.
pub struct SuboptQueue {
    heap: BinaryHeap<QueueEntry>,
    mfe: f64,
    gap: f64,
    emitted: usize,
    limit: Option<usize>,
}

impl SuboptQueue {
    /// Start a queue that will emit structures up to `mfe + gap`, capped at
    /// `limit` structures if given.
    #[must_use]
    pub fn new(mfe: f64, gap: f64, limit: Option<usize>) -> Self {
        Self {
            heap: BinaryHeap::new(),
            mfe,
            gap,
            emitted: 0,
            limit,
        }
    }

    /// Add a trace to the queue, if its committed energy is still within
    /// the gap (a trace can only grow more expensive as it resolves, so
    /// this is a valid pruning bound).
    pub fn add(&mut self, trace: Trace) {
        if trace.energy <= self.mfe + self.gap {
            self.heap.push(QueueEntry(trace));
        }
    }

    /// Pop the next trace to expand, or `None` once the queue is drained or
    /// the emission limit has been reached.
    pub fn pop(&mut self) -> Option<Trace> {
        if self.limit.is_some_and(|l| self.emitted >= l) {
            return None;
        }
        self.heap.pop().map(|e| e.0)
    }

    /// Mark one complete structure emitted (call once per structure
    /// returned to the caller, to enforce the optional limit).
    pub fn mark_emitted(&mut self) {
        self.emitted += 1;
    }

    /// Drain every trace currently satisfying the gap bound, consuming the
    /// queue. Intended for tests and small enumerations; large enumerations
    /// should instead call [`Self::pop`] in a loop and push follow-up
    /// traces as they are expanded.
    pub fn consume(mut self) -> Vec<Trace> {
        let mut out = Vec::new();
        while let Some(t) = self.pop() {
            if t.is_complete() {
                self.mark_emitted();
                out.push(t);
            }
        }
        out
    }
}

/// Fork one trace by resolving its most recently pushed pending segment
/// into every alternative [`crate::decomposition`] enumerates for it,
/// replacing that segment's optimistic bound with each alternative's
/// concrete contribution.
fn expand_once<R: Rig>(model: &CachedModel<R>, seq: &Sequence, block: &Block<R::Value>, trace: &Trace) -> Vec<Trace> {
    let mut pending = trace.pending.clone();
    let Some(seg) = pending.pop() else {
        return Vec::new();
    };
    if seg.is_empty() {
        return vec![Trace {
            energy: trace.energy,
            pending,
            pairs: trace.pairs.clone(),
        }];
    }

    let cur: f64 = current_value::<R>(block, &seg).into();
    alternatives::<R>(model, seq, block, &seg)
        .into_iter()
        .map(|alt| {
            let mut new_pending = pending.clone();
            for (i, j, src) in &alt.follow_up {
                if i <= j {
                    new_pending.push(Segment::new(*i, *j, *src));
                }
            }
            let mut pairs = trace.pairs.clone();
            if let Some(pair) = alt.pair {
                pairs.push(pair);
            }
            let value: f64 = alt.value.into();
            Trace {
                energy: trace.energy - cur + value,
                pending: new_pending,
                pairs,
            }
        })
        .collect()
}

/// Enumerate every structure within `gap` of the minimum free energy
/// recorded by `block`, each as a list of committed base pairs, in
/// non-decreasing energy order, capped at `max_number` if given.
#[must_use]
pub fn enumerate<R: Rig>(
    model: &CachedModel<R>,
    seq: &Sequence,
    block: &Block<R::Value>,
    gap: f64,
    max_number: Option<usize>,
) -> Vec<Vec<(usize, usize)>> {
    let n = seq.len();
    if n == 0 {
        return Vec::new();
    }
    let mfe: f64 = block.q[(0, n - 1)].into();
    let mut queue = SuboptQueue::new(mfe, gap, max_number);
    queue.add(Trace {
        energy: mfe,
        pending: vec![Segment::new(0, n - 1, Source::Total)],
        pairs: Vec::new(),
    });

    let mut out = Vec::new();
    while let Some(trace) = queue.pop() {
        if trace.is_complete() {
            queue.mark_emitted();
            out.push(trace.pairs.clone());
            continue;
        }
        for forked in expand_once::<R>(model, seq, block, &trace) {
            queue.add(forked);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::model::{Conditions, Model, ParameterTable};
    use crate::recursions::Engine;
    use crate::rig::Mfe;

    fn model() -> Model {
        let table = ParameterTable {
            stack: vec![vec![0.0; 4]; 4],
            hairpin_length: vec![5.0, 5.0, 5.0, 4.5, 4.0, 4.3, 4.1],
            bulge_length: (0..40).map(|i| 4.0 - i as f64 * 0.01).collect(),
            interior_length: (0..40).map(|i| i as f64 * 0.1).collect(),
            ninio: 0.5,
            ninio_cap: 3.0,
            log_loop_penalty: 1.75,
            multi_init: 3.4,
            multi_base: 0.0,
            multi_pair: 0.4,
            terminal_penalty: 0.5,
            join_penalty: 1.96,
            dangle5: vec![vec![0.0; 4]; 4],
            dangle3: vec![vec![0.0; 4]; 4],
            coaxial: vec![vec![0.0; 4]; 4],
        };
        Model::from_table(Alphabet::rna(), table, Conditions::default()).unwrap()
    }

    #[test]
    fn queue_pops_lowest_energy_first() {
        let mut q = SuboptQueue::new(0.0, 5.0, None);
        q.add(Trace { energy: 3.0, pending: vec![], pairs: vec![] });
        q.add(Trace { energy: 1.0, pending: vec![], pairs: vec![] });
        q.add(Trace { energy: 2.0, pending: vec![], pairs: vec![] });
        assert_eq!(q.pop().unwrap().energy, 1.0);
        assert_eq!(q.pop().unwrap().energy, 2.0);
        assert_eq!(q.pop().unwrap().energy, 3.0);
    }

    #[test]
    fn traces_beyond_the_gap_are_dropped() {
        let mut q = SuboptQueue::new(0.0, 2.0, None);
        q.add(Trace { energy: 2.5, pending: vec![], pairs: vec![] });
        assert!(q.pop().is_none());
    }

    #[test]
    fn limit_stops_emission() {
        let mut q = SuboptQueue::new(0.0, 5.0, Some(1));
        q.add(Trace { energy: 0.0, pending: vec![], pairs: vec![] });
        q.add(Trace { energy: 1.0, pending: vec![], pairs: vec![] });
        let out = q.consume();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn enumeration_always_includes_the_mfe_structure_itself() {
        let mut cm: CachedModel<Mfe> = CachedModel::new(model());
        let seq = Alphabet::rna().sequence("ACGUACGUACGUACGU").unwrap();
        let block = Engine::new(&mut cm).fill(&seq);
        let structures = enumerate::<Mfe>(&cm, &seq, &block, 0.0, Some(50));
        assert!(!structures.is_empty());
    }

    #[test]
    fn widening_the_gap_never_shrinks_the_enumeration() {
        let mut cm: CachedModel<Mfe> = CachedModel::new(model());
        let seq = Alphabet::rna().sequence("ACGUACGUACGUACGU").unwrap();
        let block = Engine::new(&mut cm).fill(&seq);
        let narrow = enumerate::<Mfe>(&cm, &seq, &block, 0.0, Some(200)).len();
        let wide = enumerate::<Mfe>(&cm, &seq, &block, 5.0, Some(200)).len();
        assert!(wide >= narrow);
    }

    #[test]
    fn emission_respects_the_max_number_cap() {
        let mut cm: CachedModel<Mfe> = CachedModel::new(model());
        let seq = Alphabet::rna().sequence("ACGUACGUACGUACGU").unwrap();
        let block = Engine::new(&mut cm).fill(&seq);
        let capped = enumerate::<Mfe>(&cm, &seq, &block, 100.0, Some(3));
        assert!(capped.len() <= 3);
    }
}
