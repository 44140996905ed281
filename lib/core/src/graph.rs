//! Navigable multi-layer proximity graph.
//!
//! Layout follows the classic HNSW shape: every node lives on layer 0,
//! geometrically fewer nodes on each layer above, searches descend greedily
//! from the entry point and widen into a bounded best-first beam at the
//! target layer. Neighbor lists are pruned with a diversity-aware heuristic
//! rather than pure distance, which is what keeps the graph navigable.
//!
//! This module is single-threaded by construction; [`crate::Index`] wraps it
//! in a read-write lock and owns the concurrency discipline.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::RandomState;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use smallvec::{smallvec, SmallVec};
use std::collections::HashMap;
use tracing::{debug, trace};
use vicinity_kernels::Kernel;

use crate::{Error, IndexOptions, Result};

/// Hard ceiling on layer assignment; the geometric distribution makes
/// anything near this unreachable in practice.
const MAX_LAYERS: usize = 16;

/// Dense bitset for visited-slot tracking during one traversal. Each
/// traversal gets a fresh set, so searches holding only a read lock never
/// share scratch state.
struct VisitedSet {
    bits: Vec<u64>,
}

impl VisitedSet {
    #[inline]
    fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0; (capacity + 63) / 64],
        }
    }

    /// Returns true if the slot had not been visited before.
    #[inline]
    fn insert(&mut self, idx: usize) -> bool {
        let word = idx / 64;
        let mask = 1u64 << (idx % 64);
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        let was_set = self.bits[word] & mask != 0;
        self.bits[word] |= mask;
        !was_set
    }
}

/// Min-heap entry: smaller distance pops first, slot breaks ties.
#[derive(Clone, Copy)]
struct Candidate {
    slot: u32,
    dist: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.slot == other.slot
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.slot.cmp(&self.slot))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap entry: furthest result pops first when trimming the beam.
#[derive(Clone, Copy)]
struct ReverseCandidate {
    slot: u32,
    dist: f32,
}

impl PartialEq for ReverseCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.slot == other.slot
    }
}

impl Eq for ReverseCandidate {}

impl Ord for ReverseCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for ReverseCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) id: u64,
    pub(crate) deleted: bool,
    /// Neighbor slots per layer; `layers.len() - 1` is the node's top layer.
    pub(crate) layers: SmallVec<[Vec<u32>; 1]>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryPoint {
    pub(crate) slot: u32,
    pub(crate) layer: usize,
}

pub(crate) struct Graph {
    pub(crate) kernel: Kernel,
    pub(crate) bytes_per_vector: usize,
    pub(crate) m: usize,
    pub(crate) ef_construction: usize,
    layer_mult: f64,
    rng: SmallRng,
    pub(crate) nodes: Vec<Node>,
    /// Contiguous vector storage, `bytes_per_vector` per slot.
    pub(crate) vectors: Vec<u8>,
    pub(crate) id_to_slot: HashMap<u64, u32, RandomState>,
    pub(crate) entry: Option<EntryPoint>,
    pub(crate) live: usize,
}

impl Graph {
    pub(crate) fn new(options: &IndexOptions, kernel: Kernel) -> Self {
        Self {
            kernel,
            bytes_per_vector: options.scalar_kind.bytes_for(options.dims),
            m: options.m,
            ef_construction: options.ef_construction,
            layer_mult: 1.0 / (options.m as f64).ln(),
            rng: SmallRng::seed_from_u64(options.seed),
            nodes: Vec::new(),
            vectors: Vec::new(),
            id_to_slot: HashMap::default(),
            entry: None,
            live: 0,
        }
    }

    #[inline]
    pub(crate) fn vector(&self, slot: u32) -> &[u8] {
        let start = slot as usize * self.bytes_per_vector;
        &self.vectors[start..start + self.bytes_per_vector]
    }

    #[inline]
    fn distance_to(&self, query: &[u8], slot: u32) -> f32 {
        self.kernel.distance(query, self.vector(slot))
    }

    #[inline]
    fn distance_between(&self, a: u32, b: u32) -> f32 {
        self.kernel.distance(self.vector(a), self.vector(b))
    }

    #[inline]
    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }

    /// Geometric layer assignment with multiplier `1/ln(M)`.
    fn assign_layer(&mut self) -> usize {
        let u: f64 = self.rng.random::<f64>().max(f64::MIN_POSITIVE);
        ((-u.ln() * self.layer_mult) as usize).min(MAX_LAYERS - 1)
    }

    /// Bring a vector's cache line in before it is needed.
    #[inline(always)]
    fn prefetch(&self, slot: u32) {
        let start = slot as usize * self.bytes_per_vector;
        if start < self.vectors.len() {
            #[cfg(target_arch = "x86_64")]
            unsafe {
                use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
                _mm_prefetch(self.vectors.as_ptr().add(start) as *const i8, _MM_HINT_T0);
            }
            #[cfg(target_arch = "aarch64")]
            {
                let _ = unsafe { *self.vectors.as_ptr().add(start) };
            }
        }
    }

    /// Bounded best-first search at one layer. Returns `(slot, distance)`
    /// pairs ascending by distance, slot breaking ties.
    fn search_layer(&self, query: &[u8], entry: u32, ef: usize, layer: usize) -> Vec<(u32, f32)> {
        let mut visited = VisitedSet::new(self.nodes.len());
        let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
        let mut results: BinaryHeap<ReverseCandidate> = BinaryHeap::with_capacity(ef + 1);

        let entry_dist = self.distance_to(query, entry);
        candidates.push(Candidate {
            slot: entry,
            dist: entry_dist,
        });
        results.push(ReverseCandidate {
            slot: entry,
            dist: entry_dist,
        });
        visited.insert(entry as usize);

        let mut worst_dist = entry_dist;
        let mut neighbors: SmallVec<[u32; 64]> = SmallVec::new();

        while let Some(Candidate {
            slot: current,
            dist: current_dist,
        }) = candidates.pop()
        {
            if results.len() >= ef && current_dist > worst_dist {
                break;
            }

            neighbors.clear();
            if let Some(list) = self.nodes[current as usize].layers.get(layer) {
                neighbors.extend_from_slice(list);
            }
            if neighbors.is_empty() {
                continue;
            }

            for &n in neighbors.iter().take(4) {
                self.prefetch(n);
            }

            for &n in &neighbors {
                if visited.insert(n as usize) {
                    let dist = self.distance_to(query, n);
                    if results.len() < ef || dist < worst_dist {
                        candidates.push(Candidate { slot: n, dist });
                        results.push(ReverseCandidate { slot: n, dist });

                        if results.len() > ef {
                            results.pop();
                            if let Some(worst) = results.peek() {
                                worst_dist = worst.dist;
                            }
                        } else if dist > worst_dist {
                            worst_dist = dist;
                        }
                    }
                }
            }
        }

        let mut out: Vec<(u32, f32)> = results.into_iter().map(|c| (c.slot, c.dist)).collect();
        out.sort_unstable_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        out
    }

    /// Diversity-aware neighbor selection: a candidate is kept only when it
    /// is closer to the query than to every already-kept candidate. The
    /// remainder pads with nearest skipped candidates so sparse regions do
    /// not lose connectivity. `candidates` must be ascending by distance.
    fn select_diverse(&self, candidates: &[(u32, f32)], max: usize) -> Vec<u32> {
        let mut selected: Vec<(u32, f32)> = Vec::with_capacity(max);

        for &(c, dist_to_query) in candidates {
            if selected.len() >= max {
                break;
            }
            let diverse = selected
                .iter()
                .all(|&(s, _)| self.distance_between(c, s) > dist_to_query);
            if diverse {
                selected.push((c, dist_to_query));
            }
        }

        if selected.len() < max {
            for &(c, dist_to_query) in candidates {
                if selected.len() >= max {
                    break;
                }
                if !selected.iter().any(|&(s, _)| s == c) {
                    selected.push((c, dist_to_query));
                }
            }
        }

        selected.into_iter().map(|(s, _)| s).collect()
    }

    /// Re-prune one overflowing neighbor list down to `cap`.
    fn shrink_neighbors(&mut self, slot: u32, layer: usize, cap: usize) {
        let list = std::mem::take(&mut self.nodes[slot as usize].layers[layer]);
        let mut candidates: Vec<(u32, f32)> = list
            .into_iter()
            .map(|n| (n, self.distance_between(slot, n)))
            .collect();
        candidates.sort_unstable_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        let selected = self.select_diverse(&candidates, cap);
        self.nodes[slot as usize].layers[layer] = selected;
    }

    pub(crate) fn insert(&mut self, id: u64, vector: &[u8]) -> Result<()> {
        if self.id_to_slot.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }

        let level = self.assign_layer();
        let slot = self.nodes.len() as u32;
        self.vectors.extend_from_slice(vector);
        self.nodes.push(Node {
            id,
            deleted: false,
            layers: smallvec![Vec::new(); level + 1],
        });
        self.id_to_slot.insert(id, slot);
        self.live += 1;

        let Some(entry) = self.entry else {
            self.entry = Some(EntryPoint { slot, layer: level });
            trace!(id, layer = level, "first node becomes entry point");
            return Ok(());
        };

        // Greedy descent through layers above the new node's top layer.
        let mut ep = entry.slot;
        for l in ((level + 1)..=entry.layer).rev() {
            if let Some(&(best, _)) = self.search_layer(vector, ep, 1, l).first() {
                ep = best;
            }
        }

        // Link on every shared layer, widest beam at construction width.
        for l in (0..=level.min(entry.layer)).rev() {
            let candidates = self.search_layer(vector, ep, self.ef_construction, l);
            if candidates.is_empty() {
                continue;
            }
            ep = candidates[0].0;

            let selected = self.select_diverse(&candidates, self.m);
            self.nodes[slot as usize].layers[l] = selected.clone();

            for n in selected {
                self.nodes[n as usize].layers[l].push(slot);
                let cap = self.max_links(l);
                if self.nodes[n as usize].layers[l].len() > cap {
                    self.shrink_neighbors(n, l, cap);
                }
            }
        }

        if level > entry.layer {
            self.entry = Some(EntryPoint { slot, layer: level });
            debug!(id, layer = level, "entry point raised");
        }

        Ok(())
    }

    pub(crate) fn search(&self, query: &[u8], k: usize, ef: usize) -> Vec<(u64, f32)> {
        let Some(entry) = self.entry else {
            return Vec::new();
        };

        let mut ep = entry.slot;
        for l in (1..=entry.layer).rev() {
            if let Some(&(best, _)) = self.search_layer(query, ep, 1, l).first() {
                ep = best;
            }
        }

        let beam = ef.max(k).max(1);
        let mut hits: Vec<(u64, f32)> = self
            .search_layer(query, ep, beam, 0)
            .into_iter()
            .filter(|&(slot, _)| !self.nodes[slot as usize].deleted)
            .map(|(slot, dist)| (self.nodes[slot as usize].id, dist))
            .collect();

        hits.sort_unstable_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        hits
    }

    /// Tombstone a node and relink every neighbor that pointed at it, so no
    /// surviving neighbor list references the removed slot.
    pub(crate) fn remove(&mut self, id: u64) -> Result<()> {
        let Some(slot) = self.id_to_slot.remove(&id) else {
            return Err(Error::UnknownId(id));
        };

        self.nodes[slot as usize].deleted = true;
        self.live -= 1;

        let removed_layers: Vec<Vec<u32>> = self.nodes[slot as usize]
            .layers
            .iter()
            .cloned()
            .collect();
        for list in self.nodes[slot as usize].layers.iter_mut() {
            list.clear();
        }

        // Pruning makes links asymmetric, so the removed node's own lists are
        // not enough: sweep every surviving list for references to the slot.
        let mut repairs: Vec<(u32, usize)> = Vec::new();
        for n in 0..self.nodes.len() {
            if n as u32 == slot || self.nodes[n].deleted {
                continue;
            }
            let shared = self.nodes[n].layers.len().min(removed_layers.len());
            for l in 0..shared {
                let list = &mut self.nodes[n].layers[l];
                if let Some(pos) = list.iter().position(|&x| x == slot) {
                    list.swap_remove(pos);
                    repairs.push((n as u32, l));
                }
            }
        }

        for (n, l) in &repairs {
            self.repair_node(*n, *l, &removed_layers[*l]);
        }

        if self.entry.is_some_and(|e| e.slot == slot) {
            self.entry = self.find_entry();
        }

        debug!(id, repaired = repairs.len(), "node removed");
        Ok(())
    }

    /// Rebuild one neighbor list from its survivors plus the removed node's
    /// neighborhood, keeping the region connected.
    fn repair_node(&mut self, slot: u32, layer: usize, inherited: &[u32]) {
        let cap = self.max_links(layer);
        let mut pool = self.nodes[slot as usize].layers[layer].clone();
        for &c in inherited {
            if c != slot && !self.nodes[c as usize].deleted && !pool.contains(&c) {
                pool.push(c);
            }
        }

        let mut candidates: Vec<(u32, f32)> = pool
            .into_iter()
            .map(|c| (c, self.distance_between(slot, c)))
            .collect();
        candidates.sort_unstable_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let selected = self.select_diverse(&candidates, cap);
        self.nodes[slot as usize].layers[layer] = selected;
    }

    fn find_entry(&self) -> Option<EntryPoint> {
        let mut best: Option<EntryPoint> = None;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.deleted {
                continue;
            }
            let layer = node.layers.len() - 1;
            if best.map_or(true, |b| layer > b.layer) {
                best = Some(EntryPoint {
                    slot: i as u32,
                    layer,
                });
            }
        }
        best
    }

    /// Physically drop tombstoned slots and remap surviving links.
    pub(crate) fn compact(&mut self) {
        if self.live == self.nodes.len() {
            return;
        }
        let dropped = self.nodes.len() - self.live;

        let mut remap: Vec<Option<u32>> = vec![None; self.nodes.len()];
        let mut new_nodes: Vec<Node> = Vec::with_capacity(self.live);
        let mut new_vectors: Vec<u8> = Vec::with_capacity(self.live * self.bytes_per_vector);

        for (i, node) in self.nodes.iter().enumerate() {
            if node.deleted {
                continue;
            }
            remap[i] = Some(new_nodes.len() as u32);
            new_vectors.extend_from_slice(self.vector(i as u32));
            new_nodes.push(node.clone());
        }

        for node in &mut new_nodes {
            for list in node.layers.iter_mut() {
                *list = list.iter().filter_map(|&n| remap[n as usize]).collect();
            }
        }

        self.id_to_slot = new_nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i as u32))
            .collect();
        self.entry = self.entry.and_then(|e| {
            remap[e.slot as usize].map(|slot| EntryPoint {
                slot,
                layer: e.layer,
            })
        });
        self.nodes = new_nodes;
        self.vectors = new_vectors;
        if self.entry.is_none() {
            self.entry = self.find_entry();
        }

        debug!(dropped, live = self.live, "compacted tombstoned nodes");
    }

    /// Pre-grow storage for `capacity` total nodes.
    pub(crate) fn reserve(&mut self, capacity: usize) {
        let additional = capacity.saturating_sub(self.nodes.len());
        self.nodes.reserve(additional);
        self.vectors.reserve(additional * self.bytes_per_vector);
        self.id_to_slot.reserve(additional);
    }
}
