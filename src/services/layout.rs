//! Layered layout for the dependency graph.
//!
//! 1. Split the graph into weakly connected components.
//! 2. Rank each component by longest path, so every edge points from a lower
//!    rank to a higher one.
//! 3. Order nodes inside each rank with barycenter sweeps, keeping the
//!    ordering with the fewest crossings.
//! 4. Assign coordinates, stack components along the secondary axis and
//!    centre the result on the origin.
//!
//! Ties are broken by task id, never by insertion order, so two stores
//! holding the same nodes and edges yield the same layout.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::trace;

use crate::domain::graph::GraphStore;
use crate::domain::task::TaskId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(self, other: Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    LeftToRight,
    TopToBottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_height: f64,
    /// Space between consecutive ranks along the primary axis.
    pub rank_gap: f64,
    /// Space between neighbours inside one rank.
    pub node_gap: f64,
    /// Space between disconnected components.
    pub component_gap: f64,
    pub direction: LayoutDirection,
    /// Upper bound on barycenter sweep iterations.
    pub max_sweeps: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 200.0,
            node_height: 60.0,
            rank_gap: 80.0,
            node_gap: 40.0,
            component_gap: 80.0,
            direction: LayoutDirection::LeftToRight,
            max_sweeps: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Position {
        Position::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn contains(&self, p: Position) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    fn around(center: Position, width: f64, height: f64) -> Self {
        Self {
            min_x: center.x - width / 2.0,
            min_y: center.y - height / 2.0,
            max_x: center.x + width / 2.0,
            max_y: center.y + height / 2.0,
        }
    }

    fn union(&self, other: &Bounds) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Computed node centres. A view artifact: recomputed whenever the graph
/// changes and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    positions: Vec<(TaskId, Position)>,
    index: HashMap<TaskId, usize>,
    node_width: f64,
    node_height: f64,
    direction: LayoutDirection,
}

impl Layout {
    pub fn empty(config: &LayoutConfig) -> Self {
        Self {
            positions: Vec::new(),
            index: HashMap::new(),
            node_width: config.node_width,
            node_height: config.node_height,
            direction: config.direction,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, id: &TaskId) -> Option<Position> {
        self.index.get(id).map(|&i| self.positions[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, Position)> + '_ {
        self.positions.iter().map(|(id, p)| (id, *p))
    }

    pub fn node_size(&self) -> (f64, f64) {
        (self.node_width, self.node_height)
    }

    pub fn direction(&self) -> LayoutDirection {
        self.direction
    }

    /// Rectangle of a node card centred on `center`.
    pub fn node_bounds(&self, center: Position) -> Bounds {
        Bounds::around(center, self.node_width, self.node_height)
    }

    /// Input and output handle positions for a card centred on `center`.
    pub fn handles(&self, center: Position) -> (Position, Position) {
        match self.direction {
            LayoutDirection::LeftToRight => (
                center.offset(-self.node_width / 2.0, 0.0),
                center.offset(self.node_width / 2.0, 0.0),
            ),
            LayoutDirection::TopToBottom => (
                center.offset(0.0, -self.node_height / 2.0),
                center.offset(0.0, self.node_height / 2.0),
            ),
        }
    }

    /// Bounding box of all node cards, `None` for an empty layout.
    pub fn bounds(&self) -> Option<Bounds> {
        self.positions
            .iter()
            .map(|(_, p)| self.node_bounds(*p))
            .reduce(|acc, b| acc.union(&b))
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        for (_, p) in &mut self.positions {
            *p = p.offset(dx, dy);
        }
    }
}

/// Converts a graph into node positions. Implementations must be
/// deterministic.
pub trait LayoutEngine: Send + Sync {
    fn layout(&self, store: &GraphStore) -> Layout;
}

#[derive(Debug, Clone, Default)]
pub struct LayeredLayout {
    config: LayoutConfig,
}

/// Adjacency over dense local indices, assigned in task id order.
struct LayoutGraph {
    n: usize,
    ids: Vec<TaskId>,
    succ: Vec<Vec<usize>>,
    pred: Vec<Vec<usize>>,
}

impl LayoutGraph {
    fn from_store(store: &GraphStore) -> Self {
        let mut ids = store.ids().to_vec();
        ids.sort();
        let local: HashMap<&TaskId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let n = ids.len();
        let mut succ = vec![Vec::new(); n];
        let mut pred = vec![Vec::new(); n];
        for edge in store.edges() {
            if let (Some(&a), Some(&b)) = (local.get(&edge.from), local.get(&edge.to)) {
                succ[a].push(b);
                pred[b].push(a);
            }
        }
        for list in succ.iter_mut().chain(pred.iter_mut()) {
            list.sort_unstable();
        }
        Self { n, ids, succ, pred }
    }

    /// Weakly connected components, each sorted ascending, ordered by their
    /// first member.
    fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.n];
        let mut components = Vec::new();
        for start in 0..self.n {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut members = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(v) = queue.pop_front() {
                for &w in self.succ[v].iter().chain(self.pred[v].iter()) {
                    if !seen[w] {
                        seen[w] = true;
                        members.push(w);
                        queue.push_back(w);
                    }
                }
            }
            members.sort_unstable();
            components.push(members);
        }
        components
    }

    /// Longest-path ranks for the members of one component.
    fn assign_ranks(&self, members: &[usize]) -> HashMap<usize, usize> {
        let mut in_degree: HashMap<usize, usize> =
            members.iter().map(|&v| (v, self.pred[v].len())).collect();
        let mut ranks: HashMap<usize, usize> = members.iter().map(|&v| (v, 0)).collect();
        let mut queue: VecDeque<usize> = members
            .iter()
            .copied()
            .filter(|v| in_degree[v] == 0)
            .collect();
        let mut visited = 0;

        while let Some(u) = queue.pop_front() {
            visited += 1;
            let rank_u = ranks[&u];
            for &v in &self.succ[u] {
                if let Some(rank_v) = ranks.get_mut(&v) {
                    *rank_v = (*rank_v).max(rank_u + 1);
                }
                if let Some(degree) = in_degree.get_mut(&v) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(v);
                    }
                }
            }
        }

        // The store never holds a cycle; stay total anyway.
        if visited < members.len() {
            let max_rank = ranks.values().copied().max().unwrap_or(0);
            for (v, degree) in &in_degree {
                if *degree > 0 {
                    ranks.insert(*v, max_rank + 1);
                }
            }
        }
        ranks
    }
}

fn build_rank_buckets(members: &[usize], ranks: &HashMap<usize, usize>) -> Vec<Vec<usize>> {
    let max_rank = ranks.values().copied().max().unwrap_or(0);
    let mut buckets = vec![Vec::new(); max_rank + 1];
    for &v in members {
        buckets[ranks[&v]].push(v);
    }
    buckets
}

fn slot_map(buckets: &[Vec<usize>]) -> HashMap<usize, usize> {
    buckets
        .iter()
        .flat_map(|bucket| bucket.iter().enumerate().map(|(slot, &v)| (v, slot)))
        .collect()
}

/// Reorders `buckets[r]` by the mean slot of each node's neighbours in
/// `buckets[reference]`. Nodes without such neighbours keep their slot.
fn barycenter_sweep(
    buckets: &mut [Vec<usize>],
    r: usize,
    reference: usize,
    neighbours: &[Vec<usize>],
) {
    let reference_slots: HashMap<usize, usize> = buckets[reference]
        .iter()
        .enumerate()
        .map(|(slot, &v)| (v, slot))
        .collect();

    let mut scored: Vec<(OrderedFloat<f64>, usize, usize)> = buckets[r]
        .iter()
        .enumerate()
        .map(|(slot, &v)| {
            let slots: Vec<f64> = neighbours[v]
                .iter()
                .filter_map(|w| reference_slots.get(w))
                .map(|&s| s as f64)
                .collect();
            let barycenter = if slots.is_empty() {
                slot as f64
            } else {
                slots.iter().sum::<f64>() / slots.len() as f64
            };
            (OrderedFloat(barycenter), slot, v)
        })
        .collect();
    scored.sort();
    buckets[r] = scored.into_iter().map(|(_, _, v)| v).collect();
}

fn count_crossings(upper: &[usize], lower: &[usize], succ: &[Vec<usize>]) -> usize {
    let lower_slots: HashMap<usize, usize> =
        lower.iter().enumerate().map(|(slot, &v)| (v, slot)).collect();
    let mut segments = Vec::new();
    for (i, &u) in upper.iter().enumerate() {
        for w in &succ[u] {
            if let Some(&j) = lower_slots.get(w) {
                segments.push((i, j));
            }
        }
    }
    let mut crossings = 0;
    for a in 0..segments.len() {
        for b in (a + 1)..segments.len() {
            let (a1, a2) = segments[a];
            let (b1, b2) = segments[b];
            if (a1 < b1 && a2 > b2) || (a1 > b1 && a2 < b2) {
                crossings += 1;
            }
        }
    }
    crossings
}

fn total_crossings(buckets: &[Vec<usize>], succ: &[Vec<usize>]) -> usize {
    buckets
        .windows(2)
        .map(|pair| count_crossings(&pair[0], &pair[1], succ))
        .sum()
}

fn minimize_crossings(buckets: &mut Vec<Vec<usize>>, graph: &LayoutGraph, max_sweeps: usize) {
    if buckets.len() <= 1 {
        return;
    }
    let mut best = buckets.clone();
    let mut best_crossings = total_crossings(buckets, &graph.succ);

    for _ in 0..max_sweeps {
        if best_crossings == 0 {
            break;
        }
        for r in 1..buckets.len() {
            barycenter_sweep(buckets, r, r - 1, &graph.pred);
        }
        for r in (0..buckets.len() - 1).rev() {
            barycenter_sweep(buckets, r, r + 1, &graph.succ);
        }
        let crossings = total_crossings(buckets, &graph.succ);
        if crossings < best_crossings {
            best_crossings = crossings;
            best = buckets.clone();
        } else {
            break;
        }
    }
    *buckets = best;
}

impl LayeredLayout {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// (primary span, secondary span) of one card.
    fn spans(&self) -> (f64, f64) {
        match self.config.direction {
            LayoutDirection::LeftToRight => (self.config.node_width, self.config.node_height),
            LayoutDirection::TopToBottom => (self.config.node_height, self.config.node_width),
        }
    }

    fn extent(&self, count: usize, span: f64) -> f64 {
        if count == 0 {
            return 0.0;
        }
        count as f64 * span + (count - 1) as f64 * self.config.node_gap
    }
}

impl LayoutEngine for LayeredLayout {
    fn layout(&self, store: &GraphStore) -> Layout {
        let mut layout = Layout::empty(&self.config);
        if store.is_empty() {
            return layout;
        }

        let graph = LayoutGraph::from_store(store);
        let (primary_span, secondary_span) = self.spans();
        let rank_step = primary_span + self.config.rank_gap;
        let slot_step = secondary_span + self.config.node_gap;

        let mut centres: Vec<Option<(f64, f64)>> = vec![None; graph.n];
        let mut offset = 0.0;

        for members in graph.components() {
            let ranks = graph.assign_ranks(&members);
            let mut buckets = build_rank_buckets(&members, &ranks);
            minimize_crossings(&mut buckets, &graph, self.config.max_sweeps);

            let widest = buckets.iter().map(Vec::len).max().unwrap_or(0);
            let widest_extent = self.extent(widest, secondary_span);
            let slots = slot_map(&buckets);

            for (r, bucket) in buckets.iter().enumerate() {
                let shift = (widest_extent - self.extent(bucket.len(), secondary_span)) / 2.0;
                for &v in bucket {
                    let primary = r as f64 * rank_step + primary_span / 2.0;
                    let secondary =
                        offset + shift + slots[&v] as f64 * slot_step + secondary_span / 2.0;
                    centres[v] = Some((primary, secondary));
                }
            }
            trace!(
                nodes = members.len(),
                ranks = buckets.len(),
                "Laid out component"
            );
            offset += widest_extent + self.config.component_gap;
        }

        for (v, id) in graph.ids.iter().enumerate() {
            let (primary, secondary) = centres[v].unwrap_or_default();
            let position = match self.config.direction {
                LayoutDirection::LeftToRight => Position::new(primary, secondary),
                LayoutDirection::TopToBottom => Position::new(secondary, primary),
            };
            layout.index.insert(id.clone(), layout.positions.len());
            layout.positions.push((id.clone(), position));
        }

        if let Some(bounds) = layout.bounds() {
            let centre = bounds.center();
            layout.translate(-centre.x, -centre.y);
        }
        layout
    }
}

/// Remembers the last layout and the store revision it was computed for.
#[derive(Debug, Default)]
pub struct LayoutCache {
    revision: Option<u64>,
    layout: Option<Layout>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fresh(&self, store: &GraphStore) -> bool {
        self.layout.is_some() && self.revision == Some(store.revision())
    }

    pub fn invalidate(&mut self) {
        self.revision = None;
        self.layout = None;
    }

    pub fn get_or_compute(&mut self, store: &GraphStore, engine: &dyn LayoutEngine) -> &Layout {
        if !self.is_fresh(store) {
            self.revision = Some(store.revision());
            self.layout = Some(engine.layout(store));
        }
        self.layout.get_or_insert_with(|| engine.layout(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::TaskNode;

    fn id(s: &str) -> TaskId {
        TaskId::from(s)
    }

    fn store(nodes: &[&str], edges: &[(&str, &str)]) -> GraphStore {
        let mut store = GraphStore::new();
        for &n in nodes {
            store.add_node(TaskNode::new(n, n)).unwrap();
        }
        for &(a, b) in edges {
            store.add_edge(&id(a), &id(b)).unwrap();
        }
        store
    }

    #[test]
    fn test_empty_graph_has_empty_layout() {
        let layout = LayeredLayout::default().layout(&GraphStore::new());
        assert!(layout.is_empty());
        assert!(layout.bounds().is_none());
    }

    #[test]
    fn test_single_node_is_centred() {
        let layout = LayeredLayout::default().layout(&store(&["solo"], &[]));
        assert_eq!(layout.position(&id("solo")), Some(Position::new(0.0, 0.0)));
    }

    #[test]
    fn test_upstream_before_downstream() {
        let graph = store(&["c", "b", "a"], &[("a", "b"), ("b", "c")]);
        let layout = LayeredLayout::default().layout(&graph);

        let a = layout.position(&id("a")).unwrap();
        let b = layout.position(&id("b")).unwrap();
        let c = layout.position(&id("c")).unwrap();
        assert!(a.x < b.x && b.x < c.x);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn test_top_to_bottom_direction() {
        let config = LayoutConfig {
            direction: LayoutDirection::TopToBottom,
            ..Default::default()
        };
        let layout = LayeredLayout::new(config).layout(&store(&["a", "b"], &[("a", "b")]));
        let a = layout.position(&id("a")).unwrap();
        let b = layout.position(&id("b")).unwrap();
        assert!(a.y < b.y);
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let graph = store(
            &["1", "2", "3", "4", "5", "6"],
            &[("1", "3"), ("2", "3"), ("1", "4"), ("4", "5"), ("2", "5")],
        );
        let engine = LayeredLayout::default();
        assert_eq!(engine.layout(&graph), engine.layout(&graph));
    }

    #[test]
    fn test_disconnected_components_do_not_overlap() {
        let graph = store(&["a", "b", "x", "y", "lonely"], &[("a", "b"), ("x", "y")]);
        let layout = LayeredLayout::default().layout(&graph);

        let cards: Vec<Bounds> = layout.iter().map(|(_, p)| layout.node_bounds(p)).collect();
        for i in 0..cards.len() {
            for j in (i + 1)..cards.len() {
                assert!(!cards[i].intersects(&cards[j]), "cards {i} and {j} overlap");
            }
        }
        assert_eq!(layout.bounds().unwrap().center(), Position::new(0.0, 0.0));
    }

    #[test]
    fn test_same_sets_in_any_insertion_order() {
        let engine = LayeredLayout::default();
        let first = store(&["a", "b", "c"], &[("a", "c"), ("b", "c")]);
        let second = store(&["b", "a", "c"], &[("b", "c"), ("a", "c")]);
        assert_eq!(engine.layout(&first), engine.layout(&second));

        let first = store(&["x", "y", "a", "solo"], &[("x", "y"), ("a", "y")]);
        let second = store(&["solo", "a", "y", "x"], &[("a", "y"), ("x", "y")]);
        assert_eq!(engine.layout(&first), engine.layout(&second));
    }

    #[test]
    fn test_barycenter_removes_crossing() {
        // Initial order [a, b] over [c, d] crosses a->d with b->c.
        let graph = store(&["a", "b", "c", "d"], &[("a", "d"), ("b", "c")]);
        let g = LayoutGraph::from_store(&graph);
        let ranks = g.assign_ranks(&[0, 1, 2, 3]);
        let mut buckets = build_rank_buckets(&[0, 1, 2, 3], &ranks);
        assert_eq!(total_crossings(&buckets, &g.succ), 1);

        minimize_crossings(&mut buckets, &g, 8);
        assert_eq!(total_crossings(&buckets, &g.succ), 0);
    }

    #[test]
    fn test_cache_recomputes_after_mutation() {
        let mut graph = store(&["a"], &[]);
        let engine = LayeredLayout::default();
        let mut cache = LayoutCache::new();

        assert_eq!(cache.get_or_compute(&graph, &engine).len(), 1);
        assert!(cache.is_fresh(&graph));

        graph.add_node(TaskNode::new("b", "b")).unwrap();
        assert!(!cache.is_fresh(&graph));
        assert_eq!(cache.get_or_compute(&graph, &engine).len(), 2);
    }
}
