//! Breadth-first traversal over a graph snapshot.
//!
//! Both query shapes expand level by level so results come out ordered by hop
//! count and, within a hop, by discovery order: start entities in id order,
//! outgoing edges before incoming, each list in edge creation order.

use std::time::Instant;

use crate::config::QueryLimits;
use crate::entity::EntityId;
use crate::graph::Graph;
use crate::relationship::EdgeId;

use super::request::{Direction, EdgeDirection, TraversalRequest};
use super::result::{EntityRef, GraphPath, NeighborEdge, Neighborhood, PathSet, PathStep, ReachedEntity};

/// Incident edges scanned between deadline checks.
const DEADLINE_CHECK_EVERY: u32 = 1024;

/// Expansion allowance for one query.
struct Budget {
    remaining: usize,
    deadline: Option<Instant>,
    scanned: u32,
}

impl Budget {
    fn new(limits: &QueryLimits, deadline: Option<Instant>) -> Self {
        Self {
            remaining: limits.max_visited,
            deadline,
            scanned: 0,
        }
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Takes one expansion; false once the cap or the deadline is hit.
    fn spend(&mut self) -> bool {
        if self.remaining == 0 || self.past_deadline() {
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Counts one scanned edge; false once the deadline has passed.
    ///
    /// The clock is read every [`DEADLINE_CHECK_EVERY`] edges so that a
    /// single high-degree entity cannot run past the deadline.
    fn scan_edge(&mut self) -> bool {
        self.scanned = self.scanned.wrapping_add(1);
        self.scanned % DEADLINE_CHECK_EVERY != 0 || !self.past_deadline()
    }
}

/// Entities named by the request, in id order.
fn start_entities(graph: &Graph, req: &TraversalRequest) -> Vec<EntityId> {
    let name = req.name.trim();
    let wanted_type = req.entity_type.as_deref().map(str::trim);
    graph
        .find_by_name(name)
        .iter()
        .copied()
        .filter(|&id| match wanted_type {
            None => true,
            Some(t) => graph.entity(id).is_some_and(|e| e.matches(name, t)),
        })
        .collect()
}

fn entity_ref(graph: &Graph, id: EntityId) -> Option<EntityRef> {
    graph.entity(id).map(EntityRef::from)
}

fn refs(graph: &Graph, ids: &[EntityId]) -> Vec<EntityRef> {
    ids.iter().filter_map(|&id| entity_ref(graph, id)).collect()
}

/// Incident edges of `node` allowed by `direction`: outgoing first.
fn incident(
    graph: &Graph,
    node: EntityId,
    direction: Direction,
) -> impl Iterator<Item = (EdgeId, EdgeDirection)> + '_ {
    let outgoing: &[EdgeId] = if direction.follows_outgoing() {
        graph.outgoing(node)
    } else {
        &[]
    };
    let incoming: &[EdgeId] = if direction.follows_incoming() {
        graph.incoming(node)
    } else {
        &[]
    };
    outgoing
        .iter()
        .map(|&e| (e, EdgeDirection::Outgoing))
        .chain(incoming.iter().map(|&e| (e, EdgeDirection::Incoming)))
}

pub(crate) fn neighborhood(
    graph: &Graph,
    req: &TraversalRequest,
    limits: &QueryLimits,
    deadline: Option<Instant>,
) -> Neighborhood {
    let starts = start_entities(graph, req);
    let mut result = Neighborhood {
        starts: refs(graph, &starts),
        ..Neighborhood::default()
    };

    let mut visited = vec![false; graph.entity_count()];
    let mut emitted = vec![false; graph.relationship_count()];
    for start in &result.starts {
        visited[start.id.index()] = true;
        result.entities.push(ReachedEntity {
            entity: start.clone(),
            hop: 0,
        });
    }

    let mut budget = Budget::new(limits, deadline);
    let mut frontier = starts;

    'hops: for hop in 1..=req.hops() {
        let mut next = Vec::new();
        for &node in &frontier {
            if !budget.spend() {
                result.truncated = true;
                break 'hops;
            }
            for (edge_id, direction) in incident(graph, node, req.direction) {
                if !budget.scan_edge() {
                    result.truncated = true;
                    break 'hops;
                }
                if emitted[edge_id.index()] {
                    continue;
                }
                let Some(rel) = graph.relationship(edge_id) else {
                    continue;
                };
                if !req.allows_relation(&rel.relation) {
                    continue;
                }
                let (Some(source), Some(target)) = (entity_ref(graph, rel.head), entity_ref(graph, rel.tail)) else {
                    continue;
                };
                emitted[edge_id.index()] = true;

                let other = match direction {
                    EdgeDirection::Outgoing => &target,
                    EdgeDirection::Incoming => &source,
                };
                if !visited[other.id.index()] {
                    visited[other.id.index()] = true;
                    next.push(other.id);
                    result.entities.push(ReachedEntity {
                        entity: other.clone(),
                        hop,
                    });
                }

                result.edges.push(NeighborEdge {
                    edge: edge_id,
                    source,
                    relation: rel.relation.clone(),
                    target,
                    direction,
                    hop,
                    evidence: rel.evidence.clone(),
                    record_id: rel.record_id.clone(),
                });
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    result
}

/// A path prefix under construction.
#[derive(Clone)]
struct Partial {
    nodes: Vec<EntityId>,
    edges: Vec<(EdgeId, EdgeDirection)>,
}

impl Partial {
    fn materialize(&self, graph: &Graph) -> Option<GraphPath> {
        let mut steps = Vec::with_capacity(self.edges.len());
        for (i, &(edge, direction)) in self.edges.iter().enumerate() {
            let rel = graph.relationship(edge)?;
            steps.push(PathStep {
                edge,
                from: entity_ref(graph, self.nodes[i])?,
                relation: rel.relation.clone(),
                to: entity_ref(graph, self.nodes[i + 1])?,
                direction,
            });
        }
        Some(GraphPath {
            hops: steps.len(),
            steps,
        })
    }
}

pub(crate) fn paths(
    graph: &Graph,
    req: &TraversalRequest,
    limits: &QueryLimits,
    deadline: Option<Instant>,
) -> PathSet {
    let starts = start_entities(graph, req);
    let mut result = PathSet {
        starts: refs(graph, &starts),
        ..PathSet::default()
    };

    let mut budget = Budget::new(limits, deadline);
    let mut layer: Vec<Partial> = starts
        .iter()
        .map(|&id| Partial {
            nodes: vec![id],
            edges: Vec::new(),
        })
        .collect();

    let hops = req.hops();
    'hops: for hop in 1..=hops {
        let mut next = Vec::new();
        for partial in &layer {
            if !budget.spend() {
                result.truncated = true;
                break 'hops;
            }
            let Some(&node) = partial.nodes.last() else {
                continue;
            };
            for (edge_id, direction) in incident(graph, node, req.direction) {
                if !budget.scan_edge() {
                    result.truncated = true;
                    break 'hops;
                }
                let Some(rel) = graph.relationship(edge_id) else {
                    continue;
                };
                if rel.is_self_loop() || !req.allows_relation(&rel.relation) {
                    continue;
                }
                let Some(other) = rel.other_end(node) else {
                    continue;
                };
                if partial.nodes.contains(&other) {
                    continue;
                }

                let mut extended = partial.clone();
                extended.nodes.push(other);
                extended.edges.push((edge_id, direction));
                if let Some(path) = extended.materialize(graph) {
                    result.paths.push(path);
                }
                if hop < hops {
                    next.push(extended);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        layer = next;
    }

    result
}
