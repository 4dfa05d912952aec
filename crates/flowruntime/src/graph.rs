//! Dependency graph for one run.
//!
//! Nodes live in a `petgraph` graph addressed by stable `NodeIndex`; each
//! petgraph edge carries the position of its source [`Edge`] in the request so
//! handle names survive. The graph is immutable after [`DependencyGraph::build`].

use flowcore::{Edge, EdgeEndpoint, GraphValidationError, Node, ValidationReport};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

struct Frame {
    node: NodeIndex,
    successors: Vec<NodeIndex>,
    next: usize,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, usize>,
    index: HashMap<String, NodeIndex>,
    edges: Vec<Edge>,
}

impl DependencyGraph {
    /// Build adjacency from raw nodes and edges, reporting every duplicate
    /// node id and every edge endpoint that names no node.
    pub fn build(nodes: &[Node], edges: &[Edge]) -> Result<Self, ValidationReport> {
        let mut report = ValidationReport::new();
        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut index = HashMap::with_capacity(nodes.len());
        let mut reported = HashSet::new();

        for node in nodes {
            if index.contains_key(&node.id) {
                if reported.insert(node.id.as_str()) {
                    report.push(GraphValidationError::DuplicateNode {
                        id: node.id.clone(),
                    });
                }
                continue;
            }
            let idx = graph.add_node(node.id.clone());
            index.insert(node.id.clone(), idx);
        }

        for (position, edge) in edges.iter().enumerate() {
            let source = index.get(&edge.source).copied();
            let target = index.get(&edge.target).copied();

            if source.is_none() {
                report.push(GraphValidationError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    endpoint: EdgeEndpoint::Source,
                    node_id: edge.source.clone(),
                });
            }
            if target.is_none() {
                report.push(GraphValidationError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    endpoint: EdgeEndpoint::Target,
                    node_id: edge.target.clone(),
                });
            }
            if let (Some(s), Some(t)) = (source, target) {
                graph.add_edge(s, t, position);
            }
        }

        report.into_result()?;

        Ok(Self {
            graph,
            index,
            edges: edges.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Node ids in ascending lexical order.
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.index.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Three-colour depth-first search. Roots are tried in ascending id
    /// order, so the same graph always reports the same cycle. The path
    /// starts and ends on the node that closed the cycle.
    pub fn detect_cycle(&self) -> Option<GraphValidationError> {
        let mut color = vec![Color::White; self.graph.node_count()];

        for root in self.sorted_indices() {
            if color[root.index()] != Color::White {
                continue;
            }
            color[root.index()] = Color::Gray;
            let mut stack = vec![Frame {
                node: root,
                successors: self.sorted_successors(root),
                next: 0,
            }];

            loop {
                let step = match stack.last_mut() {
                    None => break,
                    Some(frame) if frame.next < frame.successors.len() => {
                        frame.next += 1;
                        Some(frame.successors[frame.next - 1])
                    }
                    Some(_) => None,
                };

                match step {
                    Some(next) => match color[next.index()] {
                        Color::White => {
                            color[next.index()] = Color::Gray;
                            stack.push(Frame {
                                node: next,
                                successors: self.sorted_successors(next),
                                next: 0,
                            });
                        }
                        Color::Gray => {
                            let start = stack
                                .iter()
                                .position(|frame| frame.node == next)
                                .unwrap_or(0);
                            let mut path: Vec<String> = stack[start..]
                                .iter()
                                .map(|frame| self.graph[frame.node].clone())
                                .collect();
                            path.push(self.graph[next].clone());
                            return Some(GraphValidationError::Cycle { path });
                        }
                        Color::Black => {}
                    },
                    None => {
                        if let Some(frame) = stack.pop() {
                            color[frame.node.index()] = Color::Black;
                        }
                    }
                }
            }
        }

        None
    }

    /// Kahn's algorithm. Among nodes whose in-degree has dropped to zero the
    /// lexically smallest id is emitted first.
    pub fn topological_order(&self) -> Result<Vec<String>, GraphValidationError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<(&str, NodeIndex)>> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .map(|idx| Reverse((self.graph[idx].as_str(), idx)))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((id, idx))) = ready.pop() {
            order.push(id.to_string());
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let target = edge.target();
                in_degree[target.index()] -= 1;
                if in_degree[target.index()] == 0 {
                    ready.push(Reverse((self.graph[target].as_str(), target)));
                }
            }
        }

        if order.len() == self.graph.node_count() {
            return Ok(order);
        }

        Err(self.detect_cycle().unwrap_or_else(|| {
            let mut path: Vec<String> = self
                .graph
                .node_indices()
                .filter(|idx| in_degree[idx.index()] > 0)
                .map(|idx| self.graph[idx].clone())
                .collect();
            path.sort();
            GraphValidationError::Cycle { path }
        }))
    }

    /// Direct predecessors, sorted and deduplicated.
    pub fn dependencies_of(&self, node_id: &str) -> Vec<&str> {
        self.neighbors(node_id, Direction::Incoming)
    }

    /// Direct successors, sorted and deduplicated.
    pub fn dependents_of(&self, node_id: &str) -> Vec<&str> {
        self.neighbors(node_id, Direction::Outgoing)
    }

    /// Every node reachable through forward edges, excluding `node_id`.
    pub fn descendants_of(&self, node_id: &str) -> Vec<&str> {
        let Some(&start) = self.index.get(node_id) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut found = Vec::new();
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != start {
                found.push(self.graph[idx].as_str());
            }
        }
        found.sort_unstable();
        found
    }

    /// Edges feeding `node_id`, in request order.
    pub fn incoming_edges(&self, node_id: &str) -> Vec<&Edge> {
        let Some(&idx) = self.index.get(node_id) else {
            return Vec::new();
        };
        let mut positions: Vec<usize> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|edge| *edge.weight())
            .collect();
        positions.sort_unstable();
        positions.into_iter().map(|i| &self.edges[i]).collect()
    }

    fn neighbors(&self, node_id: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(node_id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn sorted_indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        indices
    }

    fn sorted_successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut successors: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        successors.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        successors.dedup();
        successors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> Vec<Node> {
        ids.iter().map(|id| Node::new(*id, "const")).collect()
    }

    fn edge(source: &str, target: &str) -> Edge {
        Edge::new(format!("{}->{}", source, target), source, target)
    }

    fn assert_respects_edges(order: &[String], edges: &[Edge]) {
        let position = |id: &str| order.iter().position(|n| n == id).unwrap();
        for e in edges {
            assert!(
                position(&e.source) < position(&e.target),
                "{} must precede {} in {:?}",
                e.source,
                e.target,
                order
            );
        }
    }

    #[test]
    fn chain_orders_exactly() {
        let edges = vec![edge("a", "b"), edge("b", "c")];
        let graph = DependencyGraph::build(&nodes(&["c", "b", "a"]), &edges).unwrap();
        assert_eq!(graph.topological_order().unwrap(), vec!["a", "b", "c"]);
        assert!(graph.detect_cycle().is_none());
    }

    #[test]
    fn ties_break_lexically() {
        let edges = vec![edge("root", "zeta"), edge("root", "alpha"), edge("root", "mid")];
        let graph =
            DependencyGraph::build(&nodes(&["zeta", "mid", "root", "alpha", "free"]), &edges)
                .unwrap();
        assert_eq!(
            graph.topological_order().unwrap(),
            vec!["free", "root", "alpha", "mid", "zeta"]
        );
    }

    #[test]
    fn diamond_respects_every_edge() {
        let edges = vec![
            edge("src", "left"),
            edge("src", "right"),
            edge("left", "join"),
            edge("right", "join"),
            edge("join", "sink"),
            edge("src", "sink"),
        ];
        let graph =
            DependencyGraph::build(&nodes(&["sink", "join", "right", "left", "src"]), &edges)
                .unwrap();
        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), 5);
        assert_respects_edges(&order, &edges);
    }

    #[test]
    fn two_node_cycle_is_reported_with_path() {
        let graph =
            DependencyGraph::build(&nodes(&["a", "b"]), &[edge("a", "b"), edge("b", "a")])
                .unwrap();
        assert_eq!(
            graph.detect_cycle(),
            Some(GraphValidationError::Cycle {
                path: vec!["a".into(), "b".into(), "a".into()]
            })
        );
        assert!(matches!(
            graph.topological_order(),
            Err(GraphValidationError::Cycle { .. })
        ));
    }

    #[test]
    fn cycle_behind_an_acyclic_prefix_is_found() {
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "d"), edge("d", "b")];
        let graph = DependencyGraph::build(&nodes(&["a", "b", "c", "d"]), &edges).unwrap();
        match graph.detect_cycle() {
            Some(GraphValidationError::Cycle { path }) => {
                assert_eq!(path, vec!["b", "c", "d", "b"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let graph = DependencyGraph::build(&nodes(&["solo"]), &[edge("solo", "solo")]).unwrap();
        assert_eq!(
            graph.detect_cycle(),
            Some(GraphValidationError::Cycle {
                path: vec!["solo".into(), "solo".into()]
            })
        );
    }

    #[test]
    fn build_reports_every_problem() {
        let err = DependencyGraph::build(
            &nodes(&["a", "a", "b", "a"]),
            &[edge("a", "ghost"), edge("phantom", "b")],
        )
        .unwrap_err();

        assert_eq!(
            err.errors,
            vec![
                GraphValidationError::DuplicateNode { id: "a".into() },
                GraphValidationError::DanglingEdge {
                    edge_id: "a->ghost".into(),
                    endpoint: EdgeEndpoint::Target,
                    node_id: "ghost".into(),
                },
                GraphValidationError::DanglingEdge {
                    edge_id: "phantom->b".into(),
                    endpoint: EdgeEndpoint::Source,
                    node_id: "phantom".into(),
                },
            ]
        );
    }

    #[test]
    fn neighbour_queries_are_direct_and_deduplicated() {
        let edges = vec![
            edge("a", "c"),
            edge("b", "c"),
            Edge::new("dup", "a", "c").with_handles(Some("x"), Some("y")),
            edge("c", "d"),
        ];
        let graph = DependencyGraph::build(&nodes(&["a", "b", "c", "d"]), &edges).unwrap();

        assert_eq!(graph.dependencies_of("c"), vec!["a", "b"]);
        assert_eq!(graph.dependents_of("a"), vec!["c"]);
        assert_eq!(graph.dependents_of("d"), Vec::<&str>::new());
        assert_eq!(graph.descendants_of("a"), vec!["c", "d"]);
        assert!(graph.dependencies_of("missing").is_empty());

        let incoming: Vec<&str> = graph
            .incoming_edges("c")
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(incoming, vec!["a->c", "b->c", "dup"]);
    }

    #[test]
    fn empty_graph_has_empty_order() {
        let graph = DependencyGraph::build(&[], &[]).unwrap();
        assert!(graph.is_empty());
        assert!(graph.topological_order().unwrap().is_empty());
    }

    #[test]
    fn generated_dags_always_respect_edges() {
        // Layered DAGs with a fixed pseudo-random edge pattern.
        for seed in 1u64..40 {
            let ids: Vec<String> = (0..12)
                .map(|i| format!("n{:02}", (i * 7 + seed) % 12))
                .collect();
            let mut state = seed;
            let mut edges = Vec::new();
            for i in 0..ids.len() {
                for j in (i + 1)..ids.len() {
                    state = state
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    if (state >> 33) % 4 == 0 {
                        edges.push(edge(&ids[i], &ids[j]));
                    }
                }
            }
            let node_list: Vec<Node> = ids
                .iter()
                .map(|id| Node::new(id.clone(), "const"))
                .collect();
            let graph = DependencyGraph::build(&node_list, &edges).unwrap();
            let order = graph.topological_order().unwrap();

            let mut sorted = order.clone();
            sorted.sort();
            let mut expected = ids.clone();
            expected.sort();
            assert_eq!(sorted, expected);
            assert_respects_edges(&order, &edges);
            assert_eq!(order, graph.topological_order().unwrap());
        }
    }
}
