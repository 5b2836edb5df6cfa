//! Validation functions for model building.

use crate::component::{Dimension, RequirementDefinition};
use crate::errors::{TempoError, TempoResult};
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use super::types::CGraph;

/// Checks that a component's definitions are internally consistent.
///
/// Every parameter and variable needs a unique name within the component and may
/// have at most one time axis.
pub(crate) fn verify_definitions(
    component: &str,
    definitions: &[RequirementDefinition],
) -> TempoResult<()> {
    let invalid = |reason: String| TempoError::InvalidDefinition {
        component: component.to_string(),
        reason,
    };

    let mut seen = BTreeSet::new();
    for definition in definitions {
        if !seen.insert(definition.name.as_str()) {
            let other = definitions
                .iter()
                .find(|d| d.name == definition.name)
                .map(|d| d.requirement_type)
                .unwrap_or(definition.requirement_type);
            let reason = if other != definition.requirement_type {
                format!(
                    "'{}' is declared as both a parameter and a variable",
                    definition.name
                )
            } else {
                format!("'{}' is declared more than once", definition.name)
            };
            return Err(invalid(reason));
        }

        let time_axes = definition
            .dimensions
            .iter()
            .filter(|d| **d == Dimension::Time)
            .count();
        if time_axes > 1 {
            return Err(invalid(format!(
                "'{}' has {} time dimensions, at most one is allowed",
                definition.name, time_axes
            )));
        }
    }
    Ok(())
}

/// Checks that a producer's value can feed a consumer's parameter.
///
/// `producer` and `consumer` are only used to label the error.
pub(crate) fn verify_shapes(
    producer: &str,
    produced: &[Dimension],
    consumer: &str,
    consumed: &[Dimension],
) -> TempoResult<()> {
    let mismatch = |reason: String| TempoError::ShapeMismatch {
        producer: producer.to_string(),
        consumer: consumer.to_string(),
        reason,
    };
    let kind = |dims: &[Dimension]| {
        if dims.contains(&Dimension::Time) {
            "time-indexed"
        } else {
            "static"
        }
    };

    if kind(produced) != kind(consumed) {
        return Err(mismatch(format!(
            "a {} value cannot be bound to a {} parameter",
            kind(produced),
            kind(consumed)
        )));
    }
    if produced != consumed {
        return Err(mismatch(format!(
            "dimensions {:?} do not match {:?}",
            produced, consumed
        )));
    }
    Ok(())
}

/// Order the components of a graph so that every producer runs before its consumers.
///
/// Nodes must have been added in declaration order.
/// Among the components that are ready to run, the one declared first always goes first,
/// so the order is stable across builds.
///
/// If the graph has a cycle, the components in every cycle are reported in declaration order.
/// A component that consumes its own output at the same period is a cycle of one.
pub(crate) fn execution_order(graph: &CGraph) -> TempoResult<Vec<NodeIndex>> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(i)) = ready.pop() {
        let node = NodeIndex::new(i);
        order.push(node);
        // Parallel edges show up once per edge, matching the in-degree count
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(Reverse(next.index()));
            }
        }
    }

    if order.len() == graph.node_count() {
        return Ok(order);
    }

    let mut cyclic: Vec<NodeIndex> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .collect();
    cyclic.sort();
    Err(TempoError::CyclicDependency {
        components: cyclic.into_iter().map(|n| graph[n].clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::RequirementType;
    use crate::model::types::{Binding, BindingSource};

    fn edge(from: &str, to: &str) -> Binding {
        Binding {
            source: BindingSource::Variable {
                component: from.to_string(),
                variable: "out".to_string(),
            },
            component: to.to_string(),
            parameter: "input".to_string(),
            offset: 0,
        }
    }

    fn graph(names: &[&str], edges: &[(usize, usize)]) -> CGraph {
        let mut graph = CGraph::new();
        let nodes: Vec<NodeIndex> = names.iter().map(|n| graph.add_node(n.to_string())).collect();
        for &(from, to) in edges {
            graph.add_edge(nodes[from], nodes[to], edge(names[from], names[to]));
        }
        graph
    }

    fn names(graph: &CGraph, order: Vec<NodeIndex>) -> Vec<String> {
        order.into_iter().map(|n| graph[n].clone()).collect()
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let g = graph(&["C", "A", "B"], &[(1, 2)]);
        let order = execution_order(&g).unwrap();
        assert_eq!(names(&g, order), vec!["C", "A", "B"]);

        // The consumer is declared before its producer
        let g = graph(&["B", "A", "C"], &[(1, 0)]);
        let order = execution_order(&g).unwrap();
        assert_eq!(names(&g, order), vec!["A", "B", "C"]);
    }

    #[test]
    fn parallel_edges() {
        let g = graph(&["A", "B"], &[(0, 1), (0, 1)]);
        let order = execution_order(&g).unwrap();
        assert_eq!(names(&g, order), vec!["A", "B"]);
    }

    #[test]
    fn cycles_name_their_members() {
        let g = graph(&["X", "B", "A", "Y"], &[(2, 1), (1, 2), (0, 3)]);
        match execution_order(&g) {
            Err(TempoError::CyclicDependency { components }) => {
                assert_eq!(components, vec!["B", "A"])
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(&["A", "B", "C"], &[(0, 1), (1, 1), (1, 2)]);
        match execution_order(&g) {
            Err(TempoError::CyclicDependency { components }) => {
                assert_eq!(components, vec!["B"])
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_names_in_definitions() {
        let definitions = vec![
            RequirementDefinition::scalar_parameter("x", ""),
            RequirementDefinition::scalar_variable("x", ""),
        ];
        assert!(matches!(
            verify_definitions("A", &definitions),
            Err(TempoError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn multiple_time_axes() {
        let definitions = vec![RequirementDefinition::new(
            "x",
            "",
            RequirementType::Variable,
            vec![Dimension::Time, Dimension::Time],
        )];
        assert!(verify_definitions("A", &definitions).is_err());
    }

    #[test]
    fn shapes_must_match() {
        let series = [Dimension::Time];
        assert!(matches!(
            verify_shapes("A.out", &series, "B.input", &[]),
            Err(TempoError::ShapeMismatch { .. })
        ));
        assert!(verify_shapes(
            "A.out",
            &series,
            "B.input",
            &[Dimension::Time, Dimension::Fixed(2)]
        )
        .is_err());
        assert!(verify_shapes("A.out", &series, "B.input", &[Dimension::Time]).is_ok());
        assert!(verify_shapes("A.out", &[], "B.input", &[]).is_ok());
    }
}
