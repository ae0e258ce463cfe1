use crate::error::{ValidationError, ValidationIssue};
use crate::types::{StepDescriptor, WorkflowDefinition};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// Dependency graph of a validated workflow definition.
///
/// Borrows the definition it was built from. Edges run from a dependency to
/// its dependent.
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    graph: DiGraph<&'a StepDescriptor, ()>,
    step_indices: HashMap<&'a str, NodeIndex>,
    layers: Vec<Vec<NodeIndex>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

impl<'a> DependencyGraph<'a> {
    /// Build the graph, collecting every duplicate, dangling reference and
    /// cycle before failing.
    pub fn build(workflow: &'a WorkflowDefinition) -> Result<Self, ValidationError> {
        let mut graph: DiGraph<&'a StepDescriptor, ()> = DiGraph::new();
        let mut step_indices: HashMap<&'a str, NodeIndex> = HashMap::new();
        let mut first_seen: HashMap<&'a str, usize> = HashMap::new();
        let mut issues = Vec::new();

        // Add all steps as nodes; a repeated name replaces the node's step
        for (position, step) in workflow.steps.iter().enumerate() {
            let name = step.unique_name();
            match step_indices.get(name) {
                Some(&node) => {
                    issues.push(ValidationIssue::DuplicateName {
                        name: name.to_string(),
                        first_index: first_seen[name],
                        duplicate_index: position,
                    });
                    graph[node] = step;
                }
                None => {
                    let node = graph.add_node(step);
                    step_indices.insert(name, node);
                    first_seen.insert(name, position);
                }
            }
        }

        for step in &workflow.steps {
            for dep in step.depends_on() {
                if !step_indices.contains_key(dep.as_str()) {
                    issues.push(ValidationIssue::DanglingDependency {
                        step: step.unique_name().to_string(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        // Add dependency edges (dep -> step) from the steps that own a node
        for node in graph.node_indices().collect::<Vec<_>>() {
            let step = graph[node];
            for dep in step.depends_on() {
                if let Some(&dep_node) = step_indices.get(dep.as_str()) {
                    graph.update_edge(dep_node, node, ());
                }
            }
        }

        let mut dag = Self {
            graph,
            step_indices,
            layers: Vec::new(),
        };

        issues.extend(dag.find_cycles());

        if !issues.is_empty() {
            return Err(ValidationError::new(issues));
        }

        dag.layers = dag.compute_layers();
        Ok(dag)
    }

    /// Dependents of a node in original step order.
    fn sorted_dependents(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut next: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        next.sort();
        next
    }

    /// Iterative depth-first search with explicit marks. A back-edge to a
    /// node still on the path closes a cycle.
    fn find_cycles(&self) -> Vec<ValidationIssue> {
        let count = self.graph.node_count();
        let mut marks = vec![Mark::Unvisited; count];
        let mut issues = Vec::new();

        for start in self.graph.node_indices() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }

            // (node, its dependents, next dependent to look at)
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = Vec::new();
            marks[start.index()] = Mark::Visiting;
            stack.push((start, self.sorted_dependents(start), 0));

            while let Some(frame) = stack.last_mut() {
                let (node, ref next, ref mut cursor) = *frame;
                if *cursor >= next.len() {
                    marks[node.index()] = Mark::Visited;
                    stack.pop();
                    continue;
                }

                let child = next[*cursor];
                *cursor += 1;

                match marks[child.index()] {
                    Mark::Unvisited => {
                        marks[child.index()] = Mark::Visiting;
                        let dependents = self.sorted_dependents(child);
                        stack.push((child, dependents, 0));
                    }
                    Mark::Visiting => {
                        let from = stack
                            .iter()
                            .position(|(n, _, _)| *n == child)
                            .unwrap_or(0);
                        let cycle = stack[from..]
                            .iter()
                            .map(|(n, _, _)| self.graph[*n].unique_name().to_string())
                            .collect();
                        issues.push(ValidationIssue::CyclicDependency { cycle });
                    }
                    Mark::Visited => {}
                }
            }
        }

        issues
    }

    /// Kahn-style layering; ties keep original step order.
    fn compute_layers(&self) -> Vec<Vec<NodeIndex>> {
        let mut remaining: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut current: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| remaining[n.index()] == 0)
            .collect();
        let mut layers = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for &node in &current {
                for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                    remaining[dependent.index()] -= 1;
                    if remaining[dependent.index()] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort();
            layers.push(current);
            current = next;
        }

        layers
    }

    fn name(&self, node: NodeIndex) -> &'a str {
        self.graph[node].unique_name()
    }

    fn node(&self, name: &str) -> Option<NodeIndex> {
        self.step_indices.get(name).copied()
    }

    /// Parallel execution groups: every step's dependencies lie in an
    /// earlier layer.
    pub fn layers(&self) -> Vec<Vec<&'a str>> {
        self.layers
            .iter()
            .map(|layer| layer.iter().map(|&n| self.name(n)).collect())
            .collect()
    }

    /// Steps with no dependencies (can start immediately).
    pub fn roots(&self) -> Vec<&'a StepDescriptor> {
        self.layers
            .first()
            .map(|layer| layer.iter().map(|&n| self.graph[n]).collect())
            .unwrap_or_default()
    }

    /// Steps in an order where every dependency comes first.
    pub fn topological_order(&self) -> Vec<&'a StepDescriptor> {
        self.layers
            .iter()
            .flatten()
            .map(|&n| self.graph[n])
            .collect()
    }

    pub fn step(&self, name: &str) -> Option<&'a StepDescriptor> {
        self.node(name).map(|n| self.graph[n])
    }

    /// Direct dependencies of a step, in original step order.
    pub fn dependencies(&self, name: &str) -> Option<Vec<&'a str>> {
        let node = self.node(name)?;
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        deps.sort();
        Some(deps.into_iter().map(|n| self.name(n)).collect())
    }

    /// Steps that directly depend on the given step, in original step order.
    pub fn dependents(&self, name: &str) -> Option<Vec<&'a str>> {
        let node = self.node(name)?;
        Some(
            self.sorted_dependents(node)
                .into_iter()
                .map(|n| self.name(n))
                .collect(),
        )
    }

    /// Size of the widest layer.
    pub fn max_parallelism(&self) -> usize {
        self.layers.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Whether any two steps are eligible to run at the same time.
    pub fn has_parallel_branches(&self) -> bool {
        self.max_parallelism() > 1
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub(crate) fn root_nodes(&self) -> &[NodeIndex] {
        self.layers.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn step_at(&self, node: NodeIndex) -> &'a StepDescriptor {
        self.graph[node]
    }

    pub(crate) fn dependents_of(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_dependents(node)
    }
}
