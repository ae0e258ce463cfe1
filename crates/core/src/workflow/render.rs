// ASCII tree rendering of a dependency graph

use crate::workflow::dag::DependencyGraph;
use petgraph::graph::NodeIndex;
use std::fmt::{self, Write};

impl DependencyGraph<'_> {
    /// Render the graph as an indented tree.
    ///
    /// Each root heads a branch and dependents nest under every parent they
    /// have, so a fan-in step is printed once per incoming edge.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_tree(&mut out);
        out
    }

    fn write_tree(&self, out: &mut impl Write) -> fmt::Result {
        // (node, prefix for its own line, connector, prefix for its children)
        let mut stack: Vec<(NodeIndex, String, &str, String)> = self
            .root_nodes()
            .iter()
            .rev()
            .map(|&root| (root, String::new(), "", String::new()))
            .collect();

        while let Some((node, prefix, connector, child_prefix)) = stack.pop() {
            write!(out, "{}{}", prefix, connector)?;
            self.write_label(out, node)?;

            let children = self.dependents_of(node);
            let last = children.len().saturating_sub(1);
            for (i, child) in children.into_iter().enumerate().rev() {
                let (branch, continuation) = if i == last {
                    ("└── ", "    ")
                } else {
                    ("├── ", "│   ")
                };
                let nested = format!("{}{}", child_prefix, continuation);
                stack.push((child, child_prefix.clone(), branch, nested));
            }
        }
        Ok(())
    }

    fn write_label(&self, out: &mut impl Write, node: NodeIndex) -> fmt::Result {
        let step = self.step_at(node);
        writeln!(out, "{} ({})", step.unique_name(), step.step_key())
    }
}

impl fmt::Display for DependencyGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{Settings, StepDescriptor, WorkflowDefinition};
    use std::fmt::{self, Write};

    fn step(key: &str, name: &str, deps: &[&str]) -> StepDescriptor {
        StepDescriptor::new(key, name, Settings::new(), deps.iter().copied()).unwrap()
    }

    #[test]
    fn test_render_independent_branches() {
        let workflow = WorkflowDefinition::new(
            "segmentation",
            vec![
                step("upload", "upload", &[]),
                step("marker_parse", "parse", &["upload"]),
                step("split", "split", &["parse"]),
                step("marker_parse", "marker_parse", &[]),
                step("marker_segment", "marker_segment", &["marker_parse"]),
            ],
        );
        let dag = workflow.validate().unwrap();

        let expected = "\
upload (upload)
└── parse (marker_parse)
    └── split (split)
marker_parse (marker_parse)
└── marker_segment (marker_segment)
";
        assert_eq!(dag.render(), expected);
        assert_eq!(dag.to_string(), expected);
    }

    #[test]
    fn test_render_repeats_fan_in_under_each_parent() {
        let workflow = WorkflowDefinition::new(
            "compare",
            vec![
                step("marker_parse", "parse", &[]),
                step("segment", "segment_a", &["parse"]),
                step("segment", "segment_b", &["parse"]),
                step("compare", "compare", &["segment_a", "segment_b"]),
            ],
        );
        let dag = workflow.validate().unwrap();

        let expected = "\
parse (marker_parse)
├── segment_a (segment)
│   └── compare (compare)
└── segment_b (segment)
    └── compare (compare)
";
        assert_eq!(dag.render(), expected);
    }

    /// Counts rendered lines without keeping the text.
    #[derive(Default)]
    struct LineCounter(usize);

    impl Write for LineCounter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0 += s.matches('\n').count();
            Ok(())
        }
    }

    #[test]
    fn test_render_deep_chain() {
        let depth = 5_000;
        let steps = (0..depth)
            .map(|i| {
                let deps: Vec<String> = if i == 0 {
                    Vec::new()
                } else {
                    vec![format!("step_{}", i - 1)]
                };
                StepDescriptor::new("noop", format!("step_{}", i), Settings::new(), deps).unwrap()
            })
            .collect();
        let workflow = WorkflowDefinition::new("chain", steps);
        let dag = workflow.validate().unwrap();
        assert_eq!(dag.layers().len(), depth);

        let mut counter = LineCounter::default();
        dag.write_tree(&mut counter).unwrap();
        assert_eq!(counter.0, depth);
    }

    #[test]
    fn test_render_empty_graph() {
        let workflow = WorkflowDefinition::new("empty", Vec::new());
        assert_eq!(workflow.validate().unwrap().render(), "");
    }
}
