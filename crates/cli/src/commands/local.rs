// Commands that work on a definition file without contacting the service

use anyhow::{Context, Result};
use docflow_core::{DependencyGraph, WorkflowDefinition};
use std::collections::HashMap;
use std::path::Path;

/// Turn `[TOKEN, VALUE, TOKEN, VALUE, ..]` into a replacement table.
pub fn parse_replacements(pairs: &[String]) -> Result<HashMap<String, String>> {
    anyhow::ensure!(
        pairs.len() % 2 == 0,
        "--replace expects a TOKEN and a VALUE"
    );

    let mut replacements = HashMap::new();
    for pair in pairs.chunks(2) {
        anyhow::ensure!(!pair[0].is_empty(), "--replace token must not be empty");
        if replacements.insert(pair[0].clone(), pair[1].clone()).is_some() {
            tracing::warn!(token = %pair[0], "Token replaced more than once, using the last value");
        }
    }
    Ok(replacements)
}

/// Load a definition, or the built-in one when no path is given, and fill in tokens.
pub fn load_definition(
    path: Option<&Path>,
    replacements: &HashMap<String, String>,
) -> Result<WorkflowDefinition> {
    let definition = match path {
        Some(path) => WorkflowDefinition::from_path(path)
            .with_context(|| format!("Failed to load workflow definition {}", path.display()))?,
        None => {
            tracing::info!("No definition given, using the built-in parse and extract workflow");
            WorkflowDefinition::builtin_simple()?
        }
    };

    if replacements.is_empty() {
        Ok(definition)
    } else {
        Ok(definition.substitute_tokens(replacements))
    }
}

pub fn check(definition: &WorkflowDefinition) -> Result<DependencyGraph<'_>> {
    definition
        .validate()
        .with_context(|| format!("Workflow \"{}\" is invalid", definition.name))
}

pub fn layers_report(graph: &DependencyGraph<'_>) -> String {
    let mut report = String::new();
    for (i, layer) in graph.layers().iter().enumerate() {
        let parallel = if layer.len() > 1 { " (parallel)" } else { "" };
        report.push_str(&format!("  Layer {}: {}{}\n", i + 1, layer.join(", "), parallel));
    }
    report
}

pub fn validate(path: &Path, replace: &[String]) -> Result<()> {
    let replacements = parse_replacements(replace)?;
    let definition = load_definition(Some(path), &replacements)?;
    let graph = check(&definition)?;

    println!(
        "Workflow \"{}\" is valid: {} step(s) in {} layer(s)",
        definition.name,
        graph.len(),
        graph.layers().len()
    );
    print!("{}", layers_report(&graph));
    Ok(())
}

pub fn visualize(path: &Path, replace: &[String]) -> Result<()> {
    let replacements = parse_replacements(replace)?;
    let definition = load_definition(Some(path), &replacements)?;
    let graph = check(&definition)?;

    println!("{}", definition.name);
    if let Some(description) = &definition.description {
        println!("{}", description);
    }
    println!();
    print!("{}", graph);

    println!();
    if graph.has_parallel_branches() {
        println!("Parallel groups (up to {} steps at once):", graph.max_parallelism());
    } else {
        println!("Execution order:");
    }
    print!("{}", layers_report(&graph));
    Ok(())
}
