// Commands that talk to the workflow service

use crate::output;
use anyhow::{bail, Context, Result};
use docflow_core::{
    CheckHandle, ExecutionId, ExecutionState, ExecutionStatus, WorkflowDefinition, WorkflowId,
};
use docflow_sdk::{DocflowClient, InputConfig, PollConfig, Workflow, WorkflowsApi};
use std::path::Path;

pub async fn run(
    client: &DocflowClient,
    definition: &WorkflowDefinition,
    input: &InputConfig,
    poll: PollConfig,
    save: Option<&Path>,
) -> Result<ExecutionState> {
    let workflows = client.workflows();

    let graph = definition
        .validate()
        .with_context(|| format!("Workflow \"{}\" is invalid", definition.name))?;
    println!("Workflow \"{}\":", definition.name);
    print!("{}", graph);

    let workflow = workflows
        .create(definition)
        .await
        .context("Failed to create workflow")?;
    println!("\nCreated workflow {}", workflow.id);

    let started = workflows
        .execute(workflow.id, input)
        .await
        .context("Failed to start execution")?;

    let state = if started.is_terminal() {
        started
    } else {
        let handle = WorkflowsApi::check_handle(&started)?;
        println!(
            "Execution started, waiting up to {} checks",
            poll.max_attempts
        );
        workflows
            .poll(&handle, poll)
            .await
            .context("Failed while waiting for the execution")?
    };

    finish(state, save)
}

/// Show the status once (`poll` is `None`) or wait for a terminal state.
pub async fn status(
    client: &DocflowClient,
    execution_id: ExecutionId,
    poll: Option<PollConfig>,
    save: Option<&Path>,
) -> Result<ExecutionState> {
    let handle = CheckHandle::for_execution(execution_id);
    let workflows = client.workflows();

    let state = match poll {
        Some(poll) => workflows
            .poll(&handle, poll)
            .await
            .with_context(|| format!("Failed while waiting for execution {}", execution_id))?,
        None => workflows
            .status(&handle)
            .await
            .with_context(|| format!("Failed to get status of execution {}", execution_id))?,
    };

    finish(state, save)
}

fn finish(state: ExecutionState, save: Option<&Path>) -> Result<ExecutionState> {
    output::print_state(&state);

    if let Some(path) = save {
        let written = output::save_state(path, &state)?;
        println!("\nResults saved to {}", written.display());
    }

    if state.status == ExecutionStatus::Failed {
        let error = state
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no error details".to_string());
        bail!("Workflow execution failed: {}", error);
    }
    Ok(state)
}

pub async fn list(client: &DocflowClient) -> Result<()> {
    let workflows = client
        .workflows()
        .list()
        .await
        .context("Failed to list workflows")?;

    if workflows.is_empty() {
        println!("No workflows found");
        return Ok(());
    }

    println!("Found {} workflow(s):\n", workflows.len());
    for workflow in &workflows {
        print_summary(workflow);
        println!();
    }
    Ok(())
}

pub async fn get(client: &DocflowClient, id: WorkflowId) -> Result<()> {
    let workflow = client
        .workflows()
        .get(id)
        .await
        .with_context(|| format!("Failed to get workflow {}", id))?;

    print_summary(&workflow);
    println!("\n  Steps:");
    for step in &workflow.steps {
        let deps = if step.has_dependencies() {
            format!(" <- {}", step.depends_on().join(", "))
        } else {
            String::new()
        };
        println!("    {} ({}){}", step.unique_name(), step.step_key(), deps);
    }
    Ok(())
}

fn print_summary(workflow: &Workflow) {
    println!("  ID: {}", workflow.id);
    println!("  Name: {}", workflow.name);
    if let Some(description) = &workflow.description {
        println!("  Description: {}", description);
    }
    if let Some(team_id) = workflow.team_id {
        println!("  Team ID: {}", team_id);
    }
    println!("  Steps: {}", workflow.steps.len());
    if let Some(created) = workflow.created {
        println!("  Created: {}", created);
    }
}

pub async fn step_types(client: &DocflowClient) -> Result<()> {
    let step_types = client
        .workflows()
        .step_types()
        .await
        .context("Failed to list step types")?;

    println!("Found {} step type(s):\n", step_types.len());
    for step_type in &step_types {
        match &step_type.version {
            Some(version) => println!("  {} (v{})", step_type.step_type, version),
            None => println!("  {}", step_type.step_type),
        }
        if let Some(name) = &step_type.name {
            println!("    Name: {}", name);
        }
        if let Some(description) = &step_type.description {
            println!("    {}", description);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_sdk::{DocflowError, RetryConfig};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DocflowClient {
        DocflowClient::builder()
            .base_url(server.uri())
            .api_key("sk-test")
            .retry_config(RetryConfig::no_retry())
            .build()
            .unwrap()
    }

    async fn mount_create_and_execute(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/v1/workflows/workflows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 3,
                "name": "Simple Parse and Extract",
                "steps": []
            })))
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/v1/workflows/workflows/3/execute"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 21, "status": "IN_PROGRESS"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    fn input() -> InputConfig {
        InputConfig::from_file_urls(["https://files.example.com/a.pdf"])
    }

    #[tokio::test]
    async fn test_run_saves_completed_state() {
        let server = MockServer::start().await;
        mount_create_and_execute(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/executions/21"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 21,
                "status": "COMPLETED",
                "steps": {"extract_metadata": {"output_url": "https://out.example.com/21"}}
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let state = run(
            &client(&server),
            &WorkflowDefinition::builtin_simple().unwrap(),
            &input(),
            PollConfig::new(3, Duration::ZERO),
            Some(&dir.path().join("result")),
        )
        .await
        .unwrap();

        assert_eq!(state.status, ExecutionStatus::Complete);
        let saved = std::fs::read_to_string(dir.path().join("result.json")).unwrap();
        assert!(saved.contains("https://out.example.com/21"));
    }

    #[tokio::test]
    async fn test_run_fails_on_failed_execution() {
        let server = MockServer::start().await;
        mount_create_and_execute(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/executions/21"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 21,
                "status": "FAILED",
                "error": "unsupported file type"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = run(
            &client(&server),
            &WorkflowDefinition::builtin_simple().unwrap(),
            &input(),
            PollConfig::new(3, Duration::ZERO),
            Some(&dir.path().join("failed.json")),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("unsupported file type"));
        // The failed state is still written
        assert!(dir.path().join("failed.json").exists());
    }

    #[tokio::test]
    async fn test_status_single_check() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/executions/21"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 21, "status": "IN_PROGRESS"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let state = status(&client(&server), ExecutionId(21), None, None)
            .await
            .unwrap();
        assert_eq!(state.status, ExecutionStatus::Processing);
    }

    #[tokio::test]
    async fn test_status_poll_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/executions/21"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 21, "status": "IN_PROGRESS"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let err = status(
            &client(&server),
            ExecutionId(21),
            Some(PollConfig::new(2, Duration::ZERO)),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DocflowError>(),
            Some(DocflowError::PollTimeout { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_get_and_list_workflows() {
        let server = MockServer::start().await;
        let workflow = json!({
            "id": 3,
            "name": "Simple Parse and Extract",
            "steps": [
                {"step_key": "marker_parse", "unique_name": "parse_document", "settings": {}, "depends_on": []}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/workflows/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(workflow.clone()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/workflows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"workflows": [workflow]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        get(&client, WorkflowId(3)).await.unwrap();
        list(&client).await.unwrap();
    }
}
