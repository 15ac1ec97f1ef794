// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt and command-line construction for agent runs.
//!
//! An agent's configured argument template may reference `{prompt}` and
//! `{task_id}`; when no argument carries `{prompt}`, the rendered prompt is
//! appended as the final argument.

use fuel_adapters::AgentCommand;
use fuel_core::task::Task;
use fuel_core::AgentSpec;

/// What a run is for: the initial attempt on a task, or the review pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPurpose {
    Primary,
    Review,
}

/// Render the prompt an agent receives for a task.
pub fn build_prompt(task: &Task, purpose: RunPurpose) -> String {
    match purpose {
        RunPurpose::Primary => primary_prompt(task),
        RunPurpose::Review => review_prompt(task),
    }
}

fn primary_prompt(task: &Task) -> String {
    let mut prompt = format!("Work on task {}: {}\n", task.id, task.title);
    if let Some(ref description) = task.description {
        prompt.push('\n');
        prompt.push_str(description);
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nType: {}. Priority: {}. Complexity: {}.\n",
        task.task_type, task.priority, task.complexity
    ));
    if !task.labels.is_empty() {
        let labels: Vec<&str> = task.labels.iter().map(String::as_str).collect();
        prompt.push_str(&format!("Labels: {}.\n", labels.join(", ")));
    }
    prompt.push_str("\nCommit your changes when the work is complete, then exit 0. Exit nonzero if you cannot finish.\n");
    prompt
}

fn review_prompt(task: &Task) -> String {
    let mut prompt = format!(
        "Review the completed work for task {}: {}\n",
        task.id, task.title
    );
    if let Some(ref description) = task.description {
        prompt.push('\n');
        prompt.push_str(description);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nVerify the implementation is correct, tested, and committed. \
         Exit 0 to approve; exit nonzero to reject.\n",
    );
    prompt
}

/// Build the full command line for an agent run, substituting the prompt
/// and task id into the configured argument template.
pub fn build_command(spec: &AgentSpec, task: &Task, purpose: RunPurpose) -> AgentCommand {
    let prompt = build_prompt(task, purpose);

    let mut args: Vec<String> = spec
        .args
        .iter()
        .map(|arg| substitute(arg, &prompt, task.id.as_str()))
        .collect();
    if !spec.args.iter().any(|arg| arg.contains("{prompt}")) {
        args.push(prompt);
    }

    let mut env: Vec<(String, String)> = spec
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    env.push(("FUEL_TASK_ID".to_string(), task.id.to_string()));

    AgentCommand {
        program: spec.command.clone(),
        args,
        env,
    }
}

fn substitute(template: &str, prompt: &str, task_id: &str) -> String {
    template
        .replace("{prompt}", prompt)
        .replace("{task_id}", task_id)
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
