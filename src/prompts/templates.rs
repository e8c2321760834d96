//! Prompts handed to coding agents, rendered with tera.

use serde::Serialize;
use tera::{Context, Tera};

use crate::task::Task;

/// Path (relative to the repository root) the analyzer agent writes to.
pub const TASKS_FILE: &str = "fsc/tasks.json";

const ANALYZER_TEMPLATE: &str = r#"
Here is your role and work style:

{{ work_style }}

Here is your coding style:

{{ coding_style }}

Now analyze the whole codebase and extract tasks that need to be done. Each task needs a
description and a priority. If a task depends on another task, include it in the
followingTasks array of the task it depends on. Extract at most {{ max_tasks }} tasks.

Write the tasks as a JSON array to ./{{ tasks_file }}. Each element has this structure:

{
  "ID": "unique task id",
  "title": "short title",
  "description": "what the task should accomplish",
  "relatedFiles": ["paths affected by the task"],
  "followingTasks": [],
  "priority": 1
}

Priority: 1 = low, 2 = medium, 3 = high, 4 = critical, 5 = immediate.
"#;

const SOLVER_TEMPLATE: &str = r#"
Here is your role and work style:

{{ work_style }}

Here is your coding style:

{{ coding_style }}

Complete the following task in this repository.

Task {{ task.ID }}: {{ task.title }} (priority {{ task.priority }})

{{ task.description }}
{% if task.relatedFiles %}
Related files:
{% for file in task.relatedFiles %}- {{ file }}
{% endfor %}{% endif %}
Edit the files in place. Do not commit.
"#;

#[derive(Serialize)]
struct StyleContext<'a> {
    work_style: &'a str,
    coding_style: &'a str,
}

fn style_context(work_style: &str, coding_style: &str) -> Result<Context, tera::Error> {
    Context::from_serialize(StyleContext {
        work_style,
        coding_style,
    })
}

/// Prompt asking an agent to turn a codebase into a task list.
pub fn analyzer_prompt(
    work_style: &str,
    coding_style: &str,
    max_tasks: usize,
) -> Result<String, tera::Error> {
    let mut context = style_context(work_style, coding_style)?;
    context.insert("max_tasks", &max_tasks);
    context.insert("tasks_file", TASKS_FILE);
    Tera::one_off(ANALYZER_TEMPLATE, &context, false)
}

/// Prompt asking an agent to complete one task.
pub fn solver_prompt(
    task: &Task,
    work_style: &str,
    coding_style: &str,
) -> Result<String, tera::Error> {
    let mut context = style_context(work_style, coding_style)?;
    context.insert("task", task);
    Tera::one_off(SOLVER_TEMPLATE, &context, false)
}
