use chrono::Local;
use dioxus::prelude::*;

use crate::domain::task::{TaskId, TaskNode};

/// Read-only view of the selected task. Renders nothing without a task.
#[component]
pub fn TaskDetailsModal(
    #[props(!optional)] task: Option<TaskNode>,
    dependencies: Vec<String>,
    dependents: Vec<String>,
    on_edit: EventHandler<TaskId>,
    on_delete: EventHandler<TaskId>,
    on_close: EventHandler<()>,
) -> Element {
    let task = task?;
    let due = task
        .due_date
        .map(|d| d.with_timezone(&Local).format("%b %d, %Y %H:%M").to_string())
        .unwrap_or_else(|| "No due date".to_string());
    let assignees = if task.assignees.is_empty() {
        "Unassigned".to_string()
    } else {
        task.assignees.iter().map(|u| u.name.as_str()).collect::<Vec<_>>().join(", ")
    };
    let status_class = format!("status-badge status-{}", task.status.as_str());
    let status_label = task.status.label().to_string();
    let depends_on = dependencies.join(", ");
    let blocks = dependents.join(", ");
    let edit_id = task.id.clone();
    let delete_id = task.id.clone();

    rsx! {
        div {
            class: "task-details",
            style: "position: absolute; top: 16px; right: 16px; width: 320px; z-index: 500;
                   background: white; border-radius: 12px; padding: 20px;
                   box-shadow: 0 10px 40px rgba(0, 0, 0, 0.2);",

            div {
                style: "display: flex; justify-content: space-between; align-items: center; margin-bottom: 12px;",
                h3 { style: "margin: 0; font-size: 18px; font-weight: 600;", "{task.name}" }
                button {
                    style: "background: none; border: none; font-size: 20px; cursor: pointer;",
                    onclick: move |_| on_close.call(()),
                    "×"
                }
            }

            span {
                class: "{status_class}",
                style: "display: inline-block; padding: 2px 8px; border-radius: 10px; background: #eef2ff; font-size: 12px;",
                "{status_label}"
            }

            dl {
                style: "margin: 16px 0; font-size: 14px;",
                dt { style: "color: #666;", "Due" }
                dd { style: "margin: 0 0 8px 0;", "{due}" }
                dt { style: "color: #666;", "Assignees" }
                dd { style: "margin: 0 0 8px 0;", "{assignees}" }
                if !depends_on.is_empty() {
                    dt { style: "color: #666;", "Depends on" }
                    dd { style: "margin: 0 0 8px 0;", "{depends_on}" }
                }
                if !blocks.is_empty() {
                    dt { style: "color: #666;", "Blocks" }
                    dd { style: "margin: 0 0 8px 0;", "{blocks}" }
                }
            }

            if !task.description.is_empty() {
                p { style: "color: #444; line-height: 1.5; white-space: pre-wrap;", "{task.description}" }
            }

            div {
                style: "display: flex; justify-content: flex-end; gap: 10px;",
                button {
                    style: "padding: 6px 16px; border: 1px solid #ddd; background: white; border-radius: 4px; cursor: pointer;",
                    onclick: move |_| on_edit.call(edit_id.clone()),
                    "Edit"
                }
                button {
                    style: "padding: 6px 16px; border: none; background: #dc2626; color: white; border-radius: 4px; cursor: pointer;",
                    onclick: move |_| on_delete.call(delete_id.clone()),
                    "Delete"
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{TaskStatus, UserRef};

    #[component]
    fn Harness(#[props(!optional)] task: Option<TaskNode>) -> Element {
        rsx! {
            TaskDetailsModal {
                task: task,
                dependencies: vec!["Design".to_string()],
                dependents: Vec::new(),
                on_edit: move |_| {},
                on_delete: move |_| {},
                on_close: move |_| {},
            }
        }
    }

    fn render(task: Option<TaskNode>) -> String {
        let mut dom = VirtualDom::new_with_props(Harness, HarnessProps { task });
        dom.rebuild_in_place();
        dioxus_ssr::render(&dom)
    }

    #[test]
    fn test_absent_task_renders_nothing() {
        assert!(!render(None).contains("task-details"));
    }

    #[test]
    fn test_renders_task_fields() {
        let task = TaskNode::new("t", "Ship release")
            .with_status(TaskStatus::InProgress)
            .assign(UserRef::new("u", "Ada"));
        let html = render(Some(task));

        assert!(html.contains("Ship release"));
        assert!(html.contains("In Progress"));
        assert!(html.contains("Ada"));
        assert!(html.contains("Depends on"));
        assert!(!html.contains("Blocks"));
    }
}
