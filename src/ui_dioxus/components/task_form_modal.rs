use chrono::{Local, NaiveDate, NaiveTime};
use dioxus::prelude::*;

use crate::domain::task::{TaskId, TaskStatus};
use crate::domain::task_validation::{Field, FormError, TaskValidator};
use crate::services::session::WorkspaceSession;
use crate::services::task_form::TaskDraft;
use crate::services::EditorError;

/// Reads the raw values of the date and time inputs. Empty means unset.
pub fn parse_due_inputs(date: &str, time: &str) -> Result<(Option<NaiveDate>, Option<NaiveTime>), FormError> {
    let date = match date.trim() {
        "" => None,
        value => Some(
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| FormError::new(Field::DueDate, "Enter the date as YYYY-MM-DD"))?,
        ),
    };
    let time = match time.trim() {
        "" => None,
        value => Some(
            NaiveTime::parse_from_str(value, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
                .map_err(|_| FormError::new(Field::DueTime, "Enter the time as HH:MM"))?,
        ),
    };
    TaskValidator::validate_due(date, time)?;
    Ok((date, time))
}

/// Create or edit a task together with the tasks it depends on. Stays open
/// and shows the error inline when saving fails.
#[component]
pub fn TaskFormModal(
    draft: TaskDraft,
    /// Every task in the project as `(id, name)`.
    tasks: Vec<(TaskId, String)>,
    on_saved: EventHandler<TaskId>,
    on_cancel: EventHandler<()>,
) -> Element {
    let session = use_context::<WorkspaceSession>();

    let editing = draft.id.is_some();
    let mut name = use_signal(|| draft.name.clone());
    let mut status = use_signal(|| draft.status.clone());
    let mut description = use_signal(|| draft.description.clone());
    let mut due_date = use_signal(|| draft.due_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default());
    let mut due_time = use_signal(|| draft.due_time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default());
    let mut dependencies = use_signal(|| draft.dependencies.clone());
    let mut saving = use_signal(|| false);
    let mut error = use_signal(|| None::<FormError>);

    let own_id = draft.id.clone();
    let base = draft.clone();
    let handle_save = move |_| {
        let (date, time) = match parse_due_inputs(&due_date.read(), &due_time.read()) {
            Ok(due) => due,
            Err(err) => {
                error.set(Some(err));
                return;
            }
        };
        let candidate = TaskDraft {
            name: name.read().clone(),
            status: status.read().clone(),
            description: description.read().clone(),
            due_date: date,
            due_time: time,
            dependencies: dependencies.read().clone(),
            ..base.clone()
        };

        spawn({
            let session = session.clone();
            async move {
                saving.set(true);
                error.set(None);
                match session.save_task(&candidate, &Local).await {
                    Ok(id) => on_saved.call(id),
                    Err(EditorError::Form(err)) => error.set(Some(err)),
                    Err(err) => error.set(Some(FormError::form(err.user_message()))),
                }
                saving.set(false);
            }
        });
    };

    let others: Vec<(TaskId, String, bool)> = tasks
        .iter()
        .filter(|(id, _)| Some(id) != own_id.as_ref())
        .map(|(id, name)| (id.clone(), name.clone(), dependencies.read().contains(id)))
        .collect();
    let status_options: Vec<(String, String, bool)> = TaskStatus::KNOWN
        .iter()
        .map(|option| (option.as_str().to_string(), option.label().to_string(), *status.read() == *option))
        .collect();
    let field_error = |field: Field| {
        error
            .read()
            .as_ref()
            .filter(|err| err.field == field)
            .map(|err| err.message.clone())
    };
    let name_error = field_error(Field::Name);
    let due_error = field_error(Field::DueDate).or_else(|| field_error(Field::DueTime));
    let dependency_error = field_error(Field::Dependencies);
    let form_error = field_error(Field::Form);

    rsx! {
        div {
            style: "position: fixed; top: 0; left: 0; right: 0; bottom: 0;
                   background: rgba(0, 0, 0, 0.5); z-index: 999;
                   display: flex; align-items: center; justify-content: center;",
            onclick: move |_| on_cancel.call(()),

            div {
                style: "background: white; border-radius: 12px; padding: 24px;
                       width: 90%; max-width: 560px; max-height: 90vh; overflow-y: auto;
                       box-shadow: 0 10px 40px rgba(0, 0, 0, 0.2);",
                onclick: move |e| e.stop_propagation(),

                div {
                    style: "display: flex; justify-content: space-between; align-items: center; margin-bottom: 20px;",
                    h2 {
                        style: "margin: 0; font-size: 22px; font-weight: 600;",
                        if editing { "Edit Task" } else { "Create Task" }
                    }
                    button {
                        style: "background: none; border: none; font-size: 24px; cursor: pointer;",
                        onclick: move |_| on_cancel.call(()),
                        "×"
                    }
                }

                if let Some(message) = form_error {
                    div {
                        style: "background: #fee; color: #c00; padding: 10px; border-radius: 4px; margin-bottom: 15px;",
                        "{message}"
                    }
                }

                div {
                    style: "margin-bottom: 16px;",
                    label {
                        style: "display: block; margin-bottom: 5px; font-weight: 500;",
                        "Name ",
                        span { style: "color: #e00;", "*" }
                    }
                    input {
                        r#type: "text",
                        style: "width: 100%; padding: 8px 12px; border: 1px solid #ddd; border-radius: 4px;",
                        value: "{name}",
                        oninput: move |e| name.set(e.value()),
                        placeholder: "What needs to be done?",
                    }
                    if let Some(message) = name_error {
                        div { style: "color: #c00; font-size: 12px; margin-top: 4px;", "{message}" }
                    }
                }

                div {
                    style: "margin-bottom: 16px;",
                    label { style: "display: block; margin-bottom: 5px; font-weight: 500;", "Status" }
                    select {
                        style: "width: 100%; padding: 8px; border: 1px solid #ddd; border-radius: 4px;",
                        onchange: move |e| status.set(TaskStatus::from(e.value())),
                        for (value, label, selected) in status_options {
                            option { value: "{value}", selected: selected, "{label}" }
                        }
                    }
                }

                div {
                    style: "display: flex; gap: 12px; margin-bottom: 16px;",
                    div {
                        style: "flex: 1;",
                        label { style: "display: block; margin-bottom: 5px; font-weight: 500;", "Due date" }
                        input {
                            r#type: "date",
                            style: "width: 100%; padding: 8px; border: 1px solid #ddd; border-radius: 4px;",
                            value: "{due_date}",
                            oninput: move |e| due_date.set(e.value()),
                        }
                    }
                    div {
                        style: "flex: 1;",
                        label { style: "display: block; margin-bottom: 5px; font-weight: 500;", "Time" }
                        input {
                            r#type: "time",
                            style: "width: 100%; padding: 8px; border: 1px solid #ddd; border-radius: 4px;",
                            value: "{due_time}",
                            oninput: move |e| due_time.set(e.value()),
                        }
                    }
                }
                if let Some(message) = due_error {
                    div { style: "color: #c00; font-size: 12px; margin: -8px 0 16px 0;", "{message}" }
                }

                div {
                    style: "margin-bottom: 16px;",
                    label { style: "display: block; margin-bottom: 5px; font-weight: 500;", "Description" }
                    textarea {
                        style: "width: 100%; min-height: 80px; padding: 8px; border: 1px solid #ddd; border-radius: 4px;",
                        value: "{description}",
                        oninput: move |e| description.set(e.value()),
                    }
                }

                if !others.is_empty() {
                    div {
                        style: "margin-bottom: 20px;",
                        label { style: "display: block; margin-bottom: 5px; font-weight: 500;", "Depends on" }
                        for (task_id, task_name, checked) in others {
                            DependencyOption {
                                key: "{task_id}",
                                id: task_id.clone(),
                                name: task_name,
                                checked: checked,
                                on_toggle: move |id: TaskId| {
                                    let mut deps = dependencies.write();
                                    if deps.contains(&id) {
                                        deps.retain(|d| d != &id);
                                    } else {
                                        deps.push(id);
                                    }
                                },
                            }
                        }
                        if let Some(message) = dependency_error {
                            div { style: "color: #c00; font-size: 12px; margin-top: 4px;", "{message}" }
                        }
                    }
                }

                div {
                    style: "display: flex; justify-content: flex-end; gap: 10px;",
                    button {
                        style: "padding: 8px 20px; border: 1px solid #ddd; background: white; border-radius: 4px; cursor: pointer;",
                        onclick: move |_| on_cancel.call(()),
                        "Cancel"
                    }
                    button {
                        style: "padding: 8px 20px; border: none; background: #3b82f6; color: white; border-radius: 4px; cursor: pointer;",
                        disabled: *saving.read(),
                        onclick: handle_save,
                        if *saving.read() { "Saving..." } else { "Save" }
                    }
                }
            }
        }
    }
}

#[component]
fn DependencyOption(id: TaskId, name: String, checked: bool, on_toggle: EventHandler<TaskId>) -> Element {
    rsx! {
        label {
            style: "display: block; font-size: 14px; padding: 2px 0;",
            input {
                r#type: "checkbox",
                checked: checked,
                onchange: move |_| on_toggle.call(id.clone()),
            }
            " {name}"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs_mean_no_due_date() {
        assert_eq!(parse_due_inputs("", "  ").unwrap(), (None, None));
    }

    #[test]
    fn test_parses_browser_formats() {
        let (date, time) = parse_due_inputs("2024-05-17", "14:30").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 17));
        assert_eq!(time, NaiveTime::from_hms_opt(14, 30, 0));
    }

    #[test]
    fn test_rejects_garbage() {
        let err = parse_due_inputs("17/05/2024", "").unwrap_err();
        assert_eq!(err.field, Field::DueDate);

        let err = parse_due_inputs("2024-05-17", "2pm").unwrap_err();
        assert_eq!(err.field, Field::DueTime);
    }

    #[test]
    fn test_time_without_date_rejected() {
        let err = parse_due_inputs("", "09:00").unwrap_err();
        assert_eq!(err.field, Field::DueTime);
    }
}
