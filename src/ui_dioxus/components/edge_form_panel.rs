use dioxus::prelude::*;

use crate::domain::task::TaskId;
use crate::domain::task_validation::{Field, FormError};
use crate::services::edge_form::EdgeForm;
use crate::services::session::WorkspaceSession;
use crate::services::EditorError;

fn selection(value: String) -> Option<TaskId> {
    (!value.is_empty()).then(|| TaskId::new(value))
}

/// Pick the two ends of a dependency. Editing replaces the existing pair.
#[component]
pub fn EdgeFormPanel(
    form: EdgeForm,
    tasks: Vec<(TaskId, String)>,
    on_done: EventHandler<()>,
    on_cancel: EventHandler<()>,
) -> Element {
    let session = use_context::<WorkspaceSession>();

    let mut from = use_signal(|| form.from.clone());
    let mut to = use_signal(|| form.to.clone());
    let mut error = use_signal(|| None::<FormError>);
    let existing = form.existing.clone();
    let editing = existing.is_some();

    let submit_session = session.clone();
    let submit_existing = existing.clone();
    let handle_submit = move |_| {
        let form = EdgeForm {
            from: from.read().clone(),
            to: to.read().clone(),
            existing: submit_existing.clone(),
        };
        if let Err(err) = EdgeForm::validate_fields(form.from.as_ref(), form.to.as_ref()) {
            error.set(Some(err));
            return;
        }
        let session = submit_session.clone();
        spawn(async move {
            match session.submit_edge(&form).await {
                Ok(_) => on_done.call(()),
                Err(EditorError::Form(err)) => error.set(Some(err)),
                Err(err) => error.set(Some(FormError::form(err.user_message()))),
            }
        });
    };

    let handle_remove = move |_| {
        let Some(edge) = existing.clone() else {
            return;
        };
        let session = session.clone();
        spawn(async move {
            if session.remove_edge(&edge).await.is_ok() {
                on_done.call(());
            }
        });
    };

    let options = |selected: Option<TaskId>| -> Vec<(String, String, bool)> {
        tasks
            .iter()
            .map(|(id, name)| (id.to_string(), name.clone(), selected.as_ref() == Some(id)))
            .collect()
    };
    let from_options = options(from.read().clone());
    let to_options = options(to.read().clone());
    let field_error = |field: Field| {
        error
            .read()
            .as_ref()
            .filter(|err| err.field == field)
            .map(|err| err.message.clone())
    };
    let from_error = field_error(Field::From);
    let to_error = field_error(Field::To);
    let form_error = field_error(Field::Form);

    rsx! {
        div {
            class: "edge-form",
            style: "position: absolute; top: 16px; left: 16px; width: 300px; z-index: 500;
                   background: white; border-radius: 12px; padding: 20px;
                   box-shadow: 0 10px 40px rgba(0, 0, 0, 0.2);",

            h3 {
                style: "margin: 0 0 16px 0; font-size: 18px; font-weight: 600;",
                if editing { "Edit Dependency" } else { "Add Dependency" }
            }

            if let Some(message) = form_error {
                div {
                    style: "background: #fee; color: #c00; padding: 8px; border-radius: 4px; margin-bottom: 12px;",
                    "{message}"
                }
            }

            label { style: "display: block; margin-bottom: 5px; font-weight: 500;", "Must finish first" }
            select {
                style: "width: 100%; padding: 8px; border: 1px solid #ddd; border-radius: 4px;",
                onchange: move |e| from.set(selection(e.value())),
                option { value: "", selected: from.read().is_none(), "Select a task" }
                for (value, label, selected) in from_options {
                    option { value: "{value}", selected: selected, "{label}" }
                }
            }
            if let Some(message) = from_error {
                div { style: "color: #c00; font-size: 12px; margin-top: 4px;", "{message}" }
            }

            label { style: "display: block; margin: 12px 0 5px 0; font-weight: 500;", "Before starting" }
            select {
                style: "width: 100%; padding: 8px; border: 1px solid #ddd; border-radius: 4px;",
                onchange: move |e| to.set(selection(e.value())),
                option { value: "", selected: to.read().is_none(), "Select a task" }
                for (value, label, selected) in to_options {
                    option { value: "{value}", selected: selected, "{label}" }
                }
            }
            if let Some(message) = to_error {
                div { style: "color: #c00; font-size: 12px; margin-top: 4px;", "{message}" }
            }

            div {
                style: "display: flex; justify-content: flex-end; gap: 10px; margin-top: 20px;",
                if editing {
                    button {
                        style: "padding: 6px 16px; border: none; background: #dc2626; color: white; border-radius: 4px; cursor: pointer; margin-right: auto;",
                        onclick: handle_remove,
                        "Remove"
                    }
                }
                button {
                    style: "padding: 6px 16px; border: 1px solid #ddd; background: white; border-radius: 4px; cursor: pointer;",
                    onclick: move |_| on_cancel.call(()),
                    "Cancel"
                }
                button {
                    style: "padding: 6px 16px; border: none; background: #3b82f6; color: white; border-radius: 4px; cursor: pointer;",
                    onclick: handle_submit,
                    "Save"
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_option_means_unset() {
        assert_eq!(selection(String::new()), None);
        assert_eq!(selection("7".to_string()), Some(TaskId::from("7")));
    }
}
