use dioxus::prelude::*;

/// Asks before deleting a task. Mentions how many dependencies go with it.
#[component]
pub fn DeleteTaskDialog(
    task_name: String,
    dependency_count: usize,
    on_confirm: EventHandler<()>,
    on_cancel: EventHandler<()>,
) -> Element {
    let message = match dependency_count {
        0 => format!("\"{}\" will be removed. This cannot be undone.", task_name),
        1 => format!("\"{}\" and 1 dependency will be removed. This cannot be undone.", task_name),
        n => format!("\"{}\" and {} dependencies will be removed. This cannot be undone.", task_name, n),
    };

    rsx! {
        // Modal backdrop
        div {
            class: "delete-task-dialog",
            style: "position: fixed; top: 0; left: 0; right: 0; bottom: 0;
                   background: rgba(0, 0, 0, 0.5); z-index: 1000;
                   display: flex; align-items: center; justify-content: center;",
            onclick: move |_| on_cancel.call(()),

            div {
                style: "background: white; border-radius: 12px; padding: 24px;
                       width: 90%; max-width: 400px;
                       box-shadow: 0 10px 40px rgba(0, 0, 0, 0.2);",
                onclick: move |e| e.stop_propagation(),

                h3 {
                    style: "margin: 0 0 12px 0; font-size: 20px; font-weight: 600;",
                    "Delete task?"
                }
                p {
                    style: "margin: 0 0 24px 0; color: #666; line-height: 1.5;",
                    "{message}"
                }

                div {
                    style: "display: flex; justify-content: flex-end; gap: 10px;",
                    button {
                        style: "padding: 8px 20px; border: 1px solid #ddd;
                               background: white; color: #333; border-radius: 4px;
                               cursor: pointer; font-size: 14px;",
                        onclick: move |_| on_cancel.call(()),
                        "Cancel"
                    }
                    button {
                        style: "padding: 8px 20px; border: none;
                               background: #dc2626; color: white; border-radius: 4px;
                               cursor: pointer; font-size: 14px;",
                        onclick: move |_| on_confirm.call(()),
                        "Delete"
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[component]
    fn Harness(dependency_count: usize) -> Element {
        rsx! {
            DeleteTaskDialog {
                task_name: "Deploy".to_string(),
                dependency_count: dependency_count,
                on_confirm: move |_| {},
                on_cancel: move |_| {},
            }
        }
    }

    fn render(dependency_count: usize) -> String {
        let mut dom = VirtualDom::new_with_props(Harness, HarnessProps { dependency_count });
        dom.rebuild_in_place();
        dioxus_ssr::render(&dom)
    }

    #[test]
    fn test_mentions_dependencies_going_with_the_task() {
        assert!(render(0).contains("will be removed"));
        assert!(render(1).contains("1 dependency will"));
        assert!(render(3).contains("3 dependencies will"));
    }
}
