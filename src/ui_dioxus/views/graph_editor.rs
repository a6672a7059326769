use chrono::{DateTime, Local, Utc};
use dioxus::prelude::*;
use tokio::time::Instant;

use crate::domain::dependency::DependencyEdge;
use crate::domain::task::{TaskId, TaskNode};
use crate::services::canvas::{CanvasOutcome, Interaction};
use crate::services::edge_form::EdgeForm;
use crate::services::editor::Editor;
use crate::services::layout::{LayoutDirection, Position};
use crate::services::notifications::Notification;
use crate::services::session::WorkspaceSession;
use crate::services::task_form::TaskDraft;
use crate::ui_dioxus::components::{
    DeleteTaskDialog, EdgeFormPanel, NotificationStack, TaskDetailsModal, TaskFormModal,
};

const ZOOM_STEP: f64 = 1.2;

#[derive(Debug, Clone, PartialEq)]
enum Modal {
    None,
    TaskForm(TaskDraft),
    EdgeForm(EdgeForm),
    ConfirmDelete(TaskId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeCard {
    pub id: TaskId,
    pub name: String,
    pub status: String,
    pub status_label: String,
    pub due: Option<String>,
    pub overdue: bool,
    pub selected: bool,
    /// Top-left corner in canvas coordinates.
    pub left: f64,
    pub top: f64,
    pub input: Position,
    pub output: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgePath {
    pub edge: DependencyEdge,
    pub path: String,
}

/// Everything the view draws, read from the editor in one lock.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub nodes: Vec<NodeCard>,
    pub edges: Vec<EdgePath>,
    pub pending: Option<String>,
    pub node_width: f64,
    pub node_height: f64,
    pub viewport_transform: String,
    pub zoom_percent: i64,
    pub notifications: Vec<(Notification, Instant)>,
    pub auth_required: bool,
    pub selected: Option<TaskNode>,
    pub selected_dependencies: Vec<String>,
    pub selected_dependents: Vec<String>,
    pub tasks: Vec<(TaskId, String)>,
}

impl Snapshot {
    pub fn capture(editor: &mut Editor, now: DateTime<Utc>) -> Self {
        let positions = editor.positions();
        let layout = editor.layout();
        let (node_width, node_height) = layout.node_size();
        let direction = layout.direction();
        let handles: Vec<(TaskId, Position, Position)> = positions
            .iter()
            .map(|(id, centre)| {
                let (input, output) = layout.handles(*centre);
                (id.clone(), input, output)
            })
            .collect();

        let selected_id = editor.canvas().selected().cloned();
        let store = editor.store();
        let name_of = |id: &TaskId| store.node(id).map(|t| t.name.clone()).unwrap_or_else(|| id.to_string());

        let nodes = positions
            .iter()
            .zip(&handles)
            .filter_map(|((id, centre), (_, input, output))| {
                let task = store.node(id)?;
                Some(NodeCard {
                    id: id.clone(),
                    name: task.name.clone(),
                    status: task.status.as_str().to_string(),
                    status_label: task.status.label().to_string(),
                    due: task
                        .due_date
                        .map(|d| d.with_timezone(&Local).format("%b %d").to_string()),
                    overdue: task.is_overdue(now),
                    selected: selected_id.as_ref() == Some(id),
                    left: centre.x - node_width / 2.0,
                    top: centre.y - node_height / 2.0,
                    input: *input,
                    output: *output,
                })
            })
            .collect::<Vec<_>>();

        let handle_of = |id: &TaskId| handles.iter().find(|(h, _, _)| h == id);
        let edges = store
            .edges()
            .into_iter()
            .filter_map(|edge| {
                let (_, _, start) = handle_of(&edge.from)?;
                let (_, end, _) = handle_of(&edge.to)?;
                Some(EdgePath {
                    path: connector(*start, *end, direction),
                    edge,
                })
            })
            .collect();

        let pending = editor.canvas().pending_edge().and_then(|(pending, cursor)| {
            let (_, _, start) = handle_of(&pending.from)?;
            Some(connector(*start, cursor, direction))
        });

        let (selected, selected_dependencies, selected_dependents) = match &selected_id {
            Some(id) => (
                store.node(id).cloned(),
                store.dependencies_of(id).iter().map(name_of).collect(),
                store.dependents_of(id).iter().map(name_of).collect(),
            ),
            None => (None, Vec::new(), Vec::new()),
        };

        let tasks = store.nodes().map(|t| (t.id.clone(), t.name.clone())).collect();

        let viewport = editor.canvas().viewport;
        let timeout = editor.notifications().timeout();
        let notifications = editor
            .notifications()
            .active()
            .map(|n| (n.clone(), n.created_at + timeout))
            .collect();

        Self {
            nodes,
            edges,
            pending,
            node_width,
            node_height,
            viewport_transform: format!(
                "translate({}px, {}px) scale({}) translate({}px, {}px)",
                viewport.pan.x, viewport.pan.y, viewport.zoom, -viewport.origin.x, -viewport.origin.y
            ),
            zoom_percent: (viewport.zoom * 100.0).round() as i64,
            notifications,
            auth_required: editor.auth_required(),
            selected,
            selected_dependencies,
            selected_dependents,
            tasks,
        }
    }
}

/// Cubic curve between two handles, bending along the layout direction.
fn connector(start: Position, end: Position, direction: LayoutDirection) -> String {
    let bend = (start.distance(end) / 3.0).clamp(20.0, 80.0);
    let (c1, c2) = match direction {
        LayoutDirection::LeftToRight => (start.offset(bend, 0.0), end.offset(-bend, 0.0)),
        LayoutDirection::TopToBottom => (start.offset(0.0, bend), end.offset(0.0, -bend)),
    };
    format!(
        "M {} {} C {} {}, {} {}, {} {}",
        start.x, start.y, c1.x, c1.y, c2.x, c2.y, end.x, end.y
    )
}

fn bump(mut tick: Signal<u64>) {
    *tick.write() += 1;
}

fn point(evt: &MouseEvent) -> Position {
    let p = evt.element_coordinates();
    Position::new(p.x, p.y)
}

/// The dependency graph of one project: toolbar, canvas, and the modals
/// that edit it. Closes the session when unmounted.
#[component]
pub fn GraphEditor(session: WorkspaceSession) -> Element {
    use_context_provider(|| session.clone());
    let closing = session.clone();
    use_drop(move || closing.close());

    let tick = use_signal(|| 0u64);
    let mut modal = use_signal(|| Modal::None);

    let _ = *tick.read();
    let snapshot = session.with_editor(|editor| Snapshot::capture(editor, Utc::now()));
    let drawing = snapshot.pending.is_some();
    let empty = snapshot.nodes.is_empty();
    let zoom_label = format!("{}%", snapshot.zoom_percent);
    let node_style = format!("width: {}px; height: {}px;", snapshot.node_width, snapshot.node_height);

    let down = session.clone();
    let on_mouse_down = move |evt: MouseEvent| {
        down.with_editor(|editor| editor.pointer_down(point(&evt)));
        bump(tick);
    };

    let moving = session.clone();
    let on_mouse_move = move |evt: MouseEvent| {
        let active = moving.with_editor(|editor| {
            let active = matches!(
                editor.canvas().interaction(),
                Interaction::DraggingNode { .. } | Interaction::DrawingEdge { .. }
            );
            if active {
                editor.pointer_move(point(&evt));
            }
            active
        });
        if active {
            bump(tick);
        }
    };

    let up = session.clone();
    let on_mouse_up = move |evt: MouseEvent| {
        let outcome = up.with_editor(|editor| editor.pointer_up(point(&evt)));
        if let CanvasOutcome::EdgeProposed(_) = outcome {
            let session = up.clone();
            spawn(async move {
                let _ = session.connect(&outcome).await;
                bump(tick);
            });
        }
        bump(tick);
    };

    let leaving = session.clone();
    let on_mouse_leave = move |_: MouseEvent| {
        leaving.with_editor(|editor| {
            if !matches!(editor.canvas().interaction(), Interaction::NodeSelected(_)) {
                editor.canvas_mut().cancel();
            }
        });
        bump(tick);
    };

    let keys = session.clone();
    let on_key_down = move |evt: KeyboardEvent| {
        if evt.key() == Key::Escape {
            keys.with_editor(|editor| editor.canvas_mut().cancel());
            modal.set(Modal::None);
            bump(tick);
        }
    };

    let zoom = session.clone();
    let zoom_by = move |factor: f64| {
        zoom.with_editor(|editor| {
            let viewport = &mut editor.canvas_mut().viewport;
            if factor == 0.0 {
                viewport.zoom = 1.0;
            } else {
                viewport.zoom_by(factor);
            }
        });
        bump(tick);
    };

    let editing = session.clone();
    let on_edit = move |id: TaskId| {
        if let Some(draft) = editing.with_editor(|editor| TaskDraft::from_node(editor.store(), &id, &Local)) {
            modal.set(Modal::TaskForm(draft));
        }
    };

    let closing_details = session.clone();
    let on_close_details = move |_: ()| {
        closing_details.with_editor(|editor| editor.canvas_mut().cancel());
        bump(tick);
    };

    let dismissing = session.clone();
    let on_dismiss = move |id: u64| {
        dismissing.with_editor(|editor| editor.notifications_mut().dismiss(id));
        bump(tick);
    };

    let signing_in = session.clone();
    let on_auth_ack = move |_: MouseEvent| {
        signing_in.with_editor(|editor| editor.clear_auth_required());
        bump(tick);
    };

    let current_modal = modal.read().clone();
    let modal_view = match current_modal {
        Modal::None => None,
        Modal::TaskForm(draft) => Some(rsx! {
            TaskFormModal {
                draft: draft,
                tasks: snapshot.tasks.clone(),
                on_saved: move |_| {
                    modal.set(Modal::None);
                    bump(tick);
                },
                on_cancel: move |_| modal.set(Modal::None),
            }
        }),
        Modal::EdgeForm(form) => Some(rsx! {
            EdgeFormPanel {
                form: form,
                tasks: snapshot.tasks.clone(),
                on_done: move |_| {
                    modal.set(Modal::None);
                    bump(tick);
                },
                on_cancel: move |_| modal.set(Modal::None),
            }
        }),
        Modal::ConfirmDelete(id) => {
            let (name, dependency_count) = session.with_editor(|editor| {
                let store = editor.store();
                let name = store.node(&id).map(|t| t.name.clone()).unwrap_or_default();
                (name, store.dependencies_of(&id).len() + store.dependents_of(&id).len())
            });
            let deleting = session.clone();
            Some(rsx! {
                DeleteTaskDialog {
                    task_name: name,
                    dependency_count: dependency_count,
                    on_confirm: move |_| {
                        modal.set(Modal::None);
                        let session = deleting.clone();
                        let id = id.clone();
                        spawn(async move {
                            let _ = session.delete_task(&id).await;
                            bump(tick);
                        });
                    },
                    on_cancel: move |_| modal.set(Modal::None),
                }
            })
        }
    };

    rsx! {
        div {
            class: "graph-editor",
            tabindex: "0",
            style: "width: 100%; height: 100vh; display: flex; flex-direction: column; background: #f5f5f5; outline: none;",
            onkeydown: on_key_down,

            // Toolbar
            div {
                style: "padding: 10px; background: white; box-shadow: 0 2px 4px rgba(0,0,0,0.1); display: flex; gap: 10px; align-items: center;",

                h2 { style: "margin: 0; margin-right: 20px;", "Task Map" }

                button {
                    style: "padding: 8px 16px; background: #3b82f6; color: white; border: none; border-radius: 4px; cursor: pointer;",
                    onclick: move |_| modal.set(Modal::TaskForm(TaskDraft::default())),
                    "Add Task"
                }
                button {
                    style: "padding: 8px 16px; background: white; border: 1px solid #ddd; border-radius: 4px; cursor: pointer;",
                    onclick: move |_| modal.set(Modal::EdgeForm(EdgeForm::create())),
                    "Add Dependency"
                }

                div {
                    style: "margin-left: auto; display: flex; gap: 6px; align-items: center;",
                    button {
                        style: "padding: 6px 10px; border: 1px solid #ddd; background: white; border-radius: 4px; cursor: pointer;",
                        onclick: {
                            let zoom_by = zoom_by.clone();
                            move |_| zoom_by(1.0 / ZOOM_STEP)
                        },
                        "−"
                    }
                    span { style: "min-width: 48px; text-align: center;", "{zoom_label}" }
                    button {
                        style: "padding: 6px 10px; border: 1px solid #ddd; background: white; border-radius: 4px; cursor: pointer;",
                        onclick: {
                            let zoom_by = zoom_by.clone();
                            move |_| zoom_by(ZOOM_STEP)
                        },
                        "+"
                    }
                    button {
                        style: "padding: 6px 10px; border: 1px solid #ddd; background: white; border-radius: 4px; cursor: pointer;",
                        onclick: {
                            let zoom_by = zoom_by.clone();
                            move |_| zoom_by(0.0)
                        },
                        "Reset"
                    }
                }

                if drawing {
                    span {
                        style: "padding: 8px 12px; background: #FFD54F; color: #333; border-radius: 4px; font-weight: 500;",
                        "Drop on an input handle to connect"
                    }
                }
            }

            if snapshot.auth_required {
                div {
                    class: "auth-required",
                    style: "padding: 10px; background: #ffebee; color: #c62828; border-left: 4px solid #f44336; display: flex; align-items: center;",
                    "Your session has expired. Sign in again to keep editing."
                    button {
                        style: "margin-left: auto; padding: 2px 8px; background: #f44336; color: white; border: none; border-radius: 3px; cursor: pointer;",
                        onclick: on_auth_ack,
                        "×"
                    }
                }
            }

            div {
                style: "flex: 1; position: relative; overflow: hidden;",

                // Canvas. Cards and curves ignore the pointer so coordinates
                // are always relative to this element.
                div {
                    class: "graph-canvas",
                    style: "position: absolute; inset: 0; background: #fafafa; cursor: default;",
                    onmousedown: on_mouse_down,
                    onmousemove: on_mouse_move,
                    onmouseup: on_mouse_up,
                    onmouseleave: on_mouse_leave,

                    div {
                        style: "position: absolute; left: 0; top: 0; transform-origin: 0 0; transform: {snapshot.viewport_transform}; pointer-events: none;",

                        svg {
                            style: "position: absolute; left: 0; top: 0; overflow: visible;",
                            width: "1",
                            height: "1",
                            defs {
                                marker {
                                    id: "arrowhead",
                                    "markerWidth": "10",
                                    "markerHeight": "10",
                                    "refX": "9",
                                    "refY": "3",
                                    orient: "auto",
                                    path { d: "M0,0 L0,6 L9,3 z", fill: "#999" }
                                }
                            }
                            for edge in snapshot.edges.clone() {
                                EdgeCurve {
                                    key: "{edge.edge}",
                                    edge: edge,
                                    on_select: move |edge: DependencyEdge| modal.set(Modal::EdgeForm(EdgeForm::edit(edge))),
                                }
                            }
                            if let Some(path) = snapshot.pending.clone() {
                                path {
                                    d: "{path}",
                                    stroke: "#4CAF50",
                                    "stroke-width": "2",
                                    "stroke-dasharray": "8,4",
                                    fill: "none",
                                    "marker-end": "url(#arrowhead)",
                                }
                            }
                        }

                        for card in snapshot.nodes.clone() {
                            TaskCard { key: "{card.id}", card: card, size: node_style.clone() }
                        }
                    }

                    if empty {
                        div {
                            style: "position: absolute; inset: 0; display: flex; align-items: center; justify-content: center; color: #999; pointer-events: none;",
                            "No tasks yet. Use Add Task to create one."
                        }
                    }
                }

                TaskDetailsModal {
                    task: snapshot.selected.clone(),
                    dependencies: snapshot.selected_dependencies.clone(),
                    dependents: snapshot.selected_dependents.clone(),
                    on_edit: on_edit,
                    on_delete: move |id: TaskId| modal.set(Modal::ConfirmDelete(id)),
                    on_close: on_close_details,
                }

                {modal_view}
            }

            NotificationStack { notifications: snapshot.notifications.clone(), on_dismiss: on_dismiss }
        }
    }
}

#[component]
fn EdgeCurve(edge: EdgePath, on_select: EventHandler<DependencyEdge>) -> Element {
    let selected = edge.edge.clone();
    rsx! {
        path {
            d: "{edge.path}",
            stroke: "#999",
            "stroke-width": "2",
            fill: "none",
            "marker-end": "url(#arrowhead)",
            style: "pointer-events: stroke; cursor: pointer;",
            onmousedown: move |evt| evt.stop_propagation(),
            onmouseup: move |evt| evt.stop_propagation(),
            onclick: move |_| on_select.call(selected.clone()),
        }
    }
}

#[component]
fn TaskCard(card: NodeCard, size: String) -> Element {
    let border = if card.selected { "2px solid #3b82f6" } else { "1px solid #ddd" };
    let due_color = if card.overdue { "#dc2626" } else { "#666" };
    let status_class = format!("status-badge status-{}", card.status);
    let input_style = format!(
        "position: absolute; left: {}px; top: {}px; width: 10px; height: 10px; margin: -5px 0 0 -5px; border-radius: 50%; background: white; border: 2px solid #999;",
        card.input.x, card.input.y
    );
    let output_style = format!(
        "position: absolute; left: {}px; top: {}px; width: 10px; height: 10px; margin: -5px 0 0 -5px; border-radius: 50%; background: #3b82f6; border: 2px solid white;",
        card.output.x, card.output.y
    );

    rsx! {
        div {
            class: "task-card",
            style: "position: absolute; left: {card.left}px; top: {card.top}px; {size}
                   box-sizing: border-box; background: white; border: {border}; border-radius: 8px;
                   padding: 8px 12px; box-shadow: 0 2px 4px rgba(0,0,0,0.08); overflow: hidden;",
            div {
                style: "font-weight: 600; white-space: nowrap; overflow: hidden; text-overflow: ellipsis;",
                "{card.name}"
            }
            div {
                style: "display: flex; justify-content: space-between; font-size: 12px; margin-top: 4px;",
                span { class: "{status_class}", "{card.status_label}" }
                if let Some(due) = card.due.clone() {
                    span { style: "color: {due_color};", "{due}" }
                }
            }
        }
        div { class: "input-handle", style: "{input_style}" }
        div { class: "output-handle", style: "{output_style}" }
    }
}
