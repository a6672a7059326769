use std::collections::HashMap;
use tracing::{debug, trace};

use crate::domain::dependency::{DependencyEdge, PendingEdge};
use crate::domain::graph::GraphStore;
use crate::domain::task::TaskId;
use crate::services::edge_form::EdgeForm;
use crate::services::error_handling::EditorError;
use crate::services::layout::{Bounds, Layout, Position};

/// Pointer travel below which a press-release on a node counts as a click.
pub const DRAG_THRESHOLD: f64 = 4.0;

/// Radius around a connection handle that still grabs it.
pub const HANDLE_RADIUS: f64 = 10.0;

/// Space kept between the graph and the top-left corner of the view.
pub const VIEW_MARGIN: f64 = 40.0;

const MIN_ZOOM: f64 = 0.3;
const MAX_ZOOM: f64 = 3.0;

/// The gesture currently in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Idle,
    DraggingNode {
        id: TaskId,
        /// Pointer position minus node centre at press time.
        grab_offset: (f64, f64),
        pressed_at: Position,
        position: Position,
        moved: bool,
    },
    DrawingEdge {
        pending: PendingEdge,
        cursor: Position,
    },
    NodeSelected(TaskId),
}

/// Where the pointer was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    InputHandle(TaskId),
    Node(TaskId),
    Canvas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Input,
    Output,
}

/// What a finished gesture asks the editor to do.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOutcome {
    Nothing,
    Selected(TaskId),
    Deselected,
    Moved { id: TaskId, position: Position },
    /// Passed validation against the store; ready to be committed.
    EdgeProposed(DependencyEdge),
    EdgeDiscarded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub pan: Position,
    pub zoom: f64,
    /// Canvas point drawn at `pan`.
    pub origin: Position,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Position::default(),
            zoom: 1.0,
            origin: Position::default(),
        }
    }
}

impl Viewport {
    /// Screen point to canvas coordinates.
    pub fn to_canvas(&self, screen: Position) -> Position {
        Position::new(
            (screen.x - self.pan.x) / self.zoom + self.origin.x,
            (screen.y - self.pan.y) / self.zoom + self.origin.y,
        )
    }

    pub fn to_screen(&self, canvas: Position) -> Position {
        Position::new(
            (canvas.x - self.origin.x) * self.zoom + self.pan.x,
            (canvas.y - self.origin.y) * self.zoom + self.pan.y,
        )
    }

    /// Anchors the top-left of `bounds`, less a margin, at `pan`.
    pub fn frame(&mut self, bounds: Option<Bounds>) {
        self.origin = bounds
            .map(|b| Position::new(b.min_x - VIEW_MARGIN, b.min_y - VIEW_MARGIN))
            .unwrap_or_default();
    }

    pub fn zoom_by(&mut self, factor: f64) {
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }
}

/// Headless interaction model of the graph canvas. Positions dragged by the
/// user are visual only and survive until the graph structure changes.
#[derive(Debug, Clone)]
pub struct Canvas {
    interaction: Interaction,
    overrides: HashMap<TaskId, Position>,
    synced_revision: Option<u64>,
    pub viewport: Viewport,
    drag_threshold: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(DRAG_THRESHOLD)
    }
}

impl Canvas {
    pub fn new(drag_threshold: f64) -> Self {
        Self {
            interaction: Interaction::Idle,
            overrides: HashMap::new(),
            synced_revision: None,
            viewport: Viewport::default(),
            drag_threshold,
        }
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn selected(&self) -> Option<&TaskId> {
        match &self.interaction {
            Interaction::NodeSelected(id) => Some(id),
            _ => None,
        }
    }

    pub fn pending_edge(&self) -> Option<(&PendingEdge, Position)> {
        match &self.interaction {
            Interaction::DrawingEdge { pending, cursor } => Some((pending, *cursor)),
            _ => None,
        }
    }

    /// Drops visual overrides once the store has changed since the last
    /// sync, and forgets gestures on nodes that no longer exist.
    pub fn sync(&mut self, store: &GraphStore) {
        if self.synced_revision == Some(store.revision()) {
            return;
        }
        if self.synced_revision.is_some() && !self.overrides.is_empty() {
            debug!(dropped = self.overrides.len(), "Graph changed; clearing dragged positions");
        }
        self.overrides.clear();
        self.synced_revision = Some(store.revision());

        let stale = match &self.interaction {
            Interaction::DraggingNode { id, .. } | Interaction::NodeSelected(id) => !store.contains_node(id),
            Interaction::DrawingEdge { pending, .. } => !store.contains_node(&pending.from),
            Interaction::Idle => false,
        };
        if stale {
            self.interaction = Interaction::Idle;
        }
    }

    /// Forces the next `sync` to treat the store as changed.
    pub fn invalidate(&mut self) {
        self.synced_revision = None;
    }

    /// Node centre as displayed: dragging position, then override, then
    /// layout.
    pub fn position_of(&self, layout: &Layout, id: &TaskId) -> Option<Position> {
        if let Interaction::DraggingNode { id: dragged, position, .. } = &self.interaction
            && dragged == id
        {
            return Some(*position);
        }
        self.overrides.get(id).copied().or_else(|| layout.position(id))
    }

    pub fn positions(&self, layout: &Layout) -> Vec<(TaskId, Position)> {
        layout
            .iter()
            .filter_map(|(id, _)| self.position_of(layout, id).map(|p| (id.clone(), p)))
            .collect()
    }

    /// Topmost node under `point` (canvas coordinates).
    pub fn node_at(&self, layout: &Layout, point: Position) -> Option<TaskId> {
        self.positions(layout)
            .into_iter()
            .rev()
            .find(|(_, centre)| layout.node_bounds(*centre).contains(point))
            .map(|(id, _)| id)
    }

    pub fn handle_at(&self, layout: &Layout, point: Position) -> Option<(TaskId, Handle)> {
        self.positions(layout).into_iter().rev().find_map(|(id, centre)| {
            let (input, output) = layout.handles(centre);
            if output.distance(point) <= HANDLE_RADIUS {
                Some((id, Handle::Output))
            } else if input.distance(point) <= HANDLE_RADIUS {
                Some((id, Handle::Input))
            } else {
                None
            }
        })
    }

    pub fn pointer_down_node(&mut self, id: TaskId, at: Position, node_centre: Position) {
        trace!(task_id = %id, "Pointer down on node");
        self.interaction = Interaction::DraggingNode {
            grab_offset: (at.x - node_centre.x, at.y - node_centre.y),
            pressed_at: at,
            position: node_centre,
            moved: false,
            id,
        };
    }

    pub fn pointer_down_output(&mut self, id: TaskId, at: Position) {
        trace!(task_id = %id, "Started drawing dependency");
        self.interaction = Interaction::DrawingEdge {
            pending: PendingEdge::from_source(id),
            cursor: at,
        };
    }

    pub fn pointer_move(&mut self, at: Position) {
        let threshold = self.drag_threshold;
        match &mut self.interaction {
            Interaction::DraggingNode {
                grab_offset,
                pressed_at,
                position,
                moved,
                ..
            } => {
                if !*moved && pressed_at.distance(at) < threshold {
                    return;
                }
                *moved = true;
                *position = Position::new(at.x - grab_offset.0, at.y - grab_offset.1);
            }
            Interaction::DrawingEdge { cursor, .. } => *cursor = at,
            _ => {}
        }
    }

    /// Ends the current gesture. A pending edge dropped on an input handle
    /// is checked against the store before it is proposed; a rejected edge
    /// is returned as an error and nothing is committed.
    pub fn pointer_up(&mut self, target: DropTarget, store: &GraphStore) -> Result<CanvasOutcome, EditorError> {
        let interaction = std::mem::replace(&mut self.interaction, Interaction::Idle);
        match interaction {
            Interaction::DraggingNode { id, moved: false, .. } => {
                self.interaction = Interaction::NodeSelected(id.clone());
                Ok(CanvasOutcome::Selected(id))
            }
            Interaction::DraggingNode { id, position, .. } => {
                self.overrides.insert(id.clone(), position);
                debug!(task_id = %id, x = position.x, y = position.y, "Node moved");
                Ok(CanvasOutcome::Moved { id, position })
            }
            Interaction::DrawingEdge { pending, .. } => match target {
                DropTarget::InputHandle(to) => {
                    let (from, to) = EdgeForm::validate_fields(Some(&pending.from), Some(&to))?;
                    store.check_edge(&from, &to)?;
                    let edge = pending
                        .with_target(to.clone())
                        .promote()
                        .unwrap_or_else(|| DependencyEdge::new(from, to));
                    Ok(CanvasOutcome::EdgeProposed(edge))
                }
                DropTarget::Node(_) | DropTarget::Canvas => {
                    trace!(from = %pending.from, "Pending dependency discarded");
                    Ok(CanvasOutcome::EdgeDiscarded)
                }
            },
            other => {
                self.interaction = other;
                Ok(CanvasOutcome::Nothing)
            }
        }
    }

    pub fn click_node(&mut self, id: TaskId) -> CanvasOutcome {
        self.interaction = Interaction::NodeSelected(id.clone());
        CanvasOutcome::Selected(id)
    }

    pub fn click_canvas(&mut self) -> CanvasOutcome {
        match std::mem::replace(&mut self.interaction, Interaction::Idle) {
            Interaction::NodeSelected(_) => CanvasOutcome::Deselected,
            Interaction::DrawingEdge { .. } => CanvasOutcome::EdgeDiscarded,
            _ => CanvasOutcome::Nothing,
        }
    }

    /// Abandons any gesture (Escape key).
    pub fn cancel(&mut self) {
        self.interaction = Interaction::Idle;
    }

    /// Starts a gesture from a raw pointer press in canvas coordinates.
    pub fn pointer_down_at(&mut self, layout: &Layout, at: Position) -> CanvasOutcome {
        if let Some((id, Handle::Output)) = self.handle_at(layout, at) {
            self.pointer_down_output(id, at);
            return CanvasOutcome::Nothing;
        }
        match self.node_at(layout, at) {
            Some(id) => {
                let centre = self.position_of(layout, &id).unwrap_or(at);
                self.pointer_down_node(id, at, centre);
                CanvasOutcome::Nothing
            }
            None => self.click_canvas(),
        }
    }

    /// Resolves the drop target under `at` and ends the gesture.
    pub fn pointer_up_at(&mut self, layout: &Layout, at: Position, store: &GraphStore) -> Result<CanvasOutcome, EditorError> {
        let target = match self.handle_at(layout, at) {
            Some((id, Handle::Input)) => DropTarget::InputHandle(id),
            _ => match self.node_at(layout, at) {
                Some(id) => DropTarget::Node(id),
                None => DropTarget::Canvas,
            },
        };
        self.pointer_up(target, store)
    }
}
