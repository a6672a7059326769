pub mod graph_editor;

pub use graph_editor::{GraphEditor, Snapshot};
