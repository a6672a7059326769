pub mod canvas;
pub mod edge_form;
pub mod editor;
pub mod error_handling;
pub mod layout;
pub mod notifications;
pub mod session;
pub mod task_form;

pub use editor::{Change, Editor};
pub use error_handling::EditorError;
pub use session::WorkspaceSession;
