pub mod delete_task_dialog;
pub mod edge_form_panel;
pub mod notification_toast;
pub mod task_details_modal;
pub mod task_form_modal;

pub use delete_task_dialog::DeleteTaskDialog;
pub use edge_form_panel::EdgeFormPanel;
pub use notification_toast::{NotificationStack, NotificationToast};
pub use task_details_modal::TaskDetailsModal;
pub use task_form_modal::TaskFormModal;
