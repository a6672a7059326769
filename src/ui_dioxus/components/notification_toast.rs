use dioxus::prelude::*;
use tokio::time::Instant;

use crate::services::notifications::{Notification, NotificationKind};

fn accent(kind: NotificationKind) -> (&'static str, &'static str) {
    match kind {
        NotificationKind::Success => ("#16a34a", "✓"),
        NotificationKind::Warning => ("#d97706", "!"),
        NotificationKind::Error => ("#dc2626", "✕"),
    }
}

/// Stacked toasts in the bottom-right corner. Never captures clicks outside
/// the toasts themselves.
#[component]
pub fn NotificationStack(notifications: Vec<(Notification, Instant)>, on_dismiss: EventHandler<u64>) -> Element {
    rsx! {
        div {
            class: "notification-stack",
            style: "position: fixed; right: 16px; bottom: 16px; z-index: 1100;
                   display: flex; flex-direction: column; gap: 8px; pointer-events: none;",
            for (notification, expires_at) in notifications {
                NotificationToast {
                    key: "{notification.id}",
                    notification: notification,
                    expires_at: expires_at,
                    on_dismiss: on_dismiss,
                }
            }
        }
    }
}

/// A single notification. Dismisses itself at `expires_at`.
#[component]
pub fn NotificationToast(notification: Notification, expires_at: Instant, on_dismiss: EventHandler<u64>) -> Element {
    let id = notification.id;
    use_future(move || async move {
        tokio::time::sleep_until(expires_at).await;
        on_dismiss.call(id);
    });

    let (color, icon) = accent(notification.kind);
    let kind = notification.kind.as_str();

    rsx! {
        div {
            class: "notification notification-{kind}",
            role: "status",
            style: "pointer-events: auto; min-width: 280px; max-width: 360px; background: white;
                   border-left: 4px solid {color}; border-radius: 8px; padding: 12px 16px;
                   box-shadow: 0 4px 16px rgba(0, 0, 0, 0.15); display: flex; gap: 12px;",
            span { style: "color: {color}; font-weight: 700;", "{icon}" }
            div {
                style: "flex: 1;",
                div { style: "font-weight: 600; margin-bottom: 2px;", "{notification.title}" }
                div { style: "color: #555; font-size: 14px;", "{notification.message}" }
            }
            button {
                style: "background: none; border: none; cursor: pointer; color: #999; font-size: 16px;",
                onclick: move |_| on_dismiss.call(id),
                "×"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifications::NotificationCenter;

    #[component]
    fn Harness(notifications: Vec<(Notification, Instant)>) -> Element {
        rsx! {
            NotificationStack { notifications: notifications, on_dismiss: move |_| {} }
        }
    }

    #[tokio::test]
    async fn test_renders_each_notification() {
        let mut center = NotificationCenter::default();
        center.error("Circular dependency", "Cannot create this dependency");
        center.success("Task created", "\"Plan\" was saved.");
        let timeout = center.timeout();
        let notifications: Vec<_> = center
            .active()
            .map(|n| (n.clone(), n.created_at + timeout))
            .collect();

        let mut dom = VirtualDom::new_with_props(Harness, HarnessProps { notifications });
        dom.rebuild_in_place();
        let html = dioxus_ssr::render(&dom);

        assert!(html.contains("Circular dependency"));
        assert!(html.contains("notification-error"));
        assert!(html.contains("Task created"));
    }
}
