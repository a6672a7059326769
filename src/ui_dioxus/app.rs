use anyhow::Result;
use dioxus::prelude::*;
use tracing::{error, info};

use crate::config::EditorConfig;
use crate::repository;
use crate::services::error_handling::ErrorContext;
use crate::services::session::WorkspaceSession;
use crate::ui_dioxus::views::GraphEditor;

/// Loads the configuration, connects to the configured backend and opens
/// the project.
pub async fn open_workspace() -> Result<WorkspaceSession> {
    let config = ErrorContext::new("load settings").wrap(EditorConfig::load())?;
    let location = config.backend.location();
    let backend = ErrorContext::new("connect to the backend")
        .with_detail("backend", location)
        .wrap(repository::connect(&config.backend).await)?;
    let session = ErrorContext::new("load the project")
        .with_detail("project_id", &config.project_id)
        .with_detail("backend", location)
        .wrap(WorkspaceSession::open(config.project_id.clone(), backend, &config).await)?;
    info!(project_id = %session.project_id(), "Editor ready");
    Ok(session)
}

#[component]
pub fn App() -> Element {
    let workspace = use_resource(|| async {
        open_workspace().await.map_err(|e| {
            error!("Failed to open workspace: {:#}", e);
            format!("{:#}", e)
        })
    });

    match &*workspace.read_unchecked() {
        Some(Ok(session)) => rsx! {
            GraphEditor { session: session.clone() }
        },
        Some(Err(message)) => rsx! {
            div {
                style: "padding: 40px; font-family: sans-serif;",
                h2 { style: "color: #c62828;", "Could not open the project" }
                p { style: "color: #666;", "{message}" }
            }
        },
        None => rsx! {
            div {
                style: "display: flex; align-items: center; justify-content: center; height: 100vh; color: #999;",
                "Loading project..."
            }
        },
    }
}
