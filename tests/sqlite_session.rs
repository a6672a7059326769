use chrono::Utc;
use std::sync::Arc;

use taskmap::config::EditorConfig;
use taskmap::domain::dependency::DependencyEdge;
use taskmap::domain::task::TaskId;
use taskmap::repository::{Repository, TaskBackend};
use taskmap::services::edge_form::EdgeForm;
use taskmap::services::task_form::TaskDraft;
use taskmap::services::{EditorError, WorkspaceSession};

const PROJECT: &str = "launch";

async fn session() -> (Arc<Repository>, WorkspaceSession) {
    let repo = Arc::new(Repository::new_memory().await.unwrap());
    let session = WorkspaceSession::open(PROJECT, repo.clone(), &EditorConfig::default())
        .await
        .unwrap();
    (repo, session)
}

#[tokio::test]
async fn test_edits_survive_a_reopen() {
    let (repo, session) = session().await;

    let design = session.save_task(&TaskDraft::new("Design"), &Utc).await.unwrap();
    let build = session
        .save_task(&TaskDraft::new("Build").depends_on(design.clone()), &Utc)
        .await
        .unwrap();
    session.close();

    let reopened = WorkspaceSession::open(PROJECT, repo.clone(), &EditorConfig::default())
        .await
        .unwrap();
    reopened.with_editor(|editor| {
        let store = editor.store();
        assert_eq!(store.len(), 2);
        assert!(store.contains_edge(&design, &build));
    });
}

#[tokio::test]
async fn test_cycle_never_reaches_the_database() {
    let (repo, session) = session().await;
    let a = session.save_task(&TaskDraft::new("A"), &Utc).await.unwrap();
    let b = session
        .save_task(&TaskDraft::new("B").depends_on(a.clone()), &Utc)
        .await
        .unwrap();

    let form = EdgeForm {
        from: Some(b.clone()),
        to: Some(a.clone()),
        existing: None,
    };
    let err = session.submit_edge(&form).await.unwrap_err();

    assert!(matches!(err, EditorError::Form(_) | EditorError::Graph(_)));
    let stored = repo.list_dependencies(PROJECT).await.unwrap();
    assert_eq!(stored, vec![DependencyEdge::new(a, b)]);
}

#[tokio::test]
async fn test_delete_removes_task_and_its_dependencies() {
    let (repo, session) = session().await;
    let one = session.save_task(&TaskDraft::new("One"), &Utc).await.unwrap();
    let two = session
        .save_task(&TaskDraft::new("Two").depends_on(one.clone()), &Utc)
        .await
        .unwrap();
    let three = session
        .save_task(&TaskDraft::new("Three").depends_on(two.clone()), &Utc)
        .await
        .unwrap();

    session.delete_task(&two).await.unwrap();

    let tasks: Vec<TaskId> = repo
        .list_tasks(PROJECT)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(tasks, vec![one, three]);
    assert!(repo.list_dependencies(PROJECT).await.unwrap().is_empty());
    session.with_editor(|editor| assert_eq!(editor.store().edge_count(), 0));
}

#[tokio::test]
async fn test_editing_a_dependency_replaces_the_pair() {
    let (repo, session) = session().await;
    let a = session.save_task(&TaskDraft::new("A"), &Utc).await.unwrap();
    let b = session.save_task(&TaskDraft::new("B"), &Utc).await.unwrap();
    let c = session.save_task(&TaskDraft::new("C"), &Utc).await.unwrap();
    let original = session
        .submit_edge(&EdgeForm {
            from: Some(a.clone()),
            to: Some(b.clone()),
            existing: None,
        })
        .await
        .unwrap();

    let mut form = EdgeForm::edit(original);
    form.to = Some(c.clone());
    session.submit_edge(&form).await.unwrap();

    assert_eq!(
        repo.list_dependencies(PROJECT).await.unwrap(),
        vec![DependencyEdge::new(a, c)]
    );
}

#[tokio::test]
async fn test_removing_an_absent_dependency_is_a_no_op() {
    let (_repo, session) = session().await;
    let a = session.save_task(&TaskDraft::new("A"), &Utc).await.unwrap();
    let b = session.save_task(&TaskDraft::new("B"), &Utc).await.unwrap();

    let removed = session.remove_edge(&DependencyEdge::new(a, b)).await.unwrap();

    assert!(!removed);
}
