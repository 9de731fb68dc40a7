//! End-to-end render pipeline scenarios against an in-memory database and
//! scripted model backends.

mod common;

use common::{
    HTML_FRAGMENTS, HtmlUi, MONTHLY_REVENUE_SQL, ScriptedSql, ScriptedUi, UiScript, seed_orders,
    shared_state, shared_state_with, test_config, user,
};
use futures::StreamExt;
use promptboard::clients::{ModelError, Role};
use promptboard::domain::{UserId, WidgetId};
use promptboard::models::widget::WidgetUpdate;
use promptboard::safety::SafetyViolation;
use promptboard::services::{PipelineError, RelayError, RenderStream};
use promptboard::state::SharedState;

async fn drain(stream: RenderStream) -> String {
    stream
        .map(|chunk| chunk.expect("stream chunk"))
        .collect::<Vec<_>>()
        .await
        .concat()
}

#[tokio::test]
async fn test_monthly_revenue_renders_and_caches() {
    let sql = ScriptedSql::new(&[MONTHLY_REVENUE_SQL]);
    let ui = HtmlUi::new();
    let state = shared_state(sql.clone(), ui.clone()).await;
    seed_orders(&state).await;

    let owner = user("analyst-1");
    let widget = state
        .widget_service
        .create_widget(&owner, "Show monthly revenue for 2024")
        .await
        .unwrap();

    let stream = state
        .pipeline
        .render(&owner, widget.id, None)
        .await
        .expect("render should start");
    let html = drain(stream).await;
    assert_eq!(html, HTML_FRAGMENTS.concat());

    let hydrated = ui.last_prompt().unwrap();
    assert!(hydrated.starts_with("Show monthly revenue for 2024 ["));
    assert!(hydrated.contains(r#""month":"2024-01""#));
    assert!(hydrated.contains(r#""month":"2024-12""#));
    assert!(hydrated.contains(r#""revenue":1200.0"#));

    let saved = state
        .widget_service
        .get_widget(widget.id, &owner)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.sql_query.as_deref(), Some(MONTHLY_REVENUE_SQL));
    assert_eq!(saved.content.as_deref(), Some(HTML_FRAGMENTS.concat().as_str()));
    assert_eq!(sql.calls(), 1);
}

#[tokio::test]
async fn test_cached_query_skips_generation() {
    let sql = ScriptedSql::new(&[MONTHLY_REVENUE_SQL]);
    let ui = HtmlUi::new();
    let state = shared_state(sql.clone(), ui.clone()).await;
    seed_orders(&state).await;

    let owner = user("analyst-1");
    let widget = state
        .widget_service
        .create_widget(&owner, "Show monthly revenue for 2024")
        .await
        .unwrap();

    for _ in 0..2 {
        let stream = state.pipeline.render(&owner, widget.id, None).await.unwrap();
        drain(stream).await;
    }

    assert_eq!(sql.calls(), 1);
    assert_eq!(ui.prompts.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_retry_feeds_back_previous_failure() {
    let sql = ScriptedSql::new(&["SELECT * FROM ordrs", MONTHLY_REVENUE_SQL]);
    let state = shared_state(sql.clone(), HtmlUi::new()).await;
    seed_orders(&state).await;

    let owner = user("analyst-1");
    let widget = state
        .widget_service
        .create_widget(&owner, "Show monthly revenue for 2024")
        .await
        .unwrap();

    let stream = state.pipeline.render(&owner, widget.id, None).await.unwrap();
    drain(stream).await;

    assert_eq!(sql.calls(), 2);
    let retry = sql.request(1);
    assert_eq!(retry.messages.len(), 4);
    assert_eq!(retry.messages[2].role, Role::Assistant);
    assert_eq!(
        retry.messages[2].content,
        "Previous response: SELECT * FROM ordrs"
    );
    assert_eq!(retry.messages[3].role, Role::User);
    assert!(retry.messages[3].content.contains("no such table: ordrs"));

    let saved = state
        .widget_service
        .get_widget(widget.id, &owner)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.sql_query.as_deref(), Some(MONTHLY_REVENUE_SQL));
}

#[tokio::test]
async fn test_exhausted_retries_discard_widget() {
    let sql = ScriptedSql::new(&["SELECT * FROM missing_table"]);
    let state = shared_state(sql.clone(), HtmlUi::new()).await;

    let owner = user("analyst-1");
    let widget = state
        .widget_service
        .create_widget(&owner, "Show monthly revenue for 2024")
        .await
        .unwrap();

    let err = state
        .pipeline
        .render(&owner, widget.id, None)
        .await
        .err()
        .expect("render should fail");

    match &err {
        PipelineError::RetriesExhausted { attempts, reason } => {
            assert_eq!(*attempts, 3);
            assert!(reason.contains("no such table: missing_table"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("Exceeded max retries after 3 attempts"));
    assert_eq!(sql.calls(), 3);

    assert!(
        state
            .widget_service
            .get_widget(widget.id, &owner)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_forbidden_sql_counts_as_failed_attempt() {
    let sql = ScriptedSql::new(&["DELETE FROM orders", MONTHLY_REVENUE_SQL]);
    let state = shared_state(sql.clone(), HtmlUi::new()).await;
    seed_orders(&state).await;

    let owner = user("analyst-1");
    let widget = state
        .widget_service
        .create_widget(&owner, "Show monthly revenue for 2024")
        .await
        .unwrap();

    let stream = state.pipeline.render(&owner, widget.id, None).await.unwrap();
    drain(stream).await;

    assert_eq!(sql.calls(), 2);
    assert!(
        sql.request(1).messages[3]
            .content
            .contains("forbidden keywords or operations: DELETE")
    );

    let count = state.store.count_table_rows("orders").await.unwrap();
    assert_eq!(count, 12);
}

#[tokio::test]
async fn test_harmful_prompt_discards_widget_without_model_call() {
    let sql = ScriptedSql::new(&[MONTHLY_REVENUE_SQL]);
    let state = shared_state(sql.clone(), HtmlUi::new()).await;

    let owner = user("analyst-1");
    let widget = state
        .widget_service
        .create_widget(&owner, "Show revenue; DROP TABLE orders")
        .await
        .unwrap();

    let err = state
        .pipeline
        .render(&owner, widget.id, None)
        .await
        .err()
        .expect("render should fail");

    assert!(matches!(
        err,
        PipelineError::InvalidPrompt(SafetyViolation::HarmfulPrompt { .. })
    ));
    assert_eq!(sql.calls(), 0);
    assert!(
        state
            .widget_service
            .get_widget(widget.id, &owner)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_failing_cached_query_keeps_widget() {
    let sql = ScriptedSql::new(&[MONTHLY_REVENUE_SQL]);
    let state = shared_state(sql.clone(), HtmlUi::new()).await;

    let owner = user("analyst-1");
    let widget = state
        .widget_service
        .create_widget(&owner, "Show monthly revenue for 2024")
        .await
        .unwrap();
    state
        .widget_service
        .update_widget(widget.id, WidgetUpdate::query("SELECT * FROM gone"), &owner)
        .await
        .unwrap();

    let err = state
        .pipeline
        .render(&owner, widget.id, None)
        .await
        .err()
        .expect("render should fail");

    assert!(matches!(err, PipelineError::Execution(_)));
    assert!(err.to_string().starts_with("Failed to fetch data for prompt"));
    assert_eq!(sql.calls(), 0);

    let kept = state
        .widget_service
        .get_widget(widget.id, &owner)
        .await
        .unwrap()
        .expect("widget should survive");
    assert_eq!(kept.sql_query.as_deref(), Some("SELECT * FROM gone"));
}

#[tokio::test]
async fn test_foreign_widget_is_not_found() {
    let state = shared_state(ScriptedSql::new(&[MONTHLY_REVENUE_SQL]), HtmlUi::new()).await;

    let widget = state
        .widget_service
        .create_widget(&user("owner"), "Show monthly revenue for 2024")
        .await
        .unwrap();

    let err = state
        .pipeline
        .render(&user("intruder"), widget.id, None)
        .await
        .err()
        .expect("render should fail");
    assert!(matches!(err, PipelineError::WidgetNotFound(id) if id == widget.id));
}

/// A widget whose query is already cached, so renders go straight to the UI
/// model.
async fn cached_widget(state: &SharedState, owner: &UserId) -> WidgetId {
    seed_orders(state).await;
    let widget = state
        .widget_service
        .create_widget(owner, "Show monthly revenue for 2024")
        .await
        .unwrap();
    state
        .widget_service
        .update_widget(widget.id, WidgetUpdate::query(MONTHLY_REVENUE_SQL), owner)
        .await
        .unwrap();
    widget.id
}

async fn saved_content(state: &SharedState, owner: &UserId, id: WidgetId) -> Option<String> {
    state
        .widget_service
        .get_widget(id, owner)
        .await
        .unwrap()
        .unwrap()
        .content
}

#[tokio::test]
async fn test_overlapping_renders_keep_last_finished_document() {
    let ui = ScriptedUi::new(vec![
        UiScript::Document(vec!["<p>", "first", "</p>"]),
        UiScript::Document(vec!["<p>", "second", "</p>"]),
    ]);
    let state = shared_state_with(test_config(), ScriptedSql::new(&[]), ui).await;
    let owner = user("analyst-1");
    let id = cached_widget(&state, &owner).await;

    let first = state.pipeline.render(&owner, id, None).await.unwrap();
    let second = state.pipeline.render(&owner, id, None).await.unwrap();

    assert_eq!(drain(first).await, "<p>first</p>");
    assert_eq!(saved_content(&state, &owner, id).await.as_deref(), Some("<p>first</p>"));

    assert_eq!(drain(second).await, "<p>second</p>");
    assert_eq!(saved_content(&state, &owner, id).await.as_deref(), Some("<p>second</p>"));

    let saved = state.widget_service.get_widget(id, &owner).await.unwrap().unwrap();
    assert_eq!(saved.sql_query.as_deref(), Some(MONTHLY_REVENUE_SQL));
}

#[tokio::test]
async fn test_model_error_mid_stream_saves_nothing() {
    let ui = ScriptedUi::new(vec![UiScript::FailAfter("<div>")]);
    let state = shared_state_with(test_config(), ScriptedSql::new(&[]), ui).await;
    let owner = user("analyst-1");
    let id = cached_widget(&state, &owner).await;

    let stream = state.pipeline.render(&owner, id, None).await.unwrap();
    let chunks: Vec<Result<String, RelayError>> = stream.collect().await;

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].as_deref().ok(), Some("<div>"));
    assert!(matches!(chunks[1], Err(RelayError::Model(ModelError::Stream(_)))));
    assert_eq!(saved_content(&state, &owner, id).await, None);
}

#[tokio::test]
async fn test_stalled_stream_times_out_and_saves_nothing() {
    let mut config = test_config();
    config.pipeline.stream_idle_timeout_seconds = 1;
    let ui = ScriptedUi::new(vec![UiScript::StallAfter("<div>")]);
    let state = shared_state_with(config, ScriptedSql::new(&[]), ui).await;
    let owner = user("analyst-1");
    let id = cached_widget(&state, &owner).await;

    let stream = state.pipeline.render(&owner, id, None).await.unwrap();
    let chunks: Vec<Result<String, RelayError>> = stream.collect().await;

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].as_deref().ok(), Some("<div>"));
    assert!(matches!(chunks[1], Err(RelayError::Idle(1))));
    assert_eq!(saved_content(&state, &owner, id).await, None);
}

#[tokio::test]
async fn test_connection_closed_before_done_saves_nothing() {
    let ui = ScriptedUi::new(vec![UiScript::CutOff("<div>partial")]);
    let state = shared_state_with(test_config(), ScriptedSql::new(&[]), ui).await;
    let owner = user("analyst-1");
    let id = cached_widget(&state, &owner).await;

    let stream = state.pipeline.render(&owner, id, None).await.unwrap();
    let chunks: Vec<Result<String, RelayError>> = stream.collect().await;

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].as_deref().ok(), Some("<div>partial"));
    assert!(matches!(chunks[1], Err(RelayError::Model(ModelError::Stream(_)))));
    assert_eq!(saved_content(&state, &owner, id).await, None);
}
