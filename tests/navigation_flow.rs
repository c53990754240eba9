//! End-to-end chat surface scenarios
//!
//! Every test runs on a paused clock, so the pacing delays are exact and
//! instantaneous.

mod helpers;

use std::time::Duration;

use helpers::{deps, CountingCompletion, FailingWriteStore, RecordingRouter};
use prep_assistant::scripted::{
    STUDY_MATERIALS_YES, TEST_HELP_PREPARE, TEST_PREPARED_YES,
};
use prep_assistant::{
    AssistantError, ChatSession, DeferredKind, DurableState, Modal, MountReason, NavPhase,
    PacingConfig, RouteError, TurnOutcome,
};

const MUGHAL_REPLY: &str =
    "The Mughal Empire was founded by Babur in 1526 after the First Battle of Panipat.";

fn follow_up_actions(outcome: &TurnOutcome) -> Vec<String> {
    match outcome {
        TurnOutcome::Replied(messages) => messages
            .iter()
            .flat_map(|m| m.buttons.iter().map(|b| b.action.clone()))
            .collect(),
        other => panic!("expected a reply, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_next_test_navigates_without_remote_call() {
    let state = DurableState::in_memory();
    let completion = CountingCompletion::text(MUGHAL_REPLY);
    let router = RecordingRouter::new();
    let deps = deps(&state, completion.clone(), router.clone(), PacingConfig::default());

    let session = ChatSession::mount(deps.clone(), MountReason::NewSession).unwrap();
    router.observe(session.status());
    assert_eq!(session.resume().await.unwrap(), TurnOutcome::Ignored);

    let outcome = session.send("when is my next test").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Navigated {
            path: "/upsc/student/study?tab=tests".to_string()
        }
    );
    assert_eq!(completion.calls(), 0);

    let calls = router.calls();
    assert_eq!(calls.len(), 1);
    // Message delay, then the full overlay animation
    assert!(calls[0].elapsed >= Duration::from_millis(2500));
    assert!(calls[0].elapsed < Duration::from_millis(2600));
    let seen = calls[0].status.clone().unwrap();
    assert!(seen.loading);
    assert_eq!(seen.overlay.unwrap().progress, 100);

    let texts: Vec<_> = session.messages().unwrap().into_iter().map(|m| m.text).collect();
    assert!(texts.contains(&"when is my next test".to_string()));
    assert!(texts.contains(&"Let me check your test schedule...".to_string()));
    assert!(state.get_flag(DeferredKind::TestFollowUp).unwrap());
    assert!(state.pending_navigation().unwrap().is_none());
    drop(session);

    // The destination page mounts the surface again
    let session = ChatSession::mount(deps, MountReason::AfterNavigation).unwrap();
    assert!(session.snapshot().open);
    assert!(!state.get_flag(DeferredKind::TestFollowUp).unwrap());

    let before = tokio::time::Instant::now();
    let outcome = session.resume().await.unwrap();
    assert!(before.elapsed() >= Duration::from_millis(800));
    assert_eq!(
        follow_up_actions(&outcome),
        vec![TEST_PREPARED_YES.to_string(), TEST_HELP_PREPARE.to_string()]
    );
    assert_eq!(session.phase().unwrap(), NavPhase::Idle);

    // The log survived the route change
    let texts: Vec<_> = session.messages().unwrap().into_iter().map(|m| m.text).collect();
    assert!(texts.contains(&"when is my next test".to_string()));
    assert!(texts
        .last()
        .unwrap()
        .starts_with("Your next test is on Indian Climate"));
}

#[tokio::test(start_paused = true)]
async fn test_deferred_response_delivered_once() {
    let state = DurableState::in_memory();
    let router = RecordingRouter::new();
    let deps = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        router,
        PacingConfig::default(),
    );

    let session = ChatSession::mount(deps.clone(), MountReason::NewSession).unwrap();
    session.send("What's my upcoming test?").await.unwrap();
    drop(session);

    let first = ChatSession::mount(deps.clone(), MountReason::AfterNavigation).unwrap();
    assert!(matches!(first.resume().await.unwrap(), TurnOutcome::Replied(_)));
    let count = first.messages().unwrap().len();
    drop(first);

    let second = ChatSession::mount(deps, MountReason::AfterNavigation).unwrap();
    assert_eq!(second.resume().await.unwrap(), TurnOutcome::Ignored);
    assert_eq!(second.messages().unwrap().len(), count);
    for kind in DeferredKind::ALL {
        assert!(!state.get_flag(kind).unwrap());
    }
}

#[tokio::test(start_paused = true)]
async fn test_help_prepare_leads_to_highlighted_resources() {
    let state = DurableState::in_memory();
    let router = RecordingRouter::new();
    let deps = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        router.clone(),
        PacingConfig::default(),
    );

    let session = ChatSession::mount(deps.clone(), MountReason::NewSession).unwrap();
    session.send("when is my next test").await.unwrap();
    drop(session);

    let session = ChatSession::mount(deps.clone(), MountReason::AfterNavigation).unwrap();
    let TurnOutcome::Replied(follow_up) = session.resume().await.unwrap() else {
        panic!("expected the test follow-up");
    };
    let follow_up_id = follow_up[0].id;

    let outcome = session.click(follow_up_id, TEST_HELP_PREPARE).await.unwrap();
    let offer_actions = follow_up_actions(&outcome);
    assert_eq!(offer_actions[0], STUDY_MATERIALS_YES);
    let TurnOutcome::Replied(offer) = outcome else {
        unreachable!()
    };

    // The clicked label is echoed and the old buttons are gone
    let messages = session.messages().unwrap();
    assert!(messages.iter().any(|m| m.is_user() && m.text == "Help me prepare"));
    assert!(messages
        .iter()
        .find(|m| m.id == follow_up_id)
        .unwrap()
        .buttons
        .is_empty());

    let outcome = session.click(offer[0].id, STUDY_MATERIALS_YES).await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Navigated {
            path: "/upsc/student/study?tab=resources".to_string()
        }
    );
    assert_eq!(state.highlight_class().unwrap().as_deref(), Some("resource-3"));
    drop(session);

    let session = ChatSession::mount(deps, MountReason::AfterNavigation).unwrap();
    let TurnOutcome::Replied(delivered) = session.resume().await.unwrap() else {
        panic!("expected the resources follow-up");
    };
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].text.starts_with("I've highlighted"));
    assert_eq!(
        router.paths(),
        vec![
            "/upsc/student/study?tab=tests".to_string(),
            "/upsc/student/study?tab=resources".to_string()
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_free_text_reply_is_plain_message() {
    let state = DurableState::in_memory();
    let completion = CountingCompletion::text(MUGHAL_REPLY);
    let router = RecordingRouter::new();
    let deps = deps(&state, completion.clone(), router.clone(), PacingConfig::default());

    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();
    let before = session.messages().unwrap().len();
    let outcome = session.send("Tell me about the Mughal Empire").await.unwrap();

    let TurnOutcome::Replied(replies) = outcome else {
        panic!("expected a plain reply");
    };
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, MUGHAL_REPLY);
    assert_eq!(completion.calls(), 1);
    assert!(router.calls().is_empty());
    assert_eq!(session.messages().unwrap().len(), before + 2);
    assert!(state.pending_navigation().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_reply_from_completion() {
    let state = DurableState::in_memory();
    state.set_stage("college").unwrap();
    let completion = CountingCompletion::text(
        r#"Sure! {"navigate": true, "page": "courses", "message": "Opening your courses now."}"#,
    );
    let router = RecordingRouter::new();
    let deps = deps(&state, completion, router.clone(), PacingConfig::immediate());

    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();
    let outcome = session.send("show me my courses").await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Navigated {
            path: "/college/student/courses".to_string()
        }
    );
    let messages = session.messages().unwrap();
    assert_eq!(messages.last().unwrap().text, "Opening your courses now.");
}

#[tokio::test(start_paused = true)]
async fn test_review_classes_opens_modal() {
    let state = DurableState::in_memory();
    let completion = CountingCompletion::text(MUGHAL_REPLY);
    let deps = deps(
        &state,
        completion.clone(),
        RecordingRouter::new(),
        PacingConfig::default(),
    );

    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();
    let outcome = session.send("I want to review classes").await.unwrap();

    assert_eq!(outcome, TurnOutcome::ModalOpened(Modal::ReviewClasses));
    assert_eq!(session.snapshot().modal, Some(Modal::ReviewClasses));
    assert_eq!(completion.calls(), 0);
    session.close_modal();
    assert!(session.snapshot().modal.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_second_click_on_same_button_is_ignored() {
    let state = DurableState::in_memory();
    let deps = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        RecordingRouter::new(),
        PacingConfig::default(),
    );

    let session = ChatSession::mount(deps.clone(), MountReason::NewSession).unwrap();
    session.send("next test please").await.unwrap();
    drop(session);
    let session = ChatSession::mount(deps, MountReason::AfterNavigation).unwrap();
    let TurnOutcome::Replied(follow_up) = session.resume().await.unwrap() else {
        panic!("expected the test follow-up");
    };
    let id = follow_up[0].id;

    let first = session.click(id, TEST_PREPARED_YES).await.unwrap();
    assert!(matches!(first, TurnOutcome::Replied(_)));
    let count = session.messages().unwrap().len();

    let second = session.click(id, TEST_PREPARED_YES).await.unwrap();
    assert_eq!(second, TurnOutcome::Ignored);
    let other = session.click(id, TEST_HELP_PREPARE).await.unwrap();
    assert_eq!(other, TurnOutcome::Ignored);
    assert_eq!(session.messages().unwrap().len(), count);
}

#[tokio::test(start_paused = true)]
async fn test_send_while_loading_is_rejected() {
    let state = DurableState::in_memory();
    let completion = CountingCompletion::slow(MUGHAL_REPLY, Duration::from_secs(2));
    let deps = deps(
        &state,
        completion.clone(),
        RecordingRouter::new(),
        PacingConfig::default(),
    );
    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();

    let (first, second) = tokio::join!(session.send("first question"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(session.is_loading());
        session.send("second question").await
    });

    assert!(matches!(first.unwrap(), TurnOutcome::Replied(_)));
    assert!(matches!(second, Err(AssistantError::Busy)));
    assert_eq!(completion.calls(), 1);
    assert!(!session.is_loading());
    assert!(!session
        .messages()
        .unwrap()
        .iter()
        .any(|m| m.text == "second question"));
}

#[tokio::test(start_paused = true)]
async fn test_unmount_discards_pending_reply() {
    let state = DurableState::in_memory();
    let completion = CountingCompletion::slow(MUGHAL_REPLY, Duration::from_secs(5));
    let deps = deps(
        &state,
        completion,
        RecordingRouter::new(),
        PacingConfig::default(),
    );
    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();

    let (result, _) = tokio::join!(session.send("Tell me about the Mughals"), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.unmount();
    });

    assert!(matches!(result, Err(AssistantError::Cancelled)));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!session
        .messages()
        .unwrap()
        .iter()
        .any(|m| m.text == MUGHAL_REPLY));
    assert!(!session.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_route_rolls_back() {
    let state = DurableState::in_memory();
    let router = RecordingRouter::rejecting(RouteError::Rejected("page offline".into()));
    let deps = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        router.clone(),
        PacingConfig::default(),
    );
    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();

    let outcome = session.send("when is my next test").await.unwrap();

    let TurnOutcome::Failed(bubble) = outcome else {
        panic!("expected an error bubble");
    };
    assert!(bubble.is_error);
    assert_eq!(router.calls().len(), 1);
    assert_eq!(session.phase().unwrap(), NavPhase::Idle);
    assert!(session.snapshot().overlay.is_none());
    assert!(state.pending_navigation().unwrap().is_none());
    assert!(!state.get_flag(DeferredKind::TestFollowUp).unwrap());
    assert!(!state.take_keep_open().unwrap());

    // The surface accepts input again
    assert!(session.send("next test").await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_hanging_route_times_out() {
    let state = DurableState::in_memory();
    let router = RecordingRouter::hanging(Duration::from_secs(60));
    let deps = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        router,
        PacingConfig::default(),
    );
    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();

    let outcome = session.send("when is my next test").await.unwrap();

    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assert_eq!(session.phase().unwrap(), NavPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_upstream_failure_appends_error_bubble() {
    let state = DurableState::in_memory();
    let deps = deps(
        &state,
        CountingCompletion::failing(429, "Rate limit reached"),
        RecordingRouter::new(),
        PacingConfig::default(),
    );
    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();

    let outcome = session.send("Explain federalism").await.unwrap();

    let TurnOutcome::Failed(bubble) = outcome else {
        panic!("expected an error bubble");
    };
    assert!(bubble.is_error);
    assert!(bubble.text.contains("Rate limit reached"));
    assert!(!session.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_missing_key_reports_configuration() {
    let state = DurableState::in_memory();
    let completion = prep_assistant::OpenAiCompletionClient::new(
        prep_assistant::CompletionConfig::default(),
    )
    .unwrap();
    let deps = prep_assistant::SessionDeps {
        state: state.clone(),
        completion: std::sync::Arc::new(completion),
        router: RecordingRouter::new(),
        pacing: PacingConfig::default(),
    };
    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();

    let outcome = session.send("Explain federalism").await.unwrap();

    let TurnOutcome::Failed(bubble) = outcome else {
        panic!("expected an error bubble");
    };
    assert!(bubble.text.contains("not configured"));
}

#[tokio::test(start_paused = true)]
async fn test_reload_mid_sequence_recovers_navigation() {
    let state = DurableState::in_memory();
    let router = RecordingRouter::new();
    let deps = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        router.clone(),
        PacingConfig::default(),
    );

    let session = ChatSession::mount(deps.clone(), MountReason::NewSession).unwrap();
    let (result, _) = tokio::join!(session.send("when is my next test"), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        session.unmount();
    });
    assert!(matches!(result, Err(AssistantError::Cancelled)));
    assert!(router.calls().is_empty());
    assert!(state.pending_navigation().unwrap().is_some());
    drop(session);

    // Page reload: the pending record is still there
    let session = ChatSession::mount(deps.clone(), MountReason::NewSession).unwrap();
    assert!(session.messages().unwrap().is_empty());
    let outcome = session.resume().await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Navigated {
            path: "/upsc/student/study?tab=tests".to_string()
        }
    );
    assert_eq!(router.calls().len(), 1);
    drop(session);

    let session = ChatSession::mount(deps, MountReason::AfterNavigation).unwrap();
    let outcome = session.resume().await.unwrap();
    assert_eq!(follow_up_actions(&outcome).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_recovery_clears_follow_up_flag() {
    let state = DurableState::in_memory();
    let first = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        RecordingRouter::new(),
        PacingConfig::default(),
    );

    let session = ChatSession::mount(first, MountReason::NewSession).unwrap();
    let (result, _) = tokio::join!(session.send("when is my next test"), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        session.unmount();
    });
    assert!(matches!(result, Err(AssistantError::Cancelled)));
    drop(session);

    // Reload, but the route change is refused this time
    let rejecting = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        RecordingRouter::rejecting(RouteError::Rejected("blocked".into())),
        PacingConfig::default(),
    );
    let session = ChatSession::mount(rejecting.clone(), MountReason::NewSession).unwrap();
    let outcome = session.resume().await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Failed(ref m) if m.is_error));
    assert!(state.pending_navigation().unwrap().is_none());
    assert!(!state.get_flag(DeferredKind::TestFollowUp).unwrap());
    drop(session);

    // No stale follow-up on the next mount
    let session = ChatSession::mount(rejecting, MountReason::AfterNavigation).unwrap();
    assert_eq!(session.resume().await.unwrap(), TurnOutcome::Ignored);
    assert!(session.messages().unwrap().iter().all(|m| m.is_user() || m.is_error));
}

#[tokio::test(start_paused = true)]
async fn test_storage_failure_mid_sequence_rolls_back() {
    let state = DurableState::new(FailingWriteStore::new("assistant.keepOpen"));
    let router = RecordingRouter::new();
    let deps = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        router.clone(),
        PacingConfig::immediate(),
    );
    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();

    let outcome = session.send("when is my next test").await.unwrap();

    let TurnOutcome::Failed(bubble) = outcome else {
        panic!("expected an error bubble");
    };
    assert!(bubble.is_error);
    assert!(router.calls().is_empty());
    assert_eq!(session.phase().unwrap(), NavPhase::Idle);
    assert!(session.snapshot().overlay.is_none());
    assert!(!session.is_loading());
    assert!(state.pending_navigation().unwrap().is_none());
    assert!(!state.get_flag(DeferredKind::TestFollowUp).unwrap());

    // The surface accepts input again
    let outcome = session.send("hello").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Replied(_)));
}

#[tokio::test(start_paused = true)]
async fn test_clear_empties_log_and_store() {
    let state = DurableState::in_memory();
    let deps = deps(
        &state,
        CountingCompletion::text(MUGHAL_REPLY),
        RecordingRouter::new(),
        PacingConfig::immediate(),
    );
    let session = ChatSession::mount(deps, MountReason::NewSession).unwrap();
    session.send("hello").await.unwrap();

    session.clear().unwrap();

    assert!(session.messages().unwrap().is_empty());
    assert!(state.conversation_json().unwrap().map_or(true, |raw| raw == "[]"));
}
