use super::*;
use crate::{events::SelectionSlot, loopback::LoopbackBackend};
use shared::domain::Channel;
use std::time::Duration;

fn settings() -> PanelSettings {
    PanelSettings {
        leave_retry_attempts: 1,
        leave_retry_delay_ms: 100,
        ..PanelSettings::default()
    }
}

fn controls(backend: &Arc<LoopbackBackend>) -> (SessionControls, broadcast::Receiver<PanelEvent>) {
    let (events, rx) = broadcast::channel(16);
    (
        SessionControls::new(Arc::clone(backend) as Arc<dyn VoiceBackend>, settings(), events),
        rx,
    )
}

fn selection() -> JoinSelection {
    JoinSelection {
        ch1: ChannelId::new("A"),
        ch2: ChannelId::new("B"),
        sub_ch: ChannelId::new("A"),
    }
}

fn loaded_picker(slot: SelectionSlot) -> ChannelPicker {
    let mut picker = ChannelPicker::new(slot);
    picker.set_channels(&[Channel::new("A", "General"), Channel::new("B", "Music")]);
    picker
}

#[test]
fn selection_requires_loaded_pickers() {
    let track1 = loaded_picker(SelectionSlot::Track1Source);
    let track2 = loaded_picker(SelectionSlot::Track2Source);
    let listener = ChannelPicker::new(SelectionSlot::Listener);

    assert!(matches!(
        JoinSelection::from_pickers(&track1, &track2, &listener),
        Err(PanelError::ChannelsNotLoaded)
    ));

    let listener = loaded_picker(SelectionSlot::Listener);
    let selection = JoinSelection::from_pickers(&track1, &track2, &listener).expect("loaded");
    assert_eq!(selection.ch1, ChannelId::new("A"));
    assert_eq!(selection.sub_ch, ChannelId::new("A"));
}

#[tokio::test]
async fn join_records_session_state() {
    let backend = Arc::new(LoopbackBackend::new(vec![
        Channel::new("A", "General"),
        Channel::new("B", "Music"),
    ]));
    let (mut controls, mut events) = controls(&backend);

    controls.join(selection()).await.expect("join");

    assert_eq!(controls.state(), &SessionState::Joined(selection()));
    assert_eq!(backend.joined().await, Some(selection()));
    assert_eq!(
        events.recv().await.expect("event"),
        PanelEvent::SessionJoined {
            ch1: ChannelId::new("A"),
            ch2: ChannelId::new("B"),
            sub_ch: ChannelId::new("A"),
        }
    );
}

#[tokio::test]
async fn rejected_join_stays_idle() {
    let backend = Arc::new(LoopbackBackend::new(vec![Channel::new("A", "General")]));
    let (mut controls, mut events) = controls(&backend);

    let err = controls.join(selection()).await.expect_err("B is unknown");
    assert!(matches!(err, PanelError::Rejected { command: "join", .. }));
    assert_eq!(controls.state(), &SessionState::Idle);
    assert!(matches!(
        events.recv().await.expect("event"),
        PanelEvent::OperationFailed {
            operation: PanelOperation::Join,
            ..
        }
    ));
}

#[tokio::test]
async fn acknowledged_leave_bumps_reset_token() {
    let backend = Arc::new(LoopbackBackend::new(vec![
        Channel::new("A", "General"),
        Channel::new("B", "Music"),
    ]));
    let (mut controls, _events) = controls(&backend);
    let mut reset = controls.reset_token();
    controls.join(selection()).await.expect("join");

    controls.leave().await.expect("leave");

    assert!(reset.has_changed().expect("sender alive"));
    assert_eq!(*reset.borrow_and_update(), 1);
    assert_eq!(controls.state(), &SessionState::Idle);
    assert!(backend.joined().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn leave_retries_transient_failure() {
    let backend = Arc::new(LoopbackBackend::new(vec![Channel::new("A", "General")]));
    let (mut controls, _events) = controls(&backend);
    let reset = controls.reset_token();
    backend.fail_next("leave").await;

    let started = tokio::time::Instant::now();
    controls.leave().await.expect("second attempt succeeds");

    assert_eq!(backend.count_requests("leave").await, 2);
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(reset.has_changed().expect("sender alive"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_leave_keeps_rosters_and_reports_failure() {
    let backend = Arc::new(LoopbackBackend::new(vec![
        Channel::new("A", "General"),
        Channel::new("B", "Music"),
    ]));
    let (mut controls, mut events) = controls(&backend);
    let reset = controls.reset_token();
    controls.join(selection()).await.expect("join");
    let _ = events.recv().await;

    backend.fail_times("leave", 2).await;

    let err = controls.leave().await.expect_err("both attempts fail");

    assert!(matches!(err, PanelError::Backend(_)));
    assert_eq!(backend.count_requests("leave").await, 2);
    assert!(!reset.has_changed().expect("sender alive"));
    assert!(matches!(controls.state(), SessionState::Joined(_)));
    assert!(matches!(
        events.recv().await.expect("event"),
        PanelEvent::OperationFailed {
            operation: PanelOperation::Leave,
            ..
        }
    ));
}
