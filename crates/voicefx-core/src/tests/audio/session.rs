use crate::{
    AudioError, DEFAULT_MAX_DURATION, PALETTE, RecordingSession, SessionPhase,
    tests::fakes::{FAKE_MEDIA_TYPE, FakeCaptureDevice, FakeStream},
};

use std::{sync::Arc, time::Duration};

const SHORT_LIMIT: Duration = Duration::from_millis(100);

fn session_with(device: &FakeCaptureDevice) -> RecordingSession<FakeCaptureDevice> {
    RecordingSession::new(Arc::new(device.clone()))
}

/// WHAT: Stopping a recording delivers the chunks concatenated in order
/// WHY: The blob must be a valid container, so chunk order matters
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_active_recording_when_stopped_then_recording_contains_chunks_in_order() {
    // Given: A device that emits three chunks on stop
    let device = FakeCaptureDevice::with_chunks(&[b"RIFF", b"-body-", b"end"]);
    let session = session_with(&device);
    let pending = session.start_recording(DEFAULT_MAX_DURATION).await.unwrap();
    assert!(session.is_recording());

    // When: Stopping the recording
    session.stop_recording();
    let recording = pending.recv().await.unwrap();

    // Then: Data, media type and identity are populated
    assert_eq!(recording.audio_data(), b"RIFF-body-end");
    assert_eq!(recording.media_type(), FAKE_MEDIA_TYPE);
    assert_eq!(recording.id().get(), 1);
    assert_eq!(recording.color(), PALETTE[0]);
    assert!(!session.is_recording());
    assert_eq!(session.phase(), SessionPhase::Idle);
}

/// WHAT: Starting while a recording is active is rejected
/// WHY: Only one capture may exist per session
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_active_recording_when_starting_again_then_already_recording_error() {
    // Given: An active recording
    let device = FakeCaptureDevice::with_chunks(&[b"data"]);
    let session = session_with(&device);
    let pending = session.start_recording(DEFAULT_MAX_DURATION).await.unwrap();

    // When: Starting a second recording
    let result = session.start_recording(DEFAULT_MAX_DURATION).await;

    // Then: Rejected, and the first recording is unaffected
    assert!(matches!(result, Err(AudioError::AlreadyRecording { .. })));
    assert!(session.is_recording());
    assert_eq!(device.begin_calls(), 1);

    session.stop_recording();
    let recording = pending.recv().await.unwrap();
    assert_eq!(recording.audio_data(), b"data");
}

/// WHAT: Stop without an active recording does nothing
/// WHY: Callers may stop unconditionally
#[tokio::test(start_paused = true)]
async fn given_idle_session_when_stopping_then_no_op() {
    // Given: An idle session
    let device = FakeCaptureDevice::new();
    let session = session_with(&device);

    // When: Stopping
    session.stop_recording();

    // Then: The device was never asked to end a capture
    assert_eq!(device.end_calls(), 0);
    assert_eq!(session.phase(), SessionPhase::Idle);
}

/// WHAT: A second stop is ignored
/// WHY: Stop must be idempotent and produce one recording
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_stopped_recording_when_stopping_twice_then_single_end_capture() {
    // Given: An active recording
    let device = FakeCaptureDevice::with_chunks(&[b"abc"]);
    let session = session_with(&device);
    let pending = session.start_recording(DEFAULT_MAX_DURATION).await.unwrap();

    // When: Stopping twice
    session.stop_recording();
    session.stop_recording();
    let recording = pending.recv().await.unwrap();

    // Then: Capture ended once and one recording was delivered
    assert_eq!(device.end_calls(), 1);
    assert_eq!(recording.audio_data(), b"abc");
}

/// WHAT: Recording stops on its own at the default maximum duration
/// WHY: Unattended recordings must not grow forever
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_default_limit_when_15_seconds_elapse_then_recording_auto_stops() {
    // Given: A recording with the default 15000ms limit
    let device = FakeCaptureDevice::with_chunks(&[b"clip"]);
    let session = session_with(&device);
    let pending = session.start_recording(DEFAULT_MAX_DURATION).await.unwrap();

    // When: Time advances to just before the limit
    tokio::time::sleep(Duration::from_millis(14_999)).await;

    // Then: Still recording
    assert!(session.is_recording());
    assert_eq!(device.end_calls(), 0);

    // When: The limit is reached
    let recording = pending.recv().await.unwrap();

    // Then: The recording is delivered without an explicit stop
    assert_eq!(device.end_calls(), 1);
    assert_eq!(recording.audio_data(), b"clip");
    assert!(recording.duration() >= DEFAULT_MAX_DURATION);
    assert_eq!(session.phase(), SessionPhase::Idle);
}

/// WHAT: Explicit stop racing the timer still yields one recording
/// WHY: Both stop paths converge; the callback must fire exactly once
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_timer_due_when_stop_called_at_same_instant_then_exactly_one_end_capture() {
    // Given: A recording whose limit is about to expire
    let device = FakeCaptureDevice::with_chunks(&[b"x"]);
    let session = session_with(&device);
    let pending = session.start_recording(SHORT_LIMIT).await.unwrap();

    // When: Stopping at the instant the timer fires
    tokio::time::sleep(SHORT_LIMIT).await;
    session.stop_recording();
    let recording = pending.recv().await.unwrap();

    // Then: Exactly one stop reached the device
    tokio::time::sleep(SHORT_LIMIT).await;
    assert_eq!(device.end_calls(), 1);
    assert_eq!(recording.audio_data(), b"x");
}

/// WHAT: Stopping early cancels the pending timer
/// WHY: A stale timer must not stop the next recording
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_early_stop_when_next_recording_runs_past_old_deadline_then_not_stopped() {
    // Given: A first recording stopped well before its limit
    let device = FakeCaptureDevice::with_chunks(&[b"a"]);
    let session = session_with(&device);
    let first = session.start_recording(SHORT_LIMIT).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    session.stop_recording();
    first.recv().await.unwrap();

    // When: A second, longer recording passes the first deadline
    let _second = session
        .start_recording(Duration::from_secs(10))
        .await
        .unwrap();
    tokio::time::sleep(SHORT_LIMIT * 2).await;

    // Then: The second recording is still running
    assert!(session.is_recording());
    assert_eq!(device.end_calls(), 1);
}

/// WHAT: Denied permission surfaces as a recoverable error
/// WHY: The user may grant access and try again
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_denied_permission_when_starting_then_error_and_idle_and_retry_succeeds() {
    // Given: A device refusing access
    let device = FakeCaptureDevice::with_chunks(&[b"ok"]);
    device.deny_permission(true);
    let session = session_with(&device);

    // When: Starting a recording
    let result = session.start_recording(DEFAULT_MAX_DURATION).await;

    // Then: Permission error, session idle, no stream held
    let err = result.unwrap_err();
    assert!(matches!(err, AudioError::PermissionDenied { .. }));
    assert!(err.is_recoverable());
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert!(!session.has_stream());

    // When: Access is granted and the user retries
    device.deny_permission(false);
    let pending = session.start_recording(DEFAULT_MAX_DURATION).await.unwrap();
    session.stop_recording();

    // Then: The retry records normally
    assert_eq!(pending.recv().await.unwrap().audio_data(), b"ok");
}

/// WHAT: Zero maximum duration is rejected
/// WHY: A zero timer would stop the capture before it starts
#[tokio::test(start_paused = true)]
async fn given_zero_duration_when_starting_then_invalid_duration_error() {
    // Given: An idle session
    let device = FakeCaptureDevice::new();
    let session = session_with(&device);

    // When: Starting with a zero limit
    let result = session.start_recording(Duration::ZERO).await;

    // Then: Rejected before touching the device
    assert!(matches!(
        result,
        Err(AudioError::InvalidDuration { duration_ms: 0, .. })
    ));
    assert_eq!(device.acquire_calls(), 0);
}

/// WHAT: A start issued while the permission prompt is open is rejected
/// WHY: Two concurrent starts must not both acquire a capture
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_permission_prompt_open_when_second_start_then_rejected() {
    // Given: A device whose permission prompt takes a while
    let device = FakeCaptureDevice::with_chunks(&[b"one"]);
    device.set_prompt_delay(Duration::from_millis(50));
    let session = session_with(&device);

    // When: A second start arrives during the prompt
    let (first, second) = tokio::join!(session.start_recording(DEFAULT_MAX_DURATION), async {
        tokio::task::yield_now().await;
        session.start_recording(DEFAULT_MAX_DURATION).await
    });

    // Then: Only the first start succeeds
    let pending = first.unwrap();
    assert!(matches!(second, Err(AudioError::AlreadyRecording { .. })));
    assert_eq!(device.begin_calls(), 1);

    session.stop_recording();
    assert_eq!(pending.recv().await.unwrap().audio_data(), b"one");
}

/// WHAT: An explicit permission request keeps the stream for later recordings
/// WHY: The platform should prompt only once
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_permission_granted_when_recording_twice_then_stream_acquired_once() {
    // Given: Permission requested up front
    let device = FakeCaptureDevice::with_chunks(&[b"c"]);
    let session = session_with(&device);
    session.request_permission().await.unwrap();
    assert_eq!(session.stream(), Some(FakeStream(1)));

    // When: Recording twice
    for _ in 0..2 {
        let pending = session.start_recording(DEFAULT_MAX_DURATION).await.unwrap();
        session.stop_recording();
        pending.recv().await.unwrap();
    }

    // Then: The stream was acquired only once
    assert_eq!(device.acquire_calls(), 1);
    assert_eq!(device.begin_calls(), 2);
}

/// WHAT: Consecutive recordings get increasing ids and successive colors
/// WHY: Recordings must be distinguishable in a list
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_sequential_recordings_when_finalized_then_ids_increase_and_colors_cycle() {
    // Given: A session
    let device = FakeCaptureDevice::with_chunks(&[b"v"]);
    let session = session_with(&device);

    // When: Recording three times
    let mut recordings = Vec::new();
    for _ in 0..3 {
        let pending = session.start_recording(DEFAULT_MAX_DURATION).await.unwrap();
        let session_id = pending.session_id();
        session.stop_recording();
        let recording = pending.recv().await.unwrap();
        assert_eq!(recording.session_id(), session_id);
        recordings.push(recording);
    }

    // Then: Ids count up and colors follow the palette
    let ids: Vec<u64> = recordings.iter().map(|r| r.id().get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    for (recording, expected) in recordings.iter().zip(PALETTE.iter()) {
        assert_eq!(recording.color(), *expected);
    }
}

/// WHAT: A capture with no chunks still delivers a recording
/// WHY: Emptiness is reported downstream as a decode failure, not lost
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_device_without_chunks_when_stopped_then_empty_recording_delivered() {
    // Given: A device producing no audio
    let device = FakeCaptureDevice::new();
    let session = session_with(&device);
    let pending = session.start_recording(DEFAULT_MAX_DURATION).await.unwrap();

    // When: Stopping
    session.stop_recording();

    // Then: An empty recording arrives
    let recording = pending.recv().await.unwrap();
    assert!(recording.audio_data().is_empty());
}

/// WHAT: Dropping the session ends the active capture
/// WHY: Teardown must release the microphone
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_active_recording_when_session_dropped_then_capture_ended() {
    // Given: An active recording
    let device = FakeCaptureDevice::with_chunks(&[b"bye"]);
    let session = session_with(&device);
    let pending = session.start_recording(DEFAULT_MAX_DURATION).await.unwrap();

    // When: The session is dropped
    drop(session);

    // Then: The capture was ended and the clip still delivered
    assert_eq!(device.end_calls(), 1);
    assert_eq!(pending.recv().await.unwrap().audio_data(), b"bye");
}
