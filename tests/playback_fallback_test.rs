//! 再生フォールバック経路のハンドラレベル検証（モック依存）

use std::rc::Rc;

use speech_transcriber::application::service_container::test_helpers::*;
use speech_transcriber::application::{
    AppConfig, PlaybackConfig, RecordingState, ServiceContainer, TranscriptionConfig,
};
use speech_transcriber::error::AppError;
use speech_transcriber::ipc::IpcCmd;
use tokio::task::LocalSet;
use tokio::time::Duration;

fn fast_config() -> AppConfig {
    AppConfig {
        transcription: TranscriptionConfig::default(),
        playback: PlaybackConfig {
            tick: Duration::from_millis(10),
        },
        max_duration_secs: 30,
    }
}

fn container_with_playback(
    primary: Rc<MockPlaybackBackend>,
    fallback: Rc<MockPlaybackBackend>,
) -> ServiceContainer<MockCaptureBackend> {
    ServiceContainer::with_dependencies(
        fast_config(),
        MockCaptureBackend::default(),
        Rc::new(MockTranscriptionClient::two_words()),
        primary,
        fallback,
    )
    .unwrap()
}

/// プライマリ開始失敗時はフォールバックで再生が続行される
#[tokio::test]
async fn fallback_keeps_playback_alive() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let primary = Rc::new(MockPlaybackBackend::failing_start());
            let fallback = Rc::new(MockPlaybackBackend::with_times(vec![0.1, 0.7]));
            let container = container_with_playback(primary.clone(), fallback.clone());
            let handler = container.command_handler.clone();

            handler.handle(IpcCmd::StartRecording).await.unwrap();
            handler.handle(IpcCmd::StopRecording).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;

            let resp = handler.handle(IpcCmd::StartPlayback).await.unwrap();
            assert!(resp.ok);
            assert_eq!(container.session.borrow().state(), &RecordingState::Playing);

            tokio::time::sleep(Duration::from_millis(80)).await;
            assert_eq!(container.session.borrow().state(), &RecordingState::Idle);
        })
        .await;
}

/// 両経路の開始失敗は PlaybackFailed として表面化し Error 状態になる
#[tokio::test]
async fn double_start_failure_surfaces_error() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let primary = Rc::new(MockPlaybackBackend::failing_start());
            let fallback = Rc::new(MockPlaybackBackend::failing_start());
            let container = container_with_playback(primary.clone(), fallback.clone());
            let handler = container.command_handler.clone();

            handler.handle(IpcCmd::StartRecording).await.unwrap();
            handler.handle(IpcCmd::StopRecording).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;

            let err = handler.handle(IpcCmd::StartPlayback).await.unwrap_err();
            assert!(matches!(err, AppError::PlaybackFailed(_)));

            let session = container.session.borrow();
            assert!(
                matches!(session.state(), RecordingState::Error(m) if m.starts_with("Playback failed:"))
            );
            drop(session);

            // Error からは dismiss でのみ復帰できる
            let resp = handler.handle(IpcCmd::Dismiss).await.unwrap();
            assert!(resp.ok);
            assert_eq!(container.session.borrow().state(), &RecordingState::Idle);
        })
        .await;
}

/// 再生中の実行時エラーはフォールバックに切り替わる
#[tokio::test]
async fn runtime_error_switches_to_fallback() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let primary = Rc::new(MockPlaybackBackend::with_times(vec![0.1; 50]));
            let fallback = Rc::new(MockPlaybackBackend::with_times(vec![0.2, 0.7]));
            let container = container_with_playback(primary.clone(), fallback.clone());
            let handler = container.command_handler.clone();

            handler.handle(IpcCmd::StartRecording).await.unwrap();
            handler.handle(IpcCmd::StopRecording).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;

            handler.handle(IpcCmd::StartPlayback).await.unwrap();
            primary.inject_error("device disconnected");

            tokio::time::sleep(Duration::from_millis(80)).await;

            // フォールバックが 1 回だけ起動し、その自然終了で Idle に戻る
            assert_eq!(
                fallback.start_calls.load(std::sync::atomic::Ordering::SeqCst),
                1
            );
            assert_eq!(container.session.borrow().state(), &RecordingState::Idle);
        })
        .await;
}
