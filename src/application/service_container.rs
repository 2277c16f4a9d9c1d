//! サービスコンテナ
//!
//! # 責任
//! - 全ての依存関係の構築と管理（プロセス起動時に一度だけ）
//! - コンポーネント間の依存関係の解決
//! - テスト時のモック注入サポート
//!
//! 依存グラフは明示的に構築して参照で渡す。プロセス全体の遅延初期化
//! レジストリのような暗黙のグローバル状態は持たない。

use std::cell::RefCell;
use std::rc::Rc;

use crate::application::command_handler::CommandHandler;
use crate::application::playback_coordinator::{PlaybackConfig, PlaybackCoordinator};
use crate::application::session::Session;
use crate::application::traits::TranscriptionClient;
use crate::application::transcription_orchestrator::{
    TranscriptionConfig, TranscriptionOrchestrator,
};
use crate::domain::recorder::Recorder;
use crate::error::Result;
use crate::infrastructure::audio::{
    CaptureBackend, CpalCaptureBackend, CpalPlayerBackend, FallbackPlayerBackend, PlaybackBackend,
};
use crate::infrastructure::external::GoogleSpeechAdapter;

/// アプリケーション設定
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// 転写サイクル設定
    pub transcription: TranscriptionConfig,
    /// 再生設定
    pub playback: PlaybackConfig,
    /// 最大録音時間（秒）
    pub max_duration_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transcription: TranscriptionConfig::default(),
            playback: PlaybackConfig::default(),
            max_duration_secs: std::env::var("SPEECH_TRANSCRIBER_MAX_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// サービスコンテナ
pub struct ServiceContainer<T: CaptureBackend + 'static> {
    /// コマンドハンドラー
    pub command_handler: Rc<CommandHandler<T>>,
    /// セッション状態（スナップショット参照用）
    pub session: Rc<RefCell<Session>>,
}

impl ServiceContainer<CpalCaptureBackend> {
    /// デフォルト設定で新しいServiceContainerを作成
    pub fn new() -> Result<Self> {
        Self::with_dependencies(
            AppConfig::default(),
            CpalCaptureBackend::default(),
            Rc::new(GoogleSpeechAdapter::new()?),
            Rc::new(CpalPlayerBackend::default()),
            Rc::new(FallbackPlayerBackend::default()),
        )
    }
}

impl<T: CaptureBackend + 'static> ServiceContainer<T> {
    /// 依存関係を注入して作成（テスト用）
    pub fn with_dependencies(
        config: AppConfig,
        capture_backend: T,
        transcription_client: Rc<dyn TranscriptionClient>,
        primary_playback: Rc<dyn PlaybackBackend>,
        fallback_playback: Rc<dyn PlaybackBackend>,
    ) -> Result<Self> {
        let session = Rc::new(RefCell::new(Session::new()));
        let recorder = Rc::new(Recorder::new(capture_backend));

        let orchestrator = Rc::new(TranscriptionOrchestrator::new(
            recorder,
            transcription_client,
            session.clone(),
            config.transcription.clone(),
        ));

        let coordinator = Rc::new(PlaybackCoordinator::new(
            primary_playback,
            fallback_playback,
            session.clone(),
            config.playback.clone(),
        ));

        let command_handler = Rc::new(CommandHandler::new(
            orchestrator,
            coordinator,
            session.clone(),
            config.max_duration_secs,
        ));

        Ok(ServiceContainer {
            command_handler,
            session,
        })
    }
}

/// テスト用のヘルパー実装
pub mod test_helpers {
    use super::*;
    use crate::domain::transcript::{TranscribedWord, WordAlternative, WordSegment};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// テスト用のモックキャプチャバックエンド
    pub struct MockCaptureBackend {
        pub is_capturing: Arc<AtomicBool>,
        pub bytes: Vec<u8>,
    }

    impl Default for MockCaptureBackend {
        fn default() -> Self {
            Self {
                is_capturing: Arc::new(AtomicBool::new(false)),
                bytes: vec![0u8; 4_000],
            }
        }
    }

    impl MockCaptureBackend {
        pub fn with_bytes(bytes: Vec<u8>) -> Self {
            Self {
                is_capturing: Arc::new(AtomicBool::new(false)),
                bytes,
            }
        }
    }

    impl CaptureBackend for MockCaptureBackend {
        fn start_capture(&self) -> std::result::Result<(), Box<dyn std::error::Error>> {
            self.is_capturing.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop_capture(&self) -> std::result::Result<PathBuf, Box<dyn std::error::Error>> {
            self.is_capturing.store(false, Ordering::SeqCst);
            Ok(PathBuf::from("/tmp/recording_test.wav"))
        }

        fn read_bytes(
            &self,
            _path: &Path,
        ) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
            Ok(self.bytes.clone())
        }

        fn is_capturing(&self) -> bool {
            self.is_capturing.load(Ordering::SeqCst)
        }
    }

    /// テスト用のモック転写クライアント
    pub struct MockTranscriptionClient {
        pub segments: Vec<WordSegment>,
    }

    impl MockTranscriptionClient {
        pub fn new(segments: Vec<WordSegment>) -> Self {
            Self { segments }
        }

        /// "hi"/"there" の 2 セグメントを返すクライアント
        pub fn two_words() -> Self {
            Self::new(vec![
                WordSegment {
                    alternatives: vec![WordAlternative {
                        words: vec![TranscribedWord::new("hi", 0.0, 0.5)],
                    }],
                },
                WordSegment {
                    alternatives: vec![WordAlternative {
                        words: vec![TranscribedWord::new("there", 0.6, 1.0)],
                    }],
                },
            ])
        }
    }

    #[async_trait(?Send)]
    impl TranscriptionClient for MockTranscriptionClient {
        async fn transcribe(
            &self,
            _audio: &[u8],
            _sample_rate_hz: u32,
        ) -> Result<Vec<WordSegment>> {
            Ok(self.segments.clone())
        }
    }

    /// テスト用のモック再生バックエンド。サンプル列を順に返し、尽きると自然終了する。
    pub struct MockPlaybackBackend {
        pub fail_start: bool,
        playing: AtomicBool,
        pub start_calls: AtomicUsize,
        times: Mutex<Vec<f64>>,
        error: Mutex<Option<String>>,
    }

    impl MockPlaybackBackend {
        pub fn with_times(times: Vec<f64>) -> Self {
            Self {
                fail_start: false,
                playing: AtomicBool::new(false),
                start_calls: AtomicUsize::new(0),
                times: Mutex::new(times),
                error: Mutex::new(None),
            }
        }

        pub fn failing_start() -> Self {
            Self {
                fail_start: true,
                ..Self::with_times(Vec::new())
            }
        }

        pub fn inject_error(&self, message: &str) {
            *self.error.lock().unwrap() = Some(message.to_string());
        }
    }

    impl PlaybackBackend for MockPlaybackBackend {
        fn start_playback(
            &self,
            _path: &Path,
        ) -> std::result::Result<(), Box<dyn std::error::Error>> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err("mock start failure".into());
            }
            self.playing.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn current_time(&self) -> f64 {
            let mut times = self.times.lock().unwrap();
            if times.is_empty() {
                self.playing.store(false, Ordering::SeqCst);
                return 0.0;
            }
            let time = times.remove(0);
            if times.is_empty() {
                self.playing.store(false, Ordering::SeqCst);
            }
            time
        }

        fn is_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }

        fn take_error(&self) -> Option<String> {
            self.error.lock().unwrap().take()
        }

        fn stop(&self) {
            self.playing.store(false, Ordering::SeqCst);
        }
    }

    /// テスト用のServiceContainerビルダー
    pub struct TestServiceContainerBuilder {
        config: AppConfig,
        capture_bytes: Vec<u8>,
        segments: Vec<WordSegment>,
        playback_times: Vec<f64>,
    }

    impl TestServiceContainerBuilder {
        pub fn new() -> Self {
            Self {
                config: AppConfig::default(),
                capture_bytes: vec![0u8; 4_000],
                segments: MockTranscriptionClient::two_words().segments,
                playback_times: vec![0.1, 0.3, 0.7, 0.9],
            }
        }

        pub fn with_config(mut self, config: AppConfig) -> Self {
            self.config = config;
            self
        }

        pub fn with_capture_bytes(mut self, bytes: Vec<u8>) -> Self {
            self.capture_bytes = bytes;
            self
        }

        pub fn with_segments(mut self, segments: Vec<WordSegment>) -> Self {
            self.segments = segments;
            self
        }

        pub fn with_playback_times(mut self, times: Vec<f64>) -> Self {
            self.playback_times = times;
            self
        }

        pub fn build(self) -> Result<ServiceContainer<MockCaptureBackend>> {
            ServiceContainer::with_dependencies(
                self.config,
                MockCaptureBackend::with_bytes(self.capture_bytes),
                Rc::new(MockTranscriptionClient::new(self.segments)),
                Rc::new(MockPlaybackBackend::with_times(self.playback_times)),
                Rc::new(MockPlaybackBackend::with_times(Vec::new())),
            )
        }
    }

    impl Default for TestServiceContainerBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
