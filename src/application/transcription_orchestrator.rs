//! 転写オーケストレータ
//!
//! # 責任
//! - 録音停止 → バイト読み込み → 転写（タイムアウト付き）→ 平坦化 の逐次実行
//! - コラボレータの失敗をドメインエラーへ写像
//! - サイクル ID による古い結果の破棄
//! - チェーン前後のステートマシン遷移
//!
//! 1 サイクルは完走するまで次のサイクルを開始できない。これは内部ロック
//! ではなく遷移表（Recording 状態からのみ StopRecording が合法）で強制する。

#![allow(clippy::await_holding_refcell_ref)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::sync::oneshot;
use tokio::task::spawn_local;
use tokio::time::Duration;

use crate::application::session::Session;
use crate::application::state_machine::StateEvent;
use crate::application::traits::TranscriptionClient;
use crate::domain::recorder::Recorder;
use crate::domain::transcript::{TranscribedWord, flatten_segments};
use crate::error::{AppError, Result};
use crate::infrastructure::audio::CaptureBackend;
use crate::utils::profiling;

/// 転写サイクルのタイムアウトメッセージ（そのままユーザーへ表示される）
const TIMEOUT_MESSAGE: &str = "Transcription timed out. Please try again.";

/// 転写サイクル設定
#[derive(Clone, Debug)]
pub struct TranscriptionConfig {
    /// 認識サービスへ渡すサンプルレート（固定プロファイル）
    pub sample_rate_hz: u32,
    /// これ未満のバイト数は録音失敗とみなす
    pub min_audio_bytes: usize,
    /// 転写ステップのタイムアウト
    pub timeout: Duration,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            min_audio_bytes: 1_000,
            timeout: Duration::from_secs(30),
        }
    }
}

/// 転写オーケストレータ
pub struct TranscriptionOrchestrator<T: CaptureBackend> {
    recorder: Rc<Recorder<T>>,
    client: Rc<dyn TranscriptionClient>,
    session: Rc<RefCell<Session>>,
    config: TranscriptionConfig,
    /// 単調増加のサイクル ID 採番
    cycle_counter: Cell<u64>,
    /// 現在有効なサイクル ID（これ以外の結果は古いものとして破棄）
    current_cycle: Cell<u64>,
}

impl<T: CaptureBackend> TranscriptionOrchestrator<T> {
    /// 依存を注入して新しいオーケストレータを作成
    pub fn new(
        recorder: Rc<Recorder<T>>,
        client: Rc<dyn TranscriptionClient>,
        session: Rc<RefCell<Session>>,
        config: TranscriptionConfig,
    ) -> Self {
        Self {
            recorder,
            client,
            session,
            config,
            cycle_counter: Cell::new(0),
            current_cycle: Cell::new(0),
        }
    }

    /// 設定を取得
    pub fn config(&self) -> &TranscriptionConfig {
        &self.config
    }

    /// 録音を開始する。
    ///
    /// Idle 以外からの要求は遷移表で拒否され、何もせず `false` を返す。
    /// 開始成功時は前回の転写結果とハイライトを消去する。
    pub fn start_recording(&self) -> Result<bool> {
        if !self.session.borrow_mut().apply(StateEvent::StartRecording) {
            return Ok(false);
        }

        match self.recorder.start() {
            Ok(()) => {
                let mut session = self.session.borrow_mut();
                session.apply(StateEvent::CaptureStarted);
                session.clear_transcript();
                Ok(true)
            }
            Err(e) => {
                let err = AppError::RecordingFailed(e.to_string());
                self.session
                    .borrow_mut()
                    .apply(StateEvent::Fail(err.user_message()));
                Err(err)
            }
        }
    }

    /// 1 回の録音サイクル（停止 → 読込 → 転写 → 平坦化）を実行する。
    ///
    /// 成功時はセッションの転写結果を丸ごと差し替えて単語列を返す。
    /// Recording 以外からの要求は無視される。サイクルが無効化されていた
    /// 場合、結果は捨てられセッションには触れない。
    pub async fn run_recording_cycle(&self) -> Result<Vec<TranscribedWord>> {
        let cycle = self.begin_cycle();

        if !self.session.borrow_mut().apply(StateEvent::StopRecording) {
            return Ok(Vec::new());
        }

        match self.execute_cycle().await {
            Ok(words) => {
                if !self.is_current(cycle) {
                    eprintln!("discarding stale transcription result (cycle {cycle})");
                    return Ok(Vec::new());
                }
                let mut session = self.session.borrow_mut();
                session.replace_transcript(words.clone());
                session.apply(StateEvent::CycleCompleted);
                Ok(words)
            }
            Err(err) => {
                if self.is_current(cycle) {
                    self.session
                        .borrow_mut()
                        .apply(StateEvent::Fail(err.user_message()));
                }
                Err(err)
            }
        }
    }

    /// 進行中サイクルの結果を無効化する（エラー解除や再起動時）。
    pub fn invalidate_pending(&self) {
        let next = self.cycle_counter.get() + 1;
        self.cycle_counter.set(next);
        self.current_cycle.set(next);
    }

    fn begin_cycle(&self) -> u64 {
        let next = self.cycle_counter.get() + 1;
        self.cycle_counter.set(next);
        self.current_cycle.set(next);
        next
    }

    fn is_current(&self, cycle: u64) -> bool {
        self.current_cycle.get() == cycle
    }

    /// サイクル本体。ステップ 1–4 を逐次実行し、失敗をドメインエラーへ写像する。
    async fn execute_cycle(&self) -> Result<Vec<TranscribedWord>> {
        let overall_timer = profiling::Timer::start("cycle.total");

        // 1. 録音停止 → ファイルパス
        let path = self
            .recorder
            .stop()
            .map_err(|e| AppError::RecordingFailed(e.to_string()))?;

        // 2. バイト読み込みと最小サイズ検証
        let bytes = self
            .recorder
            .read_bytes(&path)
            .map_err(|e| AppError::RecordingFailed(e.to_string()))?;
        if bytes.len() < self.config.min_audio_bytes {
            return Err(AppError::RecordingFailed(
                "Recording is too small to be valid".into(),
            ));
        }

        {
            let mut session = self.session.borrow_mut();
            session.set_recording_path(path);
            session.apply(StateEvent::BytesRead);
        }

        // 3. 転写（タイムアウト付き）。ネットワーク呼び出しはタスクに切り離し、
        //    タイムアウト後に遅れて完了した結果は送信先ごと破棄される。
        let api_timer = profiling::Timer::start("cycle.transcribe");
        let (tx, rx) = oneshot::channel();
        let client = self.client.clone();
        let sample_rate_hz = self.config.sample_rate_hz;
        spawn_local(async move {
            let result = client.transcribe(&bytes, sample_rate_hz).await;
            let _ = tx.send(result);
        });

        let segments = match tokio::time::timeout(self.config.timeout, rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => {
                return Err(AppError::TranscriptionFailed(
                    "transcription task dropped".into(),
                ));
            }
            Err(_) => return Err(AppError::Timeout(TIMEOUT_MESSAGE.into())),
        };
        api_timer.log();

        // 4. セグメント列を単一の単語列へ平坦化
        let words = flatten_segments(segments);
        overall_timer.log_with(&format!("words={}", words.len()));
        Ok(words)
    }
}
