//! IPCコマンドハンドラー
//!
//! # 責任
//! - IPCコマンドの処理と適切なコンポーネントへの委譲
//! - 録音の自動停止タイマー管理
//! - レスポンスの生成
//!
//! 合法性の判定はステートマシンに委ねる。ここでは遷移が拒否された要求に
//! 「無視した」ことを伝えるレスポンスを返すだけで、状態には触れない。

#![allow(clippy::await_holding_refcell_ref)]

use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::oneshot;
use tokio::task::spawn_local;
use tokio::time::Duration;

use crate::application::playback_coordinator::PlaybackCoordinator;
use crate::application::session::Session;
use crate::application::state_machine::{RecordingState, StateEvent};
use crate::application::transcription_orchestrator::TranscriptionOrchestrator;
use crate::error::Result;
use crate::infrastructure::audio::{CaptureBackend, cpal_backend, cpal_player};
use crate::ipc::{IpcCmd, IpcResp};

/// コマンドハンドラー
pub struct CommandHandler<T: CaptureBackend> {
    orchestrator: Rc<TranscriptionOrchestrator<T>>,
    coordinator: Rc<PlaybackCoordinator>,
    session: Rc<RefCell<Session>>,
    /// 最大録音秒数（自動停止）
    max_duration_secs: u64,
    /// 自動停止タイマーのキャンセル用
    auto_stop_cancel: RefCell<Option<oneshot::Sender<()>>>,
}

impl<T: CaptureBackend + 'static> CommandHandler<T> {
    /// 新しいCommandHandlerを作成
    pub fn new(
        orchestrator: Rc<TranscriptionOrchestrator<T>>,
        coordinator: Rc<PlaybackCoordinator>,
        session: Rc<RefCell<Session>>,
        max_duration_secs: u64,
    ) -> Self {
        Self {
            orchestrator,
            coordinator,
            session,
            max_duration_secs,
            auto_stop_cancel: RefCell::new(None),
        }
    }

    /// IPCコマンドを処理
    pub async fn handle(&self, cmd: IpcCmd) -> Result<IpcResp> {
        match cmd {
            IpcCmd::StartRecording => self.handle_start_recording(),
            IpcCmd::StopRecording => self.handle_stop_recording(),
            IpcCmd::ToggleRecording => {
                if self.session.borrow().state() == &RecordingState::Recording {
                    self.handle_stop_recording()
                } else {
                    self.handle_start_recording()
                }
            }
            IpcCmd::StartPlayback => self.handle_start_playback(),
            IpcCmd::StopPlayback => self.handle_stop_playback(),
            IpcCmd::TogglePlayback => {
                if self.session.borrow().state() == &RecordingState::Playing {
                    self.handle_stop_playback()
                } else {
                    self.handle_start_playback()
                }
            }
            IpcCmd::Status => self.handle_status(),
            IpcCmd::Dismiss => self.handle_dismiss(),
            IpcCmd::ListDevices => self.handle_list_devices(),
            IpcCmd::Health => self.handle_health(),
        }
    }

    /// 録音開始処理
    fn handle_start_recording(&self) -> Result<IpcResp> {
        if !self.orchestrator.start_recording()? {
            return Ok(self.ignored_resp());
        }

        self.setup_auto_stop_timer();

        Ok(IpcResp {
            ok: true,
            msg: format!("recording started (auto-stop in {}s)", self.max_duration_secs),
        })
    }

    /// 録音停止処理。転写サイクルはローカルタスクとして切り離す。
    fn handle_stop_recording(&self) -> Result<IpcResp> {
        if self.session.borrow().state() != &RecordingState::Recording {
            return Ok(self.ignored_resp());
        }

        self.cancel_auto_stop_timer();

        let orchestrator = self.orchestrator.clone();
        spawn_local(async move {
            match orchestrator.run_recording_cycle().await {
                Ok(words) => println!("✅ transcription complete ({} words)", words.len()),
                Err(e) => eprintln!("❌ transcription cycle failed: {e}"),
            }
        });

        Ok(IpcResp {
            ok: true,
            msg: "recording stopped; transcription in progress".to_string(),
        })
    }

    /// 再生開始処理
    fn handle_start_playback(&self) -> Result<IpcResp> {
        let path = match self.session.borrow().recording_path() {
            Some(path) => path.to_path_buf(),
            None => {
                return Ok(IpcResp {
                    ok: false,
                    msg: "no recording available".to_string(),
                });
            }
        };

        // 再生前の診断（警告のみ、再生は妨げない）
        match cpal_player::verify_recording_playable(&path) {
            Ok(report) => println!("🔍 {report}"),
            Err(warning) => eprintln!("⚠️  {warning}"),
        }

        if !self.coordinator.start_playback(&path)? {
            return Ok(self.ignored_resp());
        }

        Ok(IpcResp {
            ok: true,
            msg: "playback started".to_string(),
        })
    }

    /// 再生停止処理
    fn handle_stop_playback(&self) -> Result<IpcResp> {
        if !self.coordinator.stop_playback() {
            return Ok(self.ignored_resp());
        }
        Ok(IpcResp {
            ok: true,
            msg: "playback stopped".to_string(),
        })
    }

    /// 状態スナップショット取得
    fn handle_status(&self) -> Result<IpcResp> {
        let snapshot = self.session.borrow().snapshot();
        Ok(IpcResp {
            ok: true,
            msg: serde_json::to_string(&snapshot).unwrap_or_else(|e| format!("snapshot error: {e}")),
        })
    }

    /// エラー表示の解除。進行中サイクルの遅延結果も同時に無効化する。
    fn handle_dismiss(&self) -> Result<IpcResp> {
        if !self.session.borrow_mut().apply(StateEvent::DismissError) {
            return Ok(self.ignored_resp());
        }
        self.orchestrator.invalidate_pending();
        Ok(IpcResp {
            ok: true,
            msg: "error dismissed".to_string(),
        })
    }

    /// デバイス一覧取得
    fn handle_list_devices(&self) -> Result<IpcResp> {
        let devices = cpal_backend::list_input_devices();
        Ok(IpcResp {
            ok: true,
            msg: if devices.is_empty() {
                "⚠️  No input devices detected".to_string()
            } else {
                devices.join("\n")
            },
        })
    }

    /// ヘルスチェック
    fn handle_health(&self) -> Result<IpcResp> {
        let mut ok = true;
        let mut lines = Vec::new();

        // デバイスチェック
        if cpal_backend::list_input_devices().is_empty() {
            lines.push("Input device: MISSING".to_string());
            ok = false;
        } else {
            lines.push("Input device: OK".to_string());
        }

        // API キーチェック
        if crate::utils::config::EnvConfig::get().speech_api_key.is_some() {
            lines.push("GOOGLE_SPEECH_API_KEY: present".to_string());
        } else {
            lines.push("GOOGLE_SPEECH_API_KEY: missing".to_string());
            ok = false;
        }

        // 録音ディレクトリチェック
        match cpal_backend::recordings_dir() {
            Ok(dir) => lines.push(format!("Recordings dir: {}", dir.display())),
            Err(e) => {
                lines.push(format!("Recordings dir: error({e})"));
                ok = false;
            }
        }

        Ok(IpcResp {
            ok,
            msg: lines.join("\n"),
        })
    }

    /// 遷移表に拒否された要求への共通レスポンス
    fn ignored_resp(&self) -> IpcResp {
        IpcResp {
            ok: false,
            msg: format!("request ignored (state={:?})", self.session.borrow().state()),
        }
    }

    /// 自動停止タイマーをセットアップ
    fn setup_auto_stop_timer(&self) {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        *self.auto_stop_cancel.borrow_mut() = Some(cancel_tx);

        let orchestrator = self.orchestrator.clone();
        let session = self.session.clone();
        let max_secs = self.max_duration_secs;

        spawn_local(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(max_secs)) => {
                    if session.borrow().state() == &RecordingState::Recording {
                        println!("Auto-stop timer triggered after {}s", max_secs);
                        match orchestrator.run_recording_cycle().await {
                            Ok(words) => {
                                println!("✅ transcription complete ({} words)", words.len())
                            }
                            Err(e) => eprintln!("❌ transcription cycle failed: {e}"),
                        }
                    }
                }
                _ = cancel_rx => {
                    // 手動停止によるキャンセル
                }
            }
        });
    }

    /// 自動停止タイマーをキャンセル
    fn cancel_auto_stop_timer(&self) {
        if let Some(cancel) = self.auto_stop_cancel.borrow_mut().take() {
            let _ = cancel.send(());
        }
    }
}
