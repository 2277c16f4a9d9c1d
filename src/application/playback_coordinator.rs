//! 再生コーディネータ
//!
//! # 責任
//! - プライマリ再生の開始と、失敗時のフォールバック再生への切り替え（1 試行につき 1 回）
//! - 再生中の経過時刻サンプルの定期発行（既定 100ms）
//! - サンプルからの単語ハイライト更新と、完了・失敗のステートマシンへの再発行
//!
//! サンプルは単一プロデューサのイベントチャネルに流れ、コーディネータの
//! 消費タスクがセッションへ適用する。停止・完了・失敗のいずれかが起きた
//! 時点で発行は即座かつ恒久的に止まる。

#![allow(clippy::await_holding_refcell_ref)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::spawn_local;
use tokio::time::Duration;

use crate::application::session::Session;
use crate::application::state_machine::StateEvent;
use crate::domain::highlight::highlight_for;
use crate::error::{AppError, Result};
use crate::infrastructure::audio::PlaybackBackend;

/// 再生設定
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// 経過時刻サンプルの発行間隔
    pub tick: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
        }
    }
}

/// 再生中に発行される型付きイベント
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// 再生開始からの経過秒数サンプル
    Sample(f64),
    /// 実行時失敗によりフォールバック再生へ切り替えた（経過時刻は先頭に戻る）
    FallbackStarted,
    /// 自然終了
    Completed,
    /// 実行時失敗（フォールバック試行後）
    Failed(String),
}

/// 再生コーディネータ
pub struct PlaybackCoordinator {
    primary: Rc<dyn PlaybackBackend>,
    fallback: Rc<dyn PlaybackBackend>,
    session: Rc<RefCell<Session>>,
    config: PlaybackConfig,
    /// 進行中の再生のティッカー停止用
    stop_tx: RefCell<Option<oneshot::Sender<()>>>,
}

impl PlaybackCoordinator {
    /// 依存を注入して新しいコーディネータを作成
    pub fn new(
        primary: Rc<dyn PlaybackBackend>,
        fallback: Rc<dyn PlaybackBackend>,
        session: Rc<RefCell<Session>>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            primary,
            fallback,
            session,
            config,
            stop_tx: RefCell::new(None),
        }
    }

    /// 再生を開始する。
    ///
    /// Idle かつ転写が空でない場合のみ遷移表が開始を許可する。
    /// プライマリの開始失敗時はフォールバックを 1 回だけ試し、両方
    /// 失敗したら `PlaybackFailed` を返してサンプルは一切発行しない。
    pub fn start_playback(&self, path: &Path) -> Result<bool> {
        let transcript_empty = !self.session.borrow().has_transcript();
        if !self
            .session
            .borrow_mut()
            .apply(StateEvent::StartPlayback { transcript_empty })
        {
            return Ok(false);
        }

        // 開始失敗時のフォールバック（1 試行につき 1 回）
        let (backend, used_fallback) = match self.primary.start_playback(path) {
            Ok(()) => (self.primary.clone(), false),
            Err(primary_err) => {
                eprintln!("🔄 primary playback failed to start: {primary_err}");
                match self.fallback.start_playback(path) {
                    Ok(()) => (self.fallback.clone(), true),
                    Err(fallback_err) => {
                        let err = AppError::PlaybackFailed(format!(
                            "all playback methods failed: {fallback_err}"
                        ));
                        self.session
                            .borrow_mut()
                            .apply(StateEvent::Fail(err.user_message()));
                        return Err(err);
                    }
                }
            }
        };

        self.session.borrow_mut().apply(StateEvent::PlaybackStarted);

        let (stop_tx, stop_rx) = oneshot::channel();
        *self.stop_tx.borrow_mut() = Some(stop_tx);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        spawn_sampler(
            backend,
            self.fallback.clone(),
            used_fallback,
            path.to_path_buf(),
            self.config.tick,
            stop_rx,
            event_tx,
        );
        self.spawn_consumer(event_rx);
        Ok(true)
    }

    /// 再生を停止する。
    ///
    /// Playing 以外からの要求は無視される。停止後はサンプルが一切発行されず、
    /// バックエンドのリソースは解放され、ハイライトは消去される。
    pub fn stop_playback(&self) -> bool {
        if !self.session.borrow_mut().apply(StateEvent::StopPlayback) {
            return false;
        }
        if let Some(stop_tx) = self.stop_tx.borrow_mut().take() {
            let _ = stop_tx.send(());
        }
        self.primary.stop();
        self.fallback.stop();
        self.session.borrow_mut().clear_highlight();
        true
    }

    /// イベント消費タスク。サンプルをハイライトへ、終端イベントを状態遷移へ写す。
    fn spawn_consumer(&self, mut event_rx: mpsc::UnboundedReceiver<PlaybackEvent>) {
        let session = self.session.clone();
        let primary = self.primary.clone();
        let fallback = self.fallback.clone();

        spawn_local(async move {
            let mut last_sample: Option<f64> = None;
            while let Some(event) = event_rx.recv().await {
                match event {
                    PlaybackEvent::Sample(time) => {
                        let mut session = session.borrow_mut();
                        // 停止直後にキュー済みのサンプルが残ることがある
                        if !matches!(
                            session.state(),
                            crate::application::state_machine::RecordingState::Playing
                        ) {
                            continue;
                        }
                        // サンプルは単調非減少でなければならない
                        if let Some(last) = last_sample {
                            if time < last {
                                let err = AppError::PlaybackFailed(
                                    "playback time went backwards".into(),
                                );
                                session.apply(StateEvent::Fail(err.user_message()));
                                drop(session);
                                primary.stop();
                                fallback.stop();
                                break;
                            }
                        }
                        last_sample = Some(time);
                        // ギャップ（None）では直前のハイライトを保持する
                        if let Some(index) = highlight_for(time, session.transcript()) {
                            session.set_highlight(index);
                        }
                    }
                    PlaybackEvent::FallbackStarted => {
                        // フォールバックは先頭から再生し直すため、単調性の基準を取り直す
                        last_sample = None;
                    }
                    PlaybackEvent::Completed => {
                        let mut session = session.borrow_mut();
                        session.apply(StateEvent::PlaybackCompleted);
                        session.clear_highlight();
                        break;
                    }
                    PlaybackEvent::Failed(reason) => {
                        let err = AppError::PlaybackFailed(reason);
                        session
                            .borrow_mut()
                            .apply(StateEvent::Fail(err.user_message()));
                        break;
                    }
                }
            }
        });
    }
}

/// サンプル生成タスク。固定間隔で経過時刻を発行し、終端イベントで停止する。
///
/// 再生中の実行時エラーは 1 試行につき 1 回だけフォールバックへ切り替える。
/// 停止シグナル受信後はイベントをひとつも発行しない。
fn spawn_sampler(
    backend: Rc<dyn PlaybackBackend>,
    fallback: Rc<dyn PlaybackBackend>,
    mut used_fallback: bool,
    path: PathBuf,
    tick: Duration,
    mut stop_rx: oneshot::Receiver<()>,
    event_tx: mpsc::UnboundedSender<PlaybackEvent>,
) {
    spawn_local(async move {
        let mut backend = backend;
        // どの経路でタスクが終了してもデバイスリソースを解放する
        let _release = scopeguard::guard((backend.clone(), fallback.clone()), |(b, f)| {
            b.stop();
            f.stop();
        });
        let mut interval = tokio::time::interval(tick);
        // 初回 tick は即時発火のため読み捨てる
        interval.tick().await;

        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    // 明示的停止。以後イベントは発行しない
                    break;
                }
                _ = interval.tick() => {
                    if let Some(error) = backend.take_error() {
                        if used_fallback {
                            let _ = event_tx.send(PlaybackEvent::Failed(error));
                            break;
                        }
                        eprintln!("🔄 runtime playback failure, switching to fallback: {error}");
                        backend.stop();
                        if let Err(e) = fallback.start_playback(&path) {
                            let _ = event_tx.send(PlaybackEvent::Failed(format!(
                                "all playback methods failed: {e}"
                            )));
                            break;
                        }
                        backend = fallback.clone();
                        used_fallback = true;
                        let _ = event_tx.send(PlaybackEvent::FallbackStarted);
                        continue;
                    }

                    if backend.is_playing() {
                        let _ = event_tx.send(PlaybackEvent::Sample(backend.current_time()));
                    } else {
                        let _ = event_tx.send(PlaybackEvent::Completed);
                        break;
                    }
                }
            }
        }
    });
}
