//! 録音ステートマシン
//!
//! # 責任
//! - アプリケーションが「今なにをしているか」の唯一の真実を保持
//! - どの状態からどの操作が合法かの判定
//!
//! 録音と再生は相互排他であり、同時に進行することはありません。
//! この排他は遷移表で強制し、ロックでは強制しません。

use serde::{Deserialize, Serialize};

/// 録音状態。プロセス全体で常にひとつだけが生きている。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    /// 待機中
    Idle,
    /// 非同期操作の開始待ち
    Loading,
    /// 録音中
    Recording,
    /// 転写リクエスト処理中
    ProcessingTranscription,
    /// 再生中
    Playing,
    /// エラー表示中（ユーザー向けメッセージ付き）
    Error(String),
}

/// ステートマシンへのイベント。
///
/// UI 由来の要求（start/stop/dismiss）と、非同期操作の完了通知の両方を含む。
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// 録音開始要求
    StartRecording,
    /// マイクキャプチャの開始成功
    CaptureStarted,
    /// 録音停止要求（転写サイクルの先頭）
    StopRecording,
    /// 録音バイト列の読み込み成功（転写リクエストへ進む）
    BytesRead,
    /// 転写サイクルの成功完了
    CycleCompleted,
    /// 再生開始要求。空の転写では遷移しない
    StartPlayback { transcript_empty: bool },
    /// 再生の開始成功
    PlaybackStarted,
    /// 再生停止要求
    StopPlayback,
    /// 再生の自然終了
    PlaybackCompleted,
    /// 進行中の操作の失敗（ユーザー向けメッセージ付き）
    Fail(String),
    /// エラー表示の解除
    DismissError,
}

/// 録音ステートマシン本体
#[derive(Debug)]
pub struct RecordingStateMachine {
    state: RecordingState,
}

impl RecordingStateMachine {
    /// `Idle` 状態で新しいステートマシンを作成
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
        }
    }

    /// 現在の状態
    pub fn state(&self) -> &RecordingState {
        &self.state
    }

    /// イベントを適用する。
    ///
    /// 遷移表にない (状態, イベント) の組は静かに無視し `false` を返す。
    /// エラーにはしない — 不正な要求の拒否はこの表の役割そのもののため。
    pub fn apply(&mut self, event: StateEvent) -> bool {
        use RecordingState::*;
        use StateEvent::*;

        let next = match (&self.state, event) {
            // 録音ブランチ
            (Idle, StartRecording) => Loading,
            (Loading, CaptureStarted) => Recording,
            (Recording, StopRecording) => Loading,
            (Loading, BytesRead) => ProcessingTranscription,
            (ProcessingTranscription, CycleCompleted) => Idle,

            // 再生ブランチ（空の転写は再生しない）
            (
                Idle,
                StartPlayback {
                    transcript_empty: false,
                },
            ) => Loading,
            (Loading, PlaybackStarted) => Playing,
            (Playing, StopPlayback) => Idle,
            (Playing, PlaybackCompleted) => Idle,

            // 失敗は進行中の状態からのみ Error へ
            (Loading | Recording | ProcessingTranscription | Playing, Fail(message)) => {
                Error(message)
            }

            // Error からの唯一の出口は明示的な dismiss
            (Error(_), DismissError) => Idle,

            _ => return false,
        };

        self.state = next;
        true
    }
}

impl Default for RecordingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RecordingState as S;
    use StateEvent as E;

    fn machine_in(state: S) -> RecordingStateMachine {
        let mut machine = RecordingStateMachine::new();
        machine.state = state;
        machine
    }

    /// 録音サイクルの正常系遷移
    #[test]
    fn recording_cycle_happy_path() {
        let mut machine = RecordingStateMachine::new();
        assert_eq!(machine.state(), &S::Idle);

        assert!(machine.apply(E::StartRecording));
        assert_eq!(machine.state(), &S::Loading);

        assert!(machine.apply(E::CaptureStarted));
        assert_eq!(machine.state(), &S::Recording);

        assert!(machine.apply(E::StopRecording));
        assert_eq!(machine.state(), &S::Loading);

        assert!(machine.apply(E::BytesRead));
        assert_eq!(machine.state(), &S::ProcessingTranscription);

        assert!(machine.apply(E::CycleCompleted));
        assert_eq!(machine.state(), &S::Idle);
    }

    /// 再生ブランチの正常系遷移
    #[test]
    fn playback_branch_happy_path() {
        let mut machine = RecordingStateMachine::new();

        assert!(machine.apply(E::StartPlayback {
            transcript_empty: false
        }));
        assert_eq!(machine.state(), &S::Loading);

        assert!(machine.apply(E::PlaybackStarted));
        assert_eq!(machine.state(), &S::Playing);

        assert!(machine.apply(E::StopPlayback));
        assert_eq!(machine.state(), &S::Idle);
    }

    /// 自然終了でも Idle に戻る
    #[test]
    fn playback_completion_returns_to_idle() {
        let mut machine = machine_in(S::Playing);
        assert!(machine.apply(E::PlaybackCompleted));
        assert_eq!(machine.state(), &S::Idle);
    }

    /// 空の転写に対する再生要求は無視される
    #[test]
    fn empty_transcript_never_starts_playback() {
        let mut machine = RecordingStateMachine::new();
        assert!(!machine.apply(E::StartPlayback {
            transcript_empty: true
        }));
        assert_eq!(machine.state(), &S::Idle);
    }

    /// 録音中の再生要求・再生中の録音要求は拒否される（相互排他）
    #[test]
    fn recording_and_playback_are_mutually_exclusive() {
        let mut machine = machine_in(S::Recording);
        assert!(!machine.apply(E::StartPlayback {
            transcript_empty: false
        }));
        assert_eq!(machine.state(), &S::Recording);

        let mut machine = machine_in(S::Playing);
        assert!(!machine.apply(E::StartRecording));
        assert_eq!(machine.state(), &S::Playing);
    }

    /// 進行中の状態からの失敗は Error へ遷移する
    #[test]
    fn failure_from_in_flight_states_reaches_error() {
        for state in [S::Loading, S::Recording, S::ProcessingTranscription, S::Playing] {
            let mut machine = machine_in(state);
            assert!(machine.apply(E::Fail("boom".into())));
            assert_eq!(machine.state(), &S::Error("boom".into()));
        }
    }

    /// Idle からの失敗イベントは無視される（進行中の操作がない）
    #[test]
    fn failure_from_idle_is_ignored() {
        let mut machine = RecordingStateMachine::new();
        assert!(!machine.apply(E::Fail("boom".into())));
        assert_eq!(machine.state(), &S::Idle);
    }

    /// Error からの唯一の出口は dismiss
    #[test]
    fn dismiss_is_only_exit_from_error() {
        let mut machine = machine_in(S::Error("boom".into()));

        assert!(!machine.apply(E::StartRecording));
        assert!(!machine.apply(E::StartPlayback {
            transcript_empty: false
        }));
        assert!(!machine.apply(E::StopPlayback));
        assert_eq!(machine.state(), &S::Error("boom".into()));

        assert!(machine.apply(E::DismissError));
        assert_eq!(machine.state(), &S::Idle);
    }

    /// 不正な (状態, イベント) の組は状態を変えない
    #[test]
    fn invalid_transitions_leave_state_unchanged() {
        let cases = [
            (S::Idle, E::StopRecording),
            (S::Idle, E::StopPlayback),
            (S::Idle, E::DismissError),
            (S::Idle, E::CycleCompleted),
            (S::Recording, E::StartRecording),
            (S::Recording, E::CycleCompleted),
            (S::ProcessingTranscription, E::StopRecording),
            (S::ProcessingTranscription, E::StartRecording),
            (S::Playing, E::PlaybackStarted),
            (S::Loading, E::StartRecording),
        ];

        for (state, event) in cases {
            let mut machine = machine_in(state.clone());
            assert!(
                !machine.apply(event.clone()),
                "({state:?}, {event:?}) should be rejected"
            );
            assert_eq!(machine.state(), &state);
        }
    }

    /// Error の同値性はメッセージで判定される
    #[test]
    fn error_equality_compares_messages() {
        assert_eq!(S::Error("a".into()), S::Error("a".into()));
        assert_ne!(S::Error("a".into()), S::Error("b".into()));
    }
}
