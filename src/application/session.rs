//! セッション状態
//!
//! # 責任
//! - ステートマシン・転写結果・ハイライト位置の単一所有
//! - 転写結果の丸ごと差し替え（部分更新は観測されない）
//!
//! シングルスレッドの消費側からのみ触られる前提で `Rc<RefCell<Session>>`
//! として共有される。スレッド安全性は設計上持たない。

use crate::application::state_machine::{RecordingState, RecordingStateMachine, StateEvent};
use crate::domain::transcript::{TranscribedWord, joined_text};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// UI コラボレータへ公開する状態スナップショット
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// 現在の状態
    pub state: RecordingState,
    /// 転写済み単語列（発話順）
    pub words: Vec<TranscribedWord>,
    /// 表示用テキスト（空白区切り）
    pub text: String,
    /// 現在発話中の単語のインデックス
    pub highlighted_word_index: Option<usize>,
}

/// 録音・転写・再生セッションの共有状態
#[derive(Debug, Default)]
pub struct Session {
    machine: RecordingStateMachine,
    transcript: Vec<TranscribedWord>,
    highlighted_word_index: Option<usize>,
    /// 直近の録音ファイル（再生はこのファイルを使う）
    recording_path: Option<PathBuf>,
}

impl Session {
    /// 空のセッションを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 現在の状態
    pub fn state(&self) -> &RecordingState {
        self.machine.state()
    }

    /// ステートマシンへイベントを適用する（不正な遷移は無視される）
    pub fn apply(&mut self, event: StateEvent) -> bool {
        self.machine.apply(event)
    }

    /// 転写済み単語列
    pub fn transcript(&self) -> &[TranscribedWord] {
        &self.transcript
    }

    /// 転写結果が存在するか
    pub fn has_transcript(&self) -> bool {
        !self.transcript.is_empty()
    }

    /// 転写結果を丸ごと差し替える
    pub fn replace_transcript(&mut self, words: Vec<TranscribedWord>) {
        self.transcript = words;
    }

    /// 転写結果とハイライトを消去する（新しい録音の開始時）
    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.highlighted_word_index = None;
    }

    /// ハイライト位置
    pub fn highlighted_word_index(&self) -> Option<usize> {
        self.highlighted_word_index
    }

    /// ハイライト位置を更新する
    pub fn set_highlight(&mut self, index: usize) {
        self.highlighted_word_index = Some(index);
    }

    /// ハイライトを消去する（停止・完了時のみ）
    pub fn clear_highlight(&mut self) {
        self.highlighted_word_index = None;
    }

    /// 直近の録音ファイルのパス
    pub fn recording_path(&self) -> Option<&Path> {
        self.recording_path.as_deref()
    }

    /// 直近の録音ファイルを記録する
    pub fn set_recording_path(&mut self, path: PathBuf) {
        self.recording_path = Some(path);
    }

    /// UI 向けスナップショットを生成する
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state().clone(),
            words: self.transcript.clone(),
            text: joined_text(&self.transcript),
            highlighted_word_index: self.highlighted_word_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 転写結果は丸ごと差し替えられる
    #[test]
    fn transcript_is_replaced_wholesale() {
        let mut session = Session::new();
        session.replace_transcript(vec![TranscribedWord::new("old", 0.0, 0.5)]);

        session.replace_transcript(vec![
            TranscribedWord::new("new", 0.0, 0.4),
            TranscribedWord::new("words", 0.5, 0.9),
        ]);

        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[0].text, "new");
    }

    /// クリアで転写とハイライトの両方が消える
    #[test]
    fn clear_removes_transcript_and_highlight() {
        let mut session = Session::new();
        session.replace_transcript(vec![TranscribedWord::new("hi", 0.0, 0.5)]);
        session.set_highlight(0);

        session.clear_transcript();

        assert!(!session.has_transcript());
        assert_eq!(session.highlighted_word_index(), None);
    }

    /// スナップショットは状態・テキスト・ハイライトを含む
    #[test]
    fn snapshot_reflects_session_contents() {
        let mut session = Session::new();
        session.replace_transcript(vec![
            TranscribedWord::new("hi", 0.0, 0.5),
            TranscribedWord::new("there", 0.6, 1.0),
        ]);
        session.set_highlight(1);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, RecordingState::Idle);
        assert_eq!(snapshot.text, "hi there");
        assert_eq!(snapshot.highlighted_word_index, Some(1));
        assert_eq!(snapshot.words.len(), 2);
    }
}
