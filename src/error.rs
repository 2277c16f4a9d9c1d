//! 統一エラーハンドリング
//!
//! このモジュールは speech_transcriber アプリケーション全体で使用する統一エラー型を定義します。
//! コラボレータ（録音・転写・再生）の失敗はすべてオーケストレータ境界でこの型に変換され、
//! 生のトランスポートエラーが状態機械に到達することはありません。

use thiserror::Error;

/// speech_transcriber アプリケーション全体で使用する統一エラー型
///
/// 各バリアントはユーザー向けメッセージのみを保持します。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    /// 録音の開始・停止・読み込みに失敗
    #[error("Recording failed: {0}")]
    RecordingFailed(String),

    /// 転写リクエストまたはレスポンスの解釈に失敗
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// 再生の開始または継続に失敗（フォールバック試行後）
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// 転写ステップのタイムアウト（メッセージはそのまま表示する）
    #[error("{0}")]
    Timeout(String),
}

/// 統一Result型エイリアス
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// エラーが再試行で解決しうるかどうかを判定
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Timeout(_) | AppError::TranscriptionFailed(_))
    }

    /// 状態機械の `Error` 状態に表示するメッセージ
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
