//! Application層の抽象化トレイト定義
//! 外部依存を抽象化し、テスト可能な構造を提供します

use crate::domain::transcript::WordSegment;
use crate::error::Result;
use async_trait::async_trait;

/// 音声文字起こし機能の抽象化
#[async_trait(?Send)]
pub trait TranscriptionClient {
    /// 音声バイト列を文字起こしし、単語時刻付きセグメント列を返す
    async fn transcribe(&self, audio: &[u8], sample_rate_hz: u32) -> Result<Vec<WordSegment>>;
}
