//! Google Speech クライアントのアダプター実装
//! Application層のTranscriptionClientトレイトを実装

use crate::application::traits::TranscriptionClient;
use crate::domain::transcript::{TranscribedWord, WordAlternative, WordSegment};
use crate::error::{AppError, Result};
use crate::infrastructure::external::google_speech::{
    GoogleSpeechClient, RecognizeResponse, parse_offset_seconds,
};
use async_trait::async_trait;

/// Google Speech API のアダプター
pub struct GoogleSpeechAdapter {
    client: GoogleSpeechClient,
}

impl GoogleSpeechAdapter {
    /// 新しいアダプターを作成
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: GoogleSpeechClient::new().map_err(AppError::TranscriptionFailed)?,
        })
    }
}

/// レスポンスの結果セクションをドメインのセグメント列へ変換します。
///
/// 候補の順序は保存する。単語オフセットを持たない候補は空の単語列になり、
/// それが先頭候補であればそのセグメントは平坦化に寄与しない。
fn segments_from_response(response: RecognizeResponse) -> Vec<WordSegment> {
    response
        .results
        .into_iter()
        .map(|result| WordSegment {
            alternatives: result
                .alternatives
                .into_iter()
                .map(|alternative| WordAlternative {
                    words: alternative
                        .words
                        .unwrap_or_default()
                        .into_iter()
                        .map(|info| {
                            TranscribedWord::new(
                                info.word,
                                parse_offset_seconds(&info.start_time),
                                parse_offset_seconds(&info.end_time),
                            )
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

#[async_trait(?Send)]
impl TranscriptionClient for GoogleSpeechAdapter {
    async fn transcribe(&self, audio: &[u8], sample_rate_hz: u32) -> Result<Vec<WordSegment>> {
        let response = self
            .client
            .recognize(audio, sample_rate_hz)
            .await
            .map_err(AppError::TranscriptionFailed)?;
        Ok(segments_from_response(response))
    }
}
