use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::utils::config::EnvConfig;

const DEFAULT_ENDPOINT: &str = "https://speech.googleapis.com/v1p1beta1/speech:recognize";

/// 認識リクエストの config 部
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'static str,
    enable_word_time_offsets: bool,
    enable_automatic_punctuation: bool,
    model: &'static str,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Serialize)]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

/// 認識レスポンス。欠落フィールドに寛容になるよう Option を多用する。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeResponse {
    #[serde(default)]
    pub results: Vec<SpeechRecognitionResult>,
    pub total_billed_time: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRecognitionResult {
    #[serde(default)]
    pub alternatives: Vec<SpeechRecognitionAlternative>,
    pub result_end_time: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRecognitionAlternative {
    pub transcript: Option<String>,
    pub confidence: Option<f32>,
    pub words: Option<Vec<WordInfo>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordInfo {
    pub start_time: String,
    pub end_time: String,
    pub word: String,
}

/// `"1.200s"` 形式のオフセット文字列を秒に変換します。
/// 解釈できない入力はレスポンス全体を失敗させず 0.0 に落とします。
pub fn parse_offset_seconds(time_string: &str) -> f64 {
    time_string
        .trim()
        .trim_end_matches('s')
        .parse::<f64>()
        .unwrap_or(0.0)
}

/// Google Cloud Speech-to-Text クライアント
pub struct GoogleSpeechClient {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GoogleSpeechClient {
    /// EnvConfig から API キーとエンドポイントを読み込んで作成します。
    pub fn new() -> Result<Self, String> {
        let config = EnvConfig::get();
        let api_key = config
            .speech_api_key
            .clone()
            .ok_or("GOOGLE_SPEECH_API_KEY environment variable not set")?;
        let endpoint = config
            .speech_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            api_key,
            endpoint,
            client: reqwest::Client::new(),
        })
    }

    /// 音声バイト列を認識エンドポイントへ送信します。
    ///
    /// 音声は base64 で本文に埋め込み、単語時刻オフセットを要求します。
    pub async fn recognize(
        &self,
        audio: &[u8],
        sample_rate_hz: u32,
    ) -> Result<RecognizeResponse, String> {
        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: sample_rate_hz,
                language_code: "en-US",
                enable_word_time_offsets: true,
                enable_automatic_punctuation: true,
                model: "default",
            },
            audio: RecognitionAudio {
                content: BASE64.encode(audio),
            },
        };

        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(format!("API request failed with status {}: {}", status, body));
        }

        serde_json::from_str(&body).map_err(|e| e.to_string())
    }
}
