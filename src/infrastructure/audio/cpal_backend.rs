use super::CaptureBackend;
use cpal::{
    Device, SampleFormat, SampleRate, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use hound::{SampleFormat as WavFmt, WavWriter};
use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::utils::config::EnvConfig;

/// 固定録音プロファイル: モノラル 16bit 16kHz リニア PCM。
pub const SAMPLE_RATE_HZ: u32 = 16_000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

/// CPAL によるローカルマイク入力実装。
/// WAV ファイルをユーザーデータディレクトリに保存します。
pub struct CpalCaptureBackend {
    /// ランタイム中の入力ストリーム
    stream: Mutex<Option<Stream>>,
    /// 録音フラグ
    recording: Arc<AtomicBool>,
    /// 出力 WAV パス
    output_path: Mutex<Option<PathBuf>>,
}

impl Default for CpalCaptureBackend {
    fn default() -> Self {
        Self {
            stream: Mutex::new(None),
            recording: Arc::new(AtomicBool::new(false)),
            output_path: Mutex::new(None),
        }
    }
}

/// `INPUT_DEVICE_PRIORITY` 環境変数を解釈し、優先順位の高い入力デバイスを選択します。
fn select_input_device(host: &cpal::Host) -> Option<Device> {
    use std::env;

    // 1) 優先リスト取得 (カンマ区切り)
    let priorities: Vec<String> = env::var("INPUT_DEVICE_PRIORITY")
        .ok()?
        .split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect();

    // 2) 利用可能なデバイスを列挙
    let available: Vec<Device> = host.input_devices().ok()?.collect();

    // 3) 優先度順に一致デバイスを探す
    for want in &priorities {
        if let Some(dev) = available
            .iter()
            .find(|d| d.name().map(|n| n == *want).unwrap_or(false))
        {
            println!("🎙️  Using preferred device: {}", want);
            return Some(dev.clone());
        }
    }

    // 4) 見つからなければデフォルト
    println!("⚠️  No preferred device found, falling back to default input device");
    host.default_input_device()
}

// =============== 内部ユーティリティ ================================
impl CpalCaptureBackend {
    /// `recording_YYYYMMDD_HHMMSS.wav` 形式の一意なファイルパスを生成
    fn make_output_path() -> Result<PathBuf, Box<dyn Error>> {
        let dir = recordings_dir()?;
        fs::create_dir_all(&dir)?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        Ok(dir.join(format!("recording_{timestamp}.wav")))
    }

    /// CPAL ストリームを構築。サンプルを WAV ライターに書き込みます。
    fn build_input_stream(
        recording: Arc<AtomicBool>,
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        output_path: &Path,
    ) -> Result<Stream, Box<dyn Error>> {
        // WAV ヘッダ（固定プロファイル）
        let spec = hound::WavSpec {
            channels: config.channels,
            sample_rate: config.sample_rate.0,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: WavFmt::Int,
        };
        let writer = Arc::new(Mutex::new(WavWriter::create(output_path, spec)?));

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                config,
                move |data: &[i16], _| {
                    if recording.load(Ordering::SeqCst) {
                        let mut w = writer.lock().unwrap();
                        for &s in data {
                            let _ = w.write_sample(s);
                        }
                    }
                },
                |e| eprintln!("stream error: {e}"),
                None,
            )?,
            SampleFormat::F32 => device.build_input_stream(
                config,
                move |data: &[f32], _| {
                    if recording.load(Ordering::SeqCst) {
                        let mut w = writer.lock().unwrap();
                        for &s in data {
                            let _ = w.write_sample((s * i16::MAX as f32) as i16);
                        }
                    }
                },
                |e| eprintln!("stream error: {e}"),
                None,
            )?,
            _ => return Err("unsupported sample format".into()),
        };

        Ok(stream)
    }
}

/// 録音ファイルの保存先ディレクトリを解決します。
pub fn recordings_dir() -> Result<PathBuf, Box<dyn Error>> {
    if let Some(dir) = EnvConfig::get().recordings_dir.as_deref() {
        return Ok(PathBuf::from(dir));
    }
    let dirs = directories::ProjectDirs::from("", "", "speech_transcriber")
        .ok_or("could not resolve user data directory")?;
    Ok(dirs.data_dir().join("recordings"))
}

impl CaptureBackend for CpalCaptureBackend {
    /// 録音ストリームを開始します。
    fn start_capture(&self) -> Result<(), Box<dyn Error>> {
        if self.is_capturing() {
            return Err("already recording".into());
        }

        // ホスト・デバイス取得
        let host = cpal::default_host();
        let device = select_input_device(&host)
            .ok_or("no input device available (check INPUT_DEVICE_PRIORITY)")?;

        // 固定プロファイルでストリームを要求する
        let config = StreamConfig {
            channels: CHANNELS,
            sample_rate: SampleRate(SAMPLE_RATE_HZ),
            buffer_size: cpal::BufferSize::Default,
        };
        let sample_format = device.default_input_config()?.sample_format();

        // 出力パス生成 & ストリーム構築
        let wav_path = Self::make_output_path()?;
        let stream = Self::build_input_stream(
            self.recording.clone(),
            &device,
            &config,
            sample_format,
            &wav_path,
        )?;
        stream.play()?;

        self.recording.store(true, Ordering::SeqCst);
        *self.stream.lock().unwrap() = Some(stream);
        *self.output_path.lock().unwrap() = Some(wav_path);
        Ok(())
    }

    /// 録音を停止し、WAV ファイルパスを返します。
    fn stop_capture(&self) -> Result<PathBuf, Box<dyn Error>> {
        if !self.is_capturing() {
            return Err("no active recording found".into());
        }
        // ストリームを解放して終了（WavWriter はドロップ時にヘッダを確定する）
        *self.stream.lock().unwrap() = None;
        self.recording.store(false, Ordering::SeqCst);

        let path = self
            .output_path
            .lock()
            .unwrap()
            .take()
            .ok_or("output path not set")?;
        Ok(path)
    }

    /// 録音ファイルを読み込みます。
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, Box<dyn Error>> {
        if !path.exists() {
            return Err("recording file missing".into());
        }
        Ok(fs::read(path)?)
    }

    /// 録音中かどうかを確認します。
    fn is_capturing(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }
}

/// 利用可能な入力デバイス名を列挙します。
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.input_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}
