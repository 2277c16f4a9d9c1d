//! ネイティブ音声再生モジュール
//!
//! 録音済み WAV ファイルを cpal の出力ストリームで再生します。
//! プライマリ実装は WAV のサンプルレートに一致する出力設定を要求し、
//! フォールバック実装はデバイス既定の設定をそのまま使って再生します
//! （出力経路について何も仮定しない縮退モード）。

use super::PlaybackBackend;
use cpal::{
    Device, SampleFormat, SampleRate, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use std::{
    error::Error,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

/// 実行中の再生ストリームと進行状況
struct ActivePlayback {
    /// ドロップで出力ストリームが解放される
    _stream: Stream,
    /// 出力済みフレーム数（出力レート基準）
    frames_played: Arc<AtomicU64>,
    /// 出力サンプルレート
    output_rate: u32,
    /// 再生フラグ（全サンプル消費で false になる）
    playing: Arc<AtomicBool>,
}

/// 進行状況の共有ハンドル。ストリームコールバックとポーリング側で共有する。
struct Progress {
    frames_played: Arc<AtomicU64>,
    playing: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
}

/// WAV ファイルをモノラル f32 サンプル列に読み込みます。
fn load_wav_samples(path: &Path) -> Result<(Vec<f32>, u32), Box<dyn Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .collect::<Result<Vec<i16>, _>>()?
            .iter()
            .map(|&s| s as f32 / i16::MAX as f32)
            .collect(),
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>()?,
    };

    // 多チャンネル入力は先頭チャンネルのみ採用
    let mono: Vec<f32> = if channels > 1 {
        samples.iter().step_by(channels).copied().collect()
    } else {
        samples
    };

    if mono.is_empty() {
        return Err("audio file contains no samples".into());
    }
    Ok((mono, spec.sample_rate))
}

/// 出力ストリームを構築します。ソースは出力レートとの比率で歩進します。
fn build_output_stream(
    device: &Device,
    config: &StreamConfig,
    source: Arc<Vec<f32>>,
    source_rate: u32,
    progress: &Progress,
) -> Result<Stream, Box<dyn Error>> {
    let channels = config.channels as usize;
    let output_rate = config.sample_rate.0 as u64;
    let source_rate = source_rate as u64;

    let frames_played = progress.frames_played.clone();
    let playing = progress.playing.clone();
    let error_cb = progress.error.clone();
    let playing_cb = progress.playing.clone();

    let stream = device.build_output_stream(
        config,
        move |output: &mut [f32], _| {
            let mut frame = frames_played.load(Ordering::SeqCst);
            for out_frame in output.chunks_mut(channels) {
                // 出力フレーム位置をソースのサンプル位置に写像する
                let src_index = (frame * source_rate / output_rate) as usize;
                let sample = if src_index < source.len() {
                    source[src_index]
                } else {
                    // 全サンプル消費 = 自然終了
                    playing.store(false, Ordering::SeqCst);
                    0.0
                };
                for out in out_frame.iter_mut() {
                    *out = sample;
                }
                frame += 1;
            }
            frames_played.store(frame, Ordering::SeqCst);
        },
        move |e| {
            // 実行時エラーはコーディネータが take_error で回収する
            *error_cb.lock().unwrap() = Some(e.to_string());
            playing_cb.store(false, Ordering::SeqCst);
        },
        None,
    )?;

    Ok(stream)
}

/// 共通の再生バックエンド実体。設定解決ポリシーだけが実装ごとに異なる。
struct PlayerCore {
    active: Mutex<Option<ActivePlayback>>,
    error: Arc<Mutex<Option<String>>>,
}

impl PlayerCore {
    fn new() -> Self {
        Self {
            active: Mutex::new(None),
            error: Arc::new(Mutex::new(None)),
        }
    }

    fn start(
        &self,
        path: &Path,
        resolve_config: impl Fn(&Device, u32) -> Result<StreamConfig, Box<dyn Error>>,
    ) -> Result<(), Box<dyn Error>> {
        // 前回の再生が残っていれば解放
        self.stop();
        *self.error.lock().unwrap() = None;

        let (samples, source_rate) = load_wav_samples(path)?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no output device available")?;
        let config = resolve_config(&device, source_rate)?;

        let progress = Progress {
            frames_played: Arc::new(AtomicU64::new(0)),
            playing: Arc::new(AtomicBool::new(true)),
            error: self.error.clone(),
        };

        let stream = build_output_stream(
            &device,
            &config,
            Arc::new(samples),
            source_rate,
            &progress,
        )?;
        stream.play()?;

        *self.active.lock().unwrap() = Some(ActivePlayback {
            _stream: stream,
            frames_played: progress.frames_played,
            output_rate: config.sample_rate.0,
            playing: progress.playing,
        });
        Ok(())
    }

    fn current_time(&self) -> f64 {
        let guard = self.active.lock().unwrap();
        match guard.as_ref() {
            Some(active) => {
                active.frames_played.load(Ordering::SeqCst) as f64 / active.output_rate as f64
            }
            None => 0.0,
        }
    }

    fn is_playing(&self) -> bool {
        let guard = self.active.lock().unwrap();
        guard
            .as_ref()
            .map(|active| active.playing.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn take_error(&self) -> Option<String> {
        self.error.lock().unwrap().take()
    }

    fn stop(&self) {
        if let Some(active) = self.active.lock().unwrap().take() {
            active.playing.store(false, Ordering::SeqCst);
            // ストリームはドロップで解放される
        }
    }
}

/// プライマリ再生実装。WAV のレートに一致する出力設定を要求します。
pub struct CpalPlayerBackend {
    core: PlayerCore,
}

impl Default for CpalPlayerBackend {
    fn default() -> Self {
        Self {
            core: PlayerCore::new(),
        }
    }
}

impl PlaybackBackend for CpalPlayerBackend {
    fn start_playback(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        self.core.start(path, |device, source_rate| {
            // ソースレートを含む出力設定レンジを探す。見つからなければ開始失敗
            // となり、コーディネータがフォールバックを試す。
            let range = device
                .supported_output_configs()?
                .find(|range| {
                    range.sample_format() == SampleFormat::F32
                        && range.min_sample_rate().0 <= source_rate
                        && range.max_sample_rate().0 >= source_rate
                })
                .ok_or("no output config matching the recording sample rate")?;
            Ok(range.with_sample_rate(SampleRate(source_rate)).into())
        })
    }

    fn current_time(&self) -> f64 {
        self.core.current_time()
    }

    fn is_playing(&self) -> bool {
        self.core.is_playing()
    }

    fn take_error(&self) -> Option<String> {
        self.core.take_error()
    }

    fn stop(&self) {
        self.core.stop();
    }
}

/// フォールバック再生実装。デバイス既定の出力設定をそのまま使います。
pub struct FallbackPlayerBackend {
    core: PlayerCore,
}

impl Default for FallbackPlayerBackend {
    fn default() -> Self {
        Self {
            core: PlayerCore::new(),
        }
    }
}

impl PlaybackBackend for FallbackPlayerBackend {
    fn start_playback(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        self.core.start(path, |device, _source_rate| {
            let supported = device.default_output_config()?;
            if supported.sample_format() != SampleFormat::F32 {
                return Err("unsupported sample format".into());
            }
            Ok(supported.into())
        })
    }

    fn current_time(&self) -> f64 {
        self.core.current_time()
    }

    fn is_playing(&self) -> bool {
        self.core.is_playing()
    }

    fn take_error(&self) -> Option<String> {
        self.core.take_error()
    }

    fn stop(&self) {
        self.core.stop();
    }
}

/// 録音ファイルが再生可能かを検査し、診断レポートを返します。
///
/// 再生を妨げるためではなく、再生前のログ出力のための軽い検査。
pub fn verify_recording_playable(path: &Path) -> Result<String, String> {
    if !path.exists() {
        return Err(format!("recording file not found: {}", path.display()));
    }

    let size = std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| format!("cannot stat recording file: {e}"))?;
    if size < 1_000 {
        return Err(format!(
            "recording file is very small ({size} bytes), may not contain valid audio"
        ));
    }

    let reader =
        hound::WavReader::open(path).map_err(|e| format!("recording is not a readable WAV: {e}"))?;
    let spec = reader.spec();
    let duration_secs = reader.duration() as f64 / spec.sample_rate as f64;

    Ok(format!(
        "recording playable: {} bytes, {}ch {}Hz {:.2}s",
        size, spec.channels, spec.sample_rate, duration_secs
    ))
}
