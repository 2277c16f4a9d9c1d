use crate::infrastructure::audio::CaptureBackend;
use std::error::Error;
use std::path::{Path, PathBuf};

/// `CaptureBackend` の薄いラッパ。バックエンド選択を抽象化し、ドメイン層に録音 I/F を提供する。
pub struct Recorder<T: CaptureBackend> {
    backend: T,
}

impl<T: CaptureBackend> Recorder<T> {
    /// バックエンドを注入して新しい `Recorder` を作成。
    pub fn new(backend: T) -> Self {
        Self { backend }
    }

    /// 録音を開始します。
    pub fn start(&self) -> Result<(), Box<dyn Error>> {
        self.backend.start_capture()
    }

    /// 録音を停止し、保存された WAV ファイルのパスを返します。
    pub fn stop(&self) -> Result<PathBuf, Box<dyn Error>> {
        self.backend.stop_capture()
    }

    /// 録音ファイルの生バイト列を読み込みます。
    pub fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, Box<dyn Error>> {
        self.backend.read_bytes(path)
    }

    /// 録音中かどうかを返します。
    pub fn is_recording(&self) -> bool {
        self.backend.is_capturing()
    }
}
