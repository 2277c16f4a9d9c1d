//! Unix Domain Socket (UDS) ベースのシンプルな IPC モジュール。
//! `speech_transcriber` CLI ↔ `speech_transcriberd` デーモン間の通信で利用します。
use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    path::{Path, PathBuf},
};

const SOCKET_FILENAME: &str = "speech_transcriber.sock";
const DEFAULT_SOCKET_PATH: &str = "/tmp/speech_transcriber.sock";

/// デーモンソケットパスを返します。
pub fn socket_path() -> PathBuf {
    if let Some(path) = socket_env("SPEECH_TRANSCRIBER_SOCKET_PATH") {
        return PathBuf::from(path);
    }

    if let Some(dir) = socket_env("SPEECH_TRANSCRIBER_SOCKET_DIR") {
        return PathBuf::from(dir).join(SOCKET_FILENAME);
    }

    PathBuf::from(DEFAULT_SOCKET_PATH)
}

/// CLI からデーモンへ送るコマンド列挙。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IpcCmd {
    /// 録音開始
    StartRecording,
    /// 録音停止（転写サイクルを起動）
    StopRecording,
    /// 録音トグル
    ToggleRecording,
    /// 再生開始
    StartPlayback,
    /// 再生停止
    StopPlayback,
    /// 再生トグル
    TogglePlayback,
    /// 状態スナップショット取得
    Status,
    /// エラー表示の解除
    Dismiss,
    ListDevices,
    Health,
}

/// デーモンからの汎用レスポンス。
#[derive(Debug, Serialize, Deserialize)]
pub struct IpcResp {
    pub ok: bool,
    pub msg: String,
}

fn socket_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// コマンドを送信して `IpcResp` を取得する同期ユーティリティ。
pub fn send_cmd(cmd: &IpcCmd) -> Result<IpcResp, Box<dyn Error>> {
    use futures::{SinkExt, StreamExt};
    use tokio::net::UnixStream;
    use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async {
            let path = socket_path();
            if !Path::new(&path).exists() {
                return Err("daemon socket not found".into());
            }

            let stream = UnixStream::connect(path).await?;
            let (r, w) = stream.into_split();
            let mut writer = FramedWrite::new(w, LinesCodec::new());
            let mut reader = FramedRead::new(r, LinesCodec::new());

            writer.send(serde_json::to_string(cmd)?).await?;
            if let Some(Ok(line)) = reader.next().await {
                Ok(serde_json::from_str::<IpcResp>(&line)?)
            } else {
                Err("no response from daemon".into())
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static SOCKET_ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_lock<F: FnOnce()>(f: F) {
        let _guard = SOCKET_ENV_LOCK.lock().unwrap();
        f();
    }

    fn store_env(key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set_env(key: &str, value: &str) {
        unsafe {
            std::env::set_var(key, value);
        }
    }

    fn remove_env(key: &str) {
        unsafe {
            std::env::remove_var(key);
        }
    }

    fn restore_env(key: &str, value: Option<String>) {
        if let Some(val) = value {
            set_env(key, &val);
        } else {
            remove_env(key);
        }
    }

    /// 環境変数が未設定ならデフォルトのソケットパスを使う
    #[test]
    fn socket_path_uses_default_when_env_unset() {
        with_env_lock(|| {
            let orig_path = store_env("SPEECH_TRANSCRIBER_SOCKET_PATH");
            let orig_dir = store_env("SPEECH_TRANSCRIBER_SOCKET_DIR");
            remove_env("SPEECH_TRANSCRIBER_SOCKET_PATH");
            remove_env("SPEECH_TRANSCRIBER_SOCKET_DIR");

            assert_eq!(socket_path(), PathBuf::from(DEFAULT_SOCKET_PATH));

            restore_env("SPEECH_TRANSCRIBER_SOCKET_PATH", orig_path);
            restore_env("SPEECH_TRANSCRIBER_SOCKET_DIR", orig_dir);
        });
    }

    /// ソケットパス環境変数が設定されていれば優先される
    #[test]
    fn socket_path_uses_env_override() {
        with_env_lock(|| {
            let orig_path = store_env("SPEECH_TRANSCRIBER_SOCKET_PATH");
            let orig_dir = store_env("SPEECH_TRANSCRIBER_SOCKET_DIR");
            set_env("SPEECH_TRANSCRIBER_SOCKET_PATH", "/tmp/custom.sock");
            remove_env("SPEECH_TRANSCRIBER_SOCKET_DIR");

            assert_eq!(socket_path(), PathBuf::from("/tmp/custom.sock"));

            restore_env("SPEECH_TRANSCRIBER_SOCKET_PATH", orig_path);
            restore_env("SPEECH_TRANSCRIBER_SOCKET_DIR", orig_dir);
        });
    }

    /// ソケットディレクトリ環境変数が設定されていれば反映される
    #[test]
    fn socket_path_uses_env_dir_override() {
        with_env_lock(|| {
            let orig_path = store_env("SPEECH_TRANSCRIBER_SOCKET_PATH");
            let orig_dir = store_env("SPEECH_TRANSCRIBER_SOCKET_DIR");
            remove_env("SPEECH_TRANSCRIBER_SOCKET_PATH");
            set_env("SPEECH_TRANSCRIBER_SOCKET_DIR", "/var/tmp");

            assert_eq!(
                socket_path(),
                PathBuf::from("/var/tmp").join(SOCKET_FILENAME)
            );

            restore_env("SPEECH_TRANSCRIBER_SOCKET_PATH", orig_path);
            restore_env("SPEECH_TRANSCRIBER_SOCKET_DIR", orig_dir);
        });
    }

    /// IpcCmd/IpcRespがJSONで互換性を保つ
    #[test]
    fn ipc_cmd_and_resp_roundtrip() {
        let cmd = IpcCmd::ToggleRecording;
        let json = serde_json::to_string(&cmd).unwrap();
        let deserialized: IpcCmd = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, IpcCmd::ToggleRecording);

        let resp = IpcResp {
            ok: true,
            msg: "recording started".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        let deserialized: IpcResp = serde_json::from_str(&json).unwrap();
        assert!(deserialized.ok);
        assert_eq!(deserialized.msg, "recording started");
    }

    /// 全コマンドがJSONで往復できる
    #[test]
    fn all_commands_roundtrip_json() {
        let commands = [
            IpcCmd::StartRecording,
            IpcCmd::StopRecording,
            IpcCmd::ToggleRecording,
            IpcCmd::StartPlayback,
            IpcCmd::StopPlayback,
            IpcCmd::TogglePlayback,
            IpcCmd::Status,
            IpcCmd::Dismiss,
            IpcCmd::ListDevices,
            IpcCmd::Health,
        ];

        for cmd in commands {
            let json = serde_json::to_string(&cmd).unwrap();
            let deserialized: IpcCmd = serde_json::from_str(&json).unwrap();
            assert_eq!(deserialized, cmd);
        }
    }
}
