//! speech-transcriberd: 録音・転写・再生を統括する常駐プロセス（シングルスレッド Tokio ランタイム）
//!
//! # 概要
//! CLI から Unix Domain Socket (UDS) 経由で受け取ったコマンドをハンドリングし、
//!  - `Recorder` を介した録音の開始 / 停止
//!  - Google Cloud Speech-to-Text を用いた単語時刻付き文字起こし
//!  - 録音の再生と単語ハイライトの同期
//! を非同期・協調的に実行します。
//!
//! ## 実行モデル
//! - `tokio::main(flavor = "current_thread")` でシングルスレッドランタイムを起動
//! - クライアントごとの処理／転写サイクル／再生ティッカーは `spawn_local` でローカルタスク化
//! - マイク・ネットワーク・タイマー各プロデューサの完了は全てこのスレッドに合流してから
//!   共有状態（セッション）に触れる。セッションはスレッド安全性を持たない設計

use std::{error::Error, fs, rc::Rc};

use futures::{SinkExt, StreamExt};
use tokio::{
    net::{UnixListener, UnixStream},
    task::{LocalSet, spawn_local},
};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use speech_transcriber::{
    application::{CommandHandler, ServiceContainer},
    infrastructure::audio::CpalCaptureBackend,
    ipc::{IpcCmd, IpcResp, socket_path},
    utils::config::EnvConfig,
};

/// エントリポイント。環境変数を読み込み、`async_main` を current-thread ランタイムで実行します。
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // .env 読み込み (SPEECH_TRANSCRIBER_ENV_PATH > .env)
    if let Ok(path) = std::env::var("SPEECH_TRANSCRIBER_ENV_PATH") {
        dotenvy::from_path(path).ok();
    } else {
        dotenvy::dotenv().ok();
    }
    EnvConfig::init()?;

    // `spawn_local` はこのスレッドだけで動かしたい非同期ジョブを登録する。LocalSet はその実行エンジン
    let local = LocalSet::new();
    local.run_until(async_main()).await
}

/// ソケット待受とクライアントハンドリングを起動する本体。
async fn async_main() -> Result<(), Box<dyn Error>> {
    let path = socket_path();
    // 既存ソケットがあれば削除して再バインド
    let _ = fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    println!("speech-transcriberd listening on {}", path.display());

    // 依存グラフはここで一度だけ構築する
    let container = ServiceContainer::<CpalCaptureBackend>::new()?;
    let handler = container.command_handler.clone();

    // ─── クライアント接続ループ ──────────────────────
    loop {
        let (stream, _) = listener.accept().await?;
        let handler = handler.clone();
        spawn_local(async move {
            if let Err(e) = handle_client(stream, handler).await {
                eprintln!("client session error: {e}");
            }
        });
    }
}

/// 1 クライアントとの IPC セッションを処理します。
/// CLI からの JSON 文字列を `IpcCmd` にデシリアライズし、
/// コマンドハンドラーへ委譲して `IpcResp` を返送します。
async fn handle_client(
    stream: UnixStream,
    handler: Rc<CommandHandler<CpalCaptureBackend>>,
) -> Result<(), Box<dyn Error>> {
    let (r, w) = stream.into_split();
    let mut reader = FramedRead::new(r, LinesCodec::new());
    let mut writer = FramedWrite::new(w, LinesCodec::new());

    if let Some(Ok(line)) = reader.next().await {
        let cmd: IpcCmd = serde_json::from_str(&line)?;
        let resp = handler.handle(cmd).await.unwrap_or_else(|e| IpcResp {
            ok: false,
            msg: e.to_string(),
        });

        writer.send(serde_json::to_string(&resp)?).await?;
    }
    Ok(())
}
