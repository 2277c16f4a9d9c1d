use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "Speech Transcriber client (daemon control)")]
pub struct Cli {
    /// 利用可能な入力デバイスを一覧表示
    #[arg(long)]
    pub list_devices: bool,

    #[command(subcommand)]
    pub cmd: Option<Cmd>,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// 録音開始
    Record,
    /// 録音停止（転写を開始）
    Stop,
    /// 録音開始 / 停止トグル
    Toggle,
    /// 直近の録音を再生（単語ハイライト付き）
    Play,
    /// 再生停止
    StopPlay,
    /// 再生トグル
    TogglePlay,
    /// デーモン状態取得
    Status,
    /// エラー表示の解除
    Dismiss,
    /// ヘルスチェック
    Health,
}
