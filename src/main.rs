//! speech_transcriber CLI: `speech_transcriberd` デーモンの簡易コントローラ。
//! 各コマンドを `ipc::send_cmd` で送信し、レスポンスを表示します。
use clap::Parser;
use speech_transcriber::application::StatusSnapshot;
use speech_transcriber::cli::{Cli, Cmd};
use speech_transcriber::ipc::{IpcCmd, send_cmd};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 読み込み (SPEECH_TRANSCRIBER_ENV_PATH > .env)
    if let Ok(path) = std::env::var("SPEECH_TRANSCRIBER_ENV_PATH") {
        dotenvy::from_path(path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    let cli = Cli::parse();

    if cli.list_devices {
        let resp = send_cmd(&IpcCmd::ListDevices)?;
        println!("{}", resp.msg);
        return Ok(());
    }

    let Some(cmd) = cli.cmd else {
        eprintln!("no command given (try --help)");
        return Ok(());
    };

    let ipc_cmd = match cmd {
        Cmd::Record => IpcCmd::StartRecording,
        Cmd::Stop => IpcCmd::StopRecording,
        Cmd::Toggle => IpcCmd::ToggleRecording,
        Cmd::Play => IpcCmd::StartPlayback,
        Cmd::StopPlay => IpcCmd::StopPlayback,
        Cmd::TogglePlay => IpcCmd::TogglePlayback,
        Cmd::Status => IpcCmd::Status,
        Cmd::Dismiss => IpcCmd::Dismiss,
        Cmd::Health => IpcCmd::Health,
    };

    let is_status = ipc_cmd == IpcCmd::Status;
    let resp = send_cmd(&ipc_cmd)?;

    if is_status && resp.ok {
        // Status のレスポンスはスナップショット JSON。人間向けに整形する
        match serde_json::from_str::<StatusSnapshot>(&resp.msg) {
            Ok(snapshot) => print_snapshot(&snapshot),
            Err(_) => println!("{}", resp.msg),
        }
    } else {
        println!("{}", resp.msg);
    }

    if !resp.ok {
        std::process::exit(1);
    }
    Ok(())
}

/// スナップショットを整形表示する
fn print_snapshot(snapshot: &StatusSnapshot) {
    println!("state: {:?}", snapshot.state);
    if !snapshot.text.is_empty() {
        println!("transcript: {}", snapshot.text);
    }
    if let Some(index) = snapshot.highlighted_word_index {
        if let Some(word) = snapshot.words.get(index) {
            println!("highlighted: [{}] {}", index, word.text);
        }
    }
}
