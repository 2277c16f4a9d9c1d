//! 単語ハイライト同期 – ドメイン層
//!
//! 再生経過時刻のサンプルと単語区間のリストから、現在発話中の単語を決定します。
//! 状態を持たない純関数として実装し、タイマーの各サンプルで安全に呼び出せます。

use crate::domain::transcript::TranscribedWord;

/// 経過時刻 `time` に発話中の単語のインデックスを返します。
///
/// 単語列を先頭から走査し、`[start_time, end_time]`（両端含む）に
/// `time` を含む最初の単語を選びます。区間が重なる不正データでは
/// 先に開始した単語（＝列の先頭側）が勝ちます。
///
/// どの区間にも含まれない場合（単語間のギャップ、先頭より前、末尾より後、
/// または空リスト）は `None` を返します。呼び出し側は `None` のとき直前の
/// ハイライトを保持します。クリアは停止・完了時にのみ行います。
pub fn highlight_for(time: f64, words: &[TranscribedWord]) -> Option<usize> {
    words
        .iter()
        .position(|word| time >= word.start_time && time <= word.end_time)
}
