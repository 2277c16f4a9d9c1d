//! 転写結果エンティティ – ドメイン層
//!
//! 認識サービスが返すセグメント構造と、UI が扱う単語列を定義します。
//! 単語列は転写サイクルごとに丸ごと差し替えられ、部分的な更新は行いません。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 転写済み単語。開始・終了オフセットは再生開始からの秒数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribedWord {
    /// 一意な識別子
    pub id: Uuid,
    /// 単語テキスト
    pub text: String,
    /// 発話開始オフセット（秒）
    pub start_time: f64,
    /// 発話終了オフセット（秒）
    pub end_time: f64,
}

impl TranscribedWord {
    /// 新しい単語を作成します。
    ///
    /// 認識結果の時刻は常に整列しているとは限らないため、
    /// `end_time < start_time` の入力は `end_time = start_time` に丸めます。
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        let end_time = if end_time < start_time {
            start_time
        } else {
            end_time
        };
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            start_time,
            end_time,
        }
    }
}

impl PartialEq for TranscribedWord {
    // 同値性はテキストと時刻で判定する（id は識別専用）
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
            && self.start_time == other.start_time
            && self.end_time == other.end_time
    }
}

/// セグメント内の候補転写ひとつ分
#[derive(Debug, Clone, PartialEq)]
pub struct WordAlternative {
    /// 候補に含まれる単語列（空の場合は利用不可の候補）
    pub words: Vec<TranscribedWord>,
}

/// 認識サービス出力の 1 セグメント。複数の候補転写を持ちうる。
#[derive(Debug, Clone, PartialEq)]
pub struct WordSegment {
    /// 信頼度順の候補リスト（先頭が最有力）
    pub alternatives: Vec<WordAlternative>,
}

/// セグメント列を単一の単語列に平坦化します。
///
/// 各セグメントの先頭候補の単語列をセグメント順に連結します。
/// 利用可能な候補を持たないセグメントは何も寄与しません（エラーにはしない）。
pub fn flatten_segments(segments: Vec<WordSegment>) -> Vec<TranscribedWord> {
    let mut all_words = Vec::new();
    for segment in segments {
        let Some(alternative) = segment.alternatives.into_iter().next() else {
            continue;
        };
        all_words.extend(alternative.words);
    }
    all_words
}

/// 単語列を空白区切りの表示テキストに結合します。
pub fn joined_text(words: &[TranscribedWord]) -> String {
    words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 終了時刻が開始時刻より前の入力は丸められる
    #[test]
    fn constructor_clamps_inverted_interval() {
        let word = TranscribedWord::new("hi", 1.0, 0.4);
        assert_eq!(word.start_time, 1.0);
        assert_eq!(word.end_time, 1.0);

        let ok = TranscribedWord::new("there", 0.6, 1.0);
        assert_eq!(ok.end_time, 1.0);
    }

    /// セグメント平坦化は先頭候補をセグメント順に連結する
    #[test]
    fn flatten_concatenates_first_alternatives_in_order() {
        let segments = vec![
            WordSegment {
                alternatives: vec![WordAlternative {
                    words: vec![TranscribedWord::new("hi", 0.0, 0.5)],
                }],
            },
            WordSegment {
                alternatives: vec![WordAlternative {
                    words: vec![TranscribedWord::new("there", 0.6, 1.0)],
                }],
            },
        ];

        let words = flatten_segments(segments);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], TranscribedWord::new("hi", 0.0, 0.5));
        assert_eq!(words[1], TranscribedWord::new("there", 0.6, 1.0));
    }

    /// 候補を持たないセグメントはスキップされる
    #[test]
    fn flatten_skips_segments_without_alternatives() {
        let segments = vec![
            WordSegment {
                alternatives: vec![],
            },
            WordSegment {
                alternatives: vec![WordAlternative {
                    words: vec![TranscribedWord::new("only", 0.2, 0.4)],
                }],
            },
        ];

        let words = flatten_segments(segments);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "only");
    }

    /// 先頭候補が空のセグメントは何も寄与しない
    #[test]
    fn flatten_yields_nothing_for_empty_first_alternative() {
        let segments = vec![WordSegment {
            alternatives: vec![
                WordAlternative { words: vec![] },
                WordAlternative {
                    words: vec![TranscribedWord::new("unused", 0.0, 0.3)],
                },
            ],
        }];

        assert!(flatten_segments(segments).is_empty());
    }

    /// 第二候補は平坦化に寄与しない
    #[test]
    fn flatten_ignores_secondary_alternatives() {
        let segments = vec![WordSegment {
            alternatives: vec![
                WordAlternative {
                    words: vec![TranscribedWord::new("first", 0.0, 0.3)],
                },
                WordAlternative {
                    words: vec![TranscribedWord::new("second", 0.0, 0.3)],
                },
            ],
        }];

        let words = flatten_segments(segments);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "first");
    }

    /// 表示テキストは空白区切りで結合される
    #[test]
    fn joined_text_uses_single_spaces() {
        let words = vec![
            TranscribedWord::new("hello", 0.0, 0.5),
            TranscribedWord::new("world", 0.6, 1.0),
        ];
        assert_eq!(joined_text(&words), "hello world");
        assert_eq!(joined_text(&[]), "");
    }
}
