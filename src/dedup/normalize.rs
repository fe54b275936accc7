//! Text normalization for duplicate comparison

/// Non-ASCII punctuation, quotation marks and brackets replaced with a space.
/// ASCII punctuation is handled by `char::is_ascii_punctuation`.
const EXTRA_PUNCTUATION: &[char] = &[
    // CJK punctuation
    '、', '。', '〃', '〈', '〉', '《', '》', '「', '」', '『', '』', '【', '】', '〔', '〕',
    '〖', '〗', '〘', '〙', '〚', '〛', '〜', '・', '…', '‥',
    // Full-width forms
    '！', '＂', '＃', '＄', '％', '＆', '＇', '（', '）', '＊', '＋', '，', '－', '．', '／',
    '：', '；', '＜', '＝', '＞', '？', '＠', '［', '＼', '］', '＾', '＿', '｀', '｛', '｜',
    '｝', '～', '｟', '｠', '｡', '｢', '｣', '､',
    // Unicode quotation marks and dashes
    '‘', '’', '‚', '‛', '“', '”', '„', '‟', '‹', '›', '«', '»', '′', '″', '–', '—', '―',
];

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || EXTRA_PUNCTUATION.contains(&c)
}

/// Canonicalize text for comparison.
///
/// Trims, lowercases, replaces punctuation with spaces and collapses every
/// whitespace run (newlines included) into one ASCII space. Idempotent.
///
/// Example: `"AI Technology is changing FAST!!"` → `"ai technology is changing fast"`
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let replaced: String = lowered
        .chars()
        .map(|c| if is_punctuation(c) { ' ' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `normalize` for optional input; `None` is treated as empty text.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}
