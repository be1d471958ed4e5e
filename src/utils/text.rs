use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "that", "this", "what", "are", "how", "its",
    "their", "our", "your", "about", "over", "under", "between", "key", "main",
];

/// 规范化文本：小写、折叠空白、去首尾空白
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 按字符数截断，尽量在词边界处断开并补上省略号
pub fn cap_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }

    let budget = max_chars - 3;
    let truncated: String = text.chars().take(budget).collect();
    let cut = match truncated.rfind(char::is_whitespace) {
        Some(idx) if idx > budget / 2 => truncated[..idx].trim_end().to_string(),
        _ => truncated.trim_end().to_string(),
    };
    format!("{}...", cut)
}

/// 提取用于相关度排序的关键词
pub fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

/// 由主题生成安全的文件名主干：只保留字母数字、空格、`-`、`_`
pub fn safe_file_stem(topic: &str) -> String {
    let stem: String = topic
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let stem = stem.trim_end().to_string();
    if stem.trim().is_empty() {
        "presentation".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Solar   POWER\tgrowth "), "solar power growth");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_cap_chars_short_text_untouched() {
        assert_eq!(cap_chars("short", 10), "short");
    }

    #[test]
    fn test_cap_chars_breaks_on_word() {
        let capped = cap_chars("renewable energy adoption is accelerating worldwide", 30);
        assert!(capped.chars().count() <= 30);
        assert!(capped.ends_with("..."));
        assert!(capped.starts_with("renewable energy"));
    }

    #[test]
    fn test_cap_chars_multibyte() {
        let capped = cap_chars("可再生能源的发展趋势与未来展望", 8);
        assert_eq!(capped.chars().count(), 8);
    }

    #[test]
    fn test_keywords_skip_stop_words() {
        let words = keywords("The Future of Solar and Wind - Outlook");
        assert!(words.contains("solar"));
        assert!(words.contains("future"));
        assert!(!words.contains("the"));
        assert!(!words.contains("of"));
    }

    #[test]
    fn test_safe_file_stem() {
        assert_eq!(safe_file_stem("AI: Finance/Banking? "), "AI FinanceBanking");
        assert_eq!(safe_file_stem("???"), "presentation");
    }
}
