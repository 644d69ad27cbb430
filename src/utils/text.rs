/// 按词截断文本，超出 width 时以 placeholder 结尾。
/// 连续空白会被压缩为一个空格。
pub fn shorten(text: &str, width: usize, placeholder: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(placeholder.chars().count());
    let mut out = String::new();
    let mut used = 0;
    for word in collapsed.split(' ') {
        let extra = if out.is_empty() { 0 } else { 1 };
        let len = word.chars().count();
        if used + extra + len > budget {
            break;
        }
        if extra == 1 {
            out.push(' ');
        }
        out.push_str(word);
        used += extra + len;
    }

    // 第一个词就放不下时按字符截断
    if out.is_empty() {
        out = collapsed.chars().take(budget).collect();
    }
    out.push_str(placeholder);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_unchanged() {
        assert_eq!(shorten("a  small\n dream", 50, "..."), "a small dream");
    }

    #[test]
    fn test_cut_on_word_boundary() {
        let s = shorten("build a school in the village", 20, "...");
        assert_eq!(s, "build a school in...");
        assert!(s.chars().count() <= 20);
    }

    #[test]
    fn test_long_first_word() {
        assert_eq!(shorten("abcdefghijklmnop", 8, "..."), "abcde...");
    }

    #[test]
    fn test_multibyte() {
        let s = shorten("мечта о большом доме у моря", 15, "...");
        assert_eq!(s, "мечта о...");
    }
}
