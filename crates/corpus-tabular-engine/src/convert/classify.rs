/// Local facts about a single physical line.
///
/// Classification against block schemas happens in the handler tree; this
/// only strips line endings and detects blankness.
#[derive(Debug, Clone, Copy)]
pub struct LineInfo<'a> {
    /// The line as read, possibly including the trailing line break.
    pub raw: &'a str,
    /// The line without trailing `\r`/`\n`.
    pub content: &'a str,
    /// Whitespace-only after stripping the line break.
    pub is_blank: bool,
    /// 1-based physical line number.
    pub number: usize,
}

impl<'a> LineInfo<'a> {
    pub fn classify(raw: &'a str, number: usize) -> Self {
        let content = raw.trim_end_matches(['\r', '\n']);
        Self {
            raw,
            content,
            is_blank: content.trim().is_empty(),
            number,
        }
    }
}
