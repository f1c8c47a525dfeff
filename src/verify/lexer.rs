//! Minimal lexer for C-family sources
//!
//! Counts delimiter balance outside strings and comments, and string literals
//! that never terminate. It does not parse; it only has to agree with itself
//! when run on a file before and after patching.

/// Lexical rules that differ between languages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// `/* /* */ */` nests
    pub nested_comments: bool,
    /// `"..."` may span lines
    pub multiline_strings: bool,
    /// `'a` is a lifetime, `'a'` a char; raw strings `r#"..."#`
    pub rust_literals: bool,
    /// `` `...` `` is a string that may span lines
    pub backtick_strings: bool,
    /// `'...'` is a string (not a char literal)
    pub single_quote_strings: bool,
    /// `"""..."""` text blocks
    pub triple_quote_strings: bool,
}

impl Dialect {
    const C: Dialect = Dialect {
        nested_comments: false,
        multiline_strings: false,
        rust_literals: false,
        backtick_strings: false,
        single_quote_strings: false,
        triple_quote_strings: false,
    };

    /// Dialect for a file extension, `None` when the file is not lexed
    pub fn for_extension(ext: &str) -> Option<Dialect> {
        let dialect = match ext {
            "rs" => Dialect {
                nested_comments: true,
                multiline_strings: true,
                rust_literals: true,
                ..Self::C
            },
            "c" | "h" | "cc" | "cpp" | "hpp" | "cs" | "json" => Self::C,
            "java" => Dialect {
                triple_quote_strings: true,
                ..Self::C
            },
            "go" => Dialect {
                backtick_strings: true,
                ..Self::C
            },
            "js" | "jsx" | "ts" | "tsx" => Dialect {
                backtick_strings: true,
                single_quote_strings: true,
                ..Self::C
            },
            "swift" | "kt" => Dialect {
                nested_comments: true,
                triple_quote_strings: true,
                ..Self::C
            },
            _ => return None,
        };
        Some(dialect)
    }
}

/// Lexical fingerprint of one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexSummary {
    /// Open minus close counts for `()`, `[]`, `{}`
    pub parens: i64,
    pub brackets: i64,
    pub braces: i64,
    /// Literals or block comments cut off by a newline or end of input
    pub unterminated: usize,
}

impl LexSummary {
    /// Describe how `self` (patched) differs from `before` (original)
    pub fn regressions_from(&self, before: &LexSummary) -> Vec<String> {
        let mut reasons = Vec::new();
        for (name, was, now) in [
            ("()", before.parens, self.parens),
            ("[]", before.brackets, self.brackets),
            ("{}", before.braces, self.braces),
        ] {
            if was != now {
                reasons.push(format!("{name} balance changed from {was} to {now}"));
            }
        }
        if self.unterminated > before.unterminated {
            reasons.push(format!(
                "{} unterminated literal(s) introduced",
                self.unterminated - before.unterminated
            ));
        }
        reasons
    }
}

/// Lexical context at a byte position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Code,
    LineComment,
    BlockComment(usize),
    Str(u8),
    RawStr(usize),
    TripleStr,
}

/// How one byte range sits in the lexical structure of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    /// Context changes caused by bytes inside the range
    pub boundaries: usize,
    /// Context right after the range
    pub after: Context,
}

/// Lex `src` and summarize its delimiter balance
pub fn summarize(src: &[u8], dialect: Dialect) -> LexSummary {
    lex(src, dialect, None)
}

/// Context of each `(start, end)` range; ranges must be sorted and disjoint
pub fn span_contexts(src: &[u8], dialect: Dialect, ranges: &[(usize, usize)]) -> Vec<SpanContext> {
    let mut changes = Vec::new();
    lex(src, dialect, Some(&mut changes));

    ranges
        .iter()
        .map(|&(start, end)| {
            let first = changes.partition_point(|&(pos, _)| pos < start);
            let past = changes.partition_point(|&(pos, _)| pos < end);
            let after = past
                .checked_sub(1)
                .map_or(Context::Code, |last| changes[last].1);
            SpanContext {
                boundaries: past - first,
                after,
            }
        })
        .collect()
}

/// Lex `src`; context changes are recorded as (position of the causing byte, new context)
fn lex(src: &[u8], dialect: Dialect, mut changes: Option<&mut Vec<(usize, Context)>>) -> LexSummary {
    let mut summary = LexSummary::default();
    let mut state = Context::Code;
    let mut i = 0;
    let at = |j: usize| src.get(j).copied();

    while i < src.len() {
        let b = src[i];
        let start = i;
        let before = state;
        match state {
            Context::Code => match b {
                b'/' if at(i + 1) == Some(b'/') => {
                    state = Context::LineComment;
                    i += 1;
                }
                b'/' if at(i + 1) == Some(b'*') => {
                    state = Context::BlockComment(1);
                    i += 1;
                }
                b'"' if dialect.triple_quote_strings && src[i..].starts_with(b"\"\"\"") => {
                    state = Context::TripleStr;
                    i += 2;
                }
                b'"' => state = Context::Str(b'"'),
                b'`' if dialect.backtick_strings => state = Context::Str(b'`'),
                b'\'' if dialect.single_quote_strings => state = Context::Str(b'\''),
                b'\'' if dialect.rust_literals => i = skip_rust_quote(src, i),
                b'\'' => state = Context::Str(b'\''),
                b'r' | b'b' if dialect.rust_literals && !is_ident_byte(i.checked_sub(1).and_then(at)) => {
                    if let Some((hashes, quote)) = raw_string_start(src, i) {
                        state = Context::RawStr(hashes);
                        i = quote;
                    }
                }
                b'(' => summary.parens += 1,
                b')' => summary.parens -= 1,
                b'[' => summary.brackets += 1,
                b']' => summary.brackets -= 1,
                b'{' => summary.braces += 1,
                b'}' => summary.braces -= 1,
                _ => {}
            },
            Context::LineComment => {
                if b == b'\n' {
                    state = Context::Code;
                }
            }
            Context::BlockComment(depth) => {
                if b == b'*' && at(i + 1) == Some(b'/') {
                    state = if depth > 1 {
                        Context::BlockComment(depth - 1)
                    } else {
                        Context::Code
                    };
                    i += 1;
                } else if dialect.nested_comments && b == b'/' && at(i + 1) == Some(b'*') {
                    state = Context::BlockComment(depth + 1);
                    i += 1;
                }
            }
            Context::Str(quote) => {
                // Go raw strings are the only quotes without escapes.
                let escapes = quote != b'`' || dialect.single_quote_strings;
                if b == b'\\' && escapes {
                    i += 1;
                } else if b == quote {
                    state = Context::Code;
                } else if b == b'\n' && quote != b'`' && !dialect.multiline_strings {
                    summary.unterminated += 1;
                    state = Context::Code;
                }
            }
            Context::RawStr(hashes) => {
                if b == b'"' && src[i + 1..].iter().take(hashes).filter(|&&h| h == b'#').count() == hashes {
                    state = Context::Code;
                    i += hashes;
                }
            }
            Context::TripleStr => {
                if b == b'\\' {
                    i += 1;
                } else if src[i..].starts_with(b"\"\"\"") {
                    state = Context::Code;
                    i += 2;
                }
            }
        }
        if state != before {
            if let Some(changes) = changes.as_deref_mut() {
                changes.push((start, state));
            }
        }
        i += 1;
    }

    if !matches!(state, Context::Code | Context::LineComment) {
        summary.unterminated += 1;
    }
    summary
}

fn is_ident_byte(b: Option<u8>) -> bool {
    b.is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Start of `r"`, `r#"`, `br"`, `br##"`: returns (hash count, index of the quote)
fn raw_string_start(src: &[u8], i: usize) -> Option<(usize, usize)> {
    let mut j = i;
    if src[j] == b'b' {
        j += 1;
    }
    if src.get(j) != Some(&b'r') {
        return None;
    }
    j += 1;
    let hashes = src[j..].iter().take_while(|&&h| h == b'#').count();
    j += hashes;
    (src.get(j) == Some(&b'"')).then_some((hashes, j))
}

/// Skip a Rust char literal starting at `i`; a lifetime or label is left as code
///
/// Returns the index of the last byte consumed.
fn skip_rust_quote(src: &[u8], i: usize) -> usize {
    match src.get(i + 1) {
        Some(b'\\') => {
            // Escaped char: '\n', '\'', '\u{1F600}'
            let mut j = i + 3;
            while j < src.len() && src[j] != b'\'' && src[j] != b'\n' {
                j += 1;
            }
            if src.get(j) == Some(&b'\'') { j } else { i }
        }
        Some(&lead) => {
            let width = utf8_width(lead);
            if src.get(i + 1 + width) == Some(&b'\'') {
                i + 1 + width
            } else {
                i
            }
        }
        None => i,
    }
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}
