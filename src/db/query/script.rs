use super::{Segmentation, StatementKind};

/// Where the segmenter stands relative to PL/SQL blocks.
///
/// `depth` is a heuristic fence, not an exact nesting level: the opening line
/// of a block and every BEGIN inside it both count, and only its sign matters
/// when a `;` is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BlockState {
    #[default]
    Plain,
    InBlock {
        depth: isize,
    },
}

impl BlockState {
    fn in_block(&self) -> bool {
        matches!(self, BlockState::InBlock { .. })
    }

    fn enter(&mut self) {
        *self = match *self {
            BlockState::Plain => BlockState::InBlock { depth: 1 },
            BlockState::InBlock { depth } => BlockState::InBlock { depth: depth + 1 },
        };
    }

    fn adjust(&mut self, delta: isize) {
        if let BlockState::InBlock { depth } = self {
            *depth += delta;
        }
    }

    /// A `;` ends the whole statement outside a block, or once the fence has closed.
    fn semicolon_terminates(&self) -> bool {
        match *self {
            BlockState::Plain => true,
            BlockState::InBlock { depth } => depth <= 0,
        }
    }
}

struct StatementBuilder {
    state: BlockState,
    current: String,
    statements: Vec<String>,
}

impl StatementBuilder {
    fn new() -> Self {
        Self {
            state: BlockState::Plain,
            current: String::new(),
            statements: Vec::new(),
        }
    }

    fn process_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            return;
        }

        let upper = trimmed.to_uppercase();
        if ScriptSplitter::is_block_start(&upper) {
            self.state.enter();
        }

        if self.state.in_block() {
            if upper.starts_with("BEGIN") {
                self.state.adjust(1);
            } else if upper.starts_with("END") {
                self.state.adjust(-1);
            }
        }

        self.current.push_str(line);
        self.current.push('\n');

        if trimmed == "/" {
            self.close_on_slash();
        } else if trimmed.ends_with(';') && self.state.semicolon_terminates() {
            self.emit();
        }
    }

    fn close_on_slash(&mut self) {
        // A slash right after a `;`-terminated statement leaves nothing but itself.
        let only_slash = self.current.trim() == "/";
        if only_slash {
            self.current.clear();
            self.state = BlockState::Plain;
        } else {
            self.emit();
        }
    }

    fn emit(&mut self) {
        self.statements.push(std::mem::take(&mut self.current));
        self.state = BlockState::Plain;
    }

    fn finalize(mut self) -> Segmentation {
        let mut dangling_block = false;
        if !self.current.is_empty() {
            dangling_block = self.state.in_block();
            if dangling_block {
                tracing::warn!(
                    "Script ended inside a PL/SQL block; emitting the unterminated tail as a statement"
                );
            }
            self.emit();
        }
        Segmentation {
            statements: self.statements,
            dangling_block,
        }
    }
}

pub struct ScriptSplitter;

impl ScriptSplitter {
    /// Delete every `/* ... */` span. An unclosed comment runs to end of input.
    ///
    /// Purely textual: a `/*` inside a string literal still opens a comment.
    pub fn strip_block_comments(text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut remaining = text;

        while let Some(start) = remaining.find("/*") {
            result.push_str(&remaining[..start]);
            match remaining[start + 2..].find("*/") {
                Some(end) => remaining = &remaining[start + 2 + end + 2..],
                None => return result,
            }
        }

        result.push_str(remaining);
        result
    }

    /// Segment comment-stripped text into statements, line by line.
    ///
    /// Each statement keeps its original line breaks and its terminator line.
    pub fn segment(text: &str) -> Segmentation {
        let mut builder = StatementBuilder::new();
        for line in text.split('\n') {
            builder.process_line(line);
        }
        builder.finalize()
    }

    /// Strip block comments and segment in one go.
    pub fn split_script(text: &str) -> Segmentation {
        Self::segment(&Self::strip_block_comments(text))
    }

    pub(crate) fn is_block_start(upper: &str) -> bool {
        (upper.contains("CREATE OR REPLACE")
            && (upper.contains("PROCEDURE")
                || upper.contains("TRIGGER")
                || upper.contains("FUNCTION")))
            || upper.starts_with("DECLARE")
            || upper.starts_with("BEGIN")
    }

    pub fn classify(statement: &str) -> StatementKind {
        let trimmed = statement.trim();
        if trimmed.is_empty() {
            return StatementKind::Empty;
        }
        if trimmed.starts_with("--") || trimmed.starts_with("/*") {
            return StatementKind::Comment;
        }

        let upper = trimmed.to_uppercase();
        if upper.starts_with("PROMPT")
            || upper.starts_with("SET ")
            || upper.starts_with("ALTER SESSION")
            || upper.starts_with("WHENEVER")
        {
            return StatementKind::ClientDirective;
        }

        StatementKind::Executable
    }

    /// Executable and still non-empty once terminators are removed.
    pub fn should_execute(statement: &str) -> bool {
        Self::classify(statement).is_executable() && !Self::execution_text(statement).is_empty()
    }

    /// Text to hand to the Oracle client for a forwarded statement.
    ///
    /// OCI rejects the SQL*Plus `/` terminator and the trailing `;` of plain SQL,
    /// while PL/SQL units must keep their final `END;`.
    pub fn execution_text(statement: &str) -> String {
        let mut body = statement.trim();

        if body == "/" {
            body = "";
        } else if let Some((head, last)) = body.rsplit_once('\n') {
            if last.trim() == "/" {
                body = head.trim_end();
            }
        }

        if Self::is_plsql_unit(body) {
            body.to_string()
        } else {
            body.trim_end_matches(';').trim_end().to_string()
        }
    }

    /// True for anonymous blocks and stored PL/SQL unit DDL.
    pub fn is_plsql_unit(statement: &str) -> bool {
        let upper = statement.trim_start().to_uppercase();
        let mut tokens = upper.split_whitespace();
        match tokens.next() {
            Some(first) if first.starts_with("BEGIN") || first.starts_with("DECLARE") => true,
            Some("CREATE") => {
                for token in tokens {
                    match token {
                        "OR" | "REPLACE" | "EDITIONABLE" | "NONEDITIONABLE" => continue,
                        "PROCEDURE" | "FUNCTION" | "TRIGGER" | "PACKAGE" | "TYPE" => {
                            return true
                        }
                        _ => return false,
                    }
                }
                false
            }
            _ => false,
        }
    }
}
