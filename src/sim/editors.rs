use crate::error::ParseError;
use crate::services::{BlockWorkspace, TextEditor};

/// A block workspace where every non-blank source line is one block.
///
/// Good enough to exercise linking: a line with an unbalanced double quote
/// does not parse, and the saved form is a JSON array of the lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineWorkspace {
    lines: Vec<String>,
    visible: bool,
}

impl LineWorkspace {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn add_block(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !line.trim().is_empty() {
            self.lines.push(line.trim_end().to_string());
        }
    }
}

impl BlockWorkspace for LineWorkspace {
    type Program = Vec<String>;

    fn clear(&mut self) {
        self.lines.clear();
    }

    fn block_count(&self) -> usize {
        self.lines.len()
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn parse_text(&self, source: &str) -> Result<Self::Program, ParseError> {
        let mut program = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let quotes: Vec<usize> = line.match_indices('"').map(|(i, _)| i).collect();
            if quotes.len() % 2 == 1 {
                let column = quotes.last().copied().unwrap_or(0) + 1;
                return Err(ParseError::new(idx + 1, column, "unfinished string"));
            }
            program.push(line.trim_end().to_string());
        }
        Ok(program)
    }

    fn to_saved(&self) -> String {
        serde_json::to_string_pretty(&self.lines).unwrap_or_else(|_| "[]".to_string())
    }

    fn parse_saved(&self, saved: &str) -> Result<Self::Program, ParseError> {
        serde_json::from_str::<Vec<String>>(saved)
            .map_err(|err| ParseError::new(err.line(), err.column(), err.to_string()))
    }

    fn load_program(&mut self, program: Self::Program) {
        for line in program {
            self.add_block(line);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextEditor for TextBuffer {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    // A plain buffer has no cursor to move.
    fn focus(&mut self) {}
}
