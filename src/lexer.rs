//! Splitting an input line into words.
//!
//! Words are separated by whitespace and `&`. A line whose last non-blank
//! character is `&` runs in the background; the marker never reaches argv.

/// A tokenized input line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub words: Vec<String>,
    pub background: bool,
}

impl CommandLine {
    /// First word, i.e. the program or built-in name.
    pub fn name(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.words.get(1..).unwrap_or(&[])
    }
}

/// Tokenize one line of input.
pub fn split_into_words(line: &str) -> CommandLine {
    let line = line.trim();
    let background = line.ends_with('&');
    let words = line
        .split(|c: char| c.is_whitespace() || c == '&')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    CommandLine { words, background }
}
