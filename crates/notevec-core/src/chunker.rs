//! Markdown chunking: sections first, paragraphs when a section is too long.
//!
//! Chunking is a pure function of the text and the [`ChunkingConfig`], and is
//! prefix-stable: an edit only changes the chunks from the edited section on.

use crate::config::ChunkingConfig;

const PARAGRAPH_SEP: &str = "\n\n";

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Split `text` into ordered chunk texts. Empty input yields no chunks.
    ///
    /// A paragraph longer than the budget is emitted whole rather than cut.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for section in self.sections(text) {
            let section = section.trim();
            if section.is_empty() {
                continue;
            }
            if char_len(section) <= self.config.max_chars {
                chunks.push(section.to_string());
            } else {
                self.split_section(section, &mut chunks);
            }
        }
        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }

    /// Break the text before every heading line, keeping the heading with its body.
    fn sections(&self, text: &str) -> Vec<String> {
        let prefix = self.config.heading_prefix.as_str();
        let mut sections = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in text.split('\n') {
            if !prefix.is_empty() && line.starts_with(prefix) && !current.is_empty() {
                sections.push(current.join("\n"));
                current.clear();
            }
            current.push(line);
        }
        if !current.is_empty() {
            sections.push(current.join("\n"));
        }
        sections
    }

    /// Accumulate paragraphs up to the budget. Chunks after the first repeat the
    /// section heading so they keep their context.
    fn split_section(&self, section: &str, out: &mut Vec<String>) {
        let heading = self.heading_line(section);
        let context_len = heading.map_or(0, |h| char_len(h) + PARAGRAPH_SEP.len());
        let mut first = true;
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0;
        for para in section.split(PARAGRAPH_SEP).map(str::trim).filter(|p| !p.is_empty()) {
            let para_len = char_len(para);
            let heading_alone = first && current.len() == 1 && heading == Some(current[0]);
            if !current.is_empty()
                && !heading_alone
                && current_len + para_len + PARAGRAPH_SEP.len() > self.config.max_chars
            {
                out.push(assemble(if first { None } else { heading }, &current));
                first = false;
                current.clear();
                current_len = context_len;
            }
            current.push(para);
            current_len += para_len + PARAGRAPH_SEP.len();
        }
        if !current.is_empty() {
            out.push(assemble(if first { None } else { heading }, &current));
        }
    }

    fn heading_line<'a>(&self, section: &'a str) -> Option<&'a str> {
        let prefix = self.config.heading_prefix.as_str();
        if prefix.is_empty() || !section.starts_with(prefix) {
            return None;
        }
        section.lines().next().map(str::trim_end)
    }
}

fn assemble(heading: Option<&str>, paragraphs: &[&str]) -> String {
    let body = paragraphs.join(PARAGRAPH_SEP);
    match heading {
        Some(h) => format!("{h}{PARAGRAPH_SEP}{body}"),
        None => body,
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
