/// Where narration chunks are cut.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// Marks that end a sentence.
    pub terminators: Vec<char>,
    /// Marks where a long sentence may be cut.
    pub soft_breaks: Vec<char>,
    /// Length, in characters, past which a soft break cuts the sentence.
    pub soft_break_threshold: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            terminators: vec![
                '.', '?', '!', ';', ':', '。', '？', '！', '；', '：',
            ],
            soft_breaks: vec![',', '，', '—', '–'],
            soft_break_threshold: 50,
        }
    }
}

/// Cuts streamed answer text into speakable chunks.
#[derive(Debug)]
pub(crate) struct Segmenter {
    config: SegmenterConfig,
    pending: String,
}

impl Segmenter {
    #[inline]
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            pending: String::new(),
        }
    }

    /// Appends a token, returning a chunk if one is ready.
    pub fn push(&mut self, token: &str) -> Option<String> {
        self.pending.push_str(token);

        if token.trim().is_empty() {
            // Whitespace only flushes a sentence that is already finished.
            let finished = self
                .pending
                .trim_end()
                .chars()
                .last()
                .is_some_and(|c| self.is_terminator(c));
            return if finished { self.flush_all() } else { None };
        }

        let ends_sentence = token.chars().any(|c| self.is_terminator(c))
            && !self.pending.trim().is_empty();
        let long_enough = self.pending.chars().count()
            > self.config.soft_break_threshold
            && token.chars().any(|c| self.config.soft_breaks.contains(&c));
        if !ends_sentence && !long_enough {
            return None;
        }

        let cut = self
            .pending
            .char_indices()
            .filter(|(_, c)| self.is_break(*c))
            .last()
            .map(|(idx, c)| idx + c.len_utf8())?;
        let rest = self.pending.split_off(cut);
        let chunk = std::mem::replace(&mut self.pending, rest);
        let chunk = chunk.trim();
        if chunk.is_empty() {
            None
        } else {
            Some(chunk.to_owned())
        }
    }

    /// Flushes whatever is left at the end of the stream.
    pub fn finish(&mut self) -> Option<String> {
        self.flush_all()
    }

    fn flush_all(&mut self) -> Option<String> {
        let pending = std::mem::take(&mut self.pending);
        let chunk = pending.trim();
        if chunk.is_empty() {
            None
        } else {
            Some(chunk.to_owned())
        }
    }

    #[inline]
    fn is_terminator(&self, c: char) -> bool {
        self.config.terminators.contains(&c)
    }

    #[inline]
    fn is_break(&self, c: char) -> bool {
        self.is_terminator(c) || self.config.soft_breaks.contains(&c)
    }
}
