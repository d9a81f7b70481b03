/// Reassembles lines from arbitrarily split text fragments.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    #[inline]
    pub fn push(&mut self, fragment: &str) {
        self.buf.push_str(fragment);
    }

    /// Takes the next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buf.find('\n')?;
        let mut line: String = self.buf.drain(..=end).collect();
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// Takes whatever is left once the stream is over.
    pub fn take_rest(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let mut rest = std::mem::take(&mut self.buf);
        if rest.ends_with('\r') {
            rest.pop();
        }
        Some(rest)
    }
}
