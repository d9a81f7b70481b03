use bytes::BytesMut;

use super::{Chunks, ChunksError};

#[derive(Debug)]
pub enum Error {
    Transport(ChunksError),
    InvalidPayload,
}

/// Decodes a chunked body into UTF-8 text fragments.
///
/// A multi-byte character split across two network reads is held back until
/// its remaining bytes arrive, so every fragment is valid text on its own.
pub struct Fragments {
    chunks: Chunks,
    pending: BytesMut,
    eof: bool,
}

impl Fragments {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            chunks,
            pending: BytesMut::new(),
            eof: false,
        }
    }

    /// Returns the next non-empty fragment, or `None` once the body ends.
    pub async fn next_fragment(&mut self) -> Result<Option<String>, Error> {
        loop {
            if self.eof {
                return Ok(None);
            }
            let Some(chunk) =
                self.chunks.next_chunk().await.map_err(Error::Transport)?
            else {
                self.eof = true;
                if !self.pending.is_empty() {
                    // The body stopped in the middle of a character.
                    return Err(Error::InvalidPayload);
                }
                return Ok(None);
            };
            self.pending.extend_from_slice(&chunk);

            let valid_len = match std::str::from_utf8(&self.pending) {
                Ok(_) => self.pending.len(),
                Err(err) if err.error_len().is_some() => {
                    return Err(Error::InvalidPayload);
                }
                Err(err) => err.valid_up_to(),
            };
            if valid_len == 0 {
                continue;
            }

            let valid = self.pending.split_to(valid_len);
            let text = String::from_utf8(valid.to_vec())
                .map_err(|_| Error::InvalidPayload)?;
            trace!("decoded fragment of {} bytes", text.len());
            if !self.pending.is_empty() {
                trace!("holding back {} bytes", self.pending.len());
            }
            return Ok(Some(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_split_character() {
        let word = "résumé 你好".as_bytes();
        // Cut inside the second byte of "é" and inside "你".
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::copy_from_slice(&word[..2]),
                Bytes::copy_from_slice(&word[2..10]),
                Bytes::copy_from_slice(&word[10..]),
            ]
            .into(),
        );
        let mut fragments = Fragments::new(chunks);
        let mut text = String::new();
        let mut count = 0;
        while let Some(fragment) = fragments.next_fragment().await.unwrap() {
            assert!(!fragment.is_empty());
            text.push_str(&fragment);
            count += 1;
        }
        assert_eq!(text, "résumé 你好");
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_truncated_character() {
        let word = "你".as_bytes();
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::copy_from_slice(&word[..2])].into(),
        );
        let mut fragments = Fragments::new(chunks);
        assert!(matches!(
            fragments.next_fragment().await,
            Err(Error::InvalidPayload)
        ));
    }

    #[tokio::test]
    async fn test_invalid_bytes() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"ok \xff\xfe")].into(),
        );
        let mut fragments = Fragments::new(chunks);
        assert!(matches!(
            fragments.next_fragment().await,
            Err(Error::InvalidPayload)
        ));
    }
}
