const START_MARKER: &str = "<<<EXAMPLE:";
const END_MARKER: &str = ">>>";

/// The example embedded in an answer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Example {
    /// The example text so far.
    pub text: String,
    /// `false` while the end marker has not arrived yet.
    pub complete: bool,
}

/// Tracks the example tag in a growing reply.
#[derive(Debug, Default)]
pub(crate) struct ExampleExtractor {
    current: Option<Example>,
}

impl ExampleExtractor {
    /// Re-reads the reply, returning the example if it changed.
    pub fn update(&mut self, reply: &str) -> Option<&Example> {
        let start = reply.rfind(START_MARKER)?;
        let body = &reply[start + START_MARKER.len()..];
        let example = match body.find(END_MARKER) {
            Some(end) => Example {
                text: body[..end].trim().to_owned(),
                complete: true,
            },
            None => {
                let partial = body
                    .strip_suffix(">>")
                    .or_else(|| body.strip_suffix('>'))
                    .unwrap_or(body);
                Example {
                    text: partial.trim().to_owned(),
                    complete: false,
                }
            }
        };
        if self.current.as_ref() == Some(&example) {
            return None;
        }
        self.current = Some(example);
        self.current.as_ref()
    }

    #[inline]
    pub fn current(&self) -> Option<&Example> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streamed_example() {
        let tokens = [
            "Intro ", "<<<EXAM", "PLE:", "The ", "cat", " sat", ">", ">>",
            " outro",
        ];
        let mut extractor = ExampleExtractor::default();
        let mut reply = String::new();
        let mut updates = vec![];
        for token in tokens {
            reply.push_str(token);
            if let Some(example) = extractor.update(&reply) {
                updates.push(example.clone());
            }
        }
        let texts: Vec<_> = updates
            .iter()
            .map(|e| (e.text.as_str(), e.complete))
            .collect();
        assert_eq!(
            texts,
            vec![
                ("", false),
                ("The", false),
                ("The cat", false),
                ("The cat sat", false),
                ("The cat sat", true),
            ]
        );
        assert_eq!(
            extractor.current(),
            Some(&Example {
                text: "The cat sat".to_owned(),
                complete: true,
            })
        );
    }

    #[test]
    fn test_no_example() {
        let mut extractor = ExampleExtractor::default();
        assert!(extractor.update("Just an answer >>> here").is_none());
        assert!(extractor.current().is_none());
    }
}
