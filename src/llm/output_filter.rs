use crate::config::OutputFilterPolicy;

/// Decides, chunk by chunk, what part of one stream reaches the user. Every
/// chunk the backend sends counts toward the leading window, including
/// tool-call chunks and empty ones. Build a fresh filter for each stream.
#[derive(Debug, Clone)]
pub struct OutputFilter {
    policy: OutputFilterPolicy,
    seen: usize,
    suppressed: usize,
}

impl OutputFilter {
    pub fn new(policy: OutputFilterPolicy) -> Self {
        Self {
            policy,
            seen: 0,
            suppressed: 0,
        }
    }

    /// Record one chunk and report whether its content should be shown.
    pub fn admit(&mut self, content: &str) -> bool {
        self.seen += 1;
        let hidden = self.seen <= self.policy.suppress_leading_chunks
            || self.policy.suppress_tokens.iter().any(|t| t == content);
        if hidden {
            self.suppressed += 1;
        }
        !hidden && !content.is_empty()
    }

    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn suppressed(&self) -> usize {
        self.suppressed
    }
}
