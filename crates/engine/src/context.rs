use std::collections::VecDeque;

pub const CONTEXT_WINDOW: usize = 3;

/// The most recent chunk summaries fed into the next chunk's prompt.
#[derive(Debug, Clone)]
pub struct RollingContextWindow {
    entries: VecDeque<String>,
}

impl Default for RollingContextWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingContextWindow {
    pub fn new() -> Self {
        RollingContextWindow {
            entries: VecDeque::with_capacity(CONTEXT_WINDOW),
        }
    }

    /// Rebuilds a window from summaries reloaded in processing order.
    pub fn seeded<I, S>(summaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut window = Self::new();
        for summary in summaries {
            window.push(summary);
        }
        window
    }

    pub fn push(&mut self, text: impl Into<String>) {
        self.entries.push_back(text.into());
        while self.entries.len() > CONTEXT_WINDOW {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Numbers retained entries from `max(0, current_index - len) + 1` so the
    /// labels keep their absolute position after eviction. Empty window
    /// renders nothing.
    pub fn render(&self, current_index: usize) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let start_index = current_index.saturating_sub(self.entries.len());
        let body = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, summary)| format!("Video {}: {}", start_index + i + 1, summary))
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(format!("[Recent videos]\n{}", body))
    }
}
