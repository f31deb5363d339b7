use log::info;

use crate::ds::RingBuffer;

/// Fixed-capacity list of recent user-facing messages
///
/// Every message is also forwarded to the `log` facade at info level.
#[derive(Debug, Clone)]
pub struct GameLog {
    lines: RingBuffer<String>,
}

impl GameLog {
    /// ### Panics
    /// If `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: RingBuffer::new(capacity),
        }
    }

    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.lines.push(message);
    }

    /// Newest first
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().rev().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
