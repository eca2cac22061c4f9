//! Per-stage memory of earlier exchanges.
//!
//! Each stage can remember its recent (task, output) pairs across requests
//! and replay them ahead of the current task. Replay is bounded by both an
//! exchange count and a character budget.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::llm::Message;

/// Default number of exchanges a stage remembers.
pub const DEFAULT_MAX_EXCHANGES: usize = 10;

/// Default character budget for replayed history.
pub const DEFAULT_MAX_CHARS: usize = 16_000;

/// One remembered task and the output the stage produced for it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Exchange {
    task: String,
    output: String,
}

/// Bounded, shared history of a stage's exchanges.
///
/// The lock is held only to snapshot or append, never across an LLM call.
#[derive(Debug)]
pub struct StageMemory {
    exchanges: Mutex<VecDeque<Exchange>>,
    /// Maximum number of exchanges to keep.
    max_exchanges: usize,
    /// Maximum characters replayed by `history`.
    max_chars: usize,
}

impl Default for StageMemory {
    fn default() -> Self {
        Self::with_max_exchanges(DEFAULT_MAX_EXCHANGES)
    }
}

impl StageMemory {
    /// Creates an empty memory with the default limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty memory with a custom exchange limit.
    pub fn with_max_exchanges(max_exchanges: usize) -> Self {
        Self {
            exchanges: Mutex::new(VecDeque::new()),
            max_exchanges,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    /// Sets the character budget for replayed history.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Records an exchange, dropping the oldest ones past the limit.
    pub async fn remember(&self, task: impl Into<String>, output: impl Into<String>) {
        if self.max_exchanges == 0 {
            return;
        }
        let mut exchanges = self.exchanges.lock().await;
        exchanges.push_back(Exchange {
            task: task.into(),
            output: output.into(),
        });
        while exchanges.len() > self.max_exchanges {
            exchanges.pop_front();
        }
    }

    /// Returns the remembered exchanges as alternating user/assistant messages.
    ///
    /// Only the newest exchanges that fit the character budget are replayed;
    /// an exchange larger than the whole budget is never replayed.
    pub async fn history(&self) -> Vec<Message> {
        let exchanges = self.exchanges.lock().await;
        let mut used = 0;
        let recent: Vec<&Exchange> = exchanges
            .iter()
            .rev()
            .take_while(|e| {
                used += e.task.len() + e.output.len();
                used <= self.max_chars
            })
            .collect();

        recent
            .into_iter()
            .rev()
            .flat_map(|e| [Message::user(e.task.clone()), Message::assistant(e.output.clone())])
            .collect()
    }

    /// Number of exchanges currently remembered.
    pub async fn len(&self) -> usize {
        self.exchanges.lock().await.len()
    }

    /// Returns true if nothing is remembered.
    pub async fn is_empty(&self) -> bool {
        self.exchanges.lock().await.is_empty()
    }
}
