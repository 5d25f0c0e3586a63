use skr_core::RATE_LIMIT_ACTION;
use skr_core::RATE_LIMIT_CHAT;
use skr_core::RATE_WINDOW;
use std::collections::VecDeque;
use tokio::time::Instant;

/// Message categories with independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Action,
    Chat,
}

/// Per-connection sliding-window rate limiter: N events per category per
/// 60-second window. The N+1th inside the window is rejected.
#[derive(Debug, Default)]
pub struct RateLimiter {
    action: VecDeque<Instant>,
    chat: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
    /// Record an arrival; true when it fits the window.
    pub fn allow(&mut self, category: Category) -> bool {
        let now = Instant::now();
        let (window, cap) = match category {
            Category::Action => (&mut self.action, RATE_LIMIT_ACTION),
            Category::Chat => (&mut self.chat, RATE_LIMIT_CHAT),
        };
        while window
            .front()
            .map(|t| now.duration_since(*t) >= RATE_WINDOW)
            .unwrap_or(false)
        {
            window.pop_front();
        }
        if window.len() >= cap {
            return false;
        }
        window.push_back(now);
        true
    }
}
