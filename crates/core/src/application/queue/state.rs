// Per-department queue state
//
// Owned by exactly one `DepartmentQueue` and only touched while its mutex is held.

use std::collections::HashMap;

use crate::application::estimate::{assign_estimates, serving_order, EstimatePolicy};
use crate::domain::{Department, QueueEvent, Token, TokenId, TokenStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub waiting: usize,
    pub priority_waiting: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Default)]
pub(crate) struct DepartmentState {
    /// Last issued sequence number; never decreases
    last_sequence: u64,
    tokens: HashMap<TokenId, Token>,
    /// Waiting token ids in serving order
    waiting: Vec<TokenId>,
}

impl DepartmentState {
    pub fn allocate_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn get(&self, id: &str) -> Option<&Token> {
        self.tokens.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Token> {
        self.tokens.get_mut(id)
    }

    /// Track a token; waiting tokens are placed at their serving rank
    pub fn insert(&mut self, token: Token) {
        if token.is_waiting() {
            let at = self.waiting.partition_point(|id| {
                self.tokens
                    .get(id)
                    .map_or(true, |t| serving_order(t, &token).is_lt())
            });
            self.waiting.insert(at, token.id.clone());
        }
        self.tokens.insert(token.id.clone(), token);
    }

    /// Never lowers the counter
    pub fn resume_sequence(&mut self, last_sequence: u64) {
        self.last_sequence = self.last_sequence.max(last_sequence);
    }

    /// Rebuild from a persisted token; the counter resumes after the highest number seen
    pub fn restore(&mut self, token: Token) {
        self.resume_sequence(token.sequence_number);
        self.waiting.retain(|id| id != &token.id);
        self.insert(token);
    }

    pub fn remove(&mut self, id: &str) -> Option<Token> {
        let token = self.tokens.remove(id)?;
        self.leave_waiting(id);
        Some(token)
    }

    pub fn leave_waiting(&mut self, id: &str) {
        self.waiting.retain(|w| w != id);
    }

    /// Re-sort the waiting set and refresh positions and estimates.
    /// Returns one `Updated` event per token whose values changed.
    pub fn recompute(&mut self, department: &Department, policy: &EstimatePolicy) -> Vec<QueueEvent> {
        let tokens = &self.tokens;
        self.waiting.retain(|id| tokens.get(id).is_some_and(Token::is_waiting));
        self.waiting.sort_by(|a, b| match (tokens.get(a), tokens.get(b)) {
            (Some(a), Some(b)) => serving_order(a, b),
            _ => std::cmp::Ordering::Equal,
        });

        let estimates = assign_estimates(
            department,
            policy,
            self.waiting.iter().filter_map(|id| tokens.get(id)),
        );

        let mut events = Vec::new();
        for (id, (position, wait)) in self.waiting.iter().zip(estimates) {
            if let Some(token) = self.tokens.get_mut(id) {
                if token.queue_position != position || token.estimated_wait_minutes != wait {
                    token.queue_position = position;
                    token.estimated_wait_minutes = wait;
                    events.push(QueueEvent::updated(token));
                }
            }
        }
        events
    }

    pub fn waiting_tokens(&self) -> Vec<Token> {
        self.waiting
            .iter()
            .filter_map(|id| self.tokens.get(id))
            .cloned()
            .collect()
    }

    /// Drop terminal tokens last changed before `before_ms`
    pub fn evict_finished(&mut self, before_ms: i64) -> Vec<Token> {
        let expired: Vec<TokenId> = self
            .tokens
            .values()
            .filter(|t| t.status.is_terminal() && t.updated_at < before_ms)
            .map(|t| t.id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| self.tokens.remove(id))
            .collect()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for token in self.tokens.values() {
            match token.status {
                TokenStatus::Waiting => {
                    counts.waiting += 1;
                    if token.priority {
                        counts.priority_waiting += 1;
                    }
                }
                TokenStatus::InProgress => counts.in_progress += 1,
                TokenStatus::Completed => counts.completed += 1,
                TokenStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    /// Token most recently called to a counter
    pub fn now_serving(&self) -> Option<&Token> {
        self.tokens
            .values()
            .filter(|t| t.status == TokenStatus::InProgress)
            .max_by_key(|t| (t.updated_at, t.sequence_number))
    }

    pub fn next_up(&self) -> Option<&Token> {
        self.waiting.first().and_then(|id| self.tokens.get(id))
    }
}
