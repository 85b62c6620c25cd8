// Queue Estimator - token numbering, queue positions and wait estimates
//
// Each department's state sits behind its own mutex; mutations on different
// departments never contend. Events are published while the lock is held so
// subscribers and the persistence outbox see them in mutation order.

pub mod receipt;
pub mod state;
pub mod stats;

pub use receipt::{
    outbox_channel, OutboxBatch, OutboxReceiver, OutboxSender, PersistAck, PersistStatus, Receipt,
};
pub use state::StatusCounts;
pub use stats::{DepartmentStats, LoadLevel, QueueHealth};

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::application::estimate::EstimatePolicy;
use crate::domain::error::{DomainError, Result};
use crate::domain::{Department, DepartmentId, QueueEvent, Token, TokenId, TokenStatus};
use crate::port::{IdProvider, TimeProvider};
use state::DepartmentState;

/// Capacity of the live event channel; slow subscribers beyond this lag
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

struct DepartmentQueue {
    department: Department,
    prefix: String,
    state: Mutex<DepartmentState>,
}

impl DepartmentQueue {
    fn lock(&self) -> MutexGuard<'_, DepartmentState> {
        // State is only mutated after every fallible check, so a poisoned
        // lock still guards a consistent queue.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Result of [`QueueEstimator::restore`]
#[derive(Debug)]
pub struct RestoreOutcome {
    pub restored: usize,
    /// One per department whose stored estimates had to be corrected
    pub acks: Vec<PersistAck>,
}

/// Authoritative in-memory queue for every configured department
pub struct QueueEstimator {
    departments: BTreeMap<DepartmentId, DepartmentQueue>,
    token_index: RwLock<HashMap<TokenId, DepartmentId>>,
    policy: EstimatePolicy,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    events: broadcast::Sender<QueueEvent>,
    outbox: Option<OutboxSender>,
}

impl QueueEstimator {
    /// Create an estimator for a fixed department catalogue
    ///
    /// # Arguments
    ///
    /// * `departments` - Loaded once at startup; duplicates are rejected
    /// * `policy` - Wait-time policy
    /// * `id_provider` - Token ID generator (injected for determinism)
    /// * `time_provider` - Clock (injected for determinism)
    pub fn new(
        departments: Vec<Department>,
        policy: EstimatePolicy,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for department in departments {
            let id = department.id.clone();
            let queue = DepartmentQueue {
                prefix: department.token_prefix(),
                department,
                state: Mutex::new(DepartmentState::default()),
            };
            if map.insert(id.clone(), queue).is_some() {
                return Err(DomainError::Validation(format!(
                    "Department {} is configured twice",
                    id
                )));
            }
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            departments: map,
            token_index: RwLock::new(HashMap::new()),
            policy,
            id_provider,
            time_provider,
            events,
            outbox: None,
        })
    }

    /// Forward every committed change batch to the persistence writer
    pub fn with_outbox(mut self, outbox: OutboxSender) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn policy(&self) -> &EstimatePolicy {
        &self.policy
    }

    /// Live update stream (SubscribeToWaitingSet); filter by department on the receiving side
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub fn departments(&self) -> Vec<Department> {
        self.departments
            .values()
            .map(|q| q.department.clone())
            .collect()
    }

    pub fn department(&self, department_id: &str) -> Result<Department> {
        Ok(self.queue(department_id)?.department.clone())
    }

    /// IssueToken: allocate the next number and place the token in the queue
    pub fn issue_token(&self, department_id: &str, priority: bool) -> Result<Receipt<Token>> {
        let queue = self.queue(department_id)?;
        let mut state = queue.lock();

        let sequence = state.allocate_sequence();
        let token = Token::new(
            self.id_provider.generate_id(),
            &queue.department.id,
            &queue.prefix,
            sequence,
            priority,
            self.time_provider.now_millis(),
        );
        let token_id = token.id.clone();

        state.insert(token);
        self.index_insert(&token_id, &queue.department.id);

        let recomputed = state.recompute(&queue.department, &self.policy);
        let issued = state
            .get(&token_id)
            .cloned()
            .ok_or_else(|| DomainError::UnknownToken(token_id.clone()))?;

        let mut events = vec![QueueEvent::Issued {
            token: issued.clone(),
        }];
        events.extend(recomputed.into_iter().filter(|e| e.token_id() != token_id));

        info!(
            token_id = %issued.id,
            number = %issued.number,
            department = %issued.department_id,
            priority = issued.priority,
            position = issued.queue_position,
            wait_minutes = issued.estimated_wait_minutes,
            "Token issued"
        );

        let ack = self.commit(events);
        Ok(Receipt { value: issued, ack })
    }

    /// TransitionStatus: move a token along its state machine
    pub fn transition_status(&self, token_id: &str, new_status: TokenStatus) -> Result<Receipt<Token>> {
        let queue = self.queue_for_token(token_id)?;
        let mut state = queue.lock();
        let now = self.time_provider.now_millis();

        let token = state
            .get_mut(token_id)
            .ok_or_else(|| DomainError::UnknownToken(token_id.to_string()))?;
        let previous = token.transition(new_status, now)?;
        let mut events = vec![QueueEvent::updated(token)];

        if previous == TokenStatus::Waiting {
            state.leave_waiting(token_id);
            events.extend(state.recompute(&queue.department, &self.policy));
        }

        let token = state
            .get(token_id)
            .cloned()
            .ok_or_else(|| DomainError::UnknownToken(token_id.to_string()))?;

        info!(
            token_id = %token.id,
            number = %token.number,
            from = %previous,
            to = %token.status,
            "Token status changed"
        );

        let ack = self.commit(events);
        Ok(Receipt { value: token, ack })
    }

    /// DeleteToken: administrative removal in any status
    pub fn delete_token(&self, token_id: &str) -> Result<Receipt<Token>> {
        let queue = self.queue_for_token(token_id)?;
        let mut state = queue.lock();

        let removed = state
            .remove(token_id)
            .ok_or_else(|| DomainError::UnknownToken(token_id.to_string()))?;
        self.index_remove(token_id);

        let mut events = vec![QueueEvent::Removed {
            token_id: removed.id.clone(),
            department_id: removed.department_id.clone(),
        }];
        if removed.is_waiting() {
            events.extend(state.recompute(&queue.department, &self.policy));
        }

        info!(
            token_id = %removed.id,
            number = %removed.number,
            status = %removed.status,
            "Token deleted"
        );

        let ack = self.commit(events);
        Ok(Receipt { value: removed, ack })
    }

    /// RecomputeEstimates: idempotent; returns the waiting set in serving order
    pub fn recompute_estimates(&self, department_id: &str) -> Result<Receipt<Vec<Token>>> {
        let queue = self.queue(department_id)?;
        let mut state = queue.lock();

        let events = state.recompute(&queue.department, &self.policy);
        debug!(
            department = %department_id,
            changed = events.len(),
            "Estimates recomputed"
        );

        let waiting = state.waiting_tokens();
        let ack = self.commit(events);
        Ok(Receipt {
            value: waiting,
            ack,
        })
    }

    /// GetWaitingSet: waiting tokens in serving order
    pub fn waiting_set(&self, department_id: &str) -> Result<Vec<Token>> {
        Ok(self.queue(department_id)?.lock().waiting_tokens())
    }

    pub fn get_token(&self, token_id: &str) -> Result<Token> {
        let queue = self.queue_for_token(token_id)?;
        let state = queue.lock();
        state
            .get(token_id)
            .cloned()
            .ok_or_else(|| DomainError::UnknownToken(token_id.to_string()))
    }

    /// Highest sequence number issued so far for a department
    pub fn last_sequence(&self, department_id: &str) -> Result<u64> {
        Ok(self.queue(department_id)?.lock().last_sequence())
    }

    pub fn department_stats(&self, department_id: &str) -> Result<DepartmentStats> {
        let queue = self.queue(department_id)?;
        Ok(self.stats_for(queue))
    }

    pub fn stats(&self) -> Vec<DepartmentStats> {
        self.departments
            .values()
            .map(|queue| self.stats_for(queue))
            .collect()
    }

    /// Continue numbering after `last_sequence` (the persisted high-water
    /// mark). Numbers of deleted or purged tokens stay used.
    pub fn resume_numbering(&self, department_id: &str, last_sequence: u64) -> Result<()> {
        self.queue(department_id)?
            .lock()
            .resume_sequence(last_sequence);
        Ok(())
    }

    /// Rebuild queues from persisted tokens, then refresh every estimate.
    /// Tokens of departments no longer configured are skipped.
    ///
    /// The returned acks cover the corrected estimates written back.
    pub fn restore(&self, tokens: Vec<Token>) -> RestoreOutcome {
        let mut restored = 0;

        for token in tokens {
            let Some(queue) = self.departments.get(&token.department_id) else {
                warn!(
                    token_id = %token.id,
                    department = %token.department_id,
                    "Skipping token of unknown department"
                );
                continue;
            };
            self.index_insert(&token.id, &token.department_id);
            queue.lock().restore(token);
            restored += 1;
        }

        let mut acks = Vec::new();
        for queue in self.departments.values() {
            let mut state = queue.lock();
            let events = state.recompute(&queue.department, &self.policy);
            if events.is_empty() {
                continue;
            }
            info!(
                department = %queue.department.id,
                corrected = events.len(),
                "Restored estimates corrected"
            );
            acks.push(self.commit(events));
        }

        RestoreOutcome { restored, acks }
    }

    /// Forget completed/cancelled tokens last changed before `before_ms`.
    /// Storage is purged separately by the maintenance port.
    pub fn evict_finished(&self, before_ms: i64) -> usize {
        let mut evicted = 0;

        for queue in self.departments.values() {
            let mut state = queue.lock();
            let removed = state.evict_finished(before_ms);
            for token in &removed {
                self.index_remove(&token.id);
            }
            evicted += removed.len();

            self.publish(removed.into_iter().map(|t| QueueEvent::Removed {
                token_id: t.id,
                department_id: t.department_id,
            }));
        }

        if evicted > 0 {
            info!(evicted, before_ms, "Finished tokens evicted from memory");
        }
        evicted
    }

    fn stats_for(&self, queue: &DepartmentQueue) -> DepartmentStats {
        let state = queue.lock();
        let counts = state.counts();
        let standard_waiting = (counts.waiting - counts.priority_waiting) as u32;

        DepartmentStats::from_counts(
            &queue.department.id,
            &queue.department.name,
            counts,
            state.now_serving().map(|t| t.number.clone()),
            state.next_up().map(|t| t.number.clone()),
            self.policy.standard_wait(&queue.department, standard_waiting),
        )
    }

    fn queue(&self, department_id: &str) -> Result<&DepartmentQueue> {
        self.departments
            .get(department_id)
            .ok_or_else(|| DomainError::UnknownDepartment(department_id.to_string()))
    }

    fn queue_for_token(&self, token_id: &str) -> Result<&DepartmentQueue> {
        let department_id = self
            .token_index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(token_id)
            .cloned()
            .ok_or_else(|| DomainError::UnknownToken(token_id.to_string()))?;
        self.queue(&department_id)
    }

    fn index_insert(&self, token_id: &str, department_id: &str) {
        self.token_index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token_id.to_string(), department_id.to_string());
    }

    fn index_remove(&self, token_id: &str) {
        self.token_index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token_id);
    }

    /// Broadcast to live subscribers only
    fn publish(&self, events: impl IntoIterator<Item = QueueEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }

    /// Broadcast and hand the batch to the persistence outbox.
    /// Called with the department lock held.
    fn commit(&self, events: Vec<QueueEvent>) -> PersistAck {
        if events.is_empty() {
            return PersistAck::done();
        }

        self.publish(events.iter().cloned());

        let Some(outbox) = &self.outbox else {
            return PersistAck::done();
        };
        let (batch, ack) = OutboxBatch::new(events);
        if outbox.send(batch).is_err() {
            warn!("Persistence outbox closed; change kept in memory only");
        }
        ack
    }
}
