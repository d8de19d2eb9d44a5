use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::cancel::{CancelToken, Interrupted};

/// Longest a waiter sleeps before re-checking its interrupt token.
const INTERRUPT_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum LockError {
    #[error("mutex state poisoned")]
    Poisoned,
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Point-in-time view of a mutex's runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexState {
    pub held: bool,
    /// Incremented on every HELD -> FREE transition, forced or not.
    pub generation: u64,
    pub lease_deadline: Option<Instant>,
    /// Callers currently blocked waiting for the lock.
    pub waiters: usize,
}

impl MutexState {
    pub fn is_free(&self) -> bool {
        !self.held
    }
}

/// Who may take the lock when it becomes free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fairness {
    /// Any waiter, including a newcomer.
    Barging,
    /// Only the longest-waiting caller, in arrival order.
    Fifo,
}

struct Slot {
    held: bool,
    generation: u64,
    lease_deadline: Option<Instant>,
    queue: VecDeque<u64>,
    next_ticket: u64,
}

impl Slot {
    fn take(&mut self) -> u64 {
        self.held = true;
        self.generation
    }

    fn enqueue(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.queue.push_back(ticket);
        ticket
    }

    fn dequeue(&mut self, ticket: u64) {
        if let Some(position) = self.queue.iter().position(|t| *t == ticket) {
            self.queue.remove(position);
        }
    }
}

/// FREE/HELD lock backed by `Mutex<Slot>` + `Condvar`.
///
/// Ownership is proven by the generation returned from a successful acquire:
/// only a release carrying the current generation frees the lock, so a holder
/// that was force-released cannot free somebody else's hold.
pub(crate) struct LockCore {
    slot: Mutex<Slot>,
    wake: Condvar,
    fairness: Fairness,
}

impl LockCore {
    pub fn new() -> Self {
        Self::with_fairness(Fairness::Barging)
    }

    pub fn fifo() -> Self {
        Self::with_fairness(Fairness::Fifo)
    }

    fn with_fairness(fairness: Fairness) -> Self {
        LockCore {
            slot: Mutex::new(Slot {
                held: false,
                generation: 0,
                lease_deadline: None,
                queue: VecDeque::new(),
                next_ticket: 0,
            }),
            wake: Condvar::new(),
            fairness,
        }
    }

    /// Acquire within `wait` (`None` waits indefinitely).
    ///
    /// Returns `Ok(Some(generation))` once held, `Ok(None)` when the budget ran
    /// out, and `Err(Interrupted)` if `interrupt` was cancelled while waiting.
    pub fn try_lock_for(
        &self,
        wait: Option<Duration>,
        interrupt: &CancelToken,
    ) -> Result<Option<u64>, LockError> {
        let deadline = wait.and_then(|wait| Instant::now().checked_add(wait));
        let mut slot = self.slot.lock().map_err(|_| LockError::Poisoned)?;
        if !slot.held && slot.queue.is_empty() {
            return Ok(Some(slot.take()));
        }

        let ticket = slot.enqueue();
        loop {
            let our_turn = match self.fairness {
                Fairness::Barging => true,
                Fairness::Fifo => slot.queue.front() == Some(&ticket),
            };
            if !slot.held && our_turn {
                slot.dequeue(ticket);
                return Ok(Some(slot.take()));
            }
            if let Err(interrupted) = interrupt.checkpoint() {
                self.leave(&mut slot, ticket);
                return Err(interrupted.into());
            }

            let slice = match (wait, deadline) {
                (None, _) | (Some(_), None) => INTERRUPT_POLL,
                (Some(_), Some(deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.leave(&mut slot, ticket);
                        return Ok(None);
                    }
                    (deadline - now).min(INTERRUPT_POLL)
                }
            };
            slot = self
                .wake
                .wait_timeout(slot, slice)
                .map_err(|_| LockError::Poisoned)?
                .0;
        }
    }

    /// Give up a place in the queue; the next in line may now be first.
    fn leave(&self, slot: &mut Slot, ticket: u64) {
        slot.dequeue(ticket);
        if !slot.held {
            self.wake.notify_all();
        }
    }

    /// Record the lease deadline for the hold identified by `generation`.
    pub fn set_lease_deadline(&self, generation: u64, deadline: Instant) -> Result<(), LockError> {
        let mut slot = self.slot.lock().map_err(|_| LockError::Poisoned)?;
        if slot.held && slot.generation == generation {
            slot.lease_deadline = Some(deadline);
        }
        Ok(())
    }

    /// Free the lock if `generation` still owns it.
    ///
    /// Returns `false` when the hold was already ended (force-released by the
    /// lease watchdog, or released before).
    pub fn release(&self, generation: u64) -> Result<bool, LockError> {
        let mut slot = self.slot.lock().map_err(|_| LockError::Poisoned)?;
        if !(slot.held && slot.generation == generation) {
            return Ok(false);
        }
        slot.held = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.lease_deadline = None;
        match self.fairness {
            Fairness::Barging => self.wake.notify_one(),
            // Only the head of the queue may proceed, and any of them may be it.
            Fairness::Fifo => self.wake.notify_all(),
        }
        Ok(true)
    }

    pub fn snapshot(&self) -> Result<MutexState, LockError> {
        self.slot
            .lock()
            .map(|slot| MutexState {
                held: slot.held,
                generation: slot.generation,
                lease_deadline: slot.lease_deadline,
                waiters: slot.queue.len(),
            })
            .map_err(|_| LockError::Poisoned)
    }
}
