//! Case-wide single-writer lock.
//!
//! Every mutating manager operation holds a [`WriteGuard`] for its full
//! duration, whatever entity kind it targets. The lock is a ticket lock:
//! `acquire` draws the next ticket and waits until that ticket is served,
//! so contending writers are admitted in FIFO order and the order of durable
//! writes equals the order in which `acquire` was called.
//!
//! There is no timeout and no cancellation. The lock is not reentrant: a
//! thread that calls `acquire` while holding a guard waits forever.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// Case-wide mutual exclusion for writers.
#[derive(Debug, Default)]
pub struct WriteLock {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

impl WriteLock {
    /// Creates an unlocked write lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until every earlier writer has released, then returns the guard.
    pub fn acquire(&self) -> WriteGuard<'_> {
        let mut tickets = self.tickets();
        let ticket = tickets.next;
        tickets.next += 1;

        if tickets.serving != ticket {
            let started = Instant::now();
            tracing::trace!(ticket, serving = tickets.serving, "waiting for case write lock");
            while tickets.serving != ticket {
                tickets = self
                    .turn
                    .wait(tickets)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            tracing::trace!(
                ticket,
                waited_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
                "acquired case write lock"
            );
        }

        WriteGuard {
            lock: self,
            ticket,
            owner: thread::current().id(),
        }
    }

    /// Returns true if a writer currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        let tickets = self.tickets();
        tickets.next != tickets.serving
    }

    /// Number of writers holding or waiting for the lock.
    #[must_use]
    pub fn queued(&self) -> u64 {
        let tickets = self.tickets();
        tickets.next - tickets.serving
    }

    // The counters are only mutated by whole increments under the mutex, so a
    // poisoned guard still holds a consistent state.
    fn tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut tickets = self.tickets();
        tickets.serving += 1;
        drop(tickets);
        self.turn.notify_all();
    }
}

/// Proof of holding the case write lock. Releases it on drop.
#[derive(Debug)]
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a WriteLock,
    ticket: u64,
    owner: thread::ThreadId,
}

impl WriteGuard<'_> {
    /// Position of this writer in the global write order.
    #[must_use]
    pub const fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Thread that acquired the guard.
    #[must_use]
    pub const fn owner(&self) -> thread::ThreadId {
        self.owner
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
