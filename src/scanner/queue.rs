//! The shared task queue.
//!
//! Filled by the orchestrator, drained by workers. The orchestrator pushes
//! whole host x port grids; tasks are expanded one at a time as workers pop
//! them, so queue memory does not grow with the size of the product. Each
//! task is handed to exactly one `pop` caller.

use super::traits::ScanTask;
use crate::types::Port;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Result of a single `pop` attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pop {
    /// A task was dequeued.
    Task(ScanTask),
    /// Nothing arrived within the poll interval; the queue is still open.
    Empty,
    /// The queue is closed and has no tasks left.
    Closed,
}

/// Every host paired with every port, in host-major, port-minor order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGrid {
    hosts: Vec<IpAddr>,
    ports: Vec<Port>,
    timeout: Duration,
}

impl TaskGrid {
    pub fn new(hosts: Vec<IpAddr>, ports: Vec<Port>, timeout: Duration) -> Self {
        Self {
            hosts,
            ports,
            timeout,
        }
    }

    /// Number of tasks in the grid.
    pub fn len(&self) -> usize {
        self.hosts.len().saturating_mul(self.ports.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The task at `index`.
    pub fn get(&self, index: usize) -> Option<ScanTask> {
        if index >= self.len() {
            return None;
        }
        let per_host = self.ports.len();
        let host = self.hosts[index / per_host];
        let port = self.ports[index % per_host];
        Some(ScanTask::new(host, port, self.timeout))
    }
}

/// A grid plus the index of its next undelivered task.
#[derive(Debug)]
struct Pending {
    grid: TaskGrid,
    next: usize,
}

impl Pending {
    fn remaining(&self) -> usize {
        self.grid.len() - self.next
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Pending>,
    closed: bool,
}

impl QueueState {
    fn remaining(&self) -> usize {
        self.pending.iter().map(Pending::remaining).sum()
    }

    fn is_drained(&self) -> bool {
        self.closed && self.pending.is_empty()
    }

    fn take_next(&mut self) -> Option<ScanTask> {
        let front = self.pending.front_mut()?;
        let task = front.grid.get(front.next);
        front.next += 1;
        if front.remaining() == 0 {
            self.pending.pop_front();
        }
        task
    }
}

/// Multi-consumer FIFO of scan tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    available: Notify,
    drained: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue every task of `grid` after those already queued.
    ///
    /// Returns the number of tasks added.
    pub fn push(&self, grid: TaskGrid) -> usize {
        let added = grid.len();
        if added == 0 {
            return 0;
        }
        self.lock().pending.push_back(Pending { grid, next: 0 });
        self.available.notify_waiters();
        added
    }

    /// Mark the queue as complete; no more tasks will be added.
    pub fn close(&self) {
        let drained = {
            let mut state = self.lock();
            state.closed = true;
            state.is_drained()
        };
        self.available.notify_waiters();
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Discard every queued task and close the queue.
    ///
    /// Returns the number of tasks discarded.
    pub fn clear(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            state.closed = true;
            let count = state.remaining();
            state.pending.clear();
            count
        };
        self.available.notify_waiters();
        self.drained.notify_waiters();
        discarded
    }

    /// Dequeue one task, waiting at most `poll` for one to arrive.
    pub async fn pop(&self, poll: Duration) -> Pop {
        let notified = self.available.notified();
        if let Some(pop) = self.try_pop() {
            return pop;
        }
        if tokio::time::timeout(poll, notified).await.is_err() {
            return Pop::Empty;
        }
        self.try_pop().unwrap_or(Pop::Empty)
    }

    fn try_pop(&self) -> Option<Pop> {
        let (pop, drained) = {
            let mut state = self.lock();
            match state.take_next() {
                Some(task) => (Some(Pop::Task(task)), state.is_drained()),
                None if state.closed => (Some(Pop::Closed), false),
                None => (None, false),
            }
        };
        if drained {
            self.drained.notify_waiters();
        }
        pop
    }

    /// Resolve once the queue is closed and every task has been taken.
    pub async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.lock().is_drained() {
                return;
            }
            notified.await;
        }
    }

    /// Tasks not yet taken.
    pub fn len(&self) -> usize {
        self.lock().remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }
}
