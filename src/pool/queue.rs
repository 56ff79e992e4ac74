//! Bounded FIFO of pending tasks.
//!
//! The queue never waits on its own: callers hold the pool's primary lock and
//! check [`TaskQueue::is_full`] / [`TaskQueue::is_empty`] before pushing or
//! popping, blocking on the pool's condition variables instead.

use std::fmt;

/// A unit of work: a callable bound to the argument it owns.
///
/// The argument moves into the pool on submit and into the worker on
/// dequeue. It is dropped as soon as the callable returns.
pub struct Task {
    job: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Bind `callable` to `argument`.
    pub fn new<F, A>(callable: F, argument: A) -> Self
    where
        F: FnOnce(A) + Send + 'static,
        A: Send + 'static,
    {
        Self {
            job: Box::new(move || callable(argument)),
        }
    }

    /// Wrap a closure that already owns its data.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { job: Box::new(f) }
    }

    /// Run the callable, consuming the task and its argument.
    pub fn run(self) {
        (self.job)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// Fixed-capacity ring buffer addressed by head and tail indices.
///
/// Invariant: `tail == (head + len) % capacity`.
pub struct TaskQueue {
    slots: Box<[Option<Task>]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl TaskQueue {
    /// Create an empty queue. `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "task queue capacity must be non-zero");
        let slots = (0..capacity).map(|_| None).collect::<Vec<_>>();
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Append at the tail.
    ///
    /// Hands the task back if the queue is full; the caller is expected to
    /// have waited for room first.
    pub fn push(&mut self, task: Task) -> Result<(), Task> {
        if self.is_full() {
            return Err(task);
        }
        debug_assert!(self.slots[self.tail].is_none());
        self.slots[self.tail] = Some(task);
        self.tail = (self.tail + 1) % self.capacity();
        self.len += 1;
        self.check_indices();
        Ok(())
    }

    /// Remove the task at the head, if any.
    pub fn pop(&mut self) -> Option<Task> {
        if self.is_empty() {
            return None;
        }
        let task = self.slots[self.head].take();
        assert!(task.is_some(), "occupied queue slot {} was empty", self.head);
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        self.check_indices();
        task
    }

    /// Remove every queued task in FIFO order without running it.
    ///
    /// The tasks are handed back so the caller can drop them (and their
    /// arguments) after releasing the pool lock.
    pub fn drain(&mut self) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(self.len);
        while let Some(task) = self.pop() {
            tasks.push(task);
        }
        tasks
    }

    #[inline]
    fn check_indices(&self) {
        debug_assert!(self.len <= self.capacity());
        debug_assert_eq!(self.tail, (self.head + self.len) % self.capacity());
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}
