//! Indexed binary min-heap of pending collapse operations.
//!
//! Entries are keyed by operation handle so an operation's cost can be
//! changed or the operation removed in `O(log n)` after its neighbourhood
//! changes.

/// Handle of an operation in the scheduler's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(pub u32);

impl OpId {
    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

const ABSENT: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct Entry {
    cost: f64,
    op: OpId,
}

impl Entry {
    /// Total order: cost first (infinite last), ties broken by handle.
    fn before(&self, other: &Self) -> bool {
        self.cost
            .total_cmp(&other.cost)
            .then(self.op.cmp(&other.op))
            .is_lt()
    }
}

/// Min-heap of `(cost, operation)` pairs with position tracking.
#[derive(Debug, Clone, Default)]
pub(crate) struct OpQueue {
    heap: Vec<Entry>,
    positions: Vec<usize>,
}

impl OpQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, op: OpId) -> bool {
        self.positions.get(op.index()).is_some_and(|&p| p != ABSENT)
    }

    /// Insert `op`, or change its cost if already queued.
    pub fn push(&mut self, op: OpId, cost: f64) {
        if self.contains(op) {
            self.update(op, cost);
            return;
        }
        if self.positions.len() <= op.index() {
            self.positions.resize(op.index() + 1, ABSENT);
        }
        let pos = self.heap.len();
        self.heap.push(Entry { cost, op });
        self.positions[op.index()] = pos;
        self.sift_up(pos);
    }

    /// Lowest-cost entry without removing it.
    pub fn peek(&self) -> Option<(OpId, f64)> {
        self.heap.first().map(|e| (e.op, e.cost))
    }

    /// Remove and return the lowest-cost entry.
    pub fn pop(&mut self) -> Option<(OpId, f64)> {
        let top = *self.heap.first()?;
        self.remove_at(0);
        Some((top.op, top.cost))
    }

    /// Remove `op` if queued. Returns whether it was present.
    pub fn remove(&mut self, op: OpId) -> bool {
        match self.positions.get(op.index()) {
            Some(&pos) if pos != ABSENT => {
                self.remove_at(pos);
                true
            }
            _ => false,
        }
    }

    /// Change the cost of a queued operation.
    pub fn update(&mut self, op: OpId, cost: f64) {
        let Some(&pos) = self.positions.get(op.index()) else {
            return;
        };
        if pos == ABSENT {
            return;
        }
        self.heap[pos].cost = cost;
        self.sift_up(pos);
        self.sift_down(self.positions[op.index()]);
    }

    fn remove_at(&mut self, pos: usize) {
        let last = self.heap.len() - 1;
        self.swap(pos, last);
        if let Some(removed) = self.heap.pop() {
            self.positions[removed.op.index()] = ABSENT;
        }
        if pos < self.heap.len() {
            self.sift_up(pos);
            self.sift_down(pos);
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions[self.heap[a].op.index()] = a;
        self.positions[self.heap[b].op.index()] = b;
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.heap[pos].before(&self.heap[parent]) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.heap[right].before(&self.heap[left]) {
                right
            } else {
                left
            };
            if !self.heap[child].before(&self.heap[pos]) {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
    }
}
