//! Component A: a Fibonacci heap, amortised O(log n) `extract_min`.
//!
//! No `decrease_key` is exposed: callers in this crate insert each
//! meta-edge exactly once, with its negated count as the priority, and
//! simply skip entries whose `visited` bit is already set by the time
//! they are popped (`spec.md §4.A`). Priority ties are broken by
//! insertion order, so behaviour is deterministic across runs with
//! identical input.
//!
//! Implemented as an arena of nodes linked by index rather than raw
//! pointers or `Rc<RefCell<_>>`, per the arena-plus-index pattern noted
//! as a reimplementation strategy in `spec.md §9`.

use crate::error::{Error, Result};

struct Node<T> {
    key: i64,
    seq: u64,
    value: Option<T>,
    degree: usize,
    mark: bool,
    parent: Option<usize>,
    child: Option<usize>,
    left: usize,
    right: usize,
}

/// Handle to a still-live entry, returned by [`FibHeap::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(usize);

pub struct FibHeap<T> {
    arena: Vec<Node<T>>,
    min: Option<usize>,
    n: usize,
    next_seq: u64,
}

impl<T> Default for FibHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FibHeap<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            min: None,
            n: 0,
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// `true` if `a` should sort before `b`: smaller key first, ties
    /// broken by earlier insertion sequence number.
    fn less(&self, a: usize, b: usize) -> bool {
        (self.arena[a].key, self.arena[a].seq) < (self.arena[b].key, self.arena[b].seq)
    }

    pub fn insert(&mut self, key: i64, value: T) -> Result<Handle> {
        self.arena.try_reserve(1).map_err(|_| Error::Alloc)?;
        let idx = self.arena.len();
        self.arena.push(Node {
            key,
            seq: self.next_seq,
            value: Some(value),
            degree: 0,
            mark: false,
            parent: None,
            child: None,
            left: idx,
            right: idx,
        });
        self.next_seq += 1;
        self.splice_into_root_list(idx);
        match self.min {
            None => self.min = Some(idx),
            Some(min_idx) if self.less(idx, min_idx) => self.min = Some(idx),
            _ => {}
        }
        self.n += 1;
        Ok(Handle(idx))
    }

    /// Splice a singleton circular list containing `idx` into the root
    /// list (a no-op list merge when there is no root list yet).
    fn splice_into_root_list(&mut self, idx: usize) {
        let Some(min_idx) = self.min else {
            return;
        };
        if min_idx == idx {
            return;
        }
        self.concat_lists(min_idx, idx);
    }

    /// Merge two disjoint circular doubly-linked lists given one
    /// representative node from each, by swapping their `right` pointers.
    fn concat_lists(&mut self, a: usize, b: usize) {
        let a_right = self.arena[a].right;
        let b_right = self.arena[b].right;
        self.arena[a].right = b_right;
        self.arena[b_right].left = a;
        self.arena[b].right = a_right;
        self.arena[a_right].left = b;
    }

    /// Remove `idx` from whatever circular list it currently sits in.
    /// Returns `true` if `idx` was its list's only member.
    fn unlink(&mut self, idx: usize) -> bool {
        let (left, right) = (self.arena[idx].left, self.arena[idx].right);
        if left == idx {
            return true;
        }
        self.arena[left].right = right;
        self.arena[right].left = left;
        self.arena[idx].left = idx;
        self.arena[idx].right = idx;
        false
    }

    fn add_child(&mut self, parent: usize, child: usize) {
        self.unlink(child);
        self.arena[child].parent = Some(parent);
        self.arena[child].mark = false;
        match self.arena[parent].child {
            None => {
                self.arena[parent].child = Some(child);
            }
            Some(existing) => {
                self.concat_lists(existing, child);
            }
        }
        self.arena[parent].degree += 1;
    }

    pub fn extract_min(&mut self) -> Option<T> {
        let z = self.min?;

        // Move z's children into the root list.
        if let Some(child) = self.arena[z].child {
            let mut cur = child;
            loop {
                let next = self.arena[cur].right;
                self.arena[cur].parent = None;
                cur = next;
                if cur == child {
                    break;
                }
            }
            self.concat_lists(z, child);
            self.arena[z].child = None;
        }

        let was_only = self.unlink(z);
        let next_root = self.arena[z].right;

        if was_only {
            self.min = None;
        } else {
            self.min = Some(next_root);
            self.consolidate();
        }

        self.n -= 1;
        self.arena[z].value.take()
    }

    fn consolidate(&mut self) {
        let Some(start) = self.min else { return };

        // Collect the current root list before mutating it.
        let mut roots = Vec::new();
        let mut cur = start;
        loop {
            roots.push(cur);
            cur = self.arena[cur].right;
            if cur == start {
                break;
            }
        }

        let max_degree = (self.n.max(1).ilog2() as usize) * 2 + 2;
        let mut degree_table: Vec<Option<usize>> = vec![None; max_degree + 1];

        for &root in &roots {
            let mut x = root;
            let mut d = self.arena[x].degree;
            while let Some(y) = degree_table.get(d).copied().flatten() {
                let (mut x_, mut y_) = (x, y);
                if self.less(y_, x_) {
                    std::mem::swap(&mut x_, &mut y_);
                }
                self.add_child(x_, y_);
                degree_table[d] = None;
                x = x_;
                d = self.arena[x].degree;
                if d >= degree_table.len() {
                    degree_table.resize(d + 1, None);
                }
            }
            if d >= degree_table.len() {
                degree_table.resize(d + 1, None);
            }
            degree_table[d] = Some(x);
        }

        self.min = None;
        for slot in degree_table.into_iter().flatten() {
            match self.min {
                None => self.min = Some(slot),
                Some(min_idx) if self.less(slot, min_idx) => self.min = Some(slot),
                _ => {}
            }
        }
    }

    /// Drop every remaining entry. Equivalent to replacing the heap with
    /// a fresh, empty one.
    pub fn delete_all(&mut self) {
        *self = Self::new();
    }
}
