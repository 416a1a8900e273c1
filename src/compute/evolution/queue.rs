//! Bounded max-heap of candidate fitness.
//!
//! Positions are 1-indexed: position 1 is the best entry, and the children
//! of position `i` are `2i` and `2i + 1`. Only position 1 is a true rank;
//! every other position satisfies the parent-not-worse-than-child relation
//! and nothing more.

/// Handle to a candidate plus the fitness it is ranked by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueEntry {
    /// Candidate index in the owning population.
    pub id: usize,
    pub fitness: f64,
}

/// Heap misuse. Always a setup defect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Queue capacity of {capacity} entries exceeded")]
    CapacityExceeded { capacity: usize },
    #[error("Queue position {position} outside 1..={len}")]
    PositionOutOfRange { position: usize, len: usize },
}

/// Fixed-capacity max-heap keyed by fitness.
#[derive(Debug, Clone)]
pub struct FitnessQueue {
    // Slot 0 is never read.
    slots: Vec<QueueEntry>,
    len: usize,
}

impl FitnessQueue {
    /// Queue holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![
                QueueEntry {
                    id: 0,
                    fitness: f64::NEG_INFINITY,
                };
                capacity + 1
            ],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Drop every entry, keeping the storage.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Add an entry and return the position it settled at.
    pub fn insert(&mut self, id: usize, fitness: f64) -> Result<usize, QueueError> {
        if self.len == self.capacity() {
            return Err(QueueError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        self.len += 1;
        self.slots[self.len] = QueueEntry { id, fitness };
        Ok(self.sift_up(self.len))
    }

    /// Best entry.
    pub fn peek(&self) -> Option<QueueEntry> {
        self.get(1)
    }

    /// Remove and return the best entry.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        if self.len == 0 {
            return None;
        }
        let top = self.slots[1];
        self.slots[1] = self.slots[self.len];
        self.len -= 1;
        if self.len > 1 {
            self.sift_down(1);
        }
        Some(top)
    }

    /// Entry at heap position `position` (1 = best).
    pub fn get(&self, position: usize) -> Option<QueueEntry> {
        if position == 0 || position > self.len {
            return None;
        }
        Some(self.slots[position])
    }

    /// Give the entry at `position` a new fitness and restore the heap.
    ///
    /// Returns the entry's new position: smaller than before when the
    /// fitness rose above its parent's, larger when it fell below a child's.
    pub fn priority_changed(
        &mut self,
        position: usize,
        fitness: f64,
    ) -> Result<usize, QueueError> {
        if position == 0 || position > self.len {
            return Err(QueueError::PositionOutOfRange {
                position,
                len: self.len,
            });
        }
        let old = self.slots[position].fitness;
        self.slots[position].fitness = fitness;
        if fitness > old {
            Ok(self.sift_up(position))
        } else {
            Ok(self.sift_down(position))
        }
    }

    /// Entries in heap order, position 1 first.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.slots[1..=self.len].iter()
    }

    /// Check that no entry outranks its parent.
    pub fn is_valid(&self) -> bool {
        self.subtree_valid(1)
    }

    fn subtree_valid(&self, position: usize) -> bool {
        let left = 2 * position;
        let right = left + 1;
        if left <= self.len
            && (self.slots[left].fitness > self.slots[position].fitness
                || !self.subtree_valid(left))
        {
            return false;
        }
        if right <= self.len
            && (self.slots[right].fitness > self.slots[position].fitness
                || !self.subtree_valid(right))
        {
            return false;
        }
        true
    }

    fn sift_up(&mut self, mut position: usize) -> usize {
        let entry = self.slots[position];
        while position > 1 {
            let parent = position / 2;
            if self.slots[parent].fitness >= entry.fitness {
                break;
            }
            self.slots[position] = self.slots[parent];
            position = parent;
        }
        self.slots[position] = entry;
        position
    }

    fn sift_down(&mut self, mut position: usize) -> usize {
        let entry = self.slots[position];
        loop {
            let mut child = 2 * position;
            if child > self.len {
                break;
            }
            if child < self.len && self.slots[child + 1].fitness > self.slots[child].fitness {
                child += 1;
            }
            if self.slots[child].fitness <= entry.fitness {
                break;
            }
            self.slots[position] = self.slots[child];
            position = child;
        }
        self.slots[position] = entry;
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled(values: &[f64]) -> FitnessQueue {
        let mut queue = FitnessQueue::new(values.len());
        for (id, &fitness) in values.iter().enumerate() {
            queue.insert(id, fitness).unwrap();
        }
        queue
    }

    #[test]
    fn test_pop_in_descending_order() {
        let mut queue = filled(&[0.3, 2.5, 1.0, 0.7, 2.9, 0.1]);
        assert!(queue.is_valid());
        assert_eq!(queue.peek().map(|e| e.id), Some(4));

        let order: Vec<f64> = std::iter::from_fn(|| queue.pop().map(|e| e.fitness)).collect();
        assert_eq!(order, vec![2.9, 2.5, 1.0, 0.7, 0.3, 0.1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut queue = filled(&[1.0, 2.0]);
        assert_eq!(
            queue.insert(9, 3.0),
            Err(QueueError::CapacityExceeded { capacity: 2 })
        );
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_get_bounds() {
        let queue = filled(&[1.0, 2.0, 3.0]);
        assert_eq!(queue.get(0), None);
        assert_eq!(queue.get(4), None);
        assert_eq!(queue.get(1).map(|e| e.fitness), Some(3.0));
    }

    #[test]
    fn test_raised_leaf_moves_up() {
        let mut queue = filled(&[5.0, 4.0, 3.0, 2.0, 1.0, 0.5, 0.2]);
        let last = queue.len();
        let id = queue.get(last).unwrap().id;

        let position = queue.priority_changed(last, 4.5).unwrap();
        assert!(position < last);
        assert_eq!(queue.get(position).map(|e| e.id), Some(id));
        assert!(queue.is_valid());

        let position = queue.priority_changed(position, 9.0).unwrap();
        assert_eq!(position, 1);
        assert_eq!(queue.peek().map(|e| e.id), Some(id));
    }

    #[test]
    fn test_lowered_root_moves_down() {
        let mut queue = filled(&[5.0, 4.0, 3.0, 2.0, 1.0]);
        let id = queue.peek().unwrap().id;

        let position = queue.priority_changed(1, 0.0).unwrap();
        assert!(position > 1);
        assert_eq!(queue.get(position).map(|e| e.id), Some(id));
        assert!(queue.is_valid());
    }

    #[test]
    fn test_priority_changed_out_of_range() {
        let mut queue = filled(&[1.0]);
        assert_eq!(
            queue.priority_changed(2, 0.0),
            Err(QueueError::PositionOutOfRange { position: 2, len: 1 })
        );
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut queue = filled(&[1.0, 2.0, 3.0]);
        queue.reset();
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 3);
        queue.insert(0, 1.0).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(f64),
        Pop,
        Change(usize, f64),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-1.0f64..4.0).prop_map(Op::Insert),
            Just(Op::Pop),
            (1usize..32, -1.0f64..4.0).prop_map(|(p, f)| Op::Change(p, f)),
        ]
    }

    proptest! {
        #[test]
        fn prop_heap_stays_valid(ops in prop::collection::vec(arb_op(), 1..200)) {
            let mut queue = FitnessQueue::new(24);
            for (id, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Insert(fitness) => {
                        let full = queue.len() == queue.capacity();
                        prop_assert_eq!(queue.insert(id, fitness).is_err(), full);
                    }
                    Op::Pop => {
                        let best = queue.iter().map(|e| e.fitness).fold(f64::NEG_INFINITY, f64::max);
                        if let Some(top) = queue.pop() {
                            prop_assert_eq!(top.fitness, best);
                        }
                    }
                    Op::Change(position, fitness) => {
                        if position <= queue.len() {
                            queue.priority_changed(position, fitness).unwrap();
                        }
                    }
                }
                prop_assert!(queue.is_valid());
            }
        }
    }
}
