//! A priority queue that stores arbitrary data sorted by simulated day
//!
//! Defines a `Queue<T, P>` that stores items of type `T` sorted by `u32` day and a definable
//! priority `P`, called 'plans'. The driver uses it for everything that happens at a known
//! future day: the daily step itself, interventions, isolation releases and state dumps.
//! Adding a plan is *O*(log(*n*)) while cancellation and retrieval are *O*(1).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::hashing::HashMap;

/// A priority queue that stores arbitrary data sorted by day
///
/// When plans are created they are sequentially assigned an `Id`. If two plans are scheduled
/// for the same day then the plan with the lowest priority is placed earlier. If two plans have
/// the same day and priority then the plan that is scheduled first is placed earlier.
///
/// The day, plan id, and priority are stored in a binary heap of `Entry<P>` objects. The data
/// payload is stored in a hash map by plan id. Cancelling a plan removes its payload; the heap
/// entry is skipped when it is popped.
pub struct Queue<T, P: Eq + PartialEq + Ord> {
    queue: BinaryHeap<Entry<P>>,
    data_map: HashMap<u64, T>,
    plan_counter: u64,
}

impl<T, P: Eq + PartialEq + Ord> Queue<T, P> {
    /// Create a new empty `Queue<T>`
    #[must_use]
    pub fn new() -> Queue<T, P> {
        Queue {
            queue: BinaryHeap::new(),
            data_map: HashMap::default(),
            plan_counter: 0,
        }
    }

    /// Add a plan to the queue at the specified day
    ///
    /// Returns an `Id` for the newly-added plan that can be used to cancel it if needed.
    pub fn add_plan(&mut self, day: u32, data: T, priority: P) -> Id {
        let id = self.plan_counter;
        self.queue.push(Entry { day, id, priority });
        self.data_map.insert(id, data);
        self.plan_counter += 1;
        Id { id }
    }

    /// Cancel a plan that has been added to the queue. Returns false if the plan was already
    /// executed or cancelled.
    pub fn cancel_plan(&mut self, id: &Id) -> bool {
        self.data_map.remove(&id.id).is_some()
    }

    /// The day of the earliest live plan, if any.
    pub fn next_day(&mut self) -> Option<u32> {
        while let Some(entry) = self.queue.peek() {
            if self.data_map.contains_key(&entry.id) {
                return Some(entry.day);
            }
            self.queue.pop();
        }
        None
    }

    /// Retrieve the earliest plan in the queue
    ///
    /// Returns the next plan if it exists or else `None` if the queue is empty
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        while let Some(entry) = self.queue.pop() {
            // Cancelled plans have no data
            if let Some(data) = self.data_map.remove(&entry.id) {
                return Some(Plan {
                    day: entry.day,
                    data,
                });
            }
        }
        None
    }

    /// Number of live plans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.is_empty()
    }
}

impl<T, P: Eq + PartialEq + Ord> Default for Queue<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// A day, id, and priority object used to order plans in the `Queue<T>`
#[derive(PartialEq, Debug)]
struct Entry<P: Eq + PartialEq + Ord> {
    day: u32,
    id: u64,
    priority: P,
}

impl<P: Eq + PartialEq + Ord> Eq for Entry<P> {}

impl<P: Eq + PartialEq + Ord> PartialOrd for Entry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entry objects are ordered in increasing order by day, priority, and then plan id. The
/// ordering is reversed because `BinaryHeap` is a max-heap.
impl<P: Eq + PartialEq + Ord> Ord for Entry<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.day
            .cmp(&other.day)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.id.cmp(&other.id))
            .reverse()
    }
}

/// A unique identifier for a plan added to a `Queue<T>`
#[derive(Debug, PartialEq, Eq)]
pub struct Id {
    id: u64,
}

/// A plan that holds data of type `T` intended to be used on the specified day
pub struct Plan<T> {
    pub day: u32,
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::Queue;

    #[test]
    fn empty_queue() {
        let mut plan_queue = Queue::<(), ()>::new();
        assert!(plan_queue.get_next_plan().is_none());
        assert_eq!(plan_queue.next_day(), None);
    }

    #[test]
    fn add_plans() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1, 1, ());
        plan_queue.add_plan(3, 3, ());
        plan_queue.add_plan(2, 2, ());

        for expected in 1..=3 {
            let next_plan = plan_queue.get_next_plan().unwrap();
            assert_eq!(next_plan.day, expected);
            assert_eq!(next_plan.data, expected);
        }
        assert!(plan_queue.get_next_plan().is_none());
    }

    #[test]
    fn same_day_orders_by_priority_then_insertion() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1, "day", 2);
        plan_queue.add_plan(1, "release a", 1);
        plan_queue.add_plan(1, "intervention", 0);
        plan_queue.add_plan(1, "release b", 1);

        let order: Vec<_> = std::iter::from_fn(|| plan_queue.get_next_plan())
            .map(|plan| plan.data)
            .collect();
        assert_eq!(order, vec!["intervention", "release a", "release b", "day"]);
    }

    #[test]
    fn add_and_cancel_plans() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1, 1, ());
        let plan_to_cancel = plan_queue.add_plan(2, 2, ());
        plan_queue.add_plan(3, 3, ());
        assert!(plan_queue.cancel_plan(&plan_to_cancel));
        assert!(!plan_queue.cancel_plan(&plan_to_cancel));
        assert_eq!(plan_queue.len(), 2);

        assert_eq!(plan_queue.get_next_plan().unwrap().data, 1);
        assert_eq!(plan_queue.next_day(), Some(3));
        assert_eq!(plan_queue.get_next_plan().unwrap().data, 3);
        assert!(plan_queue.is_empty());
    }

    #[test]
    fn cancel_executed_plan_is_noop() {
        let mut plan_queue = Queue::new();
        let plan = plan_queue.add_plan(1, (), ());
        plan_queue.get_next_plan();
        assert!(!plan_queue.cancel_plan(&plan));
    }
}
