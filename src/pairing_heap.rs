//! Pairing Heap
//!
//! An intrusive min-heap: the heap only stores the root index while the links live inside the items
//! themselves (the edges of the graph store), so an edge can be moved between queues, removed from the
//! middle of a queue, or have all queues of a tree merged at once without any allocation per item.
//!
//! There is no ordering guarantee among equal keys, but the structure is fully deterministic: the same
//! sequence of operations always yields the same sequence of minimums.
//!

use crate::util::*;

/// links of one item; an item belongs to at most one heap at any time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapLinks {
    /// the first child in the pairing tree
    child: Option<usize>,
    /// the next sibling
    next: Option<usize>,
    /// the previous sibling, or the parent if this item is the first child
    prev: Option<usize>,
    /// whether the item is currently owned by some heap
    in_heap: bool,
}

/// storage of heap items, keyed by their current slack
pub trait HeapStore {
    fn heap_key(&self, item: usize) -> Cost;
    fn heap_links(&self, item: usize) -> &HeapLinks;
    fn heap_links_mut(&mut self, item: usize) -> &mut HeapLinks;
}

#[derive(Debug, Clone, Default)]
pub struct PairingHeap {
    root: Option<usize>,
}

impl PairingHeap {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// forget all items without touching them; only valid if every item is reset individually
    pub fn clear(&mut self) {
        self.root = None;
    }

    /// the minimum item
    pub fn get_min(&self) -> Option<usize> {
        self.root
    }

    /// whether the item is owned by no heap
    pub fn is_reset<S: HeapStore + ?Sized>(store: &S, item: usize) -> bool {
        !store.heap_links(item).in_heap
    }

    /// detach an item from whatever heap held it, used when that heap is discarded as a whole
    pub fn reset_item<S: HeapStore + ?Sized>(store: &mut S, item: usize) {
        *store.heap_links_mut(item) = HeapLinks::default();
    }

    pub fn add<S: HeapStore + ?Sized>(&mut self, item: usize, store: &mut S) {
        debug_assert!(Self::is_reset(store, item), "item {item} is already in a heap");
        *store.heap_links_mut(item) = HeapLinks {
            in_heap: true,
            ..HeapLinks::default()
        };
        self.root = Some(match self.root {
            Some(root) => Self::meld(root, item, store),
            None => item,
        });
    }

    pub fn remove<S: HeapStore + ?Sized>(&mut self, item: usize, store: &mut S) {
        debug_assert!(!Self::is_reset(store, item), "item {item} is not in a heap");
        let links = *store.heap_links(item);
        if self.root == Some(item) {
            self.root = Self::merge_pairs(links.child, store);
        } else {
            Self::cut(item, store);
            if let Some(subtree) = Self::merge_pairs(links.child, store) {
                let root = self.root.expect("removing from an empty heap");
                self.root = Some(Self::meld(root, subtree, store));
            }
        }
        Self::reset_item(store, item);
    }

    /// replace `old` by `new` whose key is not larger; `old == new` is a plain decrease-key
    pub fn decrease<S: HeapStore + ?Sized>(&mut self, old: usize, new: usize, store: &mut S) {
        if old != new {
            self.remove(old, store);
            self.add(new, store);
            return;
        }
        if self.root == Some(old) {
            return;
        }
        Self::cut(old, store);
        let root = self.root.expect("decreasing in an empty heap");
        self.root = Some(Self::meld(root, old, store));
    }

    /// move all items of this heap into `dest`, leaving this heap empty
    pub fn merge_into<S: HeapStore + ?Sized>(&mut self, dest: &mut PairingHeap, store: &mut S) {
        if let Some(root) = self.root.take() {
            dest.root = Some(match dest.root {
                Some(dest_root) => Self::meld(dest_root, root, store),
                None => root,
            });
        }
    }

    /// all items in the heap, without modifying it
    pub fn items<S: HeapStore + ?Sized>(&self, store: &S) -> Vec<usize> {
        let mut items = Vec::new();
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(item) = stack.pop() {
            items.push(item);
            let links = store.heap_links(item);
            if let Some(next) = links.next {
                stack.push(next);
            }
            if let Some(child) = links.child {
                stack.push(child);
            }
        }
        items
    }

    /// take all items out of the heap and reset each of them
    pub fn drain<S: HeapStore + ?Sized>(&mut self, store: &mut S) -> Vec<usize> {
        let items = self.items(store);
        for &item in items.iter() {
            Self::reset_item(store, item);
        }
        self.root = None;
        items
    }

    /// detach the subtree rooted at a non-root item from its siblings
    fn cut<S: HeapStore + ?Sized>(item: usize, store: &mut S) {
        let links = *store.heap_links(item);
        let prev = links.prev.expect("a non-root item must have a predecessor");
        if store.heap_links(prev).child == Some(item) {
            store.heap_links_mut(prev).child = links.next;
        } else {
            store.heap_links_mut(prev).next = links.next;
        }
        if let Some(next) = links.next {
            store.heap_links_mut(next).prev = Some(prev);
        }
        let links = store.heap_links_mut(item);
        links.prev = None;
        links.next = None;
    }

    /// link two detached trees, the one with the larger key becomes the first child of the other
    fn meld<S: HeapStore + ?Sized>(a: usize, b: usize, store: &mut S) -> usize {
        let (parent, child) = if store.heap_key(b) < store.heap_key(a) { (b, a) } else { (a, b) };
        let first_child = store.heap_links(parent).child;
        {
            let child_links = store.heap_links_mut(child);
            child_links.next = first_child;
            child_links.prev = Some(parent);
        }
        if let Some(first_child) = first_child {
            store.heap_links_mut(first_child).prev = Some(child);
        }
        let parent_links = store.heap_links_mut(parent);
        parent_links.child = Some(child);
        parent_links.prev = None;
        parent_links.next = None;
        parent
    }

    /// standard two-pass pairing of a sibling list
    fn merge_pairs<S: HeapStore + ?Sized>(first: Option<usize>, store: &mut S) -> Option<usize> {
        let mut siblings = Vec::new();
        let mut cursor = first;
        while let Some(item) = cursor {
            let links = store.heap_links_mut(item);
            cursor = links.next;
            links.next = None;
            links.prev = None;
            siblings.push(item);
        }
        let mut paired = Vec::with_capacity((siblings.len() + 1) / 2);
        for pair in siblings.chunks(2) {
            paired.push(match pair {
                [a, b] => Self::meld(*a, *b, store),
                [a] => *a,
                _ => unreachable!(),
            });
        }
        let mut result = paired.pop()?;
        while let Some(item) = paired.pop() {
            result = Self::meld(item, result, store);
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStore {
        keys: Vec<Cost>,
        links: Vec<HeapLinks>,
    }

    impl TestStore {
        fn new(keys: &[i32]) -> Self {
            Self {
                keys: keys.iter().map(|&key| key as Cost).collect(),
                links: vec![HeapLinks::default(); keys.len()],
            }
        }
    }

    impl HeapStore for TestStore {
        fn heap_key(&self, item: usize) -> Cost {
            self.keys[item]
        }
        fn heap_links(&self, item: usize) -> &HeapLinks {
            &self.links[item]
        }
        fn heap_links_mut(&mut self, item: usize) -> &mut HeapLinks {
            &mut self.links[item]
        }
    }

    fn pop_all(heap: &mut PairingHeap, store: &mut TestStore) -> Vec<usize> {
        let mut order = vec![];
        while let Some(item) = heap.get_min() {
            heap.remove(item, store);
            order.push(item);
        }
        order
    }

    #[test]
    fn pairing_heap_sorted_order() {
        // cargo test pairing_heap_sorted_order -- --nocapture
        let mut store = TestStore::new(&[5, 3, 8, 1, 9, 2, 7, 3]);
        let mut heap = PairingHeap::new();
        for item in 0..8 {
            heap.add(item, &mut store);
        }
        assert_eq!(heap.get_min(), Some(3));
        let order = pop_all(&mut heap, &mut store);
        let keys: Vec<Cost> = order.iter().map(|&item| store.keys[item]).collect();
        assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());
        assert!(heap.is_empty());
        assert!((0..8).all(|item| PairingHeap::is_reset(&store, item)));
        // replaying the same operations gives the same order, including among equal keys
        for item in 0..8 {
            heap.add(item, &mut store);
        }
        assert_eq!(pop_all(&mut heap, &mut store), order);
    }

    #[test]
    fn pairing_heap_arbitrary_remove() {
        // cargo test pairing_heap_arbitrary_remove -- --nocapture
        let mut store = TestStore::new(&[4, 6, 2, 9, 5, 1, 8]);
        let mut heap = PairingHeap::new();
        for item in 0..7 {
            heap.add(item, &mut store);
        }
        heap.remove(0, &mut store);
        heap.remove(5, &mut store);
        heap.remove(3, &mut store);
        assert!(PairingHeap::is_reset(&store, 0));
        assert_eq!(pop_all(&mut heap, &mut store), vec![2, 4, 1, 6]);
    }

    #[test]
    fn pairing_heap_decrease() {
        // cargo test pairing_heap_decrease -- --nocapture
        let mut store = TestStore::new(&[4, 6, 2, 9, 5]);
        let mut heap = PairingHeap::new();
        for item in 0..4 {
            heap.add(item, &mut store);
        }
        heap.remove(2, &mut store);
        heap.add(2, &mut store);
        store.keys[3] = 0 as Cost;
        heap.decrease(3, 3, &mut store);
        assert_eq!(heap.get_min(), Some(3));
        // replace item 1 by item 4 that carries a smaller key
        heap.decrease(1, 4, &mut store);
        assert!(PairingHeap::is_reset(&store, 1));
        assert_eq!(pop_all(&mut heap, &mut store), vec![3, 2, 0, 4]);
    }

    #[test]
    fn pairing_heap_merge_and_drain() {
        // cargo test pairing_heap_merge_and_drain -- --nocapture
        let mut store = TestStore::new(&[7, 3, 5, 1, 6, 2]);
        let mut heap_a = PairingHeap::new();
        let mut heap_b = PairingHeap::new();
        for item in 0..3 {
            heap_a.add(item, &mut store);
        }
        for item in 3..6 {
            heap_b.add(item, &mut store);
        }
        heap_a.merge_into(&mut heap_b, &mut store);
        assert!(heap_a.is_empty());
        let mut items = heap_b.items(&store);
        items.sort();
        assert_eq!(items, vec![0, 1, 2, 3, 4, 5]);
        // uniform shifts keep the heap order valid
        for &item in items.iter() {
            store.keys[item] -= 1 as Cost;
        }
        assert_eq!(heap_b.get_min(), Some(3));
        let mut drained = heap_b.drain(&mut store);
        drained.sort();
        assert_eq!(drained, vec![0, 1, 2, 3, 4, 5]);
        assert!(heap_b.is_empty());
        assert!((0..6).all(|item| PairingHeap::is_reset(&store, item)));
    }
}
