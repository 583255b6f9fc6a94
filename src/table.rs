use std::ops::Index;

use log::debug;

use crate::utils::MyHash;

#[derive(Clone)]
struct Entry<T> {
    value: T,
    /// Index of the next entry in the same bucket chain (0 terminates).
    next: usize,
}

/// Hash-consing arena: every distinct value is stored exactly once and is
/// addressed by a stable 1-based index. Index 0 is a sentry.
pub struct Table<T> {
    data: Vec<Entry<T>>,
    buckets: Vec<usize>,
    bitmask: u64,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with room for `2^bits` entries before reallocation.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");

        let capacity = 1usize << bits;
        let mut data = Vec::with_capacity(capacity);
        data.push(Entry {
            value: T::default(),
            next: 0,
        });

        let buckets_bits = bits.min(16);
        let buckets = vec![0; 1 << buckets_bits];
        let bitmask = (buckets.len() - 1) as u64;

        Self {
            data,
            buckets,
            bitmask,
        }
    }
}

impl<T> Table<T> {
    /// Get the number of allocated slots.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }
    /// Get the number of stored values.
    pub fn size(&self) -> usize {
        self.data.len() - 1
    }
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index].value
    }

    /// Get the index of the next entry in the bucket chain.
    pub fn next(&self, index: usize) -> usize {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next
    }

    /// Append a value without hash consing and return its index.
    pub fn add(&mut self, value: T) -> usize {
        self.data.push(Entry { value, next: 0 });
        self.data.len() - 1
    }
}

impl<T> Table<T>
where
    T: MyHash + Eq,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Put a value into the table and return its index, reusing an existing
    /// equal entry if there is one.
    pub fn put(&mut self, value: T) -> usize {
        let bucket_index = self.bucket_index(&value);
        let mut index = self.buckets[bucket_index];

        while index != 0 {
            if &value == self.value(index) {
                return index;
            }
            index = self.next(index);
        }

        // Prepend to the chain.
        let i = self.add(value);
        self.data[i].next = self.buckets[bucket_index];
        self.buckets[bucket_index] = i;

        if self.size() > 4 * self.buckets.len() {
            self.grow_buckets();
        }
        i
    }

    /// Double the bucket array and relink every chain.
    fn grow_buckets(&mut self) {
        let n = self.buckets.len() * 2;
        debug!("Growing unique table buckets to {}", n);
        self.buckets = vec![0; n];
        self.bitmask = (n - 1) as u64;
        for i in 1..self.data.len() {
            let b = self.bucket_index(&self.data[i].value);
            self.data[i].next = self.buckets[b];
            self.buckets[b] = i;
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    struct Item(i32);

    impl MyHash for Item {
        fn hash(&self) -> u64 {
            self.0.unsigned_abs() as u64
        }
    }

    #[test]
    fn test_add() {
        let mut table = Table::new(2);
        let index = table.add(42);
        assert_eq!(index, 1);
        assert_eq!(table[index], 42);
        assert_eq!(table.next(index), 0);
    }

    #[test]
    fn test_put_dedup() {
        let mut table = Table::new(2);
        let a = table.put(Item(5));
        let b = table.put(Item(5));
        assert_eq!(a, b);
        assert_eq!(table.size(), 1);
    }

    #[test]
    fn test_put_collision() {
        let mut table = Table::new(2);
        let index1 = table.put(Item(5));
        let index2 = table.put(Item(-5));
        assert_ne!(index1, index2);
        assert_eq!(table[index1], Item(5));
        assert_eq!(table[index2], Item(-5));
        // Newest entry heads the chain.
        assert_eq!(table.next(index2), index1);
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut table = Table::new(2);
        let buckets = table.num_buckets();
        let indices: Vec<_> = (0..100).map(|i| table.put(Item(i))).collect();
        assert_eq!(table.size(), 100);
        assert!(table.num_buckets() > buckets);
        for (i, &index) in indices.iter().enumerate() {
            assert_eq!(table.put(Item(i as i32)), index);
        }
    }
}
