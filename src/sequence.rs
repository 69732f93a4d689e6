/// Series storage backends
///
/// A `Sequence` is the raw storage underneath a series. Two layouts are
/// available and selected per series through [`StorageHint`]:
/// - `ArraySequence`: one contiguous `Vec`, O(1) access, O(N) middle edits
/// - `TieredVectorSequence`: blocks of roughly √N elements, O(log √N) access,
///   O(√N) middle edits

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;

/// Storage layout hint for a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageHint {
    /// Append and read heavy data such as live feeds and time series.
    #[default]
    FastReads,
    /// Frequent inserts and removals anywhere in the series.
    FastUpdates,
}

impl StorageHint {
    pub(crate) fn new_sequence<T>(&self) -> Box<dyn Sequence<T> + Send + Sync>
    where
        T: Clone + Debug + Send + Sync + 'static,
    {
        match self {
            StorageHint::FastReads => Box::new(ArraySequence::new()),
            StorageHint::FastUpdates => Box::new(TieredVectorSequence::new()),
        }
    }
}

impl FromStr for StorageHint {
    type Err = String;

    /// Accepts "fast_reads" and "fast_updates" (case-insensitive).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast_reads" | "fastreads" => Ok(StorageHint::FastReads),
            "fast_updates" | "fastupdates" => Ok(StorageHint::FastUpdates),
            _ => Err(format!(
                "Unknown storage hint: '{}'. Use 'fast_reads' or 'fast_updates'",
                s
            )),
        }
    }
}

/// Storage operations shared by both layouts
pub trait Sequence<T: Clone> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cloned value at `index`
    fn get(&self, index: usize) -> Result<T>;

    fn get_ref(&self, index: usize) -> Option<&T>;

    fn set(&mut self, index: usize, value: T) -> Result<()>;

    /// Insert at `index` (0..=len), shifting later elements
    fn insert(&mut self, index: usize, value: T) -> Result<()>;

    /// Remove and return the value at `index`
    fn delete(&mut self, index: usize) -> Result<T>;

    fn append(&mut self, value: T);

    fn iter(&self) -> Box<dyn Iterator<Item = T> + '_>;

    /// Drop every element at or after `len`
    fn truncate(&mut self, len: usize) {
        while self.len() > len {
            let last = self.len() - 1;
            // Index is in range by construction
            let _ = self.delete(last);
        }
    }

    fn clear(&mut self) {
        self.truncate(0);
    }

    /// Replace the whole content
    fn replace(&mut self, values: Vec<T>) {
        self.clear();
        for value in values {
            self.append(value);
        }
    }

    fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

/// Contiguous storage
#[derive(Debug, Clone)]
pub struct ArraySequence<T: Clone> {
    data: Vec<T>,
}

impl<T: Clone> ArraySequence<T> {
    pub fn new() -> Self {
        ArraySequence { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ArraySequence {
            data: Vec::with_capacity(capacity),
        }
    }
}

impl<T: Clone> Default for ArraySequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Debug> Sequence<T> for ArraySequence<T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> Result<T> {
        self.data
            .get(index)
            .cloned()
            .ok_or_else(|| Error::out_of_range(index, self.data.len()))
    }

    fn get_ref(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(index)
            .ok_or_else(|| Error::out_of_range(index, len))?;
        *slot = value;
        Ok(())
    }

    fn insert(&mut self, index: usize, value: T) -> Result<()> {
        if index > self.data.len() {
            return Err(Error::out_of_range(index, self.data.len() + 1));
        }
        self.data.insert(index, value);
        Ok(())
    }

    fn delete(&mut self, index: usize) -> Result<T> {
        if index >= self.data.len() {
            return Err(Error::out_of_range(index, self.data.len()));
        }
        Ok(self.data.remove(index))
    }

    fn append(&mut self, value: T) {
        self.data.push(value);
    }

    fn iter(&self) -> Box<dyn Iterator<Item = T> + '_> {
        Box::new(self.data.iter().cloned())
    }

    fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    fn replace(&mut self, values: Vec<T>) {
        self.data = values;
    }

    fn to_vec(&self) -> Vec<T> {
        self.data.clone()
    }
}

/// Block-decomposed storage.
///
/// `block_starts[i]` holds the global index of the first element in
/// `blocks[i]`, so lookup is a binary search over block starts. Blocks split
/// above 2√N elements and merge with a neighbour below √N/4.
#[derive(Debug, Clone)]
pub struct TieredVectorSequence<T: Clone> {
    blocks: Vec<Vec<T>>,
    block_starts: Vec<usize>,
    size: usize,
}

impl<T: Clone> TieredVectorSequence<T> {
    const MIN_BLOCK_SIZE: usize = 16;
    const MAX_BLOCK_SIZE: usize = 4096;

    pub fn new() -> Self {
        TieredVectorSequence {
            blocks: Vec::new(),
            block_starts: Vec::new(),
            size: 0,
        }
    }

    fn ideal_block_size(&self) -> usize {
        let sqrt = (self.size as f64).sqrt() as usize;
        sqrt.clamp(Self::MIN_BLOCK_SIZE, Self::MAX_BLOCK_SIZE)
    }

    /// (block index, offset in block) for a global index
    fn locate(&self, index: usize) -> Result<(usize, usize)> {
        if index >= self.size {
            return Err(Error::out_of_range(index, self.size));
        }
        let block = match self.block_starts.binary_search(&index) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        Ok((block, index - self.block_starts[block]))
    }

    fn shift_starts_after(&mut self, block: usize, delta: isize) {
        for start in self.block_starts.iter_mut().skip(block + 1) {
            *start = (*start as isize + delta) as usize;
        }
    }

    fn split_if_oversized(&mut self, block: usize) {
        if self.blocks[block].len() <= 2 * self.ideal_block_size() {
            return;
        }
        let mid = self.blocks[block].len() / 2;
        let tail = self.blocks[block].split_off(mid);
        let tail_start = self.block_starts[block] + mid;
        self.blocks.insert(block + 1, tail);
        self.block_starts.insert(block + 1, tail_start);
    }

    fn merge_if_undersized(&mut self, block: usize) {
        if self.blocks[block].is_empty() {
            self.blocks.remove(block);
            self.block_starts.remove(block);
            return;
        }
        let ideal = self.ideal_block_size();
        if self.blocks.len() <= 1 || self.blocks[block].len() >= ideal / 4 {
            return;
        }
        // Merge into the previous block when possible, otherwise pull in the next one
        let (left, right) = if block > 0 { (block - 1, block) } else { (block, block + 1) };
        if self.blocks[left].len() + self.blocks[right].len() <= 2 * ideal {
            let moved = self.blocks.remove(right);
            self.block_starts.remove(right);
            self.blocks[left].extend(moved);
        }
    }

    /// Redistribute elements into evenly sized blocks. O(N).
    pub fn rebalance(&mut self) {
        let all: Vec<T> = self.blocks.drain(..).flatten().collect();
        self.block_starts.clear();
        let size = self.ideal_block_size();
        for (i, chunk) in all.chunks(size).enumerate() {
            self.blocks.push(chunk.to_vec());
            self.block_starts.push(i * size);
        }
    }
}

impl<T: Clone> Default for TieredVectorSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Debug> Sequence<T> for TieredVectorSequence<T> {
    fn len(&self) -> usize {
        self.size
    }

    fn get(&self, index: usize) -> Result<T> {
        let (block, offset) = self.locate(index)?;
        Ok(self.blocks[block][offset].clone())
    }

    fn get_ref(&self, index: usize) -> Option<&T> {
        self.locate(index)
            .ok()
            .map(|(block, offset)| &self.blocks[block][offset])
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        let (block, offset) = self.locate(index)?;
        self.blocks[block][offset] = value;
        Ok(())
    }

    fn insert(&mut self, index: usize, value: T) -> Result<()> {
        if index > self.size {
            return Err(Error::out_of_range(index, self.size + 1));
        }
        if index == self.size {
            self.append(value);
            return Ok(());
        }
        let (block, offset) = self.locate(index)?;
        self.blocks[block].insert(offset, value);
        self.size += 1;
        self.shift_starts_after(block, 1);
        self.split_if_oversized(block);
        Ok(())
    }

    fn delete(&mut self, index: usize) -> Result<T> {
        let (block, offset) = self.locate(index)?;
        let value = self.blocks[block].remove(offset);
        self.size -= 1;
        self.shift_starts_after(block, -1);
        self.merge_if_undersized(block);
        Ok(value)
    }

    fn append(&mut self, value: T) {
        match self.blocks.last_mut() {
            Some(last) => last.push(value),
            None => {
                self.blocks.push(vec![value]);
                self.block_starts.push(0);
            }
        }
        self.size += 1;
        let last = self.blocks.len() - 1;
        self.split_if_oversized(last);
    }

    fn iter(&self) -> Box<dyn Iterator<Item = T> + '_> {
        Box::new(self.blocks.iter().flat_map(|b| b.iter().cloned()))
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.block_starts.clear();
        self.size = 0;
    }

    fn replace(&mut self, values: Vec<T>) {
        self.blocks = vec![values];
        self.block_starts = vec![0];
        self.size = self.blocks[0].len();
        self.rebalance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_sequence_basic() {
        let mut seq = ArraySequence::<i32>::new();
        seq.append(10);
        seq.append(30);
        seq.insert(1, 20).unwrap();

        assert_eq!(seq.to_vec(), vec![10, 20, 30]);
        assert_eq!(seq.delete(0).unwrap(), 10);
        assert_eq!(seq.get(2), Err(Error::out_of_range(2, 2)));
    }

    #[test]
    fn test_array_sequence_truncate_and_replace() {
        let mut seq = ArraySequence::<i32>::with_capacity(8);
        for i in 0..8 {
            seq.append(i);
        }
        seq.truncate(3);
        assert_eq!(seq.to_vec(), vec![0, 1, 2]);

        seq.replace(vec![7, 8]);
        assert_eq!(seq.len(), 2);
        seq.clear();
        assert!(seq.is_empty());
    }

    #[test]
    fn test_tiered_vector_insert_at_all_positions() {
        for pos in 0..=40 {
            let mut seq = TieredVectorSequence::<i32>::new();
            for i in 0..40 {
                seq.append(i);
            }
            seq.insert(pos, 999).unwrap();

            let mut expected: Vec<i32> = (0..40).collect();
            expected.insert(pos, 999);
            assert_eq!(seq.to_vec(), expected, "insert at {}", pos);
        }
    }

    #[test]
    fn test_tiered_vector_mixed_operations() {
        let mut seq = TieredVectorSequence::<i32>::new();
        for i in 0..500 {
            seq.append(i * 2);
        }
        for i in 0..500 {
            seq.insert((i * 2 + 1) as usize, i * 2 + 1).unwrap();
        }
        assert_eq!(seq.to_vec(), (0..1000).collect::<Vec<_>>());

        // Remove every other element from the back
        for i in (0..500).rev() {
            seq.delete(i * 2).unwrap();
        }
        assert_eq!(seq.to_vec(), (0..1000).filter(|x| x % 2 == 1).collect::<Vec<_>>());

        seq.rebalance();
        assert_eq!(seq.get(0).unwrap(), 1);
        assert_eq!(seq.get(499).unwrap(), 999);
    }

    #[test]
    fn test_tiered_vector_truncate_and_replace() {
        let mut seq = TieredVectorSequence::<i32>::new();
        for i in 0..100 {
            seq.append(i);
        }
        seq.truncate(10);
        assert_eq!(seq.to_vec(), (0..10).collect::<Vec<_>>());

        seq.replace((0..300).rev().collect());
        assert_eq!(seq.len(), 300);
        assert_eq!(seq.get(0).unwrap(), 299);
        assert_eq!(seq.get(299).unwrap(), 0);
        assert_eq!(seq.get_ref(300), None);

        seq.replace(Vec::new());
        assert!(seq.is_empty());
        seq.append(5);
        assert_eq!(seq.to_vec(), vec![5]);
    }

    #[test]
    fn test_tiered_vector_error_handling() {
        let mut seq = TieredVectorSequence::<i32>::new();
        assert!(seq.get(0).is_err());
        assert!(seq.insert(1, 42).is_err());

        seq.append(1);
        seq.append(2);
        assert!(seq.get(2).is_err());
        assert!(seq.delete(2).is_err());
        assert!(seq.set(2, 99).is_err());
    }

    #[test]
    fn test_storage_hint_parse() {
        assert_eq!("fast_reads".parse::<StorageHint>(), Ok(StorageHint::FastReads));
        assert_eq!("FastUpdates".parse::<StorageHint>(), Ok(StorageHint::FastUpdates));
        assert!("fast".parse::<StorageHint>().is_err());

        let hint: StorageHint = serde_json::from_str("\"fast_updates\"").unwrap();
        assert_eq!(hint, StorageHint::FastUpdates);
    }
}
