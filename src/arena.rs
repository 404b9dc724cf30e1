//! Disjoint per-batch blocks over a shared backing buffer
//!
//! Batched primitives keep every batch element's blocks in one allocation and
//! locate them through an offset table. To hand each task exclusive mutable
//! access to its own block, the backing buffer is split once into
//! non-overlapping sub-slices; after that every task owns its `&mut [f32]` and
//! no locking is needed.

use crate::error::{DenseError, Result};

/// Split `buffer` into one mutable block per batch element.
///
/// Block `k` covers `buffer[starts[k]..starts[k] + lens[k]]`. The returned
/// vector is in batch order regardless of how the offsets are ordered in
/// memory. Empty blocks never conflict with anything.
///
/// # Errors
///
/// - `InvalidInput` if `starts` and `lens` differ in length
/// - `OutOfBounds` if a block runs past the end of `buffer`
/// - `OverlappingBlocks` if two non-empty blocks share an element
///
/// # Example
///
/// ```
/// use trueno_dense::arena::split_blocks_mut;
///
/// let mut buf = vec![0.0f32; 6];
/// let mut blocks = split_blocks_mut(&mut buf, &[4, 0], &[2, 4]).unwrap();
/// blocks[0].fill(1.0);
/// blocks[1].fill(2.0);
/// assert_eq!(buf, vec![2.0, 2.0, 2.0, 2.0, 1.0, 1.0]);
/// ```
pub fn split_blocks_mut<'a>(
    buffer: &'a mut [f32],
    starts: &[usize],
    lens: &[usize],
) -> Result<Vec<&'a mut [f32]>> {
    if starts.len() != lens.len() {
        return Err(DenseError::InvalidInput(format!(
            "{} block offsets but {} block lengths",
            starts.len(),
            lens.len()
        )));
    }

    let total = buffer.len();
    let mut order: Vec<usize> = (0..starts.len()).filter(|&k| lens[k] > 0).collect();
    order.sort_by_key(|&k| starts[k]);

    let mut slots: Vec<Option<&'a mut [f32]>> = (0..starts.len()).map(|_| None).collect();
    let mut rest = buffer;
    let mut consumed = 0;
    let mut previous: Option<usize> = None;

    for k in order {
        let start = starts[k];
        let end = match start.checked_add(lens[k]) {
            Some(end) if end <= total => end,
            end => {
                return Err(DenseError::OutOfBounds {
                    batch: k,
                    end: end.unwrap_or(usize::MAX),
                    len: total,
                })
            }
        };
        if let Some(prev) = previous.filter(|_| start < consumed) {
            return Err(DenseError::OverlappingBlocks {
                first: prev,
                second: k,
            });
        }

        let tail = std::mem::take(&mut rest);
        let (_, tail) = tail.split_at_mut(start - consumed);
        let (block, tail) = tail.split_at_mut(lens[k]);
        slots[k] = Some(block);
        rest = tail;
        consumed = end;
        previous = Some(k);
    }

    Ok(slots.into_iter().map(Option::unwrap_or_default).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_in_order() {
        let mut buf: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let blocks = split_blocks_mut(&mut buf, &[0, 4, 9], &[4, 5, 1]).unwrap();
        assert_eq!(blocks[0], &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(blocks[1], &[4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(blocks[2], &[9.0]);
    }

    #[test]
    fn test_split_with_gaps_and_unsorted_offsets() {
        let mut buf: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let blocks = split_blocks_mut(&mut buf, &[8, 1], &[2, 3]).unwrap();
        assert_eq!(blocks[0], &[8.0, 9.0]);
        assert_eq!(blocks[1], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_split_empty_blocks() {
        let mut buf = vec![0.0f32; 4];
        let blocks = split_blocks_mut(&mut buf, &[0, 0, 2], &[0, 2, 0]).unwrap();
        assert!(blocks[0].is_empty());
        assert_eq!(blocks[1].len(), 2);
        assert!(blocks[2].is_empty());
    }

    #[test]
    fn test_split_detects_overlap() {
        let mut buf = vec![0.0f32; 8];
        assert_eq!(
            split_blocks_mut(&mut buf, &[0, 3], &[4, 4]),
            Err(DenseError::OverlappingBlocks {
                first: 0,
                second: 1
            })
        );
    }

    #[test]
    fn test_split_detects_out_of_bounds() {
        let mut buf = vec![0.0f32; 8];
        assert_eq!(
            split_blocks_mut(&mut buf, &[0, 6], &[4, 4]),
            Err(DenseError::OutOfBounds {
                batch: 1,
                end: 10,
                len: 8
            })
        );
    }

    #[test]
    fn test_split_rejects_offset_overflow() {
        let mut buf = [0.0f32; 8];
        assert_eq!(
            split_blocks_mut(&mut buf, &[usize::MAX], &[2]),
            Err(DenseError::OutOfBounds {
                batch: 0,
                end: usize::MAX,
                len: 8
            })
        );
    }

    #[test]
    fn test_split_rejects_ragged_tables() {
        let mut buf = vec![0.0f32; 8];
        assert!(matches!(
            split_blocks_mut(&mut buf, &[0, 4], &[4]),
            Err(DenseError::InvalidInput(_))
        ));
    }
}
