//! Most-frequent filter over ascending integer lists.
//!
//! Each matched node carries the ascending ranks of the signatures it belongs to.
//! The candidates worth scoring are the ranks shared by the largest number of
//! matched nodes.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Values that occur in the largest number of `lists`, ascending.
///
/// Every list must be sorted ascending; repeated values within one list count
/// once. A single list is returned as is (deduplicated) and no lists yield an
/// empty result.
///
/// The lists are merged through a min-heap of cursors. Merging stops as soon as
/// fewer lists remain unexhausted than the current maximum frequency, because no
/// later value can then reach it.
#[must_use]
pub fn most_frequent(lists: &[&[i32]]) -> Vec<i32> {
    match lists {
        [] => return Vec::new(),
        [single] => {
            let mut values = single.to_vec();
            values.dedup();
            return values;
        }
        _ => {}
    }

    let mut cursors = vec![0usize; lists.len()];
    let mut heap: BinaryHeap<Reverse<(i32, usize)>> = lists
        .iter()
        .enumerate()
        .filter_map(|(list, values)| values.first().map(|&value| Reverse((value, list))))
        .collect();

    let mut max_frequency = 0usize;
    let mut result = Vec::new();

    while let Some(&Reverse((value, _))) = heap.peek() {
        if heap.len() < max_frequency {
            break;
        }

        let mut frequency = 0;
        while let Some(&Reverse((current, list))) = heap.peek() {
            if current != value {
                break;
            }
            heap.pop();
            frequency += 1;

            let values = lists[list];
            let mut cursor = cursors[list] + 1;
            while values.get(cursor) == Some(&value) {
                cursor += 1;
            }
            cursors[list] = cursor;
            if let Some(&next) = values.get(cursor) {
                heap.push(Reverse((next, list)));
            }
        }

        match frequency.cmp(&max_frequency) {
            Ordering::Greater => {
                max_frequency = frequency;
                result.clear();
                result.push(value);
            }
            Ordering::Equal => result.push(value),
            Ordering::Less => {}
        }
    }

    result
}
