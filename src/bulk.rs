//! Scoped worker pool for converting many independent inputs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::thread;

/// Run `convert` over every input on up to `workers` threads.
///
/// Results come back in input order. A worker count of zero is treated as
/// one, and no more threads are started than there are inputs.
pub fn convert_all<I, O, F>(inputs: Vec<I>, workers: usize, convert: F) -> Vec<O>
where
    I: Send,
    O: Send,
    F: Fn(I) -> O + Sync,
{
    let total = inputs.len();
    let workers = workers.max(1).min(total);
    if workers <= 1 {
        return inputs.into_iter().map(convert).collect();
    }

    let queue: Mutex<VecDeque<(usize, I)>> = Mutex::new(inputs.into_iter().enumerate().collect());
    let results: Mutex<Vec<Option<O>>> = Mutex::new((0..total).map(|_| None).collect());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let job = queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some((index, input)) = job else {
                        break;
                    };
                    let output = convert(input);
                    results.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(output);
                }
            });
        }
    });

    results
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn preserves_input_order() {
        let inputs: Vec<u64> = (0..64).collect();
        let outputs = convert_all(inputs, 4, |value| {
            if value % 3 == 0 {
                thread::sleep(std::time::Duration::from_millis(1));
            }
            value * 2
        });
        assert_eq!(outputs, (0..64).map(|value| value * 2).collect::<Vec<_>>());
    }

    #[test]
    fn runs_every_input_exactly_once() {
        let calls = AtomicUsize::new(0);
        let outputs = convert_all(vec!["a", "b", "c"], 8, |input| {
            calls.fetch_add(1, Ordering::SeqCst);
            input.to_uppercase()
        });
        assert_eq!(outputs, vec!["A", "B", "C"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn handles_empty_input_and_zero_workers() {
        let empty: Vec<u8> = convert_all(Vec::new(), 0, |value: u8| value);
        assert!(empty.is_empty());
        assert_eq!(convert_all(vec![1, 2], 0, |value: i32| -value), vec![-1, -2]);
    }
}
