//! Ordered application of payload updates.
//!
//! Updates collected from a group are applied one after another in the
//! group's static order, each one seeing the output of the previous. Arrival
//! order of the hook results plays no part.

use crate::invoker::panic_message;
use stagehook_core::{BoxError, Payload, PayloadUpdate};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// The result of applying a batch of updates.
#[derive(Debug)]
pub struct Applied<P, K> {
    /// The payload after every successful update.
    pub payload: Arc<P>,
    /// Keys of the updates that failed, with their errors, in order.
    pub failed: Vec<(K, BoxError)>,
}

/// Folds `updates` over `payload` in iteration order.
///
/// An update that fails or panics is skipped and the payload it was given is
/// passed on unchanged. Each update is tagged with a key so failures can be
/// attributed to the hook that produced them.
pub fn apply_updates<P, K, I>(payload: Arc<P>, updates: I) -> Applied<P, K>
where
    P: Payload,
    I: IntoIterator<Item = (K, PayloadUpdate<P>)>,
{
    updates.into_iter().fold(
        Applied {
            payload,
            failed: Vec::new(),
        },
        |mut applied, (key, update)| {
            let current = applied.payload.as_ref();
            match catch_unwind(AssertUnwindSafe(|| update.apply(current))) {
                Ok(Ok(next)) => applied.payload = Arc::new(next),
                Ok(Err(err)) => applied.failed.push((key, err)),
                Err(panic) => applied
                    .failed
                    .push((key, panic_message(panic).into())),
            }
            applied
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append(suffix: &'static str) -> PayloadUpdate<String> {
        PayloadUpdate::map(move |s: &String| format!("{s}{suffix}"))
    }

    #[test]
    fn applies_in_given_order() {
        let applied = apply_updates(
            Arc::new(String::from("p")),
            vec![(0, append("-a")), (1, append("-b")), (2, append("-c"))],
        );

        assert_eq!(applied.payload.as_str(), "p-a-b-c");
        assert!(applied.failed.is_empty());
    }

    #[test]
    fn failing_update_is_skipped() {
        let applied = apply_updates(
            Arc::new(String::from("p")),
            vec![
                (0, append("-a")),
                (1, PayloadUpdate::new(|_: &String| Err("bad update".into()))),
                (2, append("-c")),
            ],
        );

        assert_eq!(applied.payload.as_str(), "p-a-c");
        assert_eq!(applied.failed.len(), 1);
        assert_eq!(applied.failed[0].0, 1);
        assert_eq!(applied.failed[0].1.to_string(), "bad update");
    }

    #[test]
    fn panicking_update_is_skipped() {
        let applied = apply_updates(
            Arc::new(String::from("p")),
            vec![
                ("boom", PayloadUpdate::<String>::map(|_| panic!("no"))),
                ("ok", append("-a")),
            ],
        );

        assert_eq!(applied.payload.as_str(), "p-a");
        assert_eq!(applied.failed[0].0, "boom");
    }

    #[test]
    fn no_updates_keeps_payload() {
        let payload = Arc::new(String::from("p"));
        let applied = apply_updates::<_, usize, _>(Arc::clone(&payload), Vec::new());
        assert!(Arc::ptr_eq(&payload, &applied.payload));
    }
}
