//! One-record lookahead over forward-only record sources.
//!
//! Synchronous iterators and asynchronous streams are both adapted to the
//! [`RecordPull`] primitive, so one [`LookaheadCursor`] serves both the
//! worksheet writer and the split orchestrator.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::spec::CursorError;

/// Forward-only polling primitive: `None` once the source is exhausted.
pub trait RecordPull {
    /// Element type.
    type Item;

    /// Fetch the next element; an `Err` carries the source fault message.
    fn pull(&mut self) -> impl Future<Output = Option<Result<Self::Item, String>>>;
}

/// Pull adapter over a synchronous iterator; never suspends.
pub struct SyncPull<I> {
    iter: I,
}

impl<I> SyncPull<I> {
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<I, T, E> RecordPull for SyncPull<I>
where
    I: Iterator<Item = Result<T, E>>,
    E: Display,
{
    type Item = T;

    async fn pull(&mut self) -> Option<Result<T, String>> {
        self.iter.next().map(|res| res.map_err(|err| err.to_string()))
    }
}

/// Pull adapter over an asynchronous stream; suspends only while awaiting the next item.
pub struct StreamPull<S> {
    stream: Pin<Box<S>>,
}

impl<S> StreamPull<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Box::pin(stream),
        }
    }
}

impl<S, T, E> RecordPull for StreamPull<S>
where
    S: Stream<Item = Result<T, E>>,
    E: Display,
{
    type Item = T;

    async fn pull(&mut self) -> Option<Result<T, String>> {
        self.stream
            .next()
            .await
            .map(|res| res.map_err(|err| err.to_string()))
    }
}

/// Single-use cursor buffering at most one element.
///
/// Once the source reports exhaustion or a fault it is never polled again.
pub struct LookaheadCursor<P: RecordPull> {
    source: P,
    buffered: Option<P::Item>,
    if_exhausted: bool,
    n_taken: usize,
}

impl<P: RecordPull> LookaheadCursor<P> {
    pub fn new(source: P) -> Self {
        Self {
            source,
            buffered: None,
            if_exhausted: false,
            n_taken: 0,
        }
    }

    /// Whether another element exists; fetches and caches it if needed.
    pub async fn peek_has_next(&mut self) -> Result<bool, CursorError> {
        if self.buffered.is_some() {
            return Ok(true);
        }
        if self.if_exhausted {
            return Ok(false);
        }

        match self.source.pull().await {
            Some(Ok(item)) => {
                self.buffered = Some(item);
                Ok(true)
            }
            Some(Err(msg)) => {
                self.if_exhausted = true;
                Err(CursorError::Source(msg))
            }
            None => {
                self.if_exhausted = true;
                Ok(false)
            }
        }
    }

    /// Return the next element, preferring the cached one.
    pub async fn take_next(&mut self) -> Result<P::Item, CursorError> {
        if !self.peek_has_next().await? {
            return Err(CursorError::EndOfSequence);
        }
        let item = self.buffered.take().ok_or(CursorError::EndOfSequence)?;
        self.n_taken += 1;
        Ok(item)
    }

    /// Elements handed out so far.
    pub fn n_taken(&self) -> usize {
        self.n_taken
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use futures::executor::block_on;
    use futures::stream;

    use super::*;

    fn derive_sync_cursor(
        l_values: Vec<Result<i32, String>>,
    ) -> LookaheadCursor<SyncPull<std::vec::IntoIter<Result<i32, String>>>> {
        LookaheadCursor::new(SyncPull::new(l_values.into_iter()))
    }

    #[test]
    fn test_peek_does_not_consume() {
        block_on(async {
            let mut cursor = derive_sync_cursor(vec![Ok(1), Ok(2)]);
            assert!(cursor.peek_has_next().await.unwrap());
            assert!(cursor.peek_has_next().await.unwrap());
            assert_eq!(cursor.take_next().await.unwrap(), 1);
            assert_eq!(cursor.take_next().await.unwrap(), 2);
            assert!(!cursor.peek_has_next().await.unwrap());
            assert_eq!(cursor.n_taken(), 2);
        });
    }

    #[test]
    fn test_take_past_end_is_end_of_sequence() {
        block_on(async {
            let mut cursor = derive_sync_cursor(vec![]);
            assert_eq!(cursor.take_next().await, Err(CursorError::EndOfSequence));
            assert_eq!(cursor.take_next().await, Err(CursorError::EndOfSequence));
        });
    }

    #[test]
    fn test_source_fault_is_reported_once_then_fused() {
        block_on(async {
            let mut cursor = derive_sync_cursor(vec![Ok(1), Err("boom".to_string()), Ok(3)]);
            assert_eq!(cursor.take_next().await.unwrap(), 1);
            assert_eq!(
                cursor.peek_has_next().await,
                Err(CursorError::Source("boom".to_string()))
            );
            assert!(!cursor.peek_has_next().await.unwrap());
        });
    }

    #[test]
    fn test_exhausted_source_is_never_polled_again() {
        let n_polls = Rc::new(Cell::new(0usize));
        let n_polls_inner = Rc::clone(&n_polls);
        let iter = std::iter::from_fn(move || {
            n_polls_inner.set(n_polls_inner.get() + 1);
            None::<Result<i32, String>>
        });

        block_on(async {
            let mut cursor = LookaheadCursor::new(SyncPull::new(iter));
            assert!(!cursor.peek_has_next().await.unwrap());
            assert!(!cursor.peek_has_next().await.unwrap());
            assert!(cursor.take_next().await.is_err());
        });
        assert_eq!(n_polls.get(), 1);
    }

    #[test]
    fn test_stream_source_preserves_order() {
        block_on(async {
            let source = stream::iter(vec![Ok::<_, String>("a"), Ok("b"), Ok("c")]);
            let mut cursor = LookaheadCursor::new(StreamPull::new(source));
            let mut l_seen = Vec::new();
            while cursor.peek_has_next().await.unwrap() {
                l_seen.push(cursor.take_next().await.unwrap());
            }
            assert_eq!(l_seen, vec!["a", "b", "c"]);
        });
    }
}
