//! Task-backed streams.
//!
//! A [`TaskStream`] is lazy: nothing runs until the first poll. On the
//! first poll the producer is moved onto a tokio task that forwards items
//! through a bounded channel, so a slow consumer applies backpressure to
//! the producer. Dropping the stream aborts the task.

use acore::Response;
use anyhow::Result;
use futures_core::Stream;
use futures_util::StreamExt;
use std::{
    fmt, mem,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{sync::mpsc, task::JoinHandle};

/// Channel capacity used when none is configured.
pub const DEFAULT_BUFFER: usize = 32;

type Producer<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

enum State<T> {
    Idle(Producer<T>),
    Running {
        rx: mpsc::Receiver<Result<T>>,
        task: JoinHandle<()>,
    },
    Done,
}

/// A finite, non-restartable sequence produced on its own task.
///
/// An error item ends the sequence.
pub struct TaskStream<T> {
    state: State<T>,
    buffer: usize,
}

/// The responses of one generation.
pub type ResponseStream = TaskStream<Response>;

impl<T: Send + 'static> TaskStream<T> {
    /// Wrap a producer. It starts on the first poll.
    pub fn new<S>(producer: S) -> Self
    where
        S: Stream<Item = Result<T>> + Send + 'static,
    {
        Self {
            state: State::Idle(Box::pin(producer)),
            buffer: DEFAULT_BUFFER,
        }
    }

    /// A stream of exactly one item.
    pub fn once(item: Result<T>) -> Self {
        Self::new(futures_util::stream::once(async move { item }))
    }

    /// A stream that fails immediately.
    pub fn fail(err: impl Into<anyhow::Error>) -> Self {
        Self::once(Err(err.into()))
    }

    /// Set the channel capacity. Zero is treated as one.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// The channel capacity.
    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// Whether the producer task has been spawned.
    pub fn is_started(&self) -> bool {
        !matches!(self.state, State::Idle(_))
    }

    fn start(&mut self) {
        let State::Idle(mut producer) = mem::replace(&mut self.state, State::Done) else {
            return;
        };

        let (tx, rx) = mpsc::channel(self.buffer);
        let task = tokio::spawn(async move {
            while let Some(item) = producer.next().await {
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });
        self.state = State::Running { rx, task };
    }
}

impl ResponseStream {
    /// Drain the stream and return its terminal response.
    ///
    /// The terminal response is the first non-partial one; for adapters
    /// whose last partial is terminal, that partial is returned instead.
    pub async fn finish(mut self) -> Result<Response> {
        let mut last = None;
        while let Some(response) = self.next().await {
            let response = response?;
            if !response.partial {
                return Ok(response);
            }
            last = Some(response);
        }

        match last {
            Some(mut response) => {
                response.partial = false;
                Ok(response)
            }
            None => anyhow::bail!("response stream ended without a response"),
        }
    }
}

impl<T: Send + 'static> Stream for TaskStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if matches!(this.state, State::Idle(_)) {
            this.start();
        }

        match &mut this.state {
            State::Running { rx, .. } => match rx.poll_recv(cx) {
                Poll::Ready(None) => {
                    this.state = State::Done;
                    Poll::Ready(None)
                }
                other => other,
            },
            _ => Poll::Ready(None),
        }
    }
}

impl<T> Drop for TaskStream<T> {
    fn drop(&mut self) {
        if let State::Running { task, .. } = &self.state {
            task.abort();
        }
    }
}

impl<T> fmt::Debug for TaskStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Idle(_) => "idle",
            State::Running { .. } => "running",
            State::Done => "done",
        };
        f.debug_struct("TaskStream")
            .field("state", &state)
            .field("buffer", &self.buffer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        time::Duration,
    };

    #[tokio::test]
    async fn lazy_until_polled() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let mut stream = ResponseStream::new(async_stream::stream! {
            flag.store(true, Ordering::SeqCst);
            yield Ok(Response::text("hi"));
        });

        tokio::task::yield_now().await;
        assert!(!started.load(Ordering::SeqCst));
        assert!(!stream.is_started());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("hi"));
        assert!(started.load(Ordering::SeqCst));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn buffer_bounds_the_producer() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let mut stream = TaskStream::new(async_stream::stream! {
            for i in 0..10 {
                counter.fetch_add(1, Ordering::SeqCst);
                yield Ok(i);
            }
        })
        .with_buffer(0);
        assert_eq!(stream.buffer(), 1);

        assert_eq!(stream.next().await.unwrap().unwrap(), 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(produced.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn error_ends_the_stream() {
        let mut stream = ResponseStream::new(async_stream::stream! {
            yield Err(anyhow::anyhow!("boom"));
            yield Ok(Response::text("never"));
        });
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn finish_promotes_last_partial() {
        let stream = ResponseStream::new(futures_util::stream::iter(vec![
            Ok(Response::chunk("a")),
            Ok(Response::chunk("ab")),
        ]));
        let response = stream.finish().await.unwrap();
        assert_eq!(response.content.as_deref(), Some("ab"));
        assert!(!response.partial);
    }

    #[tokio::test]
    async fn finish_on_empty_stream_fails() {
        let stream = ResponseStream::new(futures_util::stream::empty());
        assert!(stream.finish().await.is_err());
    }
}
