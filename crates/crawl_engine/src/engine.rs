use std::sync::{mpsc, Arc};
use std::thread;

use tokio_util::sync::CancellationToken;

use crate::aggregate::CrawlSnapshot;
use crate::crawler::CrawlerBuilder;
use crate::progress::ChannelProgressSink;
use crate::{CrawlError, CrawlEvent};

/// A crawl running on its own thread and runtime. Progress arrives as
/// [`CrawlEvent`]s; the final snapshot comes from [`CrawlHandle::join`].
pub struct CrawlHandle {
    event_rx: mpsc::Receiver<CrawlEvent>,
    cancel: CancellationToken,
    thread: thread::JoinHandle<Result<CrawlSnapshot, CrawlError>>,
}

impl CrawlHandle {
    /// Any progress sink already set on `builder` is replaced by the
    /// handle's channel.
    pub fn spawn(builder: CrawlerBuilder, seed: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let seed = seed.into();

        let thread = thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new()
                .map_err(|err| CrawlError::Runtime(format!("tokio runtime: {err}")))?;
            let crawler = builder
                .progress_sink(Arc::new(ChannelProgressSink::new(event_tx)))
                .build()?;
            runtime.block_on(crawler.run(&seed, token))
        });

        Self {
            event_rx,
            cancel,
            thread,
        }
    }

    pub fn try_recv(&self) -> Option<CrawlEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Ask the crawl to stop. In-flight pages finish; queued ones are dropped.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the crawl to end and return its snapshot.
    pub fn join(self) -> Result<CrawlSnapshot, CrawlError> {
        self.thread
            .join()
            .map_err(|_| CrawlError::Runtime("crawl thread panicked".to_string()))?
    }
}
