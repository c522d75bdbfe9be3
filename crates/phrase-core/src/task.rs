//! Lookup tasks and the fixed-size query pool that runs them.
//!
//! A pool belongs to one dictionary. Each pool thread owns a private cache
//! for that dictionary, so tasks never contend on shared state: the only
//! things a task writes are its own cache and its reply slot.

use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam_channel as cb;
use tracing::{debug, warn};

use crate::cache::{CachedLookup, PhraseCache};
use crate::dict::resolver::Resolver;
use crate::dict::{LookupLimits, PhraseTable};
use crate::phrase::Phrase;

/// One phrase lookup, answered on `reply` tagged with its slot.
pub struct LookupTask {
    phrase: Phrase,
    slot: usize,
    reply: cb::Sender<(usize, CachedLookup)>,
}

impl LookupTask {
    pub fn new(phrase: Phrase, slot: usize, reply: cb::Sender<(usize, CachedLookup)>) -> Self {
        Self {
            phrase,
            slot,
            reply,
        }
    }

    /// Resolve against `cache`, then report. A dropped receiver means the
    /// batch was abandoned; the result is discarded.
    pub(crate) fn run(self, resolver: &Resolver<'_>, cache: &mut PhraseCache) {
        let result = resolver.lookup(cache, &self.phrase);
        let _ = self.reply.send((self.slot, result));
    }
}

pub(crate) struct QueryPool {
    sender: Option<cb::Sender<LookupTask>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl QueryPool {
    pub(crate) fn spawn(
        name: &str,
        threads: usize,
        engine: Arc<dyn PhraseTable>,
        limits: LookupLimits,
    ) -> io::Result<Self> {
        let (tx, rx) = cb::unbounded::<LookupTask>();
        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let rx = rx.clone();
            let engine = Arc::clone(&engine);
            let handle = thread::Builder::new()
                .name(format!("{name}-query-{i}"))
                .spawn(move || query_worker(rx, engine, limits))?;
            workers.push(handle);
        }
        debug!(pool = name, threads, "query pool started");
        Ok(Self {
            sender: Some(tx),
            workers,
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.workers.len()
    }

    /// Submit one task per phrase and block until every reply is in.
    ///
    /// Returns `None` if the pool could not answer every task (a worker died);
    /// the caller then resolves the batch itself.
    pub(crate) fn run(&self, phrases: Vec<Phrase>) -> Option<Vec<CachedLookup>> {
        let sender = self.sender.as_ref()?;
        let n = phrases.len();
        // Capacity n: workers never block on reply.
        let (reply_tx, reply_rx) = cb::bounded(n);
        for (slot, phrase) in phrases.into_iter().enumerate() {
            if sender
                .send(LookupTask::new(phrase, slot, reply_tx.clone()))
                .is_err()
            {
                warn!("query pool closed while submitting");
                return None;
            }
        }
        drop(reply_tx);

        let mut results: Vec<CachedLookup> = vec![None; n];
        let mut received = 0;
        for (slot, result) in reply_rx.iter() {
            results[slot] = result;
            received += 1;
        }
        if received != n {
            warn!(received, expected = n, "query pool lost tasks");
            return None;
        }
        Some(results)
    }
}

impl Drop for QueryPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn query_worker(rx: cb::Receiver<LookupTask>, engine: Arc<dyn PhraseTable>, limits: LookupLimits) {
    let resolver = Resolver::new(engine.as_ref(), limits);
    let mut cache = PhraseCache::new(limits.cache_size);
    while let Ok(task) = rx.recv() {
        task.run(&resolver, &mut cache);
    }
    debug!(stats = ?cache.stats(), entries = cache.len(), "query worker exiting");
}
