//! Connection pool.
//!
//! Idle connections wait in a bounded crossbeam channel (`max_idle`); the
//! open-connection cap is a second channel pre-filled with one permit per
//! allowed connection. A checked-out connection is returned on drop unless it
//! outlived `max_lifetime`, the idle queue is full, or the pool was closed.

use crate::error::XplusError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Opens new physical connections for a [`Pool`].
pub trait ConnectionFactory: Send + Sync {
    type Connection: Send;

    fn connect(&self) -> Result<Self::Connection, XplusError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    pub max_idle: usize,
    /// 0 means unlimited
    pub max_open: usize,
    pub max_lifetime: Option<Duration>,
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_idle: 2,
            max_open: 0,
            max_lifetime: None,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub open: usize,
    pub idle: usize,
}

struct IdleConnection<C> {
    conn: C,
    created_at: Instant,
}

pub struct Pool<F: ConnectionFactory> {
    factory: F,
    options: PoolOptions,
    idle_tx: Sender<IdleConnection<F::Connection>>,
    idle_rx: Receiver<IdleConnection<F::Connection>>,
    permits: Option<(Sender<()>, Receiver<()>)>,
    open: AtomicUsize,
    closed: AtomicBool,
}

impl<F: ConnectionFactory> Pool<F> {
    pub fn new(factory: F, options: PoolOptions) -> Self {
        let (idle_tx, idle_rx) = bounded(options.max_idle);
        let permits = (options.max_open > 0).then(|| {
            let (tx, rx) = bounded(options.max_open);
            for _ in 0..options.max_open {
                // capacity == max_open, cannot fail
                let _ = tx.try_send(());
            }
            (tx, rx)
        });

        Self {
            factory,
            options,
            idle_tx,
            idle_rx,
            permits,
            open: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            open: self.open.load(Ordering::Acquire),
            idle: self.idle_rx.len(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Check out a connection, reusing an idle one when possible.
    ///
    /// Blocks for at most `acquire_timeout` when `max_open` connections are
    /// already checked out.
    pub fn acquire(&self) -> Result<Pooled<'_, F>, XplusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::acquire_connection_span().entered();

        if self.is_closed() {
            return Err(XplusError::PoolClosed);
        }

        let start = Instant::now();
        let has_permit = self.take_permit()?;

        // From here on the guard owns the permit; dropping it on an error path gives it back.
        let mut pooled = Pooled {
            pool: self,
            conn: None,
            has_permit,
        };

        if self.is_closed() {
            return Err(XplusError::PoolClosed);
        }

        while let Ok(idle) = self.idle_rx.try_recv() {
            if self.is_expired(&idle) {
                log::debug!("discarding expired idle connection");
                self.open.fetch_sub(1, Ordering::AcqRel);
                continue;
            }
            pooled.conn = Some(idle);
            self.observe_wait(start);
            return Ok(pooled);
        }

        let conn = self.factory.connect()?;
        self.open.fetch_add(1, Ordering::AcqRel);
        log::debug!("opened new connection ({} open)", self.open.load(Ordering::Acquire));
        pooled.conn = Some(IdleConnection {
            conn,
            created_at: Instant::now(),
        });
        self.observe_wait(start);
        Ok(pooled)
    }

    /// Close the pool: drop idle connections and refuse new checkouts.
    ///
    /// Connections still checked out are dropped when they are returned.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut dropped = 0usize;
        while let Ok(idle) = self.idle_rx.try_recv() {
            drop(idle);
            self.open.fetch_sub(1, Ordering::AcqRel);
            dropped += 1;
        }
        log::debug!("connection pool closed, {dropped} idle connection(s) released");
    }

    fn take_permit(&self) -> Result<bool, XplusError> {
        let Some((_, rx)) = &self.permits else {
            return Ok(false);
        };
        match rx.recv_timeout(self.options.acquire_timeout) {
            Ok(()) => Ok(true),
            Err(RecvTimeoutError::Timeout) => Err(XplusError::PoolTimeout),
            Err(RecvTimeoutError::Disconnected) => Err(XplusError::PoolClosed),
        }
    }

    fn release_permit(&self) {
        if let Some((tx, _)) = &self.permits {
            let _ = tx.try_send(());
        }
    }

    fn is_expired(&self, idle: &IdleConnection<F::Connection>) -> bool {
        self.options
            .max_lifetime
            .is_some_and(|lifetime| idle.created_at.elapsed() >= lifetime)
    }

    fn give_back(&self, idle: IdleConnection<F::Connection>) {
        if self.is_closed() || self.is_expired(&idle) {
            self.open.fetch_sub(1, Ordering::AcqRel);
            return;
        }
        match self.idle_tx.try_send(idle) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.open.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    #[allow(unused_variables)]
    fn observe_wait(&self, start: Instant) {
        #[cfg(feature = "metrics")]
        crate::metrics::METRICS.record_connection_wait(start.elapsed());
    }
}

/// A connection checked out of a [`Pool`]; returns itself on drop.
pub struct Pooled<'p, F: ConnectionFactory> {
    pool: &'p Pool<F>,
    conn: Option<IdleConnection<F::Connection>>,
    has_permit: bool,
}

impl<'p, F: ConnectionFactory> Pooled<'p, F> {
    pub fn pool(&self) -> &'p Pool<F> {
        self.pool
    }
}

impl<F: ConnectionFactory> Deref for Pooled<'_, F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.conn {
            Some(idle) => &idle.conn,
            // only `acquire` builds a Pooled without a connection, and it never hands that one out
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<F: ConnectionFactory> Drop for Pooled<'_, F> {
    fn drop(&mut self) {
        if let Some(idle) = self.conn.take() {
            self.pool.give_back(idle);
        }
        if self.has_permit {
            self.pool.release_permit();
        }
    }
}
