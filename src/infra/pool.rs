//! # Session Pool / 会话池
//!
//! A per-node pool of connections. A command checks out its own connection for
//! as long as it runs, so a slow command on a node never holds up another one.
//! Connections are opened lazily up to the capacity and returned on drop.
//!
//! 每个节点的连接池。命令在运行期间独占一个连接，因此节点上的慢命令不会阻塞其他命令。
//! 连接按需打开，直到达到容量上限，并在释放时归还。

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity)
            .field("idle", &self.idle_count())
            .finish()
    }
}

impl<T> Pool<T> {
    /// A pool allowing at most `capacity` checked-out items at once.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            idle: Mutex::new(Vec::new()),
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// A pool seeded with an already-open item.
    pub fn with_item(capacity: usize, item: T) -> Self {
        let pool = Self::new(capacity);
        pool.lock().push(item);
        pool
    }

    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    /// Takes an idle item, or opens a new one with `open` when none is idle.
    /// Waits only when `capacity` items are already checked out.
    ///
    /// # Arguments / 参数
    /// * `open` - Opens a fresh item; only called when no idle item exists
    ///            打开新项；仅在没有空闲项时调用
    pub async fn checkout<F, Fut, E>(self: &Arc<Self>, open: F) -> Result<Lease<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<PoolClosed>,
    {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| PoolClosed)?;

        let idle = self.lock().pop();
        let item = match idle {
            Some(item) => item,
            None => open().await?,
        };

        Ok(Lease {
            item: Some(item),
            pool: Arc::clone(self),
            discard: false,
            _permit: permit,
        })
    }

    // Pushing and popping never panic midway, so a poisoned lock still holds
    // a consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The pool's semaphore was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolClosed;

impl fmt::Display for PoolClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection pool closed")
    }
}

impl std::error::Error for PoolClosed {}

/// A checked-out item. Goes back to the pool on drop unless discarded.
pub struct Lease<T> {
    item: Option<T>,
    pool: Arc<Pool<T>>,
    discard: bool,
    // Released after `item` is back in the idle list.
    _permit: OwnedSemaphorePermit,
}

impl<T> Lease<T> {
    /// Drops the item instead of returning it, e.g. after a transport error.
    pub fn discard(&mut self) {
        self.discard = true;
    }
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // `item` is only taken in `drop`.
        self.item.as_ref().unwrap_or_else(|| unreachable!("lease used after drop"))
    }
}

impl<T> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!("lease used after drop"))
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            if !self.discard {
                self.pool.lock().push(item);
            }
        }
    }
}
