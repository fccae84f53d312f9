use dspi_core::StreamId;

use crate::Error;

/// Stack of stream identifiers not currently in use.
///
/// The most recently released identifier is handed out first. A fresh pool
/// hands out `0, 1, 2, ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIdPool {
    available: Vec<StreamId>,
}

impl Default for StreamIdPool {
    fn default() -> Self {
        Self {
            available: StreamId::all().rev().collect(),
        }
    }
}

impl StreamIdPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> error_stack::Result<StreamId, Error> {
        self.available
            .pop()
            .ok_or_else(|| error_stack::report!(Error::StreamPoolExhausted))
    }

    pub fn release(&mut self, id: StreamId) {
        debug_assert!(
            !self.available.contains(&id),
            "stream id {id} released twice"
        );
        self.available.push(id);
    }

    pub fn available(&self) -> usize {
        self.available.len()
    }

    /// Return true if no identifier is in use.
    pub fn is_full(&self) -> bool {
        self.available.len() == StreamId::COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_pool_starts_at_zero() {
        let mut pool = StreamIdPool::new();
        assert_eq!(pool.allocate().unwrap().index(), 0);
        assert_eq!(pool.allocate().unwrap().index(), 1);
        assert_eq!(pool.available(), 14);
    }

    #[test]
    fn test_most_recently_released_first() {
        let mut pool = StreamIdPool::new();
        let first = pool.allocate().unwrap();
        let second = pool.allocate().unwrap();
        pool.release(first);
        pool.release(second);
        assert_eq!(pool.allocate().unwrap(), second);
        assert_eq!(pool.allocate().unwrap(), first);
    }

    #[test]
    fn test_exhausted() {
        let mut pool = StreamIdPool::new();
        for _ in 0..StreamId::COUNT {
            pool.allocate().unwrap();
        }
        let error = pool.allocate().unwrap_err();
        assert!(matches!(error.current_context(), Error::StreamPoolExhausted));
    }
}
