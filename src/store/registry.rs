use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use crossbeam_skiplist::SkipMap;

/// Opaque reference to an open row reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CursorHandle(u64);

impl CursorHandle {
    /// Raw handle number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CursorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Liveness flag shared between a registered reader and the registry.
#[derive(Debug, Clone)]
pub(crate) struct ReaderFlag(Arc<AtomicBool>);

impl ReaderFlag {
    pub(crate) fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Open readers by handle. Safe to touch from several threads; each handle
/// can be closed exactly once.
#[derive(Debug, Default)]
pub(crate) struct ReaderRegistry {
    readers: SkipMap<u64, ReaderFlag>,
    next: AtomicU64,
}

impl ReaderRegistry {
    pub(crate) fn register(&self) -> (CursorHandle, ReaderFlag) {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let flag = ReaderFlag(Arc::new(AtomicBool::new(true)));
        self.readers.insert(id, flag.clone());
        (CursorHandle(id), flag)
    }

    /// Closes `handle`; false when it is unknown or already closed.
    pub(crate) fn close(&self, handle: CursorHandle) -> bool {
        match self.readers.remove(&handle.0) {
            Some(entry) => {
                entry.value().close();
                true
            }
            None => false,
        }
    }

    /// Closes every open reader, returning how many there were.
    pub(crate) fn close_all(&self) -> usize {
        let mut closed = 0;
        while let Some(entry) = self.readers.pop_front() {
            entry.value().close();
            closed += 1;
        }
        closed
    }

    pub(crate) fn open_count(&self) -> usize {
        self.readers.len()
    }
}
