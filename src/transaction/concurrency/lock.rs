use parking_lot::Mutex;

#[derive(Debug, Default, Clone, Copy)]
struct LockCounts {
    shared: usize,
    exclusive: bool,
}

/// Per-page lock word: a shared-reader count and an exclusive flag.
///
/// None of the operations block. A failed acquire tells the caller to wait;
/// suspension and wake-up are driven by the `LockManager`.
#[derive(Debug, Default)]
pub struct Lock {
    counts: Mutex<LockCounts>,
}

impl Lock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reader unless a writer holds the lock
    pub fn acquire_shared(&self) -> bool {
        let mut counts = self.counts.lock();
        if counts.exclusive {
            return false;
        }
        counts.shared += 1;
        true
    }

    pub fn acquire_exclusive(&self) -> bool {
        let mut counts = self.counts.lock();
        if counts.exclusive || counts.shared > 0 {
            return false;
        }
        counts.exclusive = true;
        true
    }

    /// Turn the only outstanding share into exclusive ownership
    pub fn upgrade(&self) -> bool {
        let mut counts = self.counts.lock();
        if counts.exclusive || counts.shared != 1 {
            return false;
        }
        counts.shared = 0;
        counts.exclusive = true;
        true
    }

    pub fn release_shared(&self) -> bool {
        let mut counts = self.counts.lock();
        if counts.shared == 0 {
            return false;
        }
        counts.shared -= 1;
        true
    }

    pub fn release_exclusive(&self) -> bool {
        let mut counts = self.counts.lock();
        if !counts.exclusive {
            return false;
        }
        counts.exclusive = false;
        true
    }

    pub fn shared_count(&self) -> usize {
        self.counts.lock().shared
    }

    pub fn is_exclusive(&self) -> bool {
        self.counts.lock().exclusive
    }

    pub fn is_free(&self) -> bool {
        let counts = self.counts.lock();
        counts.shared == 0 && !counts.exclusive
    }
}
