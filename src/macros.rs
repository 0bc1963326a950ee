/// Helper macro for locking items
///
/// ```rust, ignore
///  let mut touch = lock!(self.touch);
///  touch.down = true;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().expect("Failed to acquire lock")
    };
}

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let table = read_lock!(header.vptr).clone();
///  let entry = table.entry(slot)?;
/// ```
macro_rules! read_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.read().expect("Failed to acquire read lock")
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let previous = std::mem::replace(&mut *write_lock!(cell), ghost);
/// ```
macro_rules! write_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.write().expect("Failed to acquire write lock")
    };
}

/// Helper macro for reading locked items through a closure
///
/// ```rust, ignore
///  let radius = with_read!(window.decoration, |d| d.radius);
/// ```
macro_rules! with_read {
    ($arc_rwlock:expr, $closure:expr) => {{
        let guard = $arc_rwlock.read().expect("Failed to acquire read lock");
        $closure(&*guard)
    }};
}

/// Helper macro for writing to locked items through a closure
///
/// ```rust, ignore
///  with_write!(window.geometry, |g| g.size = size);
/// ```
macro_rules! with_write {
    ($arc_rwlock:expr, $closure:expr) => {{
        let mut guard = $arc_rwlock.write().expect("Failed to acquire write lock");
        $closure(&mut *guard)
    }};
}
