//! A cloneable handle to a currently-active target.

use std::sync::{Arc, Mutex};

/// An indirection over a currently-active target supporting atomic
/// retargeting.
///
/// Consumers capture a clone once and observe every subsequent retarget made
/// through any other clone; retargeting never invalidates captured handles.
pub struct Swap<T> {
    target: Arc<Mutex<T>>,
}

impl<T> Swap<T> {
    /// Create a new handle pointing at `target`.
    pub fn new(target: T) -> Self {
        Self {
            target: Arc::new(Mutex::new(target)),
        }
    }

    /// Replace the active target, returning the previous one.
    pub fn retarget(&self, target: T) -> T {
        let mut guard = self.target.lock().unwrap();
        std::mem::replace(&mut *guard, target)
    }
}

impl<T: Clone> Swap<T> {
    /// The currently-active target.
    pub fn current(&self) -> T {
        self.target.lock().unwrap().clone()
    }
}

impl<T> Clone for Swap<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Swap<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Swap").field(&*self.target.lock().unwrap()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_observe_retarget() {
        let swap = Swap::new(1u64);
        let captured = swap.clone();
        assert_eq!(captured.current(), 1);

        let previous = swap.retarget(2);
        assert_eq!(previous, 1);
        assert_eq!(captured.current(), 2);

        // Retargeting through a clone is visible everywhere.
        captured.retarget(3);
        assert_eq!(swap.current(), 3);
    }
}
