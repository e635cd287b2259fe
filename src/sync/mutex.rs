//! Mutex selection for the diagnostics registry.
//!
//! With the `parking_lot` feature enabled its mutex is used directly.
//! Otherwise a thin wrapper gives `std::sync::Mutex` the same surface:
//! const construction for statics, `Default` for derive use, and a `lock`
//! that recovers from poisoning instead of panicking (a sink registry
//! poisoned by one panicking emitter should not cascade).

#[cfg(feature = "parking_lot")]
pub(crate) use parking_lot::Mutex;

#[cfg(not(feature = "parking_lot"))]
pub(crate) use fallback::Mutex;

#[cfg(not(feature = "parking_lot"))]
mod fallback {
    use std::ops::{Deref, DerefMut};
    use std::sync::{self, PoisonError};

    /// `std::sync::Mutex` without poison bookkeeping at the call sites.
    pub struct Mutex<T>(sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub const fn new(value: T) -> Self {
            Self(sync::Mutex::new(value))
        }

        /// Lock the mutex, taking the data back from a poisoned lock.
        pub fn lock(&self) -> Guard<'_, T> {
            Guard(self.0.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }

    impl<T: Default> Default for Mutex<T> {
        fn default() -> Self {
            Self::new(T::default())
        }
    }

    pub struct Guard<'a, T>(sync::MutexGuard<'a, T>);

    impl<T> Deref for Guard<'_, T> {
        type Target = T;

        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }

    impl<T> DerefMut for Guard<'_, T> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.0
        }
    }
}
