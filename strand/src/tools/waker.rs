use super::future::FutureDriver;
use crate::promise::Value;

use std::mem;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Returns the vtable for wakers backed by an `Arc<FutureDriver<T>>`.
///
/// # Safety
///
/// Every function in the vtable expects a pointer obtained from
/// `Arc::into_raw` on a `FutureDriver<T>` and keeps the reference count
/// balanced.
fn vtable<T: Value>() -> &'static RawWakerVTable {
    &RawWakerVTable::new(
        clone_raw::<T>,
        wake_raw::<T>,
        wake_by_ref_raw::<T>,
        drop_raw::<T>,
    )
}

/// Creates a [`Waker`] that schedules another poll of `driver` when woken.
pub(crate) fn make_waker<T: Value>(driver: Arc<FutureDriver<T>>) -> Waker {
    // SAFETY: the pointer comes from `Arc::into_raw` and the vtable keeps the
    // reference count balanced.
    unsafe {
        Waker::from_raw(RawWaker::new(
            Arc::into_raw(driver) as *const (),
            vtable::<T>(),
        ))
    }
}

fn clone_raw<T: Value>(ptr: *const ()) -> RawWaker {
    let arc = unsafe { Arc::<FutureDriver<T>>::from_raw(ptr as *const FutureDriver<T>) };
    let cloned = arc.clone();
    mem::forget(arc);

    RawWaker::new(Arc::into_raw(cloned) as *const (), vtable::<T>())
}

/// Consumes the waker's reference.
fn wake_raw<T: Value>(ptr: *const ()) {
    let arc = unsafe { Arc::<FutureDriver<T>>::from_raw(ptr as *const FutureDriver<T>) };
    arc.wake();
}

fn wake_by_ref_raw<T: Value>(ptr: *const ()) {
    let arc = unsafe { Arc::<FutureDriver<T>>::from_raw(ptr as *const FutureDriver<T>) };
    arc.clone().wake();
    mem::forget(arc);
}

fn drop_raw<T: Value>(ptr: *const ()) {
    unsafe { drop(Arc::<FutureDriver<T>>::from_raw(ptr as *const FutureDriver<T>)) };
}
