/// No outcome has been written yet.
///
/// Listeners registered in this state are queued.
pub(crate) const PENDING: u8 = 0;

/// One writer won the race and is storing the outcome.
///
/// Every other writer observing this state gives up.
pub(crate) const COMPLETING: u8 = 1;

/// The outcome is stored and the listener queue has been (or is being)
/// drained.
pub(crate) const RESOLVED: u8 = 2;
