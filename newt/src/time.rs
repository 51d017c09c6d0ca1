use embedded_time::duration::Milliseconds;
use embedded_time::Instant;

/// A duration, in milliseconds
pub type Millis = Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the type of "ticks"
/// to u64.
///
/// The engine never reads a clock itself; callers hand it
/// [`Instant`]s from whatever single monotonic clock they drive it
/// with. Substituting a cell-backed mock makes every state transition
/// reproducible.
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Milliseconds between the clock's epoch and `instant`.
///
/// Assumes the clock's scaling factor is millisecond-precise or finer.
pub fn since_epoch<C: Clock>(instant: Instant<C>) -> Millis {
  Milliseconds::try_from(instant.duration_since_epoch()).unwrap()
}
