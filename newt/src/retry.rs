use embedded_time::duration::Milliseconds;
use rand::{Rng, SeedableRng};

use crate::config::TransmissionParameters;
use crate::time::Millis;

/// A lazy, finite schedule of retransmission delays: an initial
/// timeout that doubles after every yield, exhausted after
/// `max_retries + 1` values.
///
/// This drives the binary exponential backoff of a Confirmable
/// exchange: each yielded delay is how long to wait after a
/// transmission, and the last yielded delay (double the one before
/// it) is the final-ACK wait. Exhaustion means "no more scheduled
/// retransmissions".
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use newt::retry::RetryTimeout;
///
/// let delays: Vec<u64> = RetryTimeout::fixed(Milliseconds(3_000), 4).map(|d| d.0).collect();
/// assert_eq!(delays, vec![3_000, 6_000, 12_000, 24_000, 48_000]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimeout {
  timeout: Millis,
  remaining: u16,
}

impl RetryTimeout {
  /// A schedule starting at exactly `initial`
  pub fn fixed(initial: Millis, max_retries: u16) -> Self {
    RetryTimeout { timeout: initial,
                   remaining: max_retries + 1 }
  }

  /// The RFC 7252 §4.2 schedule: initial timeout drawn from
  /// `ACK_TIMEOUT + uniform(0,1) * ACK_RANDOM_FACTOR` seconds,
  /// `MAX_RETRANSMIT` retries. Seeding the generator (usually with
  /// the creation timestamp) keeps the draw reproducible.
  pub fn jittered(params: &TransmissionParameters, seed: u64) -> Self {
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    let jitter_ms = rng.gen_range(0.0..1.0) * params.ack_random_factor * 1_000.0;

    RetryTimeout { timeout: Milliseconds(params.ack_timeout.0 + jitter_ms as u64),
                   remaining: params.max_retransmit + 1 }
  }

  /// Whether another delay remains to be yielded
  pub fn have_next(&self) -> bool {
    self.remaining > 0
  }

  /// The delay the next yield would return; after exhaustion, double
  /// the last yielded delay (the final-ACK wait)
  pub fn current(&self) -> Millis {
    self.timeout
  }
}

impl Iterator for RetryTimeout {
  type Item = Millis;

  fn next(&mut self) -> Option<Millis> {
    if self.remaining == 0 {
      return None;
    }

    let delay = self.timeout;
    self.remaining -= 1;
    self.timeout = Milliseconds(self.timeout.0 * 2);
    Some(delay)
  }
}
