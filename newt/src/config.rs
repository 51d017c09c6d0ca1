use embedded_time::duration::Milliseconds;

use crate::retry::RetryTimeout;
use crate::time::Millis;

/// RFC 7252 §4.8 transmission parameters, plus the timing bounds
/// derived from them.
///
/// There is no process-wide mutable default: construct one (or take
/// [`Default::default`], which carries the RFC values) and thread it
/// through explicitly. After mutating any primitive field, call
/// [`TransmissionParameters::recalculate_derived`] — the derived
/// values are stored, not computed on read, and are otherwise stale.
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use newt::config::TransmissionParameters;
///
/// let mut params = TransmissionParameters::default();
/// assert_eq!(params.exchange_lifetime(), Milliseconds(247_000u64));
///
/// params.max_retransmit = 2;
/// params.recalculate_derived();
/// assert_eq!(params.max_transmit_span(), Milliseconds(9_000u64));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionParameters {
  /// Initial ACK wait before the first retransmission; RFC value 2 s
  pub ack_timeout: Millis,
  /// Random spread applied to the initial timeout; RFC value 1.5
  pub ack_random_factor: f64,
  /// Maximum number of retransmissions of a Con; RFC value 4
  pub max_retransmit: u16,
  /// Maximum outstanding interactions per endpoint; RFC value 1
  pub nstart: u8,
  /// Maximum response delay for multicast requests; RFC value 5 s
  pub default_leisure: Millis,
  /// Data rate to not exceed toward an unresponsive peer, bytes/s;
  /// RFC value 1
  pub probing_rate: u16,
  /// Assumed maximum one-way network latency; RFC value 100 s
  pub max_latency: Millis,
  /// Assumed peer processing time before it acknowledges; RFC sets
  /// this to ACK_TIMEOUT
  pub processing_delay: Millis,

  max_transmit_span: Millis,
  max_transmit_wait: Millis,
  max_rtt: Millis,
  exchange_lifetime: Millis,
  non_lifetime: Millis,
}

impl Default for TransmissionParameters {
  fn default() -> Self {
    let mut params = TransmissionParameters { ack_timeout: Milliseconds(2_000),
                                              ack_random_factor: 1.5,
                                              max_retransmit: 4,
                                              nstart: 1,
                                              default_leisure: Milliseconds(5_000),
                                              probing_rate: 1,
                                              max_latency: Milliseconds(100_000),
                                              processing_delay: Milliseconds(2_000),
                                              max_transmit_span: Milliseconds(0),
                                              max_transmit_wait: Milliseconds(0),
                                              max_rtt: Milliseconds(0),
                                              exchange_lifetime: Milliseconds(0),
                                              non_lifetime: Milliseconds(0) };
    params.recalculate_derived();
    params
  }
}

impl TransmissionParameters {
  /// Recompute the derived bounds from the primitive fields.
  ///
  /// ```text
  /// MAX_TRANSMIT_SPAN = ACK_TIMEOUT * (2^MAX_RETRANSMIT - 1) * ACK_RANDOM_FACTOR
  /// MAX_TRANSMIT_WAIT = ACK_TIMEOUT * (2^(MAX_RETRANSMIT+1) - 1) * ACK_RANDOM_FACTOR
  /// MAX_RTT           = 2 * MAX_LATENCY + PROCESSING_DELAY
  /// EXCHANGE_LIFETIME = MAX_TRANSMIT_SPAN + MAX_RTT
  /// NON_LIFETIME      = MAX_TRANSMIT_SPAN + MAX_LATENCY
  /// ```
  pub fn recalculate_derived(&mut self) {
    let ack_timeout = self.ack_timeout.0 as f64;
    let span = ack_timeout * (((1u64 << self.max_retransmit) - 1) as f64) * self.ack_random_factor;
    let wait =
      ack_timeout * (((1u64 << (self.max_retransmit + 1)) - 1) as f64) * self.ack_random_factor;

    self.max_transmit_span = Milliseconds(span as u64);
    self.max_transmit_wait = Milliseconds(wait as u64);
    self.max_rtt = Milliseconds(2 * self.max_latency.0 + self.processing_delay.0);
    self.exchange_lifetime = Milliseconds(self.max_transmit_span.0 + self.max_rtt.0);
    self.non_lifetime = Milliseconds(self.max_transmit_span.0 + self.max_latency.0);
  }

  /// Worst-case span from first transmission of a Con to its last
  pub fn max_transmit_span(&self) -> Millis {
    self.max_transmit_span
  }

  /// Worst-case wait from first transmission of a Con to giving up on
  /// its ACK
  pub fn max_transmit_wait(&self) -> Millis {
    self.max_transmit_wait
  }

  /// Worst-case round-trip time
  pub fn max_rtt(&self) -> Millis {
    self.max_rtt
  }

  /// How long a Con's message ID stays live and must not be reused
  pub fn exchange_lifetime(&self) -> Millis {
    self.exchange_lifetime
  }

  /// How long a Non's message ID stays live
  pub fn non_lifetime(&self) -> Millis {
    self.non_lifetime
  }

  /// A retransmission schedule with the jittered default initial
  /// timeout: `ACK_TIMEOUT + uniform(0,1) * ACK_RANDOM_FACTOR`
  /// seconds, then doubling. `seed` pins the jitter (callers usually
  /// pass the creation timestamp).
  pub fn retransmission_schedule(&self, seed: u64) -> RetryTimeout {
    RetryTimeout::jittered(self, seed)
  }
}
