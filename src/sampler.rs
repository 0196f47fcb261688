//! # Light Sampler Core
//!
//! Owns the sampling thread and every piece of mutable sampling state:
//! the in-progress second's samples, the previous second's history, the
//! exponential moving average, the dip detector, and the lifetime sample
//! counter. All of it lives behind a single mutex inside one owned
//! [`Sampler`] instance, so collaborators (UDP server, display refresher)
//! read through cheap cloned [`SamplerHandle`]s instead of process globals.
//!
//! ## Sampling loop
//!
//! The background thread ticks roughly once per millisecond: one ADC
//! acquisition through the transport, an EMA update, an append to the
//! current buffer, then a short sleep. After each tick it checks the
//! monotonic clock; once a second has elapsed it runs dip detection over
//! the current buffer *before* retiring it to history — detection must see
//! the full second's samples while they are still intact — then swaps and
//! starts a fresh collection second. The cadence is best effort: a late
//! boundary only delays the next swap, it never corrupts state.
//!
//! ## Dip detection
//!
//! A dip is a drop of more than 0.1 V below the long-run average. A
//! persistent hysteresis flag keeps a single sustained dip from being
//! counted once per sample: after triggering, the signal must climb back
//! within 0.03 V of the threshold before another dip can be counted. The
//! flag deliberately survives second boundaries, so a dip straddling two
//! seconds is counted exactly once.
//!
//! ## Error model
//!
//! Lifecycle misuse (accessor before `start`, double `start`, `stop`
//! before `start`) is a programming error and panics. Transport faults are
//! recoverable: a failed tick is logged and skipped, and only a fault
//! during `start`'s initial probe is returned to the caller.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::code_to_volts;
use crate::period::{PeriodStats, PeriodTimer};
use crate::transport::{AdcTransport, TransportError};

/// Maximum samples stored per second; overflow samples are dropped but
/// still counted in the lifetime total.
pub const MAX_HISTORY_SIZE: usize = 1200;

/// EMA weight of a new sample: 0.1% new, 99.9% previous average.
const SMOOTHING_FACTOR: f64 = 0.001;

/// Voltage drop below the average that triggers a dip.
const DIP_THRESHOLD_VOLTS: f64 = 0.1;

/// Recovery margin: the signal must rise back to within this of the
/// trigger threshold before another dip can be counted.
const HYSTERESIS_VOLTS: f64 = 0.03;

/// Pause between ticks, throttling the sampling rate to ~1 kHz.
const TICK_PAUSE: Duration = Duration::from_millis(1);

/// Length of one collection second.
const BOUNDARY_PERIOD: Duration = Duration::from_secs(1);

// TLA2024 registers: the channel configuration word is rewritten before
// every data read, matching the chip's one-shot conversion flow.
const REG_CONFIGURATION: u8 = 0x01;
const REG_DATA: u8 = 0x00;
const TLA2024_CHANNEL_CONF_2: u16 = 0x83E2;

/// All mutable sampling state, guarded by the one sampler mutex.
#[derive(Debug)]
struct State {
    /// Samples collected during the in-progress second
    current: Vec<f64>,
    /// Samples from the previous completed second
    history: Vec<f64>,
    /// Exponential moving average over all samples ever taken (raw counts)
    smoothed_average: f64,
    /// True until the first sample seeds the average
    first_sample: bool,
    /// Lifetime sample count, incremented even when the buffer is full
    total_samples: u64,
    /// Dips detected in the most recently completed second
    dip_count: u32,
    /// Hysteresis flag; persists across seconds
    below_threshold: bool,
    /// Jitter summary from the most recent completed second
    last_jitter: Option<PeriodStats>,
}

impl State {
    fn new() -> Self {
        Self {
            current: Vec::with_capacity(MAX_HISTORY_SIZE),
            history: Vec::new(),
            smoothed_average: 0.0,
            first_sample: true,
            total_samples: 0,
            dip_count: 0,
            below_threshold: false,
            last_jitter: None,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    /// Fold one reading into the average and the current buffer.
    fn record(&mut self, reading: f64) {
        if self.first_sample {
            self.smoothed_average = reading;
            self.first_sample = false;
        } else {
            self.smoothed_average = SMOOTHING_FACTOR * reading
                + (1.0 - SMOOTHING_FACTOR) * self.smoothed_average;
        }

        if self.current.len() < MAX_HISTORY_SIZE {
            self.current.push(reading);
        }
        self.total_samples += 1;
    }

    /// Recount dips over the current (about-to-retire) second's samples.
    ///
    /// The counter is recomputed from zero on every pass; the hysteresis
    /// flag carries over. An empty pass reports zero dips and leaves the
    /// flag untouched.
    fn detect_dips(&mut self) {
        let average_volts = code_to_volts(self.smoothed_average);
        let dip_threshold = average_volts - DIP_THRESHOLD_VOLTS;
        let reset_threshold = average_volts - (DIP_THRESHOLD_VOLTS - HYSTERESIS_VOLTS);

        self.dip_count = 0;
        for &code in &self.current {
            let volts = code_to_volts(code);
            if !self.below_threshold && volts < dip_threshold {
                self.dip_count += 1;
                self.below_threshold = true;
            } else if self.below_threshold && volts > reset_threshold {
                self.below_threshold = false;
            }
        }
    }

    /// Close out the current second: detect dips, then retire the current
    /// buffer to history and start a fresh one. Detection runs first so it
    /// sees the full second's samples before they are cleared.
    fn roll_second(&mut self) {
        self.detect_dips();
        self.history.clear();
        self.history.extend_from_slice(&self.current);
        self.current.clear();
    }
}

/// State shared between the owning [`Sampler`], its worker thread, and
/// reader handles.
struct Shared {
    state: Mutex<State>,
    /// Transport lives outside the state lock: acquisitions are serialized
    /// by this separate lock (plus the transport's own settling delay), so
    /// readers are never blocked behind a bus transfer.
    transport: Mutex<Option<Box<dyn AdcTransport + Send>>>,
    started: AtomicBool,
    keep_sampling: AtomicBool,
    period: PeriodTimer,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
            transport: Mutex::new(None),
            started: AtomicBool::new(false),
            keep_sampling: AtomicBool::new(false),
            period: PeriodTimer::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("sampler lock poisoned")
    }

    fn assert_started(&self) {
        assert!(
            self.started.load(Ordering::SeqCst),
            "sampler used before start()"
        );
    }

    /// One acquisition: configure the channel, read the conversion, fold
    /// the reading into state. Shared by the background tick and
    /// `get_instant_reading`.
    fn acquire(&self) -> Result<f64, TransportError> {
        let reading = {
            let mut guard = self.transport.lock().expect("transport lock poisoned");
            let transport = guard.as_mut().expect("sampler transport missing");
            transport.write_register(REG_CONFIGURATION, TLA2024_CHANNEL_CONF_2)?;
            let wire = transport.read_register(REG_DATA)?;
            // The conversion arrives byte-swapped with the 12-bit code
            // left-aligned; the low 4 bits are padding.
            f64::from(wire.swap_bytes() >> 4)
        };

        self.state().record(reading);
        self.period.mark();
        Ok(reading)
    }

    /// Second-boundary processing: dips, swap, jitter snapshot.
    fn boundary(&self) {
        let jitter = self.period.statistics_and_clear();
        let mut state = self.state();
        state.roll_second();
        state.last_jitter = jitter;
    }
}

fn run(shared: Arc<Shared>) {
    let mut last_boundary = Instant::now();
    while shared.keep_sampling.load(Ordering::SeqCst) {
        if let Err(err) = shared.acquire() {
            // Recoverable: skip this tick and keep sampling.
            eprintln!("sampler: skipping tick: {err}");
        }
        thread::sleep(TICK_PAUSE);

        if last_boundary.elapsed() >= BOUNDARY_PERIOD {
            shared.boundary();
            last_boundary = Instant::now();
        }
    }
}

/// Cheap cloneable read handle onto a running sampler.
///
/// All accessors are safe to call from any thread concurrently with the
/// sampling thread; each holds the sampler lock only for a bounded copy.
/// Calling any accessor before `start()` is a usage fault and panics.
#[derive(Clone)]
pub struct SamplerHandle {
    shared: Arc<Shared>,
}

impl SamplerHandle {
    /// Trigger one synchronous acquisition and return the raw reading.
    ///
    /// Shares the background tick logic, so the reading also lands in the
    /// buffers and counters. Intended for diagnostics and manual polling.
    pub fn get_instant_reading(&self) -> Result<f64, TransportError> {
        self.shared.assert_started();
        self.shared.acquire()
    }

    /// A fresh copy of the previous second's samples; empty before the
    /// first boundary. The caller owns the copy: the sampling thread may
    /// swap again immediately without affecting it.
    pub fn get_history(&self) -> Vec<f64> {
        self.shared.assert_started();
        self.shared.state().history.clone()
    }

    /// Number of samples captured during the previous second.
    pub fn get_history_length(&self) -> usize {
        self.shared.assert_started();
        self.shared.state().history.len()
    }

    /// Smoothed average in raw ADC counts; callers apply
    /// [`crate::code_to_volts`] when a voltage is needed.
    pub fn get_average(&self) -> f64 {
        self.shared.assert_started();
        self.shared.state().smoothed_average
    }

    /// Lifetime sample count, including samples dropped on buffer overflow.
    pub fn get_total_count(&self) -> u64 {
        self.shared.assert_started();
        self.shared.state().total_samples
    }

    /// Dips detected during the previous second.
    pub fn get_dip_count(&self) -> u32 {
        self.shared.assert_started();
        self.shared.state().dip_count
    }

    /// Jitter statistics from the previous second, if any ticks landed.
    pub fn last_jitter(&self) -> Option<PeriodStats> {
        self.shared.assert_started();
        self.shared.state().last_jitter
    }
}

/// The owning half of the sampler: lifecycle plus everything on
/// [`SamplerHandle`] via `Deref`.
pub struct Sampler {
    handle: SamplerHandle,
    worker: Option<thread::JoinHandle<()>>,
}

impl Sampler {
    pub fn new() -> Self {
        Self {
            handle: SamplerHandle {
                shared: Arc::new(Shared::new()),
            },
            worker: None,
        }
    }

    /// Take ownership of an opened transport, reset all counters, and
    /// spawn the sampling thread.
    ///
    /// The transport is probed with one configuration write first; a fault
    /// here is returned to the caller rather than starting a sampler that
    /// can never read. Starting twice without an intervening `stop()`
    /// panics.
    pub fn start(
        &mut self,
        mut transport: Box<dyn AdcTransport + Send>,
    ) -> Result<(), TransportError> {
        let shared = &self.handle.shared;
        assert!(
            !shared.started.load(Ordering::SeqCst),
            "sampler started twice without stop()"
        );

        transport.write_register(REG_CONFIGURATION, TLA2024_CHANNEL_CONF_2)?;

        *shared.transport.lock().expect("transport lock poisoned") = Some(transport);
        shared.state().reset();
        shared.keep_sampling.store(true, Ordering::SeqCst);
        shared.started.store(true, Ordering::SeqCst);

        let worker_shared = Arc::clone(shared);
        self.worker = Some(
            thread::Builder::new()
                .name("sampler".to_string())
                .spawn(move || run(worker_shared))
                .expect("failed to spawn sampler thread"),
        );
        Ok(())
    }

    /// Cooperatively stop: clear the continuation flag, join the thread,
    /// release the transport. Panics when called before `start()`.
    pub fn stop(&mut self) {
        self.handle.shared.assert_started();
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let shared = &self.handle.shared;
        shared.keep_sampling.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        *shared.transport.lock().expect("transport lock poisoned") = None;
        shared.started.store(false, Ordering::SeqCst);
    }

    /// A read handle for collaborator threads.
    pub fn handle(&self) -> SamplerHandle {
        self.handle.clone()
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Sampler {
    type Target = SamplerHandle;

    fn deref(&self) -> &SamplerHandle {
        &self.handle
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        if self.handle.shared.started.load(Ordering::SeqCst) {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SyntheticAdc;
    use crate::VOLTS_PER_BIT;

    /// Express a voltage as the raw ADC code the sampler stores.
    fn raw(volts: f64) -> f64 {
        volts / VOLTS_PER_BIT
    }

    /// A state primed to an established average, in volt units.
    fn primed_state(average_volts: f64) -> State {
        let mut state = State::new();
        state.smoothed_average = raw(average_volts);
        state.first_sample = false;
        state
    }

    #[test]
    fn total_count_tracks_every_tick() {
        let mut state = State::new();
        for i in 0..100 {
            state.record(f64::from(i));
        }
        assert_eq!(state.total_samples, 100);
        assert_eq!(state.current.len(), 100);
    }

    #[test]
    fn current_buffer_caps_but_total_keeps_counting() {
        let mut state = State::new();
        for _ in 0..(MAX_HISTORY_SIZE + 50) {
            state.record(1000.0);
        }
        assert_eq!(state.current.len(), MAX_HISTORY_SIZE);
        assert_eq!(state.total_samples, (MAX_HISTORY_SIZE + 50) as u64);
    }

    #[test]
    fn first_sample_seeds_the_average() {
        let mut state = State::new();
        state.record(100.0);
        assert_eq!(state.smoothed_average, 100.0);
    }

    #[test]
    fn second_sample_applies_ema_weight() {
        let mut state = State::new();
        state.record(100.0);
        state.record(200.0);
        let expected = 0.001 * 200.0 + 0.999 * 100.0;
        assert!((state.smoothed_average - expected).abs() < 1e-9);
    }

    #[test]
    fn roll_second_swaps_current_into_history() {
        let mut state = State::new();
        for i in 0..7 {
            state.record(f64::from(i));
        }
        state.roll_second();
        assert_eq!(state.history.len(), 7);
        assert_eq!(state.current.len(), 0);
        // The next second collects independently.
        state.record(42.0);
        assert_eq!(state.history.len(), 7);
        assert_eq!(state.current, vec![42.0]);
    }

    #[test]
    fn dip_scenario_counts_two_distinct_dips() {
        // avg 1.0 V, thresholds: dip at 0.9 V, reset at 0.93 V.
        let mut state = primed_state(1.0);
        state.current = [1.0, 0.85, 0.85, 0.95, 0.85].iter().map(|&v| raw(v)).collect();
        state.detect_dips();
        assert_eq!(state.dip_count, 2);
    }

    #[test]
    fn sustained_dip_counts_once() {
        let mut state = primed_state(1.0);
        state.current = [1.0, 0.85, 0.86, 0.84, 0.85, 0.92]
            .iter()
            .map(|&v| raw(v))
            .collect();
        state.detect_dips();
        assert_eq!(state.dip_count, 1);
    }

    #[test]
    fn oscillation_inside_the_deadband_counts_once() {
        // 0.91 V sits between the 0.90 trigger and the 0.93 reset, so the
        // detector must stay latched.
        let mut state = primed_state(1.0);
        state.current = [0.88, 0.91, 0.88, 0.91, 0.88].iter().map(|&v| raw(v)).collect();
        state.detect_dips();
        assert_eq!(state.dip_count, 1);
    }

    #[test]
    fn dip_straddling_a_boundary_is_not_recounted() {
        let mut state = primed_state(1.0);
        state.current = vec![raw(0.85), raw(0.85)];
        state.roll_second();
        assert_eq!(state.dip_count, 1);
        assert!(state.below_threshold);

        // Still below threshold for the whole next second.
        state.current = vec![raw(0.85), raw(0.86)];
        state.roll_second();
        assert_eq!(state.dip_count, 0);
        assert!(state.below_threshold);
    }

    #[test]
    fn empty_second_reports_zero_and_keeps_the_flag() {
        let mut state = primed_state(1.0);
        state.below_threshold = true;
        state.roll_second();
        assert_eq!(state.dip_count, 0);
        assert!(state.below_threshold);
    }

    #[test]
    fn history_copy_survives_a_subsequent_swap() {
        let mut sampler = Sampler::new();
        sampler.start(Box::new(SyntheticAdc::new())).unwrap();

        {
            let mut state = sampler.handle.shared.state();
            state.current = vec![1.0, 2.0, 3.0];
            state.roll_second();
        }
        let snapshot = sampler.get_history();
        {
            let mut state = sampler.handle.shared.state();
            state.current = vec![9.0];
            state.roll_second();
        }
        assert_eq!(snapshot, vec![1.0, 2.0, 3.0]);
        assert_eq!(sampler.get_history(), vec![9.0]);

        sampler.stop();
    }

    #[test]
    fn synthetic_run_collects_samples() {
        let mut sampler = Sampler::new();
        sampler.start(Box::new(SyntheticAdc::new())).unwrap();

        thread::sleep(Duration::from_millis(120));
        assert!(sampler.get_total_count() > 0);
        assert!(sampler.get_average() > 0.0);
        // No boundary has passed yet at 120 ms.
        assert_eq!(sampler.get_history_length(), 0);
        assert!(sampler.get_history().is_empty());

        let reading = sampler.get_instant_reading().unwrap();
        assert!((0.0..=4095.0).contains(&reading));

        sampler.stop();
        let total = sampler.handle.shared.state().total_samples;
        assert!(total > 0);
    }

    #[test]
    fn boundary_retires_the_first_second() {
        let mut sampler = Sampler::new();
        sampler.start(Box::new(SyntheticAdc::new())).unwrap();

        thread::sleep(Duration::from_millis(1300));
        let history_len = sampler.get_history_length();
        assert!(history_len > 0, "no boundary after 1.3 s");
        assert_eq!(sampler.get_history().len(), history_len);
        assert!(sampler.get_total_count() >= history_len as u64);
        assert!(sampler.last_jitter().is_some());

        sampler.stop();
    }

    #[test]
    fn restart_after_stop_resets_counters() {
        let mut sampler = Sampler::new();
        sampler.start(Box::new(SyntheticAdc::new())).unwrap();
        thread::sleep(Duration::from_millis(50));
        sampler.stop();

        sampler.start(Box::new(SyntheticAdc::new())).unwrap();
        thread::sleep(Duration::from_millis(20));
        let total = sampler.get_total_count();
        assert!(total > 0);
        sampler.stop();
    }

    struct FailingTransport;

    impl AdcTransport for FailingTransport {
        fn write_register(&mut self, reg: u8, _value: u16) -> Result<(), TransportError> {
            Err(TransportError::Write {
                reg,
                reason: "nack".to_string(),
            })
        }

        fn read_register(&mut self, reg: u8) -> Result<u16, TransportError> {
            Err(TransportError::Read {
                reg,
                reason: "nack".to_string(),
            })
        }
    }

    #[test]
    fn start_probe_failure_is_returned_not_fatal() {
        let mut sampler = Sampler::new();
        let result = sampler.start(Box::new(FailingTransport));
        assert!(result.is_err());
        // The sampler never started, so a retry with a good transport works.
        sampler.start(Box::new(SyntheticAdc::new())).unwrap();
        sampler.stop();
    }

    #[test]
    #[should_panic(expected = "before start")]
    fn accessor_before_start_panics() {
        let sampler = Sampler::new();
        let _ = sampler.get_total_count();
    }

    #[test]
    #[should_panic(expected = "started twice")]
    fn double_start_panics() {
        let mut sampler = Sampler::new();
        sampler.start(Box::new(SyntheticAdc::new())).unwrap();
        let _ = sampler.start(Box::new(SyntheticAdc::new()));
    }

    #[test]
    #[should_panic(expected = "before start")]
    fn stop_before_start_panics() {
        let mut sampler = Sampler::new();
        sampler.stop();
    }
}
