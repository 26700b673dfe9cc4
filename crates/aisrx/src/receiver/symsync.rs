//! Symbol timing recovery and synchronization lock
//!
//! The [`TimingLoop`] tracks the sender's symbol clock with a
//! proportional-integrate (PI) filter fed by a zero-crossing timing
//! error detector running at two samples per symbol. From the
//! oversampled soft-decision stream it selects one decision instant
//! per symbol; no interpolation is needed at ten samples per symbol.
//!
//! The [`BitSynchronizer`] wraps the loop with the fractional sample
//! clock that schedules TED inputs and with an explicit lock state
//! machine: `Unlocked → Acquiring → Locked`, falling back to
//! `Unlocked` on sustained timing-error overflow or loss of signal.
//! Bits flow downstream only while `Locked`, so the deframer never
//! sees garbage from an unsynchronized stream.

use arraydeque::ArrayDeque;

/// Symbol estimate with timing error
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolEstimate {
    /// `data[0]` is the inter-symbol zero, `data[1]` the soft symbol
    pub data: [f32; 2],

    /// Timing error as a fraction of the symbol period
    ///
    /// `err < 0` → sampling late, `err > 0` → sampling early.
    pub err: f32,
}

impl SymbolEstimate {
    pub fn new(zero: f32, sym: f32, err: f32) -> Self {
        Self {
            data: [zero, sym],
            err,
        }
    }

    /// Soft symbol estimate
    pub fn sym(&self) -> f32 {
        self.data[1]
    }
}

/// Symbol clock tracking loop
///
/// A PI filter tracks both the average and the instantaneous sample
/// clock period. The period is clamped to a configured maximum
/// deviation from nominal, so noise cannot walk the clock away.
#[derive(Clone, Debug)]
pub struct TimingLoop {
    // average input samples per TED input
    samples_per_ted: f32,

    // permitted period_avg range
    period_min: f32,
    period_max: f32,

    // PI gains
    loop_alpha: f32,
    loop_beta: f32,

    // average and instantaneous period estimates
    period_avg: f32,
    period_inst: f32,

    ted: ZeroCrossingTed,
}

impl TimingLoop {
    /// New timing loop
    ///
    /// Expects `samples_per_symbol` input samples per symbol on
    /// average, with at most `max_deviation` symbol periods of clock
    /// error. `loop_bandwidth` is a fraction of the TED input rate.
    pub fn new(samples_per_symbol: f32, loop_bandwidth: f32, max_deviation: f32) -> Self {
        const NEED_SPS: f32 = ZeroCrossingTed::SAMPLES_PER_SYMBOL as f32;

        let (loop_alpha, loop_beta) = compute_loop_alphabeta(loop_bandwidth);
        let samples_per_ted = samples_per_symbol / NEED_SPS;
        let period_deviation = samples_per_symbol * f32::clamp(max_deviation, 0.0, 0.5);

        Self {
            samples_per_ted,
            period_min: samples_per_ted - period_deviation,
            period_max: samples_per_ted + period_deviation,
            loop_alpha,
            loop_beta,
            period_avg: samples_per_ted,
            period_inst: samples_per_ted,
            ted: ZeroCrossingTed::default(),
        }
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.ted.reset();
        self.period_avg = self.samples_per_ted;
        self.period_inst = self.samples_per_ted;
    }

    /// Set the loop bandwidth, as a fraction of the TED input rate
    pub fn set_loop_bandwidth(&mut self, loop_bandwidth: f32) {
        let (loop_alpha, loop_beta) = compute_loop_alphabeta(loop_bandwidth);
        self.loop_alpha = loop_alpha;
        self.loop_beta = loop_beta;
    }

    /// Process one commanded sample
    ///
    /// `offset` is the error between the commanded (fractional) sample
    /// time and the actual integer sample time, `-0.5 < offset < 0.5`,
    /// positive if this sample is early.
    ///
    /// Returns the number of input samples until the next call and a
    /// symbol estimate when one is ready.
    pub fn input(&mut self, sample: f32, offset: f32) -> (f32, Option<SymbolEstimate>) {
        let sym = self.ted.input(sample);
        (self.advance_loop(offset, &sym), sym)
    }

    /// Average period between successive `input()` calls, in samples
    pub fn samples_per_ted(&self) -> f32 {
        self.samples_per_ted
    }

    // Advance the PI filter and return the next commanded period
    fn advance_loop(&mut self, offset: f32, sym: &Option<SymbolEstimate>) -> f32 {
        let offset = offset.clamp(-0.5f32, 0.5f32);

        match sym {
            Some(sym) => {
                // correct the error estimate for the reported sample time
                let err = f32::clamp(sym.err - offset / self.samples_per_ted, -1.0, 1.0);

                // integral arm
                self.period_avg += self.loop_beta * err;
                self.period_avg = self.period_avg.clamp(self.period_min, self.period_max);

                // proportional arm; we cannot go backwards in time
                self.period_inst = self.period_avg + self.loop_alpha * err + offset;
                if self.period_inst < 0.0f32 {
                    self.period_inst = self.period_avg;
                }
            }
            None => {
                self.period_inst += offset;
            }
        }

        self.period_inst
    }
}

/// Zero-crossing timing error detector
#[derive(Clone, Debug)]
pub struct ZeroCrossingTed {
    history: ArrayDeque<f32, 3, arraydeque::Wrapping>,
    sample_counter: u32,
}

impl ZeroCrossingTed {
    /// Input samples per symbol required by this TED
    pub const SAMPLES_PER_SYMBOL: u32 = 2;

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.history.clear();
        for _i in 0..self.history.capacity() {
            let _ = self.history.push_back(0.0f32);
        }
        self.sample_counter = 0;
    }

    /// Accept one sample at twice the symbol rate
    ///
    /// Produces a symbol and error estimate on every second input.
    pub fn input(&mut self, sample: f32) -> Option<SymbolEstimate> {
        let _ = self.history.push_back(sample);
        self.sample_counter = (self.sample_counter + 1) % Self::SAMPLES_PER_SYMBOL;
        if self.sample_counter == 1 {
            let err = zero_crossing_metric(&self.history);
            Some(SymbolEstimate::new(self.history[1], self.history[2], err))
        } else {
            None
        }
    }
}

impl Default for ZeroCrossingTed {
    fn default() -> Self {
        let mut out = ZeroCrossingTed {
            history: ArrayDeque::default(),
            sample_counter: 0,
        };
        out.reset();
        out
    }
}

// Zero-crossing metric over (previous symbol, zero, current symbol)
//
// A Gardner-style metric with hard decision slicing.
#[inline]
fn zero_crossing_metric<A>(v: &A) -> f32
where
    A: std::ops::Index<usize, Output = f32> + ?Sized,
{
    v[1] * (bit_decision(v[0]) - bit_decision(v[2]))
}

// Hard decision slicer for two-level symbols
#[inline]
fn bit_decision(sym: f32) -> f32 {
    sym.signum()
}

// PI (alpha, beta) for a critically-damped loop at the given
// bandwidth, expressed as a fraction of the symbol rate
fn compute_loop_alphabeta(loop_bandwidth: f32) -> (f32, f32) {
    let omega_n_norm = 2.0f32 * std::f32::consts::PI * loop_bandwidth;
    let k0 = 2.0f32;
    let k1 = f32::exp(-omega_n_norm);
    let sinh_zeta_omega_n_t = f32::sinh(omega_n_norm);
    let alpha = k0 * k1 * sinh_zeta_omega_n_t;
    let beta = k0 * (1.0f32 - k1 * (sinh_zeta_omega_n_t + 1.0f32));
    (alpha, beta)
}

/// Synchronizer lock state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// No usable signal; nothing is emitted
    Unlocked,

    /// Signal present; accumulating timing-error statistics
    Acquiring,

    /// Steady-state bit output
    Locked,
}

/// Thresholds governing lock transitions
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LockThresholds {
    /// Smoothed symbol power needed to leave `Unlocked`
    pub power_open: f32,

    /// Power floor below which the synchronizer unlocks
    pub power_close: f32,

    /// Smoothed |timing error| at or below which lock is declared
    pub err_lock: f32,

    /// Smoothed |timing error| at or above which lock is lost
    pub err_unlock: f32,

    /// Minimum symbols observed in `Acquiring` before locking
    pub min_acquire_symbols: u32,
}

impl Default for LockThresholds {
    fn default() -> Self {
        Self {
            power_open: 0.10,
            power_close: 0.05,
            err_lock: 0.20,
            err_unlock: 0.45,
            min_acquire_symbols: 10,
        }
    }
}

/// Pure lock transition function
///
/// Computes the next state from the current state and the smoothed
/// signal statistics. Free of side effects, so every edge is directly
/// unit-testable.
pub fn advance_lock(
    state: SyncState,
    power: f32,
    err_avg: f32,
    acquired_symbols: u32,
    th: &LockThresholds,
) -> SyncState {
    match state {
        SyncState::Unlocked if power >= th.power_open => SyncState::Acquiring,
        SyncState::Unlocked => SyncState::Unlocked,

        SyncState::Acquiring if power < th.power_close => SyncState::Unlocked,
        SyncState::Acquiring
            if acquired_symbols >= th.min_acquire_symbols && err_avg <= th.err_lock =>
        {
            SyncState::Locked
        }
        SyncState::Acquiring => SyncState::Acquiring,

        SyncState::Locked if power < th.power_close || err_avg >= th.err_unlock => {
            SyncState::Unlocked
        }
        SyncState::Locked => SyncState::Locked,
    }
}

/// Output of one [`BitSynchronizer`] input sample
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SyncOut {
    /// Bit decision, present only while locked
    pub bit: Option<bool>,

    /// Lock transition `(from, to)`, if one occurred
    pub transition: Option<(SyncState, SyncState)>,
}

/// Complete bit synchronizer
///
/// Consumes one soft decision per working-rate sample. Internally it
/// schedules the timing error detector at two (fractional) samples
/// per symbol, tracks smoothed power and timing-error statistics, and
/// runs the lock state machine. Emits at most one bit per symbol
/// period, and only while locked.
#[derive(Clone, Debug)]
pub struct BitSynchronizer {
    timing: TimingLoop,
    thresholds: LockThresholds,
    state: SyncState,

    // fractional TED sample clock
    clock: u32,
    until_next: f32,

    // smoothed statistics
    power: f32,
    err_avg: f32,
    power_alpha: f32,
    err_alpha: f32,
    acquired_symbols: u32,

    bandwidth_unlocked: f32,
    bandwidth_locked: f32,
}

impl BitSynchronizer {
    /// New synchronizer
    ///
    /// `samples_per_symbol` is the oversampling factor of the input.
    /// The loop runs at `bandwidth_unlocked` until lock is declared,
    /// then narrows to `bandwidth_locked`.
    pub fn new(
        samples_per_symbol: f32,
        bandwidth_unlocked: f32,
        bandwidth_locked: f32,
        max_deviation: f32,
    ) -> Self {
        let timing = TimingLoop::new(samples_per_symbol, bandwidth_unlocked, max_deviation);
        let until_next = timing.samples_per_ted();
        Self {
            timing,
            thresholds: LockThresholds::default(),
            state: SyncState::Unlocked,
            clock: 0,
            until_next,
            power: 0.0,
            err_avg: 1.0,
            power_alpha: 0.02,
            err_alpha: 0.15,
            acquired_symbols: 0,
            bandwidth_unlocked,
            bandwidth_locked,
        }
    }

    /// Current lock state
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.timing.reset();
        self.timing.set_loop_bandwidth(self.bandwidth_unlocked);
        self.state = SyncState::Unlocked;
        self.clock = 0;
        self.until_next = self.timing.samples_per_ted();
        self.power = 0.0;
        self.err_avg = 1.0;
        self.acquired_symbols = 0;
    }

    /// Process one soft decision
    pub fn input(&mut self, soft: f32) -> SyncOut {
        self.power += self.power_alpha * (soft * soft - self.power);
        self.clock += 1;

        let mut out = SyncOut::default();
        let remaining = self.until_next - self.clock as f32;
        if remaining > 0.0f32 && remaining.abs() >= 0.5f32 {
            return out;
        }

        self.clock = 0;
        let (next, sym) = self.timing.input(soft, remaining);
        self.until_next = next;

        let sym = match sym {
            Some(sym) => sym,
            None => return out,
        };

        self.err_avg += self.err_alpha * (sym.err.abs() - self.err_avg);
        if self.state == SyncState::Acquiring {
            self.acquired_symbols += 1;
        }

        let next_state = advance_lock(
            self.state,
            self.power,
            self.err_avg,
            self.acquired_symbols,
            &self.thresholds,
        );
        if next_state != self.state {
            out.transition = Some((self.state, next_state));
            self.enter(next_state);
        }

        if self.state == SyncState::Locked {
            out.bit = Some(sym.sym() > 0.0);
        }

        out
    }

    // Apply side effects of a state change
    fn enter(&mut self, next: SyncState) {
        match next {
            SyncState::Acquiring => {
                self.timing.reset();
                self.timing.set_loop_bandwidth(self.bandwidth_unlocked);
                self.err_avg = 1.0;
                self.acquired_symbols = 0;
            }
            SyncState::Locked => {
                self.timing.set_loop_bandwidth(self.bandwidth_locked);
            }
            // a frame may still be in flight downstream; the deframer
            // is left alone and the frame fails its CRC naturally
            SyncState::Unlocked => {}
        }
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;
    use nalgebra::DVector;

    fn gen_sinusoid(period: usize) -> DVector<f32> {
        let twopi = 2.0f32 * std::f32::consts::PI;
        DVector::from_iterator(
            period,
            (0..period).map(|n| f32::sin(twopi * (n as f32) / (period as f32))),
        )
    }

    #[test]
    fn test_zero_crossing_metric() {
        const DEAD_ON: &[f32] = &[1.0, 0.0, -1.0];
        const CONSTANT_HIGH: &[f32] = &[1.0, 1.0, 1.0];
        const TIMING_EARLY: &[f32] = &[0.8, 0.2, -0.8];
        const TIMING_LATE: &[f32] = &[0.8, -0.2, -0.8];

        assert_approx_eq!(zero_crossing_metric(DEAD_ON), 0.0f32);
        assert_approx_eq!(zero_crossing_metric(CONSTANT_HIGH), 0.0f32);
        assert_approx_eq!(zero_crossing_metric(TIMING_EARLY), 0.4f32);
        assert_approx_eq!(zero_crossing_metric(TIMING_LATE), -0.4f32);
    }

    #[test]
    fn test_zero_crossing_ted() {
        let mut ted = ZeroCrossingTed::default();

        assert!(ted.input(0.8f32).is_some());
        assert!(ted.input(0.2f32).is_none());
        match ted.input(-0.8f32) {
            Some(sym) => {
                assert_eq!(-0.8f32, sym.sym());
                assert_approx_eq!(0.4f32, sym.err);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_compute_loop_alphabeta() {
        let (alpha, beta) = compute_loop_alphabeta(0.0f32);
        assert_approx_eq!(alpha, 0.0f32);
        assert_approx_eq!(beta, 0.0f32);

        let (alpha, beta) = compute_loop_alphabeta(0.5f32);
        assert_approx_eq!(alpha, 0.99813f32, 1.0e-4);
        assert_approx_eq!(beta, 0.91544f32, 1.0e-4);
    }

    // drive the loop around a circular input, return the last estimate
    fn timing_test(timing: &mut TimingLoop, inp: &DVector<f32>, start: usize) -> SymbolEstimate {
        let mut offset = 0.0f32;
        let mut sa = start;
        let mut last_sym = SymbolEstimate::default();
        timing.reset();
        for _i in 0..128 {
            let (skip, sym) = timing.input(inp[sa], offset);
            let whole = skip.round();
            offset = skip - whole;
            sa = (sa + whole as usize) % inp.len();
            if let Some(s) = sym {
                last_sym = s;
            }
        }
        last_sym
    }

    #[test]
    fn test_timing_loop_convergence() {
        const SAMPLES_PER_SYMBOL: usize = 32;

        // a sinusoid stands in for alternating matched symbols
        let inp = gen_sinusoid(2 * SAMPLES_PER_SYMBOL);
        assert_approx_eq!(1.0f32, inp[16]);
        assert_approx_eq!(-1.0f32, inp[48]);

        let mut timing = TimingLoop::new(SAMPLES_PER_SYMBOL as f32, 0.25, 0.125f32);

        // best case: start synchronized
        let last_sym = timing_test(&mut timing, &inp, 16);
        assert!(last_sym.sym().abs() > 0.99);
        assert!(last_sym.err < 1e-4);

        // worst case: start half a symbol off
        let last_sym = timing_test(&mut timing, &inp, 0);
        assert!(last_sym.sym().abs() > 0.99);
        assert!(last_sym.err < 1e-4);
    }

    #[test]
    fn test_advance_lock_edges() {
        let th = LockThresholds::default();

        // silence holds Unlocked
        assert_eq!(
            SyncState::Unlocked,
            advance_lock(SyncState::Unlocked, 0.0, 1.0, 0, &th)
        );

        // power opens the gate
        assert_eq!(
            SyncState::Acquiring,
            advance_lock(SyncState::Unlocked, 0.5, 1.0, 0, &th)
        );

        // not enough symbols yet
        assert_eq!(
            SyncState::Acquiring,
            advance_lock(SyncState::Acquiring, 0.5, 0.1, 5, &th)
        );

        // symbols and low error lock
        assert_eq!(
            SyncState::Locked,
            advance_lock(SyncState::Acquiring, 0.5, 0.1, 20, &th)
        );

        // error overflow unlocks
        assert_eq!(
            SyncState::Unlocked,
            advance_lock(SyncState::Locked, 0.5, 0.5, 20, &th)
        );

        // silence unlocks
        assert_eq!(
            SyncState::Unlocked,
            advance_lock(SyncState::Locked, 0.01, 0.1, 20, &th)
        );

        // acquisition abandoned on silence
        assert_eq!(
            SyncState::Unlocked,
            advance_lock(SyncState::Acquiring, 0.01, 0.1, 5, &th)
        );
    }

    // alternating ±1 symbols at 10 samples per symbol, with smooth
    // zero crossings, standing in for demodulated training sequence
    fn alternating_soft(n: usize) -> f32 {
        f32::sin(2.0 * std::f32::consts::PI * n as f32 / 20.0)
    }

    #[test]
    fn test_bit_synchronizer_locks_on_alternating() {
        let mut sync = BitSynchronizer::new(10.0, 0.125, 0.05, 0.01);
        assert_eq!(SyncState::Unlocked, sync.state());

        let mut bits = Vec::new();
        let mut saw_lock = false;
        for n in 0..64 * 10 {
            let out = sync.input(alternating_soft(n));
            if let Some((_, SyncState::Locked)) = out.transition {
                saw_lock = true;
            }
            if let Some(bit) = out.bit {
                bits.push(bit);
            }
        }

        assert!(saw_lock);
        assert_eq!(SyncState::Locked, sync.state());
        assert!(bits.len() > 16, "only {} bits emitted", bits.len());
        // alternating pattern must come through alternating
        for pair in bits.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_bit_synchronizer_unlocks_on_silence() {
        let mut sync = BitSynchronizer::new(10.0, 0.125, 0.05, 0.01);

        // lock it first
        for n in 0..64 * 10 {
            sync.input(alternating_soft(n));
        }
        assert_eq!(SyncState::Locked, sync.state());

        // prolonged silence closes the gate
        let mut transitions = Vec::new();
        for _i in 0..2000 {
            let out = sync.input(0.0);
            if sync.state() == SyncState::Unlocked {
                assert_eq!(None, out.bit, "bit emitted while unlocked");
            }
            if let Some(tr) = out.transition {
                transitions.push(tr);
            }
        }
        assert_eq!(SyncState::Unlocked, sync.state());
        assert!(transitions.contains(&(SyncState::Locked, SyncState::Unlocked)));
    }
}
