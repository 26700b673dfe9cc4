//! FIR filter primitives
//!
//! [`FilterCoeff`] holds an impulse response and performs the
//! multiply-accumulate half of FIR filtering against a caller-provided
//! history slice. [`Window`] is the other half: a fixed-length sliding
//! window of the most recent input samples, stored contiguously so it
//! can be handed to [`FilterCoeff::filter()`] without copying.
//!
//! The taps are stored *reversed* so that the multiply-accumulate runs
//! forward over the history slice, with `history[N-1]` as the most
//! recent sample.
//!
//! [`lowpass()`] designs a Hamming-windowed sinc low-pass response for
//! the anti-alias filters in the sample conditioner.

use std::convert::AsRef;

use nalgebra::base::Scalar;
use nalgebra::DVector;
use num_traits::{One, Zero};
use slice_ring_buffer::SliceRingBuffer;

/// FIR filter coefficients
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoeff<T>(DVector<T>)
where
    T: Copy + Scalar + One + Zero;

#[allow(dead_code)]
impl<T> FilterCoeff<T>
where
    T: Copy + Scalar + One + Zero,
{
    /// Create from an impulse response slice
    ///
    /// `h` uses the same representation as GNU Octave's `filter()`
    /// function. The taps are stored reversed internally.
    pub fn from_slice<S>(h: S) -> Self
    where
        S: AsRef<[T]>,
    {
        let inp = h.as_ref();
        FilterCoeff(DVector::from_iterator(
            inp.len(),
            inp.iter().rev().copied(),
        ))
    }

    /// Number of filter taps
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the filter has no taps
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// FIR filter against the given sample history
    ///
    /// `history[N-1]` must be the most recent sample and `history[0]`
    /// the oldest. If `history` is shorter than the filter, the
    /// missing past is taken to be zero. If it is longer, the excess
    /// (oldest) samples are ignored.
    pub fn filter<I, In, Out>(&self, history: I) -> Out
    where
        I: AsRef<[In]>,
        In: Copy + Scalar + std::ops::Mul<T, Output = Out>,
        Out: Copy + Scalar + Zero + std::ops::AddAssign,
    {
        multiply_accumulate(history.as_ref(), self.0.as_slice())
    }

    /// Taps, in reverse order
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }
}

impl<T> AsRef<[T]> for FilterCoeff<T>
where
    T: Copy + Scalar + One + Zero,
{
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

/// Fixed-length sliding sample window
///
/// The window starts out zero-filled. New samples are pushed onto the
/// right; the oldest age off the left. Contents are always available
/// as one contiguous slice, oldest first.
#[derive(Clone, Debug)]
pub struct Window<T>(SliceRingBuffer<T>)
where
    T: Copy + Scalar + Zero;

#[allow(dead_code)]
impl<T> Window<T>
where
    T: Copy + Scalar + Zero,
{
    /// Create a zero-filled window of length `len`
    pub fn new(len: usize) -> Self {
        let mut out = Self(SliceRingBuffer::with_capacity(len));
        for _i in 0..len {
            out.0.push_back(T::zero());
        }
        out
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        let len = self.0.len();
        self.0.clear();
        for _i in 0..len {
            self.0.push_back(T::zero());
        }
    }

    /// Window length
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the window has zero length
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Push one sample onto the window
    #[inline]
    pub fn push_one(&mut self, sample: T) {
        drop(self.0.drain(0..1));
        self.0.push_back(sample);
    }

    /// Append a slice to the window
    ///
    /// The last sample of `input` becomes the most recent sample of
    /// the window. If `input` is longer than the window, only its
    /// trailing chunk is retained.
    pub fn push<S>(&mut self, input: S)
    where
        S: AsRef<[T]>,
    {
        let input = input.as_ref();
        let input = if input.len() > self.0.len() {
            &input[input.len() - self.0.len()..]
        } else {
            input
        };

        drop(self.0.drain(0..input.len()));
        self.0.extend_from_slice(input);
    }

    /// Current contents, oldest sample first
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }
}

impl<T> AsRef<[T]> for Window<T>
where
    T: Copy + Scalar + Zero,
{
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

/// Design a Hamming-windowed sinc low-pass filter
///
/// `cutoff` is the normalized cutoff frequency as a fraction of the
/// sampling rate, `0.0 < cutoff <= 0.5`. The response is normalized to
/// unity gain at DC. `ntaps` should be odd for a symmetric response.
pub fn lowpass(ntaps: usize, cutoff: f32) -> Vec<f32> {
    use std::f32::consts::PI;

    let mid = (ntaps / 2) as isize;
    let mut taps = Vec::with_capacity(ntaps);
    for n in 0..ntaps {
        let x = n as isize - mid;
        let sinc = if x == 0 {
            2.0 * cutoff
        } else {
            (2.0 * cutoff * PI * x as f32).sin() / (PI * x as f32)
        };
        let window = 0.54 - 0.46 * ((2.0 * PI * n as f32) / (ntaps as f32 - 1.0)).cos();
        taps.push(sinc * window);
    }

    let norm: f32 = taps.iter().sum();
    for tap in taps.iter_mut() {
        *tap /= norm;
    }
    taps
}

// Multiply-accumulate over a history slice and reversed taps
//
// `history[N-1]` is the most recent sample; `rev_coeff[N-1]` is the
// zeroth filter coefficient. The shorter slice governs; missing
// history is treated as zero.
fn multiply_accumulate<In, Coeff, Out>(history: &[In], rev_coeff: &[Coeff]) -> Out
where
    In: Copy + Scalar + std::ops::Mul<Coeff, Output = Out>,
    Coeff: Copy + Scalar,
    Out: Copy + Scalar + Zero + std::ops::AddAssign,
{
    let mul_len = usize::min(history.len(), rev_coeff.len());
    let history = &history[history.len() - mul_len..];
    let rev_coeff = &rev_coeff[rev_coeff.len() - mul_len..];

    let mut out = Out::zero();
    for (hi, co) in history.iter().zip(rev_coeff.iter()) {
        out += *hi * *co;
    }
    out
}
