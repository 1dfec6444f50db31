use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::color::{lerp_color, Color};
use crate::{EffectError, Result};

/// Band levels below this are treated as silence when blending.
const MIN_BAND_ENERGY: f32 = 1e-3;

/// One capture tick's worth of amplitude samples. Consumed immediately by the
/// analysis and discarded.
#[derive(Debug, Clone, Default)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Contract of the external capture source, usable in microphone or loopback
/// mode. `Ok(None)` means no new data is available yet; implementations must
/// not block indefinitely waiting for a frame.
pub trait AudioSource: Send {
    fn read_frame(&mut self, sample_count: usize) -> Result<Option<AudioFrame>>;
}

/// Root-mean-square amplitude of one frame.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

/// Windowed forward real FFT with the plan and buffers cached across frames
/// of the same size.
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Width in Hz of one spectrum bin for a frame of `len` samples.
    pub fn bin_hz(&self, len: usize) -> f32 {
        self.sample_rate as f32 / len.max(1) as f32
    }

    /// Magnitude spectrum of one Hann-windowed frame.
    pub fn magnitudes(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        if samples.len() < 2 {
            return Err(EffectError::Capture(
                "analysis requires frames with at least two samples".into(),
            ));
        }

        let len = samples.len();
        let fft = self.prepare_fft(len);
        for (index, value) in samples.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        Ok(fft.spectrum.iter().map(|bin| bin.norm()).collect())
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let rebuild = self
            .fft
            .as_ref()
            .map(|fft| fft.size != size)
            .unwrap_or(true);

        if rebuild {
            let plan = self.fft_planner.plan_fft_forward(size);
            let scratch = plan.make_scratch_vec();
            let spectrum = plan.make_output_vec();
            let input = plan.make_input_vec();
            self.fft = Some(FftResources {
                size,
                plan,
                scratch,
                spectrum,
                input,
            });
        }

        self.fft.as_mut().expect("fft resources must exist")
    }
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .field("fft", &self.fft.as_ref().map(|fft| fft.size))
            .finish()
    }
}

/// One contiguous frequency range with its assigned color.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyBand {
    pub low_hz: f32,
    pub high_hz: f32,
    pub color: Color,
}

/// Colors assigned to bands in ascending frequency order, wrapping when more
/// bands than colors are configured.
pub const BAND_COLORS: [Color; 6] = [
    Color::new(255, 0, 0),
    Color::new(255, 127, 0),
    Color::new(255, 255, 0),
    Color::new(0, 255, 0),
    Color::new(0, 0, 255),
    Color::new(148, 0, 211),
];

/// Builds the band partition from ascending boundary frequencies. Boundaries
/// `[60, 250, 500]` yield bands 60–250, 250–500 and 500–nyquist.
pub fn bands_from_boundaries(boundaries: &[i64], nyquist_hz: f32) -> Result<Vec<FrequencyBand>> {
    if boundaries.is_empty() {
        return Err(EffectError::InvalidValue {
            expected: "at least one frequency boundary",
            value: "[]".into(),
        });
    }
    for pair in boundaries.windows(2) {
        if pair[1] <= pair[0] {
            return Err(EffectError::InvalidValue {
                expected: "ascending frequency boundaries",
                value: format!("{boundaries:?}"),
            });
        }
    }

    let mut bands = Vec::with_capacity(boundaries.len());
    for (index, &low) in boundaries.iter().enumerate() {
        let high = boundaries
            .get(index + 1)
            .map(|&next| next as f32)
            .unwrap_or(nyquist_hz);
        if high <= low as f32 {
            break;
        }
        bands.push(FrequencyBand {
            low_hz: low as f32,
            high_hz: high,
            color: BAND_COLORS[index % BAND_COLORS.len()],
        });
    }
    Ok(bands)
}

/// Average magnitude over the band's bins; zero when the band covers none.
fn band_level(magnitudes: &[f32], bin_hz: f32, band: &FrequencyBand) -> f32 {
    if magnitudes.is_empty() || bin_hz <= 0.0 {
        return 0.0;
    }
    let first = (band.low_hz / bin_hz).ceil() as usize;
    let last = ((band.high_hz / bin_hz).floor() as usize).min(magnitudes.len() - 1);
    if last < first {
        return 0.0;
    }
    let sum: f32 = magnitudes[first..=last].iter().sum();
    sum / (last - first + 1) as f32
}

/// Maps frame spectra to a composite color: each band's color weighted by its
/// normalised energy and blended through repeated interpolation. A silent
/// frame holds the previous composite instead of dividing by zero.
pub struct FrequencyColorEngine {
    analyzer: SpectrumAnalyzer,
    bands: Vec<FrequencyBand>,
    last_composite: Color,
}

impl FrequencyColorEngine {
    pub fn new(sample_rate: u32, bands: Vec<FrequencyBand>) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(sample_rate),
            bands,
            last_composite: Color::BLACK,
        }
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    pub fn last_composite(&self) -> Color {
        self.last_composite
    }

    /// Analyses one frame and returns the new composite color.
    pub fn composite(&mut self, frame: &AudioFrame) -> Result<Color> {
        let magnitudes = self.analyzer.magnitudes(&frame.samples)?;
        let bin_hz = self.analyzer.bin_hz(frame.len());

        let mut blended: Option<Color> = None;
        let mut accumulated = 0.0_f32;
        for band in &self.bands {
            let level = band_level(&magnitudes, bin_hz, band);
            if level < MIN_BAND_ENERGY {
                continue;
            }
            blended = Some(match blended {
                None => band.color,
                Some(current) => {
                    // Incremental weighted mean keeps the weights normalised
                    // without a second pass.
                    let t = level / (accumulated + level);
                    lerp_color(current, band.color, t)
                }
            });
            accumulated += level;
        }

        if let Some(color) = blended {
            self.last_composite = color;
        }
        Ok(self.last_composite)
    }
}

impl fmt::Debug for FrequencyColorEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrequencyColorEngine")
            .field("bands", &self.bands.len())
            .field("last_composite", &self.last_composite)
            .finish()
    }
}

/// What the peak detector reports for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeakEvent {
    /// No active flash.
    Quiet,
    /// A new peak crossed the threshold this frame.
    Triggered,
    /// Flash still holding at full intensity.
    Holding,
    /// Fading out; the factor falls linearly from 1 to 0.
    Fading(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PeakPhase {
    Idle,
    Hold { since: f32 },
    Fade { since: f32 },
}

/// RMS threshold detector with a hold-then-fade envelope. Re-triggers are
/// suppressed until the fade completes, so a sustained loud passage produces
/// one flash per envelope instead of a flicker storm.
#[derive(Debug)]
pub struct PeakDetector {
    threshold: f32,
    hold_s: f32,
    fade_s: f32,
    phase: PeakPhase,
}

impl PeakDetector {
    pub fn new(threshold: f32, hold_s: f32, fade_s: f32) -> Self {
        Self {
            threshold,
            hold_s: hold_s.max(0.0),
            fade_s: fade_s.max(f32::EPSILON),
            phase: PeakPhase::Idle,
        }
    }

    /// Feeds one frame's RMS level at `now` seconds since the effect started.
    pub fn update(&mut self, level: f32, now: f32) -> PeakEvent {
        match self.phase {
            PeakPhase::Idle => {
                if level > self.threshold {
                    self.phase = PeakPhase::Hold { since: now };
                    PeakEvent::Triggered
                } else {
                    PeakEvent::Quiet
                }
            }
            PeakPhase::Hold { since } => {
                if now - since <= self.hold_s {
                    PeakEvent::Holding
                } else {
                    self.phase = PeakPhase::Fade { since: now };
                    PeakEvent::Fading(1.0)
                }
            }
            PeakPhase::Fade { since } => {
                let progress = (now - since) / self.fade_s;
                if progress >= 1.0 {
                    self.phase = PeakPhase::Idle;
                    PeakEvent::Quiet
                } else {
                    PeakEvent::Fading(1.0 - progress)
                }
            }
        }
    }
}
