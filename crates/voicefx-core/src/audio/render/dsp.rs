//! Sample-level processing stages for the software render engine.
//!
//! All stages are mono and process blocks in place. Gain, echo and reverb
//! are fundsp units; the pitch shifter has no fundsp counterpart.

use crate::{
    Analyser,
    audio::{NodeSpec, PlayerState},
};

use std::{f32::consts::PI, sync::Arc};

use fundsp::prelude::{AudioUnit, U2, delay, feedback, join, pass, reverb_stereo, split};

/// Length of the pitch shifter's crossfade window.
const PITCH_WINDOW_SECS: f32 = 0.1;

const REVERB_ROOM_SIZE: f32 = 10.0;
const REVERB_DAMPING: f32 = 0.5;

/// Echo feedback is kept inside this range so the loop stays stable and
/// the repeat normalisation never divides by zero.
const MIN_FEEDBACK: f32 = 0.01;
const MAX_FEEDBACK: f32 = 0.99;

/// In-place block processor.
pub(crate) trait Processor: Send {
    fn process(&mut self, block: &mut [f32]);
}

/// Builds the processor for `spec`. Analysers are built by the engine.
pub(crate) fn processor_for(spec: &NodeSpec, sample_rate: u32) -> Option<Box<dyn Processor>> {
    match *spec {
        NodeSpec::Gain { gain } => Some(Box::new(UnitStage::gain(gain, sample_rate))),
        NodeSpec::PitchShift { semitones } => {
            Some(Box::new(PitchShifter::new(semitones, sample_rate)))
        }
        NodeSpec::FeedbackDelay {
            delay_secs,
            feedback,
            wet,
        } => Some(Box::new(UnitStage::feedback_delay(
            delay_secs,
            feedback,
            wet,
            sample_rate,
        ))),
        NodeSpec::Reverb { decay_secs, wet } => {
            Some(Box::new(UnitStage::reverb(decay_secs, wet, sample_rate)))
        }
        NodeSpec::Analyser { .. } => None,
    }
}

/// Buffer source with variable playback rate.
pub(crate) struct Player {
    samples: Arc<[f32]>,
    rate: f64,
    position: f64,
    state: PlayerState,
}

impl Player {
    pub(crate) fn new(samples: Arc<[f32]>, rate: f32) -> Self {
        Self {
            samples,
            rate: f64::from(rate.max(f32::EPSILON)),
            position: 0.0,
            state: PlayerState::Stopped,
        }
    }

    pub(crate) fn start(&mut self) {
        self.position = 0.0;
        self.state = PlayerState::Started;
    }

    pub(crate) fn stop(&mut self) {
        self.state = PlayerState::Stopped;
    }

    pub(crate) fn state(&self) -> PlayerState {
        self.state
    }

    /// Fills `block`, switching to stopped once the buffer is exhausted.
    pub(crate) fn read(&mut self, block: &mut [f32]) {
        for out in block.iter_mut() {
            if self.state != PlayerState::Started {
                *out = 0.0;
                continue;
            }

            let index = self.position as usize;
            let Some(&current) = self.samples.get(index) else {
                self.state = PlayerState::Stopped;
                *out = 0.0;
                continue;
            };

            // Linear interpolation between neighbouring samples
            let next = self.samples.get(index + 1).copied().unwrap_or(0.0);
            let frac = (self.position - index as f64) as f32;
            *out = current + (next - current) * frac;

            self.position += self.rate;
        }
    }
}

/// Pass-through stage feeding an analysis tap.
pub(crate) struct Tap {
    analyser: Analyser,
}

impl Tap {
    pub(crate) fn new(analyser: Analyser) -> Self {
        Self { analyser }
    }
}

impl Processor for Tap {
    fn process(&mut self, block: &mut [f32]) {
        self.analyser.write_samples(block);
    }
}

/// Delay-line pitch shifter with two crossfaded read heads.
///
/// The heads sweep the window at a rate set by the pitch ratio and are
/// half a window apart, so one is always fading in while the other fades out.
pub(crate) struct PitchShifter {
    buffer: Vec<f32>,
    write_pos: usize,
    window: f32,
    phase: f32,
    phase_step: f32,
}

impl PitchShifter {
    pub(crate) fn new(semitones: f32, sample_rate: u32) -> Self {
        let ratio = 2f32.powf(semitones / 12.0);
        let window = (PITCH_WINDOW_SECS * sample_rate as f32).max(2.0);
        Self {
            buffer: vec![0.0; (window as usize) * 2 + 2],
            write_pos: 0,
            window,
            phase: 0.0,
            phase_step: (1.0 - ratio) / window,
        }
    }

    fn read_delayed(&self, delay: f32) -> f32 {
        let len = self.buffer.len() as f32;
        let pos = (self.write_pos as f32 - delay).rem_euclid(len);
        let i0 = pos as usize % self.buffer.len();
        let i1 = (i0 + 1) % self.buffer.len();
        let frac = pos - pos.floor();
        self.buffer[i0] + (self.buffer[i1] - self.buffer[i0]) * frac
    }
}

impl Processor for PitchShifter {
    fn process(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            self.buffer[self.write_pos] = *sample;

            let phase_a = self.phase;
            let phase_b = (self.phase + 0.5) % 1.0;
            let gain_a = (PI * phase_a).sin().powi(2);
            let gain_b = (PI * phase_b).sin().powi(2);

            *sample = gain_a * self.read_delayed(phase_a * self.window)
                + gain_b * self.read_delayed(phase_b * self.window);

            self.phase = (self.phase + self.phase_step).rem_euclid(1.0);
            self.write_pos = (self.write_pos + 1) % self.buffer.len();
        }
    }
}

/// A mono fundsp unit driven sample by sample.
pub(crate) struct UnitStage {
    unit: Box<dyn AudioUnit>,
}

impl UnitStage {
    fn new(mut unit: Box<dyn AudioUnit>, sample_rate: u32) -> Self {
        unit.set_sample_rate(f64::from(sample_rate));
        unit.reset();
        Self { unit }
    }

    pub(crate) fn gain(gain: f32, sample_rate: u32) -> Self {
        Self::new(Box::new(pass() * gain), sample_rate)
    }

    /// Echo: the delayed signal is fed back into the line and mixed with
    /// the dry input.
    pub(crate) fn feedback_delay(delay_secs: f32, amount: f32, wet: f32, sample_rate: u32) -> Self {
        let amount = amount.clamp(MIN_FEEDBACK, MAX_FEEDBACK);
        let wet = wet.clamp(0.0, 1.0);
        // The loop scales every repeat by `amount`, the first one included.
        let repeats = feedback(delay(delay_secs.into()) * amount) * (wet / amount);
        Self::new(Box::new((pass() * (1.0 - wet)) & repeats), sample_rate)
    }

    /// Stereo fundsp reverb fed the mono signal on both sides and folded
    /// back to mono. `decay_secs` is the time to -60 dB.
    pub(crate) fn reverb(decay_secs: f32, wet: f32, sample_rate: u32) -> Self {
        let wet = wet.clamp(0.0, 1.0);
        let tail = (split::<U2>()
            >> reverb_stereo(
                REVERB_ROOM_SIZE.into(),
                decay_secs.max(0.01).into(),
                REVERB_DAMPING.into(),
            )
            >> join::<U2>())
            * wet;
        Self::new(Box::new((pass() * (1.0 - wet)) & tail), sample_rate)
    }
}

impl Processor for UnitStage {
    fn process(&mut self, block: &mut [f32]) {
        let mut out = [0.0f32; 1];
        for sample in block.iter_mut() {
            self.unit.tick(&[*sample], &mut out);
            *sample = out[0];
        }
    }
}
