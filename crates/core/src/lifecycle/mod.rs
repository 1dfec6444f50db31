use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use rand::seq::SliceRandom;

use crate::audio::{AudioFrame, AudioSource};
use crate::color::Color;
use crate::options::EffectOptions;
use crate::screen::{PixelFrame, PixelSource};
use crate::sink::{Device, DeviceSink};
use crate::{EffectError, Result};

/// Capability contract every effect implements. The lifecycle calls `start`
/// once, `tick` per iteration, and `stop` exactly once on the way out.
pub trait Effect: Send {
    /// One-time setup: palette precompute, capture handle checks. Runs after
    /// the device snapshot has been taken.
    fn start(&mut self, ctx: &mut EffectContext<'_>) -> Result<()>;

    /// One iteration: compute colors and push them.
    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome>;

    /// Teardown; expected to leave the devices in a deliberate state.
    fn stop(&mut self, ctx: &mut EffectContext<'_>) -> Result<()>;
}

/// What an iteration asks of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sleep for the configured `sleep_s`, then tick again.
    Continue,
    /// Sleep for an effect-computed delay instead.
    ContinueAfter(Duration),
    /// Bounded iteration reached its natural end.
    Finished,
}

/// Lifecycle phases of one running effect. `Stopped` is terminal; re-running
/// requires a fresh lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Cancellation flag shared between the lifecycle and whoever may stop it.
/// Every sleep in the engine goes through [`StopSignal::wait_timeout`], so a
/// stop takes effect within one sleep interval instead of after it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    shared: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let (flag, condvar) = &*self.shared;
        let mut triggered = match flag.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *triggered = true;
        condvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (flag, _) = &*self.shared;
        match flag.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Sleeps up to `timeout`, returning early when triggered. Returns
    /// whether the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.shared;
        let guard = match flag.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (guard, _) = match condvar.wait_timeout_while(guard, timeout, |triggered| !*triggered) {
            Ok(outcome) => outcome,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard
    }
}

/// Everything one running effect may touch: the sink, the resolved target
/// snapshot, its options, the stop signal, and the optional capture sources.
/// The helpers mirror what every effect needs — clamped pushes honoring
/// `max_brightness`, a raw push for full-intensity flashes, and blackout.
pub struct EffectContext<'a> {
    sink: &'a mut dyn DeviceSink,
    audio: Option<&'a mut dyn AudioSource>,
    screen: Option<&'a mut dyn PixelSource>,
    options: &'a EffectOptions,
    targets: Vec<Device>,
    stop: StopSignal,
}

impl<'a> EffectContext<'a> {
    /// Snapshots the device list and resolves the configured selection.
    pub fn new(
        sink: &'a mut dyn DeviceSink,
        options: &'a EffectOptions,
        stop: StopSignal,
    ) -> Result<Self> {
        let devices = sink.list_devices()?;
        let targets = options.devices().resolve(&devices);
        Ok(Self {
            sink,
            audio: None,
            screen: None,
            options,
            targets,
            stop,
        })
    }

    /// Attaches the audio capture source.
    pub fn with_audio(mut self, source: &'a mut dyn AudioSource) -> Self {
        self.audio = Some(source);
        self
    }

    /// Attaches the screen capture source.
    pub fn with_screen(mut self, source: &'a mut dyn PixelSource) -> Self {
        self.screen = Some(source);
        self
    }

    pub fn options(&self) -> &EffectOptions {
        self.options
    }

    /// The devices this run drives, fixed at start.
    pub fn targets(&self) -> &[Device] {
        &self.targets
    }

    /// Picks one target uniformly at random; `None` when nothing is targeted.
    pub fn random_target(&self) -> Option<Device> {
        self.targets.choose(&mut rand::thread_rng()).cloned()
    }

    /// Pushes `color` scaled by `max_brightness` to every target.
    pub fn fill(&mut self, color: Color) -> Result<()> {
        let scaled = color.scaled(self.options.max_brightness());
        for device in &self.targets {
            self.sink.set_color(device, scaled)?;
        }
        Ok(())
    }

    /// Pushes `color` scaled by `max_brightness` to one device.
    pub fn fill_device(&mut self, device: &Device, color: Color) -> Result<()> {
        self.sink
            .set_color(device, color.scaled(self.options.max_brightness()))
    }

    /// Pushes `color` as-is, bypassing the brightness clamp.
    pub fn fill_device_unclamped(&mut self, device: &Device, color: Color) -> Result<()> {
        self.sink.set_color(device, color)
    }

    /// Turns every target off.
    pub fn blackout(&mut self) -> Result<()> {
        for device in &self.targets {
            self.sink.set_color(device, Color::BLACK)?;
        }
        Ok(())
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Reads one frame from the capture source. `Ok(None)` means no new data
    /// this tick; the caller skips or reuses its previous state.
    pub fn read_audio(&mut self, sample_count: usize) -> Result<Option<AudioFrame>> {
        match self.audio.as_deref_mut() {
            Some(source) => source.read_frame(sample_count),
            None => Err(EffectError::Capture("no audio source installed".into())),
        }
    }

    pub fn has_screen(&self) -> bool {
        self.screen.is_some()
    }

    /// Captures one screen frame. `Ok(None)` means nothing new this tick.
    pub fn read_screen(&mut self) -> Result<Option<PixelFrame>> {
        match self.screen.as_deref_mut() {
            Some(source) => source.capture_frame(),
            None => Err(EffectError::Capture("no screen source installed".into())),
        }
    }

    /// Interruptible sleep; returns whether a stop was requested.
    pub fn wait(&self, duration: Duration) -> bool {
        self.stop.wait_timeout(duration)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_triggered()
    }
}

/// Drives one effect through `Created → Running → Stopping → Stopped`.
///
/// Failure policy inside the loop: transient errors are logged and the run
/// proceeds to the next tick; fatal errors (sink gone) end the run. The
/// teardown hook runs exactly once in every path, including when `start`
/// itself fails, so devices are never left mid-update.
pub struct EffectLifecycle {
    state: LifecycleState,
    stop: StopSignal,
}

impl EffectLifecycle {
    pub fn new() -> Self {
        Self::with_signal(StopSignal::new())
    }

    pub fn with_signal(stop: StopSignal) -> Self {
        Self {
            state: LifecycleState::Created,
            stop,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// A clone of the signal that cancels this lifecycle.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs the effect to completion on the calling thread. Returns the
    /// fatal error that ended the run, if any.
    pub fn run(&mut self, effect: &mut dyn Effect, ctx: &mut EffectContext<'_>) -> Result<()> {
        if self.state != LifecycleState::Created {
            return Err(EffectError::InvalidValue {
                expected: "fresh lifecycle",
                value: format!("{:?}", self.state),
            });
        }
        self.state = LifecycleState::Running;

        let mut failure = match effect.start(ctx) {
            Ok(()) => None,
            Err(err) => Some(err),
        };

        if failure.is_none() {
            let sleep = ctx.options().sleep();
            while !self.stop.is_triggered() {
                match effect.tick(ctx) {
                    Ok(TickOutcome::Continue) => {
                        if ctx.wait(sleep) {
                            break;
                        }
                    }
                    Ok(TickOutcome::ContinueAfter(delay)) => {
                        if ctx.wait(delay) {
                            break;
                        }
                    }
                    Ok(TickOutcome::Finished) => break,
                    Err(err) if err.is_fatal() => {
                        tracing::error!("effect iteration failed fatally: {err}");
                        failure = Some(err);
                        break;
                    }
                    Err(err) => {
                        tracing::warn!("effect iteration failed, skipping tick: {err}");
                        if ctx.wait(sleep) {
                            break;
                        }
                    }
                }
            }
        }

        self.state = LifecycleState::Stopping;
        if let Err(err) = effect.stop(ctx) {
            tracing::warn!("effect teardown failed: {err}");
        }
        self.state = LifecycleState::Stopped;

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for EffectLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
