use std::sync::{Arc, Mutex};

use crate::audio::AudioSource;
use crate::color::Color;
use crate::lifecycle::{EffectContext, EffectLifecycle, StopSignal};
use crate::registry::{EffectInfo, EffectRegistry};
use crate::screen::PixelSource;
use crate::sink::DeviceSink;
use crate::{EffectError, Result};

/// Cancellation handle over the controller's single active run. Cloneable and
/// thread-safe, so a front end can signal from an interrupt handler or a
/// watchdog thread while `run_effect` blocks the main one. Stopping with
/// nothing running is a no-op.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    slot: Arc<Mutex<Option<StopSignal>>>,
}

impl StopHandle {
    pub fn stop(&self) {
        if let Ok(slot) = self.slot.lock() {
            if let Some(signal) = slot.as_ref() {
                signal.trigger();
            }
        }
    }

    fn install(&self, signal: StopSignal) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(signal);
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

/// Top-level façade: connect to the sink, list and describe effects, drive
/// one effect at a time on the calling thread.
pub struct Controller {
    sink: Box<dyn DeviceSink>,
    registry: EffectRegistry,
    audio: Option<Box<dyn AudioSource>>,
    screen: Option<Box<dyn PixelSource>>,
    connected: bool,
    active: StopHandle,
}

impl Controller {
    /// Builds a controller over the given sink with every built-in effect.
    /// Fails only on a registry integrity violation.
    pub fn new(sink: Box<dyn DeviceSink>) -> Result<Self> {
        Ok(Self::with_registry(sink, EffectRegistry::with_builtins()?))
    }

    pub fn with_registry(sink: Box<dyn DeviceSink>, registry: EffectRegistry) -> Self {
        Self {
            sink,
            registry,
            audio: None,
            screen: None,
            connected: false,
            active: StopHandle::default(),
        }
    }

    /// Installs the capture source audio effects read from.
    pub fn set_audio_source(&mut self, source: Box<dyn AudioSource>) {
        self.audio = Some(source);
    }

    /// Installs the capture source screen effects read from.
    pub fn set_pixel_source(&mut self, source: Box<dyn PixelSource>) {
        self.screen = Some(source);
    }

    /// Acquires the device sink. Surfaced errors are final; the caller owns
    /// any retry policy.
    pub fn connect(&mut self) -> Result<()> {
        self.sink.connect()?;
        self.connected = true;
        match self.sink.list_devices() {
            Ok(devices) => {
                tracing::info!(count = devices.len(), "connected to device sink");
                for device in &devices {
                    tracing::info!(index = device.index, name = %device.name, leds = device.leds, "device");
                }
            }
            Err(err) => tracing::warn!("connected, but device enumeration failed: {err}"),
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn list_effects(&self) -> Vec<&str> {
        self.registry.list()
    }

    pub fn describe_effect(&self, name: &str) -> Result<EffectInfo> {
        self.registry.describe(name)
    }

    /// Resolves `name`, merges `overrides` over the effect's defaults, and
    /// drives the lifecycle on the calling thread until it stops. Exactly one
    /// effect runs per controller at a time; the borrow rules already forbid
    /// a second concurrent call.
    pub fn run_effect(&mut self, name: &str, overrides: &[(String, String)]) -> Result<()> {
        if !self.connected {
            return Err(EffectError::Connection(
                "not connected to the device sink".into(),
            ));
        }
        let descriptor = self.registry.resolve(name)?;
        let options = descriptor.merge_options(overrides)?;
        let mut effect = descriptor.instantiate(&options);

        let mut lifecycle = EffectLifecycle::new();
        self.active.install(lifecycle.stop_signal());
        tracing::info!(effect = name, "starting effect");

        let result = match EffectContext::new(self.sink.as_mut(), &options, lifecycle.stop_signal())
        {
            Ok(mut ctx) => {
                if let Some(source) = self.audio.as_deref_mut() {
                    ctx = ctx.with_audio(source);
                }
                if let Some(source) = self.screen.as_deref_mut() {
                    ctx = ctx.with_screen(source);
                }
                lifecycle.run(effect.as_mut(), &mut ctx)
            }
            Err(err) => Err(err),
        };

        self.active.clear();
        match &result {
            Ok(()) => tracing::info!(effect = name, "effect stopped"),
            Err(err) => tracing::error!(effect = name, "effect ended with error: {err}"),
        }
        result
    }

    /// Signals the active run to stop; idempotent when nothing is running.
    pub fn stop(&self) {
        self.active.stop();
    }

    /// Handle for stopping the active run from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.active.clone()
    }

    /// Turns every device off, independent of any effect targeting.
    pub fn turn_off_all(&mut self) -> Result<()> {
        for device in self.sink.list_devices()? {
            self.sink.set_color(&device, Color::BLACK)?;
        }
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            self.sink.disconnect()?;
            self.connected = false;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("connected", &self.connected)
            .field("effects", &self.registry.len())
            .field("audio", &self.audio.is_some())
            .field("screen", &self.screen.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::sink::MemorySink;

    fn overrides(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn connected_controller(devices: usize) -> (Controller, MemorySink) {
        let sink = MemorySink::new(devices);
        let observer = sink.clone();
        let mut controller = Controller::new(Box::new(sink)).unwrap();
        controller.connect().unwrap();
        (controller, observer)
    }

    /// Stops the controller after a short grace period, from another thread.
    fn stop_after(controller: &Controller, delay: Duration) -> std::thread::JoinHandle<()> {
        let handle = controller.stop_handle();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            handle.stop();
        })
    }

    #[test]
    fn lists_builtin_effects_in_order() {
        let (controller, _) = connected_controller(1);
        let names = controller.list_effects();
        assert_eq!(names[0], "Static");
        assert!(names.contains(&"AudioLoopback"));
    }

    #[test]
    fn run_requires_a_connection() {
        let mut controller = Controller::new(Box::new(MemorySink::new(1))).unwrap();
        let err = controller.run_effect("Static", &[]).unwrap_err();
        assert!(matches!(err, EffectError::Connection(_)));
    }

    #[test]
    fn unknown_effects_and_options_abort_before_start() {
        let (mut controller, observer) = connected_controller(1);

        let err = controller.run_effect("Disco", &[]).unwrap_err();
        assert!(matches!(err, EffectError::UnknownEffect(_)));

        let err = controller
            .run_effect("Static", &overrides(&[("colour", "red")]))
            .unwrap_err();
        assert!(matches!(err, EffectError::UnknownOption(_)));

        let err = controller
            .run_effect("Static", &overrides(&[("color", "blurple")]))
            .unwrap_err();
        assert!(matches!(err, EffectError::InvalidOption { .. }));

        // Nothing was pushed by any of the refused runs.
        assert!(observer.pushes().is_empty());
    }

    #[test]
    fn static_scenario_pushes_the_scaled_color_every_iteration() {
        let (mut controller, observer) = connected_controller(3);
        let watchdog = stop_after(&controller, Duration::from_millis(60));

        controller
            .run_effect(
                "Static",
                &overrides(&[
                    ("color", "#00FF00"),
                    ("max_brightness", "50%"),
                    ("sleep_s", "0.005"),
                ]),
            )
            .unwrap();
        watchdog.join().unwrap();

        let pushes = observer.pushes();
        // Start plus several iterations across all three devices.
        assert!(pushes.len() >= 6);
        let expected = Color::new(0, 127, 0);
        assert!(pushes.iter().all(|(_, color)| *color == expected));
        // No drift: the final state equals the first push.
        assert_eq!(observer.current(), vec![expected; 3]);
    }

    #[test]
    fn device_selector_degrades_to_the_valid_subset() {
        let (mut controller, observer) = connected_controller(3);
        let watchdog = stop_after(&controller, Duration::from_millis(30));

        controller
            .run_effect(
                "Static",
                &overrides(&[("devices", "[0,5]"), ("sleep_s", "0.005")]),
            )
            .unwrap();
        watchdog.join().unwrap();

        let pushes = observer.pushes();
        assert!(!pushes.is_empty());
        assert!(pushes.iter().all(|(index, _)| *index == 0));
    }

    #[test]
    fn stop_is_idempotent_when_nothing_runs() {
        let (controller, _) = connected_controller(1);
        controller.stop();
        controller.stop();
    }

    #[test]
    fn audio_effects_fail_cleanly_without_a_source() {
        let (mut controller, _) = connected_controller(1);
        let err = controller
            .run_effect("Audio", &overrides(&[("sleep_s", "0.001")]))
            .unwrap_err();
        assert!(matches!(err, EffectError::Capture(_)));
    }

    #[test]
    fn turn_off_all_blacks_out_every_device() {
        let (mut controller, observer) = connected_controller(2);
        let watchdog = stop_after(&controller, Duration::from_millis(30));
        controller
            .run_effect("Static", &overrides(&[("sleep_s", "0.005")]))
            .unwrap();
        watchdog.join().unwrap();

        controller.turn_off_all().unwrap();
        assert_eq!(observer.current(), vec![Color::BLACK; 2]);
    }

    #[test]
    fn disconnect_after_a_run_leaves_the_sink_released() {
        let (mut controller, observer) = connected_controller(1);
        controller.disconnect().unwrap();
        assert!(!controller.is_connected());
        assert!(!observer.is_connected());
    }
}
