use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::{EffectError, Result};

/// One addressable device as reported by the sink. Identity is owned by the
/// sink; the engine only computes colors to push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub index: usize,
    pub name: String,
    pub leds: usize,
}

/// Contract of the external lighting-control endpoint. The engine treats it
/// as an opaque color sink; transport details live behind implementations.
pub trait DeviceSink: Send {
    fn connect(&mut self) -> Result<()>;
    fn list_devices(&self) -> Result<Vec<Device>>;
    fn set_color(&mut self, device: &Device, color: Color) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
}

/// In-memory sink that records every push. Serves as the demo backend of the
/// command line app and as the double in tests; clones share state, so a
/// handle kept before handing the sink over can observe the run afterwards.
#[derive(Debug, Clone)]
pub struct MemorySink {
    shared: Arc<Mutex<SinkState>>,
}

#[derive(Debug)]
struct SinkState {
    devices: Vec<Device>,
    pushes: Vec<(usize, Color)>,
    current: Vec<Color>,
    connected: bool,
}

impl MemorySink {
    pub fn new(device_count: usize) -> Self {
        let devices = (0..device_count)
            .map(|index| Device {
                index,
                name: format!("virtual-{index}"),
                leds: 8,
            })
            .collect();
        Self {
            shared: Arc::new(Mutex::new(SinkState {
                devices,
                pushes: Vec::new(),
                current: vec![Color::BLACK; device_count],
                connected: false,
            })),
        }
    }

    /// Every `(device index, color)` push in arrival order.
    pub fn pushes(&self) -> Vec<(usize, Color)> {
        match self.lock() {
            Ok(state) => state.pushes.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// The last color pushed to each device.
    pub fn current(&self) -> Vec<Color> {
        match self.lock() {
            Ok(state) => state.current.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().map(|state| state.connected).unwrap_or(false)
    }

    /// Drops the connection out from under the engine, as a vanished server
    /// would. Subsequent pushes fail fatally.
    pub fn sever(&self) {
        if let Ok(mut state) = self.lock() {
            state.connected = false;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SinkState>> {
        self.shared
            .lock()
            .map_err(|_| EffectError::Connection("sink state has been poisoned".into()))
    }
}

impl DeviceSink for MemorySink {
    fn connect(&mut self) -> Result<()> {
        let mut state = self.lock()?;
        state.connected = true;
        tracing::debug!(devices = state.devices.len(), "memory sink connected");
        Ok(())
    }

    fn list_devices(&self) -> Result<Vec<Device>> {
        let state = self.lock()?;
        if !state.connected {
            return Err(EffectError::SinkDisconnected);
        }
        Ok(state.devices.clone())
    }

    fn set_color(&mut self, device: &Device, color: Color) -> Result<()> {
        let mut state = self.lock()?;
        if !state.connected {
            return Err(EffectError::SinkDisconnected);
        }
        if device.index >= state.devices.len() {
            return Err(EffectError::UnknownDevice {
                index: device.index,
                available: state.devices.len(),
            });
        }
        state.pushes.push((device.index, color));
        state.current[device.index] = color;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut state = self.lock()?;
        state.connected = false;
        Ok(())
    }
}
