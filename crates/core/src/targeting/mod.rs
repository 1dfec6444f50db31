use crate::sink::Device;
use crate::EffectError;

/// Which of the sink's devices an effect drives. Resolved once at effect
/// start against the live device list; effects wanting a fresh random subset
/// per iteration re-pick from the resolved snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    #[default]
    All,
    Indices(Vec<usize>),
}

impl DeviceSelector {
    /// An empty index list means every device.
    pub fn from_indices(indices: Vec<usize>) -> Self {
        if indices.is_empty() {
            Self::All
        } else {
            Self::Indices(indices)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Resolves the selection against the sink's device list. Out-of-range
    /// indices are reported as warnings and dropped; the rest proceed, so a
    /// stale selector degrades instead of aborting the run.
    pub fn resolve(&self, devices: &[Device]) -> Vec<Device> {
        match self {
            Self::All => devices.to_vec(),
            Self::Indices(indices) => {
                let mut selected = Vec::with_capacity(indices.len());
                for &index in indices {
                    match devices.get(index) {
                        Some(device) => selected.push(device.clone()),
                        None => {
                            let err = EffectError::UnknownDevice {
                                index,
                                available: devices.len(),
                            };
                            tracing::warn!("dropping device selection entry: {err}");
                        }
                    }
                }
                selected
            }
        }
    }
}
