use std::f32::consts::TAU;

use glam::Vec3;

use crate::{
    device::GpuDevice,
    storage::{CommitState, DrawStorage},
    types::WindMode,
};

/// Sway period in milliseconds, `None` for objects without wind.
fn wind_period_ms(mode: WindMode) -> Option<u64> {
    match mode {
        WindMode::None => None,
        WindMode::Wind => Some(3000),
        WindMode::Wind2 => Some(1500),
    }
}

/// Sway factor of an object at `time_ms`. Objects are phase shifted by their
/// position so neighbours don't move in lockstep.
pub fn wind_sway(mode: WindMode, intensity: f32, time_ms: u64, position: Vec3) -> f32 {
    let Some(period) = wind_period_ms(mode) else {
        return 0.0;
    };
    let phase = (time_ms % period) as f32 / period as f32 * TAU + (position.x + position.z) * 0.01;
    intensity * phase.sin()
}

impl<D: GpuDevice> DrawStorage<D> {
    /// Advances per object animation state to `time_ms`: expires finished
    /// morph layers and writes the current wind sway of every wind animated
    /// object into its instance.
    ///
    /// Morph layers never reach the instance descriptor, they are only
    /// exposed through [`crate::ItemRef::morph_layers`].
    pub fn pre_frame_update(&mut self, time_ms: u64) {
        profiling::scope!("DrawStorage::pre_frame_update");

        let mut touched = false;
        for (_, object) in self.objects.iter_mut() {
            object.morph.retain(|layer| !layer.is_finished(time_ms));

            if object.wind == WindMode::None {
                continue;
            }
            let Some(slot) = object.instance else {
                continue;
            };
            let sway = wind_sway(
                object.wind,
                object.wind_intensity,
                time_ms,
                object.transform.w_axis.truncate(),
            );
            self.instances.update(slot, |desc| desc.wind = sway);
            touched = true;
        }

        if touched {
            self.state = CommitState::Dirty;
        }
    }
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::wind_sway;
    use crate::types::WindMode;

    #[test]
    fn no_wind_never_sways() {
        assert_eq!(wind_sway(WindMode::None, 5.0, 750, Vec3::ZERO), 0.0);
    }

    #[test]
    fn sway_follows_period() {
        // A quarter period in, at the origin, the sway peaks.
        let sway = wind_sway(WindMode::Wind, 2.0, 750, Vec3::ZERO);
        assert!((sway - 2.0).abs() < 1e-4);

        let faster = wind_sway(WindMode::Wind2, 2.0, 375, Vec3::ZERO);
        assert!((faster - 2.0).abs() < 1e-4);
    }

    #[test]
    fn sway_is_periodic() {
        let position = Vec3::new(10.0, 0.0, 4.0);
        let a = wind_sway(WindMode::Wind, 1.0, 100, position);
        let b = wind_sway(WindMode::Wind, 1.0, 3100, position);
        assert!((a - b).abs() < 1e-5);
    }
}
