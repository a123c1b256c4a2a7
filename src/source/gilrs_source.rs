use gilrs::{Axis, Event, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

use crate::source::{SampleSource, SourceError, StickReading};

/// Full-scale value of one stick axis
const AXIS_SCALE: f32 = 127.0;

/// Reads the left stick of the first connected gamepad
pub struct GilrsSource {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
}

impl GilrsSource {
    pub fn create() -> Result<Self, SourceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(SourceError::InitializationError(e.to_string()));
            }
        };

        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = gilrs.gamepads().collect();
        let active_gamepad = match gamepads.first() {
            Some((id, gamepad)) => {
                info!("Found {} gamepads, using {} ({})", gamepads.len(), gamepad.name(), id);
                Some(*id)
            }
            None => {
                warn!("No gamepad connected, waiting for one");
                None
            }
        };

        Ok(Self {
            gilrs,
            active_gamepad,
        })
    }

    /// Applies pending connect and disconnect events
    fn drain_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected if self.active_gamepad.is_none() => {
                    info!("Gamepad {} connected, selecting it", id);
                    self.active_gamepad = Some(id);
                }
                EventType::Disconnected if self.active_gamepad == Some(id) => {
                    warn!("Active gamepad {} disconnected", id);
                    self.active_gamepad = None;
                }
                _ => {}
            }
        }
    }
}

impl SampleSource for GilrsSource {
    fn read(&mut self) -> Result<StickReading, SourceError> {
        self.drain_events();

        let id = self.active_gamepad.ok_or(SourceError::NoGamepad)?;
        let gamepad = self.gilrs.gamepad(id);
        if !gamepad.is_connected() {
            debug!("Gamepad {} not connected", id);
            return Err(SourceError::NoGamepad);
        }

        Ok(StickReading::new(
            scale_axis(gamepad.value(Axis::LeftStickX)),
            scale_axis(gamepad.value(Axis::LeftStickY)),
        ))
    }

    fn name(&self) -> String {
        match self.active_gamepad {
            Some(id) => format!("gamepad {}", self.gilrs.gamepad(id).name()),
            None => "gamepad (none)".to_string(),
        }
    }
}

/// Maps a normalized axis value onto the signed 8-bit stick range
fn scale_axis(value: f32) -> i8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * AXIS_SCALE).round() as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_axis() {
        assert_eq!(scale_axis(0.0), 0);
        assert_eq!(scale_axis(1.0), 127);
        assert_eq!(scale_axis(-1.0), -127);
        assert_eq!(scale_axis(0.5), 64);
        assert_eq!(scale_axis(-0.504), -64);
    }

    #[test]
    fn test_scale_axis_out_of_range() {
        assert_eq!(scale_axis(3.0), 127);
        assert_eq!(scale_axis(-3.0), -127);
        assert_eq!(scale_axis(f32::NAN), 0);
    }
}
