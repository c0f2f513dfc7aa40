//! In-memory model of the amplifier behind the control API.

use shared::{error::DeviceFault, protocol::DeviceStatus};

#[derive(Debug, Clone)]
pub struct Amplifier {
    power: bool,
    mute: bool,
    source: String,
    sources: Vec<String>,
    volume: u8,
    max_volume: u8,
}

impl Amplifier {
    /// Starts powered off, unmuted, on `initial_source` (or the first known source).
    pub fn new(sources: Vec<String>, initial_source: Option<String>, max_volume: u8) -> Self {
        let source = initial_source
            .filter(|source| sources.contains(source))
            .or_else(|| sources.first().cloned())
            .unwrap_or_default();
        Self {
            power: false,
            mute: false,
            source,
            sources,
            volume: max_volume / 4,
            max_volume,
        }
    }

    pub fn is_on(&self) -> bool {
        self.power
    }

    pub fn is_muted(&self) -> bool {
        self.mute
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Power state plus, when on, the mute flag and current source.
    pub fn power_status(&self) -> DeviceStatus {
        if self.power {
            DeviceStatus::ok()
                .with_mute(self.mute)
                .with_source(self.source.clone())
        } else {
            DeviceStatus::not_ok()
        }
    }

    pub fn toggle_power(&mut self) -> DeviceStatus {
        self.power = !self.power;
        self.power_status()
    }

    /// `ok` mirrors the mute flag so a mute button lights while muted.
    pub fn mute_status(&self) -> Result<DeviceStatus, DeviceFault> {
        self.ensure_on()?;
        Ok(DeviceStatus {
            ok: self.mute,
            ..DeviceStatus::default()
        }
        .with_mute(self.mute))
    }

    pub fn toggle_mute(&mut self) -> Result<DeviceStatus, DeviceFault> {
        self.ensure_on()?;
        self.mute = !self.mute;
        self.mute_status()
    }

    pub fn source_status(&self) -> Result<DeviceStatus, DeviceFault> {
        self.ensure_on()?;
        Ok(DeviceStatus::ok().with_source(self.source.clone()))
    }

    pub fn select_source(&mut self, source: &str) -> Result<DeviceStatus, DeviceFault> {
        self.ensure_on()?;
        if !self.sources.iter().any(|known| known == source) {
            return Err(DeviceFault::UnknownSource);
        }
        self.source = source.to_string();
        Ok(DeviceStatus::ok().with_source(self.source.clone()))
    }

    pub fn volume_up(&mut self) -> Result<DeviceStatus, DeviceFault> {
        self.ensure_on()?;
        self.volume = self.volume.saturating_add(1).min(self.max_volume);
        Ok(DeviceStatus::ok())
    }

    pub fn volume_down(&mut self) -> Result<DeviceStatus, DeviceFault> {
        self.ensure_on()?;
        self.volume = self.volume.saturating_sub(1);
        Ok(DeviceStatus::ok())
    }

    fn ensure_on(&self) -> Result<(), DeviceFault> {
        if self.power {
            Ok(())
        } else {
            Err(DeviceFault::PoweredOff)
        }
    }
}
