//! Flash device profiles.
//!
//! Real NOR flash varies mostly in erase granularity; `eeprom` only cares
//! about sector size (the constraint `erase_sector` must respect) and total
//! capacity. The profiles below span the range of chips the engine is meant
//! to run across, named after the parts whose erase geometry they copy.

use crate::SimFlash;

/// Sector size and sector count for one simulated device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceProfile {
    pub sector_size: usize,
    pub sectors: usize,
}

impl DeviceProfile {
    pub fn build(&self) -> SimFlash {
        SimFlash::new(self.sector_size, self.sectors)
    }
}

/// STM32F4-style: a small number of large sectors.
pub static STM32F_STYLE: DeviceProfile = DeviceProfile {
    sector_size: 128 * 1024,
    sectors: 4,
};

/// K64-style: small uniform sectors, the common case.
pub static K64_STYLE: DeviceProfile = DeviceProfile {
    sector_size: 4 * 1024,
    sectors: 64,
};

/// External SPI NOR: same uniform 4K-sector shape as K64, smaller device.
pub static EXT_STYLE: DeviceProfile = DeviceProfile {
    sector_size: 4 * 1024,
    sectors: 16,
};

/// Page-style devices, based on the LPC55S69: very small erase units.
pub static LPC_STYLE: DeviceProfile = DeviceProfile {
    sector_size: 512,
    sectors: 256,
};

/// Large-sector dual-bank device, based on the STM32H745.
pub static STM32H_STYLE: DeviceProfile = DeviceProfile {
    sector_size: 128 * 1024,
    sectors: 8,
};

/// All device profiles, for tests that want to run a scenario across every
/// sector-size shape `eeprom` is expected to handle.
pub static ALL_STYLES: [&DeviceProfile; 5] = [
    &STM32F_STYLE,
    &K64_STYLE,
    &EXT_STYLE,
    &LPC_STYLE,
    &STM32H_STYLE,
];

/// An iterator that builds a fresh device for each profile.
pub fn all_flashes() -> impl Iterator<Item = SimFlash> {
    ALL_STYLES.iter().map(|style| style.build())
}
