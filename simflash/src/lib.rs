//! In-memory NOR flash simulator.
//!
//! `SimFlash` backs `storage::Flash` with a `Vec<u8>`, enforcing the same
//! "program only clears bits" and "erase restores 0xFF" rules a real chip
//! would, so tests exercise the same discipline `eeprom` must observe on
//! hardware. `FaultInjector` wraps any `Flash` to cut power after a fixed
//! number of calls, for the crash-recovery tests in `eeprom`.

use std::fmt;

use storage::{check_bounds, check_erase, Error as StorageError, Flash, ReadFlash};

pub mod styles;

/// A flash device backed by a flat in-memory buffer.
pub struct SimFlash {
    sector_size: usize,
    data: Vec<u8>,
}

impl SimFlash {
    /// Build a device of `sectors` sectors of `sector_size` bytes each,
    /// starting fully erased.
    pub fn new(sector_size: usize, sectors: usize) -> SimFlash {
        SimFlash {
            sector_size,
            data: vec![0xFFu8; sector_size * sectors],
        }
    }
}

impl ReadFlash for SimFlash {
    type Error = StorageError;

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, offset: usize, dst: &mut [u8]) -> Result<(), Self::Error> {
        check_bounds(self.data.len(), offset, dst.len())?;
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }
}

impl Flash for SimFlash {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn program(&mut self, offset: usize, src: &[u8]) -> Result<(), Self::Error> {
        check_bounds(self.data.len(), offset, src.len())?;
        let dst = &mut self.data[offset..offset + src.len()];
        if dst.iter().zip(src).any(|(&old, &new)| new & !old != 0) {
            return Err(StorageError::BitSetViolation);
        }
        for (d, &s) in dst.iter_mut().zip(src) {
            *d &= s;
        }
        Ok(())
    }

    fn erase_sector(&mut self, offset: usize) -> Result<(), Self::Error> {
        check_erase(self.data.len(), self.sector_size, offset)?;
        self.data[offset..offset + self.sector_size].fill(0xFF);
        Ok(())
    }
}

/// Error returned by a `FaultInjector`-wrapped device: either the inner
/// device failed on its own, or the injector cut power before the call
/// could complete.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultError<E> {
    Device(E),
    PowerLoss,
}

impl<E: fmt::Debug> fmt::Display for FaultError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultError::Device(e) => write!(f, "device error: {:?}", e),
            FaultError::PowerLoss => write!(f, "power loss"),
        }
    }
}

/// Wraps a `Flash` and allows only a fixed number of `program`/`erase_sector`
/// calls to complete before simulating a power loss on the next one.
///
/// Reads are never faulted: the crash model is "power is cut between two
/// flash write operations", not "reads fail".
pub struct FaultInjector<F> {
    inner: F,
    budget: Option<usize>,
}

impl<F> FaultInjector<F> {
    /// No injected fault: every call passes through to `inner`.
    pub fn new(inner: F) -> FaultInjector<F> {
        FaultInjector {
            inner,
            budget: None,
        }
    }

    /// Allow exactly `budget` more program/erase calls to complete, then
    /// fail the next one with `PowerLoss`.
    pub fn with_budget(inner: F, budget: usize) -> FaultInjector<F> {
        FaultInjector {
            inner,
            budget: Some(budget),
        }
    }

    /// Number of program/erase calls that will still succeed before the
    /// injected fault fires, or `None` if no fault is armed.
    pub fn remaining(&self) -> Option<usize> {
        self.budget
    }

    pub fn into_inner(self) -> F {
        self.inner
    }

    fn tick(&mut self) -> Result<(), FaultError<F::Error>>
    where
        F: Flash,
    {
        match self.budget {
            None => Ok(()),
            Some(0) => Err(FaultError::PowerLoss),
            Some(n) => {
                self.budget = Some(n - 1);
                Ok(())
            }
        }
    }
}

impl<F: ReadFlash> ReadFlash for FaultInjector<F> {
    type Error = FaultError<F::Error>;

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn read(&mut self, offset: usize, dst: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.read(offset, dst).map_err(FaultError::Device)
    }
}

impl<F: Flash> Flash for FaultInjector<F> {
    fn sector_size(&self) -> usize {
        self.inner.sector_size()
    }

    fn program(&mut self, offset: usize, src: &[u8]) -> Result<(), Self::Error> {
        self.tick()?;
        self.inner.program(offset, src).map_err(FaultError::Device)
    }

    fn erase_sector(&mut self, offset: usize) -> Result<(), Self::Error> {
        self.tick()?;
        self.inner
            .erase_sector(offset)
            .map_err(FaultError::Device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erase_then_program_roundtrip() {
        let mut f = SimFlash::new(16, 4);
        assert_eq!(f.capacity(), 64);
        f.erase_sector(16).unwrap();
        f.program(16, &[0x01, 0x02, 0x03]).unwrap();
        let mut buf = [0u8; 3];
        f.read(16, &mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x02, 0x03]);
    }

    #[test]
    fn program_can_only_clear_bits() {
        let mut f = SimFlash::new(16, 1);
        f.program(0, &[0b1100_1100]).unwrap();
        // Clearing further bits is fine.
        f.program(0, &[0b1000_0000]).unwrap();
        let mut buf = [0u8; 1];
        f.read(0, &mut buf).unwrap();
        assert_eq!(buf[0], 0b1000_0000);
        // Trying to set a cleared bit back to 1 is rejected.
        assert_eq!(
            f.program(0, &[0b0100_0000]),
            Err(StorageError::BitSetViolation)
        );
    }

    #[test]
    fn erase_requires_sector_alignment() {
        let mut f = SimFlash::new(16, 4);
        assert_eq!(f.erase_sector(1), Err(StorageError::NotAligned));
    }

    #[test]
    fn fault_injector_cuts_power_after_budget() {
        let mut f = FaultInjector::with_budget(SimFlash::new(16, 4), 1);
        f.erase_sector(0).unwrap();
        assert_eq!(f.program(0, &[1]), Err(FaultError::PowerLoss));
    }

    #[test]
    fn fault_injector_passes_through_device_errors() {
        let mut f = FaultInjector::new(SimFlash::new(16, 4));
        assert_eq!(
            f.erase_sector(1),
            Err(FaultError::Device(StorageError::NotAligned))
        );
    }
}
