//! Flash driver contract.
//!
//! `eeprom` is built against the `Flash` trait here rather than against any
//! particular chip. A flash device only needs to provide three primitives:
//!
//! - `read`: raw read, no restrictions.
//! - `program`: writes bytes at an address, but may only clear bits (1 -> 0).
//!   Programming a 0 over an already-0 bit is a no-op; programming a 1 over a
//!   0 is undefined and callers must never attempt it.
//! - `erase_sector`: erases the sector containing an address back to all-0xFF.
//!
//! The error type is associated rather than fixed, so a simulator can layer
//! its own fault-injection error alongside plain bounds errors (`simflash`
//! does exactly this). `Error` below is the plain bounds-checking error a
//! straightforward implementation can return as-is.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

use core::fmt::Debug;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An address or length fell outside the device's capacity.
    OutOfBounds,
    /// An address was not a multiple of the required alignment (the sector
    /// size, for `erase_sector`).
    NotAligned,
    /// A `program` call tried to set a bit from 0 to 1. Real NOR flash cannot
    /// do this; a simulator that catches it is cheaper than debugging the
    /// corruption on hardware.
    BitSetViolation,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Read-only view into flash.
pub trait ReadFlash {
    type Error: Debug;

    /// Total addressable bytes.
    fn capacity(&self) -> usize;
    /// Raw read of `dst.len()` bytes starting at `offset`.
    fn read(&mut self, offset: usize, dst: &mut [u8]) -> core::result::Result<(), Self::Error>;
}

/// Flash that can be programmed and erased.
pub trait Flash: ReadFlash {
    /// Minimum erase granularity, and the alignment required of every
    /// `erase_sector` address.
    fn sector_size(&self) -> usize;

    /// Clear bits at `offset` to match `src`. Only 1 -> 0 transitions are
    /// permitted; the caller is responsible for never attempting the reverse.
    fn program(&mut self, offset: usize, src: &[u8]) -> core::result::Result<(), Self::Error>;

    /// Erase the sector containing `offset` to all-0xFF.
    fn erase_sector(&mut self, offset: usize) -> core::result::Result<(), Self::Error>;
}

/// Validate a read or program call against a device's capacity. Neither
/// operation is constrained to sector alignment; only erase is.
pub fn check_bounds(capacity: usize, offset: usize, length: usize) -> Result<()> {
    if length > capacity || offset > capacity - length {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}

/// Validate an erase call against a device's capacity and sector alignment.
pub fn check_erase(capacity: usize, sector_size: usize, offset: usize) -> Result<()> {
    check_bounds(capacity, offset, sector_size)?;
    if offset % sector_size != 0 {
        return Err(Error::NotAligned);
    }
    Ok(())
}
