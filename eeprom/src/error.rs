//! Error taxonomy.
//!
//! Every fallible entry point returns one of the small enums below rather
//! than an integer code. Each one carries a `Flash(E)` variant for faults
//! raised by the underlying `storage::Flash` device, alongside the
//! taxonomy specific to that operation.

use core::fmt::Debug;

/// Failure building or recovering an [`crate::Eeprom`] at `init`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConfigError {
    /// `indexAreaSectors` was not strictly smaller than `indexRegionSectors`.
    IndexAreaNotSmallerThanRegion,
    /// The primary index array (`DATA_NUM` records of 16 bytes) does not
    /// fit within `indexAreaSectors`.
    IndexArrayDoesNotFit,
}

/// Top-level error returned by [`crate::Eeprom::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E: Debug> {
    Flash(E),
    Config(ConfigError),
}

impl<E: Debug> From<ConfigError> for Error<E> {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

/// Failure from [`crate::Eeprom::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError<E: Debug> {
    Flash(E),
    /// The id's primary slot would fall outside the index area.
    IdOutOfRange,
    /// Ids must be written in order the first time; an earlier id was
    /// never written.
    Sequence,
}

/// Failure from [`crate::Eeprom::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError<E: Debug> {
    Flash(E),
    /// The id's primary slot would fall outside the index area.
    IdOutOfRange,
    /// The slot has never been written.
    NotWritten,
    /// A write to this id was interrupted and never superseded.
    Invalid,
}
