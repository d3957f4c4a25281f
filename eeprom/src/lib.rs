//! A power-loss-tolerant key/value store that emulates EEPROM semantics on
//! raw NOR flash.
//!
//! The host declares a dense set of variable ids (`DATA_NUM` of them) and
//! gets back an [`Eeprom`] handle that can `write`/`read` arbitrary-length
//! payloads under each id, surviving unexpected power loss at any point.
//! See the individual modules for the on-flash layout (`record`,
//! `status`), the addressing math (`geometry`, `index_store`), the write
//! and read sequencing (`protocol`), the A/B region swap
//! (`swap`), and boot-time dispatch (`recovery`).

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod error;
pub mod geometry;
mod index_store;
pub mod record;
mod protocol;
mod recovery;
pub mod status;
mod swap;

pub use error::{ConfigError, Error, ReadError, WriteError};
pub use geometry::Geometry;
pub use record::DataStatus;
pub use status::RegionStatus;

use storage::Flash;

/// A mounted EEPROM-emulation instance over `DATA_NUM` variable ids.
///
/// `DATA_NUM` is a compile-time constant because the id catalog is fixed
/// at build time by the embedding application; there is no runtime
/// registration of new ids.
pub struct Eeprom<F: Flash, const DATA_NUM: usize> {
    flash: F,
    geometry: Geometry,
}

impl<F: Flash, const DATA_NUM: usize> Eeprom<F, DATA_NUM> {
    /// Mount the store, recovering from any interrupted swap or performing
    /// a first-time format if the device is blank.
    ///
    /// `index_start`/`index_swap_start` and `data_start`/`data_swap_start`
    /// name the two mirrored region pairs; which one ends up active is
    /// determined by what is already on flash, not by argument order.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        mut flash: F,
        index_start: usize,
        index_swap_start: usize,
        index_region_sectors: usize,
        index_area_sectors: usize,
        data_start: usize,
        data_swap_start: usize,
        data_region_sectors: usize,
    ) -> Result<Self, Error<F::Error>> {
        let geometry = recovery::init(
            &mut flash,
            index_start,
            index_swap_start,
            index_region_sectors,
            index_area_sectors,
            data_start,
            data_swap_start,
            data_region_sectors,
            DATA_NUM,
        )?;
        Ok(Eeprom { flash, geometry })
    }

    /// Store `payload` under `id`. Ids must be written in order the first
    /// time: writing id *k* before id *k-1* exists fails with
    /// `WriteError::Sequence`.
    pub fn write(&mut self, id: usize, payload: &[u8]) -> Result<(), WriteError<F::Error>> {
        protocol::write(&mut self.flash, &mut self.geometry, DATA_NUM, id, payload)
    }

    /// Resolve `id` to its latest value and copy it into `out`, which must
    /// be at least as long as the stored payload.
    pub fn read(&mut self, id: usize, out: &mut [u8]) -> Result<(), ReadError<F::Error>> {
        protocol::read(&mut self.flash, &self.geometry, id, out)
    }

    /// Borrow the resolved layout, mostly useful for tests and diagnostics.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Release the flash device back to the caller.
    pub fn into_inner(self) -> F {
        self.flash
    }
}
