//! Boot recovery: inspects both region-status words and routes to
//! normal mount, resuming an interrupted swap, first format, or a
//! reset-to-format path for any pair that shouldn't otherwise occur.
//!
//! This dispatch is a single `match` over the `(active, swap)` status
//! tuple with disjoint arms, unlike the C source it replaces, where a
//! missing `break` let the ERASING/ERASING arm fall through into the
//! COPY/VERIFIED handling.

use storage::Flash;

use crate::error::Error;
use crate::geometry::Geometry;
use crate::status::{self, RegionStatus};
use crate::swap;

#[cfg(feature = "defmt")]
use defmt::warn;

/// Read both region-status words, resolve which side is active, and
/// return a `Geometry` ready for `write`/`read`. Idempotent across cold
/// boots: calling this again after a clean shutdown just re-derives the
/// same geometry.
#[allow(clippy::too_many_arguments)]
pub fn init<F: Flash>(
    flash: &mut F,
    index_a: usize,
    index_b: usize,
    index_region_sectors: usize,
    index_area_sectors: usize,
    data_a: usize,
    data_b: usize,
    data_region_sectors: usize,
    data_num: usize,
) -> Result<Geometry, Error<F::Error>> {
    let status_a = status::read_status(flash, index_a).map_err(Error::Flash)?;
    let status_b = status::read_status(flash, index_b).map_err(Error::Flash)?;

    use RegionStatus::{Active, Copy, Erasing, Verified};

    let (active_index, swap_index, active_data, swap_data, resume_swap, format) = match (status_a, status_b) {
        (Active, Erasing) => (index_a, index_b, data_a, data_b, false, false),
        (Active, Copy) | (Active, Verified) => (index_a, index_b, data_a, data_b, true, false),
        (Erasing, Erasing) => (index_a, index_b, data_a, data_b, false, true),
        (Erasing, Active) => (index_b, index_a, data_b, data_a, false, false),
        (Copy, Active) | (Verified, Active) => (index_b, index_a, data_b, data_a, true, false),
        _ => {
            #[cfg(feature = "defmt")]
            warn!("recovery: unrecognized region-status pair, resetting to format");
            (index_a, index_b, data_a, data_b, false, true)
        }
    };

    let mut geometry = Geometry::new(
        flash,
        active_index,
        swap_index,
        index_region_sectors,
        index_area_sectors,
        active_data,
        swap_data,
        data_region_sectors,
        data_num,
    )?;

    if format {
        format_fresh(flash, &geometry)?;
    } else if resume_swap {
        swap::swap(flash, &mut geometry, data_num).map_err(Error::Flash)?;
    }

    Ok(geometry)
}

/// Erase all four sub-regions, verify erased, and stamp the chosen active
/// side ACTIVE.
fn format_fresh<F: Flash>(flash: &mut F, geometry: &Geometry) -> Result<(), Error<F::Error>> {
    status::erase_verify(flash, geometry.index_region_base, geometry.index_region_size(), geometry.sector_size)
        .map_err(Error::Flash)?;
    status::erase_verify(
        flash,
        geometry.index_swap_region_base,
        geometry.index_region_size(),
        geometry.sector_size,
    )
    .map_err(Error::Flash)?;
    status::erase_verify(flash, geometry.data_start_addr, geometry.data_region_size(), geometry.sector_size)
        .map_err(Error::Flash)?;
    status::erase_verify(
        flash,
        geometry.data_swap_start_addr,
        geometry.data_region_size(),
        geometry.sector_size,
    )
    .map_err(Error::Flash)?;

    status::stamp_status(flash, geometry.index_region_base, RegionStatus::Active).map_err(Error::Flash)
}
