//! Region swap engine: copies the live dataset to the mirror region and
//! advances the four-state region lifecycle, so boot-time recovery can
//! always land on a single consistent active side.

use storage::Flash;

use crate::geometry::Geometry;
use crate::index_store;
use crate::record::{self, DataStatus, RECORD_SIZE};
use crate::status::{self, RegionStatus};

#[cfg(feature = "defmt")]
use defmt::{debug, trace};

/// Erase every sector in `[base, base+len)` unconditionally.
fn erase_region<F: Flash>(flash: &mut F, base: usize, len: usize, sector_size: usize) -> Result<(), F::Error> {
    let mut offset = 0;
    while offset < len {
        flash.erase_sector(base + offset)?;
        offset += sector_size;
    }
    Ok(())
}

/// Bring the swap side up to date and fold the live dataset into it.
/// Called both when the active side's index or data area is full, and
/// when `recovery::init` resumes a swap interrupted mid-flight.
pub fn swap<F: Flash>(flash: &mut F, geometry: &mut Geometry, data_num: usize) -> Result<(), F::Error> {
    let swap_status = status::read_status(flash, geometry.index_swap_region_base)?;

    #[cfg(feature = "defmt")]
    trace!("swap: swap-side status = {}", swap_status);

    if matches!(
        swap_status,
        RegionStatus::Copy | RegionStatus::Active | RegionStatus::Erasing
    ) {
        status::erase_verify(
            flash,
            geometry.index_swap_region_base,
            geometry.index_region_size(),
            geometry.sector_size,
        )?;
        status::erase_verify(
            flash,
            geometry.data_swap_start_addr,
            geometry.data_region_size(),
            geometry.sector_size,
        )?;
        status::stamp_status(flash, geometry.index_swap_region_base, RegionStatus::Verified)?;
    }

    copy_live(flash, geometry, data_num)
}

/// Copy every live id's current value to the swap side, then flip which
/// side is active.
fn copy_live<F: Flash>(flash: &mut F, geometry: &mut Geometry, data_num: usize) -> Result<(), F::Error> {
    status::stamp_status(flash, geometry.index_swap_region_base, RegionStatus::Copy)?;

    let mut dst_cursor = 0usize;
    for id in 0..data_num {
        let primary_addr = geometry.index_start_addr + id * RECORD_SIZE;
        let primary = record::read_record(flash, primary_addr)?;
        if primary.status == DataStatus::Empty {
            continue;
        }

        let live = if primary.overwrite_addr != record::CHAIN_END {
            let tail_addr = index_store::last_not_overwritten(flash, geometry, id)?;
            record::read_record(flash, tail_addr)?
        } else if primary.status == DataStatus::Valid {
            primary
        } else {
            // Interrupted write with no successor: never committed.
            continue;
        };

        let dst_slot = geometry.index_swap_start_addr + id * RECORD_SIZE;
        record::copy_record(
            flash,
            dst_slot,
            geometry.data_start_addr + live.addr as usize,
            geometry.data_swap_start_addr,
            dst_cursor,
            live.size,
        )?;
        dst_cursor += live.size as usize;
    }

    geometry.swap_sides();

    #[cfg(feature = "defmt")]
    debug!("swap: new active side at {}", geometry.index_region_base);

    // From here on `index_region_base`/`index_swap_region_base` name the
    // new active and new swap sides. The old active can only become
    // ERASING by actually being erased, not by a bit-clearing program
    // (ERASING has more set bits than ACTIVE), so stamping the new side
    // active and erasing the old one are two separate operations, not one
    // status transition.
    status::stamp_status(flash, geometry.index_region_base, RegionStatus::Active)?;
    flash.erase_sector(geometry.index_swap_region_base)?;
    erase_region(
        flash,
        geometry.index_swap_region_base + geometry.sector_size,
        geometry.index_region_size() - geometry.sector_size,
        geometry.sector_size,
    )?;
    erase_region(
        flash,
        geometry.data_swap_start_addr,
        geometry.data_region_size(),
        geometry.sector_size,
    )?;

    Ok(())
}
