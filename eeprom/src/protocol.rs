//! Write and read sequencing: the id-range and sequence checks, the
//! bit-clear ordering that makes a write atomic-on-recovery, and the
//! chain walk that resolves a read to the latest value.

use storage::{Flash, ReadFlash};

use crate::error::{ReadError, WriteError};
use crate::geometry::Geometry;
use crate::index_store;
use crate::record::{self, DataStatus, RECORD_SIZE};
use crate::swap;

fn primary_slot_addr(geometry: &Geometry, id: usize) -> usize {
    geometry.index_start_addr + id * RECORD_SIZE
}

fn id_in_range(geometry: &Geometry, id: usize) -> bool {
    let bitmap_start = geometry.overwrite_addr - geometry.overwrite_count_area_size;
    primary_slot_addr(geometry, id) < bitmap_start
}

/// Store `payload` under `id`, triggering a region swap if either the
/// index area or the data region has run out of room.
pub fn write<F: Flash>(
    flash: &mut F,
    geometry: &mut Geometry,
    data_num: usize,
    id: usize,
    payload: &[u8],
) -> Result<(), WriteError<F::Error>> {
    if !id_in_range(geometry, id) {
        return Err(WriteError::IdOutOfRange);
    }

    if id > 0 {
        let prev = record::read_record(flash, primary_slot_addr(geometry, id - 1)).map_err(WriteError::Flash)?;
        if matches!(prev.status, DataStatus::Empty | DataStatus::Invalid) {
            return Err(WriteError::Sequence);
        }
    }

    let slot_addr = primary_slot_addr(geometry, id);
    let mut data_free = index_store::free_data_addr(flash, geometry, data_num).map_err(WriteError::Flash)?;
    let primary = record::read_record(flash, slot_addr).map_err(WriteError::Flash)?;

    if primary.status == DataStatus::Empty {
        return record::write_record(flash, slot_addr, geometry.data_start_addr, data_free, payload)
            .map_err(WriteError::Flash);
    }

    let mut tail_addr = index_store::last_not_overwritten(flash, geometry, id).map_err(WriteError::Flash)?;
    let mut ow_free = index_store::overwrite_free_addr(flash, geometry).map_err(WriteError::Flash)?;

    let index_region_end = geometry.index_region_base + geometry.index_region_size();
    let data_region_end = geometry.data_region_size();
    if ow_free + RECORD_SIZE > index_region_end || data_free + payload.len() > data_region_end {
        swap::swap(flash, geometry, data_num).map_err(WriteError::Flash)?;
        data_free = index_store::free_data_addr(flash, geometry, data_num).map_err(WriteError::Flash)?;
        tail_addr = primary_slot_addr(geometry, id);
        ow_free = geometry.overwrite_addr;
    }

    index_store::count_area_plus_one(flash, geometry).map_err(WriteError::Flash)?;
    record::write_record(flash, ow_free, geometry.data_start_addr, data_free, payload).map_err(WriteError::Flash)?;

    let bias = (ow_free - geometry.overwrite_addr) as u16;
    record::link_chain(flash, tail_addr, bias).map_err(WriteError::Flash)?;

    Ok(())
}

/// Resolve `id` to its latest value and copy it into `out`, which must be
/// at least as long as the stored payload.
pub fn read<F: Flash>(
    flash: &mut F,
    geometry: &Geometry,
    id: usize,
    out: &mut [u8],
) -> Result<(), ReadError<F::Error>> {
    if !id_in_range(geometry, id) {
        return Err(ReadError::IdOutOfRange);
    }

    let slot_addr = primary_slot_addr(geometry, id);
    let primary = record::read_record(flash, slot_addr).map_err(ReadError::Flash)?;

    if primary.status == DataStatus::Empty {
        return Err(ReadError::NotWritten);
    }

    let live = if primary.overwrite_addr != record::CHAIN_END {
        let tail_addr = index_store::last_not_overwritten(flash, geometry, id).map_err(ReadError::Flash)?;
        record::read_record(flash, tail_addr).map_err(ReadError::Flash)?
    } else if primary.status == DataStatus::Valid {
        primary
    } else {
        return Err(ReadError::Invalid);
    };

    let dst = &mut out[..live.size as usize];
    flash
        .read(geometry.data_start_addr + live.addr as usize, dst)
        .map_err(ReadError::Flash)?;
    Ok(())
}
