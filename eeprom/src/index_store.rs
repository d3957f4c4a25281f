//! Index-store helpers: the free-cursor and overwrite-chain bookkeeping
//! that let addressing stay O(chain length) instead of a full scan.

use byteorder::{ByteOrder, LittleEndian};

use storage::{Flash, ReadFlash};

use crate::geometry::Geometry;
use crate::record::{self, DataStatus, CHAIN_END, RECORD_SIZE};

/// Lowest offset in the data region known to be unused.
pub fn free_data_addr<F: Flash>(
    flash: &mut F,
    geometry: &Geometry,
    data_num: usize,
) -> Result<usize, F::Error> {
    let mut free_addr = 0usize;

    for id in (0..data_num).rev() {
        let addr = geometry.index_start_addr + id * RECORD_SIZE;
        let rec = record::read_record(flash, addr)?;
        if matches!(rec.status, DataStatus::Valid | DataStatus::HalfValid) {
            free_addr = rec.addr as usize + rec.size as usize;
            break;
        }
    }

    let occupied = overwrite_slot_count(flash, geometry)?;
    for slot in (0..occupied).rev() {
        let addr = geometry.overwrite_addr + slot * RECORD_SIZE;
        let rec = record::read_record(flash, addr)?;
        if matches!(rec.status, DataStatus::Valid | DataStatus::HalfValid) {
            let candidate = rec.addr as usize + rec.size as usize;
            if candidate > free_addr {
                free_addr = candidate;
            }
            break;
        }
    }

    Ok(free_addr)
}

/// Advance the unary overwrite counter by one bit. Must run before the
/// corresponding overwrite slot is programmed: if power is lost between
/// the two, recovery sees a counter one ahead of the slots actually
/// written, which every reader already tolerates.
pub fn count_area_plus_one<F: Flash>(flash: &mut F, geometry: &Geometry) -> Result<(), F::Error> {
    let bitmap_start = geometry.overwrite_addr - geometry.overwrite_count_area_size;
    let mut offset = 0;
    while offset < geometry.overwrite_count_area_size {
        let mut buf = [0u8; 4];
        flash.read(bitmap_start + offset, &mut buf)?;
        let word = LittleEndian::read_u32(&buf);
        if word != 0 {
            LittleEndian::write_u32(&mut buf, word << 1);
            flash.program(bitmap_start + offset, &buf)?;
            return Ok(());
        }
        offset += 4;
    }
    Ok(())
}

/// Number of overwrite slots currently occupied: the count of cleared
/// bits in the counter bitmap, read word by word from the low end.
pub fn overwrite_slot_count<F: Flash>(flash: &mut F, geometry: &Geometry) -> Result<usize, F::Error> {
    let bitmap_start = geometry.overwrite_addr - geometry.overwrite_count_area_size;
    let mut count = 0usize;
    let mut offset = 0;
    while offset < geometry.overwrite_count_area_size {
        let mut buf = [0u8; 4];
        flash.read(bitmap_start + offset, &mut buf)?;
        let word = LittleEndian::read_u32(&buf);
        if word == 0 {
            count += 32;
            offset += 4;
            continue;
        }
        count += word.trailing_zeros() as usize;
        break;
    }
    Ok(count)
}

/// Address of the next free overwrite slot.
pub fn overwrite_free_addr<F: Flash>(flash: &mut F, geometry: &Geometry) -> Result<usize, F::Error> {
    Ok(geometry.overwrite_addr + overwrite_slot_count(flash, geometry)? * RECORD_SIZE)
}

/// Address of the tail record of `id`'s overwrite chain. Returns
/// the primary slot address itself when the chain is empty.
pub fn last_not_overwritten<F: Flash>(
    flash: &mut F,
    geometry: &Geometry,
    id: usize,
) -> Result<usize, F::Error> {
    let mut addr = geometry.index_start_addr + id * RECORD_SIZE;
    loop {
        let rec = record::read_record(flash, addr)?;
        if rec.overwrite_addr == CHAIN_END {
            return Ok(addr);
        }
        addr = geometry.overwrite_addr + rec.overwrite_addr as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simflash::SimFlash;

    fn geometry(flash: &SimFlash) -> Geometry {
        Geometry::new(flash, 0, 0x2000, 2, 1, 0x4000, 0x5000, 1, 3).unwrap()
    }

    #[test]
    fn free_data_addr_is_zero_on_fresh_region() {
        let flash_dev = SimFlash::new(4096, 8);
        let geometry = geometry(&flash_dev);
        let mut flash = flash_dev;
        assert_eq!(free_data_addr(&mut flash, &geometry, 3).unwrap(), 0);
    }

    #[test]
    fn free_data_addr_follows_last_written_primary_slot() {
        let flash_dev = SimFlash::new(4096, 8);
        let geometry = geometry(&flash_dev);
        let mut flash = flash_dev;
        record::write_record(&mut flash, geometry.index_start_addr, geometry.data_start_addr, 0, &[1, 2, 3])
            .unwrap();
        assert_eq!(free_data_addr(&mut flash, &geometry, 3).unwrap(), 3);
    }

    #[test]
    fn count_area_plus_one_clears_one_more_bit() {
        let flash_dev = SimFlash::new(4096, 8);
        let geometry = geometry(&flash_dev);
        let mut flash = flash_dev;
        assert_eq!(overwrite_slot_count(&mut flash, &geometry).unwrap(), 0);
        count_area_plus_one(&mut flash, &geometry).unwrap();
        assert_eq!(overwrite_slot_count(&mut flash, &geometry).unwrap(), 1);
        count_area_plus_one(&mut flash, &geometry).unwrap();
        assert_eq!(overwrite_slot_count(&mut flash, &geometry).unwrap(), 2);
    }

    #[test]
    fn last_not_overwritten_follows_chain() {
        let flash_dev = SimFlash::new(4096, 8);
        let geometry = geometry(&flash_dev);
        let mut flash = flash_dev;
        let primary = geometry.index_start_addr;
        record::write_record(&mut flash, primary, geometry.data_start_addr, 0, &[1, 2, 3]).unwrap();
        assert_eq!(last_not_overwritten(&mut flash, &geometry, 0).unwrap(), primary);

        count_area_plus_one(&mut flash, &geometry).unwrap();
        let ow_free = geometry.overwrite_addr;
        record::write_record(&mut flash, ow_free, geometry.data_start_addr, 3, &[4, 5]).unwrap();
        record::link_chain(&mut flash, primary, (ow_free - geometry.overwrite_addr) as u16).unwrap();

        assert_eq!(last_not_overwritten(&mut flash, &geometry, 0).unwrap(), ow_free);
    }
}
