//! On-flash index record encoding and the write sequence that advances a
//! record through its lifecycle one bit-clear at a time.

use byteorder::{ByteOrder, LittleEndian};

use storage::{Flash, ReadFlash};

/// On-flash stride of one record slot. Only the first 8 bytes are ever
/// programmed or read; the remaining 8 pad every record so every address
/// formula elsewhere in this crate can multiply by `RECORD_SIZE` rather
/// than track two different strides.
pub const RECORD_SIZE: usize = 16;

const ENCODED_SIZE: usize = 8;

/// Sentinel meaning "no next record in the overwrite chain".
pub const CHAIN_END: u16 = 0xFFFF;

/// Per-record lifecycle state. Every legal transition clears bits only, so
/// the raw values order as EMPTY > INVALID > HALFVALID > VALID when read
/// as unsigned 16-bit integers (P1).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataStatus {
    Empty,
    Invalid,
    HalfValid,
    Valid,
}

impl DataStatus {
    const EMPTY: u16 = 0xFFFF;
    const INVALID: u16 = 0x00FF;
    const HALF_VALID: u16 = 0x000F;
    const VALID: u16 = 0x0000;

    fn from_raw(raw: u16) -> DataStatus {
        match raw {
            Self::EMPTY => DataStatus::Empty,
            Self::INVALID => DataStatus::Invalid,
            Self::HALF_VALID => DataStatus::HalfValid,
            Self::VALID => DataStatus::Valid,
            // A bit pattern outside the four legal values can only come
            // from a crash mid-program; treat it as no further along than
            // INVALID, since no legal sequence skips that stamp.
            _ => DataStatus::Invalid,
        }
    }

    fn to_raw(self) -> u16 {
        match self {
            DataStatus::Empty => Self::EMPTY,
            DataStatus::Invalid => Self::INVALID,
            DataStatus::HalfValid => Self::HALF_VALID,
            DataStatus::Valid => Self::VALID,
        }
    }
}

/// Decoded contents of one record slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IndexRecord {
    pub status: DataStatus,
    pub size: u16,
    pub addr: u16,
    pub overwrite_addr: u16,
}

impl IndexRecord {
    fn decode(buf: &[u8; ENCODED_SIZE]) -> IndexRecord {
        IndexRecord {
            status: DataStatus::from_raw(LittleEndian::read_u16(&buf[0..2])),
            size: LittleEndian::read_u16(&buf[2..4]),
            addr: LittleEndian::read_u16(&buf[4..6]),
            overwrite_addr: LittleEndian::read_u16(&buf[6..8]),
        }
    }
}

/// Read and decode the record at `addr`.
pub fn read_record<F: Flash>(flash: &mut F, addr: usize) -> Result<IndexRecord, F::Error> {
    let mut buf = [0u8; ENCODED_SIZE];
    flash.read(addr, &mut buf)?;
    Ok(IndexRecord::decode(&buf))
}

fn stamp_status<F: Flash>(flash: &mut F, slot_addr: usize, status: DataStatus) -> Result<(), F::Error> {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, status.to_raw());
    flash.program(slot_addr, &buf)
}

/// Program the body fields (everything but the status word) of a record.
/// The 8 reserved trailing bytes are left untouched (still 0xFF from the
/// last erase) since they are never part of the record's meaning.
fn stamp_body<F: Flash>(
    flash: &mut F,
    slot_addr: usize,
    size: u16,
    addr: u16,
    overwrite_addr: u16,
) -> Result<(), F::Error> {
    let mut buf = [0u8; 6];
    LittleEndian::write_u16(&mut buf[0..2], size);
    LittleEndian::write_u16(&mut buf[2..4], addr);
    LittleEndian::write_u16(&mut buf[4..6], overwrite_addr);
    flash.program(slot_addr + 2, &buf)
}

/// Program `tail`'s `dataOverwriteAddr` field, linking a newly written
/// overwrite record into the chain. Only after this call is
/// the new record reachable from a read.
pub fn link_chain<F: Flash>(flash: &mut F, tail_addr: usize, bias: u16) -> Result<(), F::Error> {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, bias);
    flash.program(tail_addr + 6, &buf)
}

/// Stamp a fresh record at `slot_addr` and program its payload at
/// `data_start + data_offset`, walking EMPTY -> INVALID -> HALFVALID ->
/// VALID one bit-clearing program at a time.
pub fn write_record<F: Flash>(
    flash: &mut F,
    slot_addr: usize,
    data_start: usize,
    data_offset: usize,
    payload: &[u8],
) -> Result<(), F::Error> {
    debug_assert!(payload.len() <= u16::MAX as usize);
    debug_assert!(data_offset <= u16::MAX as usize);

    stamp_status(flash, slot_addr, DataStatus::Invalid)?;
    stamp_body(flash, slot_addr, payload.len() as u16, data_offset as u16, CHAIN_END)?;
    stamp_status(flash, slot_addr, DataStatus::HalfValid)?;
    flash.program(data_start + data_offset, payload)?;
    stamp_status(flash, slot_addr, DataStatus::Valid)?;
    Ok(())
}

/// Like [`write_record`], but copies the payload from another flash
/// location in fixed-size chunks instead of from a caller-supplied RAM
/// buffer, for moving a live record across the swap boundary.
pub fn copy_record<F: Flash>(
    flash: &mut F,
    slot_addr: usize,
    src_addr: usize,
    dst_data_start: usize,
    dst_offset: usize,
    size: u16,
) -> Result<(), F::Error> {
    const CHUNK: usize = 64;

    stamp_status(flash, slot_addr, DataStatus::Invalid)?;
    stamp_body(flash, slot_addr, size, dst_offset as u16, CHAIN_END)?;
    stamp_status(flash, slot_addr, DataStatus::HalfValid)?;

    let mut copied = 0usize;
    let size = size as usize;
    let mut buf = [0u8; CHUNK];
    while copied < size {
        let n = CHUNK.min(size - copied);
        flash.read(src_addr + copied, &mut buf[..n])?;
        flash.program(dst_data_start + dst_offset + copied, &buf[..n])?;
        copied += n;
    }

    stamp_status(flash, slot_addr, DataStatus::Valid)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simflash::SimFlash;

    #[test]
    fn write_record_round_trips() {
        let mut flash = SimFlash::new(4096, 1);
        write_record(&mut flash, 0, 2048, 10, &[0xAA, 0xBB, 0xCC]).unwrap();

        let rec = read_record(&mut flash, 0).unwrap();
        assert_eq!(rec.status, DataStatus::Valid);
        assert_eq!(rec.size, 3);
        assert_eq!(rec.addr, 10);
        assert_eq!(rec.overwrite_addr, CHAIN_END);

        let mut payload = [0u8; 3];
        flash.read(2048 + 10, &mut payload).unwrap();
        assert_eq!(payload, [0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn link_chain_updates_overwrite_addr() {
        let mut flash = SimFlash::new(4096, 1);
        write_record(&mut flash, 0, 2048, 0, &[1]).unwrap();
        link_chain(&mut flash, 0, 0x20).unwrap();
        let rec = read_record(&mut flash, 0).unwrap();
        assert_eq!(rec.overwrite_addr, 0x20);
    }

    #[test]
    fn copy_record_moves_payload() {
        let mut flash = SimFlash::new(4096, 1);
        flash.program(1000, &[1, 2, 3, 4, 5]).unwrap();
        copy_record(&mut flash, 0, 1000, 2000, 50, 5).unwrap();

        let rec = read_record(&mut flash, 0).unwrap();
        assert_eq!(rec.status, DataStatus::Valid);
        assert_eq!(rec.size, 5);
        assert_eq!(rec.addr, 50);

        let mut out = [0u8; 5];
        flash.read(2000 + 50, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5]);
    }
}
