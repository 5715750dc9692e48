use crate::bus::{BusAccess, BusError, BusResult};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Shared bus RAM backed by atomic byte cells.
///
/// Cloning a `SharedRam` produces another handle to the same storage; every
/// CPU context holds its own clone. Bulk accesses use relaxed per-byte
/// atomics; they are data-race-free but carry no ordering on their own.
/// Cross-context publication (ring head/tail bytes, response status words)
/// goes through the acquire/release accessors, whose synchronizing byte pairs
/// a release store on the producer side with an acquire load on the consumer
/// side; the relaxed payload bytes written before the release store are then
/// visible after the matching acquire load.
#[derive(Clone)]
pub struct SharedRam {
    cells: Arc<[AtomicU8]>,
}

impl SharedRam {
    /// Allocates `size` bytes of zeroed shared RAM.
    pub fn new(size: u32) -> Self {
        let cells: Vec<AtomicU8> = (0..size).map(|_| AtomicU8::new(0)).collect();
        Self {
            cells: cells.into(),
        }
    }

    #[inline]
    fn check_range(&self, addr: u32, len: usize) -> BusResult<usize> {
        let start = addr as usize;
        let end = start
            .checked_add(len)
            .ok_or(BusError::OutOfRange {
                addr,
                len,
                size: self.size(),
            })?;
        if end > self.cells.len() {
            return Err(BusError::OutOfRange {
                addr,
                len,
                size: self.size(),
            });
        }
        Ok(start)
    }

    /// Zero-fills `[addr, addr + len)`.
    pub fn zero_range(&self, addr: u32, len: usize) -> BusResult<()> {
        let start = self.check_range(addr, len)?;
        for cell in &self.cells[start..start + len] {
            cell.store(0, Ordering::Relaxed);
        }
        Ok(())
    }
}

impl BusAccess for SharedRam {
    fn size(&self) -> u32 {
        self.cells.len() as u32
    }

    fn read_into(&self, addr: u32, dst: &mut [u8]) -> BusResult<()> {
        let start = self.check_range(addr, dst.len())?;
        for (slot, cell) in dst.iter_mut().zip(&self.cells[start..]) {
            *slot = cell.load(Ordering::Relaxed);
        }
        Ok(())
    }

    fn write_from(&self, addr: u32, src: &[u8]) -> BusResult<()> {
        let start = self.check_range(addr, src.len())?;
        for (byte, cell) in src.iter().zip(&self.cells[start..]) {
            cell.store(*byte, Ordering::Relaxed);
        }
        Ok(())
    }

    fn read_u8_acquire(&self, addr: u32) -> BusResult<u8> {
        let start = self.check_range(addr, 1)?;
        Ok(self.cells[start].load(Ordering::Acquire))
    }

    fn write_u8_release(&self, addr: u32, value: u8) -> BusResult<()> {
        let start = self.check_range(addr, 1)?;
        self.cells[start].store(value, Ordering::Release);
        Ok(())
    }

    fn read_u32_acquire(&self, addr: u32) -> BusResult<u32> {
        let start = self.check_range(addr, 4)?;
        let b0 = self.cells[start].load(Ordering::Acquire);
        let b1 = self.cells[start + 1].load(Ordering::Relaxed);
        let b2 = self.cells[start + 2].load(Ordering::Relaxed);
        let b3 = self.cells[start + 3].load(Ordering::Relaxed);
        Ok(u32::from_le_bytes([b0, b1, b2, b3]))
    }

    fn write_u32_release(&self, addr: u32, value: u32) -> BusResult<()> {
        let start = self.check_range(addr, 4)?;
        let bytes = value.to_le_bytes();
        self.cells[start + 1].store(bytes[1], Ordering::Relaxed);
        self.cells[start + 2].store(bytes[2], Ordering::Relaxed);
        self.cells[start + 3].store(bytes[3], Ordering::Relaxed);
        self.cells[start].store(bytes[0], Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn read_write_primitives_aligned_and_unaligned() {
        let ram = SharedRam::new(64);

        ram.write_u16(2, 0x1122).unwrap();
        ram.write_u32(4, 0x3344_5566).unwrap();
        ram.write_u32(9, 0xdead_beef).unwrap();

        assert_eq!(ram.read_u16(2).unwrap(), 0x1122);
        assert_eq!(ram.read_u32(4).unwrap(), 0x3344_5566);
        assert_eq!(ram.read_u32(9).unwrap(), 0xdead_beef);
        assert_eq!(ram.read_u8(9).unwrap(), 0xef);
    }

    #[test]
    fn clones_alias_the_same_storage() {
        let a = SharedRam::new(16);
        let b = a.clone();

        a.write_u32(8, 0x0102_0304).unwrap();
        assert_eq!(b.read_u32(8).unwrap(), 0x0102_0304);

        b.write_u8(8, 0xAA).unwrap();
        assert_eq!(a.read_u32(8).unwrap(), 0x0102_03AA);
    }

    #[test]
    fn out_of_range_returns_error_without_panicking() {
        let ram = SharedRam::new(16);
        assert!(matches!(
            ram.read_u32(14),
            Err(BusError::OutOfRange { .. })
        ));
        assert!(matches!(
            ram.write_from(16, &[1]),
            Err(BusError::OutOfRange { .. })
        ));
        assert!(matches!(
            ram.read_into(u32::MAX, &mut [0u8; 2]),
            Err(BusError::OutOfRange { .. })
        ));
    }

    #[test]
    fn zero_range_clears_bytes() {
        let ram = SharedRam::new(32);
        ram.write_from(4, &[0xFF; 8]).unwrap();
        ram.zero_range(6, 4).unwrap();

        let mut buf = [0u8; 8];
        ram.read_into(4, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF, 0, 0, 0, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn synchronized_accessors_round_trip() {
        let ram = SharedRam::new(16);

        ram.write_u8_release(0, 0x5A).unwrap();
        assert_eq!(ram.read_u8_acquire(0).unwrap(), 0x5A);

        ram.write_u32_release(4, 0x0102_0304).unwrap();
        assert_eq!(ram.read_u32_acquire(4).unwrap(), 0x0102_0304);
        // Plain accessors observe the same bytes.
        assert_eq!(ram.read_u32(4).unwrap(), 0x0102_0304);
    }

    proptest! {
        #[test]
        fn bulk_write_then_read_round_trips(
            addr in 0u32..0x380,
            data in proptest::collection::vec(any::<u8>(), 1..128),
        ) {
            let ram = SharedRam::new(0x400);
            prop_assume!(addr as usize + data.len() <= 0x400);

            ram.write_from(addr, &data).unwrap();
            let mut back = vec![0u8; data.len()];
            ram.read_into(addr, &mut back).unwrap();
            prop_assert_eq!(back, data);
        }
    }
}
