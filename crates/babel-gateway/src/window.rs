//! Bus views.
//!
//! [`SystemBus`] is the flat 32-bit view every wide-addressing context uses:
//! plain shared RAM with the gateway register window routed to the register
//! file. [`WindowedBus`] is the view handed to cores whose native address
//! space is narrower than the bus: a 16-bit space flat-mapped onto the
//! context's bank of RAM, with two fixed windows identity-mapped onto the
//! shared mailbox and the gateway register file. Through those windows an
//! 8-bit core reaches 32-bit gateway registers as sequences of byte accesses.

use crate::gateway::GatewayLink;
use crate::layout::{NARROW_GATEWAY_WINDOW, NARROW_MAILBOX_WINDOW};
use babel_proto as proto;
use memory::{BusAccess, BusError, BusResult, SharedRam};

const NARROW_SPACE: u32 = 0x1_0000;

fn mmio_read(gateway: &GatewayLink, offset: u32, size: usize) -> u32 {
    match gateway.upgrade() {
        Some(gw) => gw.lock().expect("gateway lock poisoned").mmio_read(offset, size),
        // Gateway gone: open bus.
        None => 0xFFFF_FFFF,
    }
}

fn mmio_write(gateway: &GatewayLink, offset: u32, size: usize, value: u32) {
    if let Some(gw) = gateway.upgrade() {
        gw.lock()
            .expect("gateway lock poisoned")
            .mmio_write(offset, size, value);
    }
}

/// Flat 32-bit bus view: RAM everywhere, except the 64-byte gateway register
/// window, which takes precedence over the RAM behind it.
#[derive(Clone)]
pub struct SystemBus {
    ram: SharedRam,
    gateway: GatewayLink,
}

impl SystemBus {
    pub(crate) fn new(ram: SharedRam, gateway: GatewayLink) -> Self {
        Self { ram, gateway }
    }

    fn in_window(addr: u32) -> bool {
        (proto::GATEWAY_MMIO_BASE..proto::GATEWAY_MMIO_BASE + proto::GATEWAY_MMIO_SIZE)
            .contains(&addr)
    }

    fn intersects_window(addr: u32, len: usize) -> bool {
        let start = addr as u64;
        let end = start + len as u64;
        start < (proto::GATEWAY_MMIO_BASE + proto::GATEWAY_MMIO_SIZE) as u64
            && end > proto::GATEWAY_MMIO_BASE as u64
    }
}

impl BusAccess for SystemBus {
    fn size(&self) -> u32 {
        self.ram.size()
    }

    fn read_into(&self, addr: u32, dst: &mut [u8]) -> BusResult<()> {
        if !Self::intersects_window(addr, dst.len()) {
            return self.ram.read_into(addr, dst);
        }
        if Self::in_window(addr) && matches!(dst.len(), 1 | 2 | 4) {
            let value = mmio_read(&self.gateway, addr - proto::GATEWAY_MMIO_BASE, dst.len());
            dst.copy_from_slice(&value.to_le_bytes()[..dst.len()]);
            return Ok(());
        }
        // Straddling access: route byte by byte.
        for (i, slot) in dst.iter_mut().enumerate() {
            let byte_addr = addr.wrapping_add(i as u32);
            *slot = if Self::in_window(byte_addr) {
                mmio_read(&self.gateway, byte_addr - proto::GATEWAY_MMIO_BASE, 1) as u8
            } else {
                self.ram.read_u8(byte_addr)?
            };
        }
        Ok(())
    }

    fn write_from(&self, addr: u32, src: &[u8]) -> BusResult<()> {
        if !Self::intersects_window(addr, src.len()) {
            return self.ram.write_from(addr, src);
        }
        if Self::in_window(addr) && matches!(src.len(), 1 | 2 | 4) {
            let mut bytes = [0u8; 4];
            bytes[..src.len()].copy_from_slice(src);
            mmio_write(
                &self.gateway,
                addr - proto::GATEWAY_MMIO_BASE,
                src.len(),
                u32::from_le_bytes(bytes),
            );
            return Ok(());
        }
        for (i, byte) in src.iter().enumerate() {
            let byte_addr = addr.wrapping_add(i as u32);
            if Self::in_window(byte_addr) {
                mmio_write(
                    &self.gateway,
                    byte_addr - proto::GATEWAY_MMIO_BASE,
                    1,
                    u32::from(*byte),
                );
            } else {
                self.ram.write_u8(byte_addr, *byte)?;
            }
        }
        Ok(())
    }

    fn read_u8_acquire(&self, addr: u32) -> BusResult<u8> {
        if Self::in_window(addr) {
            Ok(mmio_read(&self.gateway, addr - proto::GATEWAY_MMIO_BASE, 1) as u8)
        } else {
            self.ram.read_u8_acquire(addr)
        }
    }

    fn write_u8_release(&self, addr: u32, value: u8) -> BusResult<()> {
        if Self::in_window(addr) {
            mmio_write(
                &self.gateway,
                addr - proto::GATEWAY_MMIO_BASE,
                1,
                u32::from(value),
            );
            Ok(())
        } else {
            self.ram.write_u8_release(addr, value)
        }
    }

    fn read_u32_acquire(&self, addr: u32) -> BusResult<u32> {
        if Self::in_window(addr) {
            Ok(mmio_read(&self.gateway, addr - proto::GATEWAY_MMIO_BASE, 4))
        } else {
            self.ram.read_u32_acquire(addr)
        }
    }

    fn write_u32_release(&self, addr: u32, value: u32) -> BusResult<()> {
        if Self::in_window(addr) {
            mmio_write(&self.gateway, addr - proto::GATEWAY_MMIO_BASE, 4, value);
            Ok(())
        } else {
            self.ram.write_u32_release(addr, value)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Ram(u32),
    Gateway(u32),
}

/// 16-bit bus view for narrow-address cores (6502, Z80).
///
/// Address `0x0000..0xFFFF` flat-maps onto the context's RAM bank, except:
/// - [`NARROW_MAILBOX_WINDOW`]: identity-mapped onto the shared mailbox, and
/// - [`NARROW_GATEWAY_WINDOW`]: routed to the gateway register file.
///
/// Request/response buffers referenced by descriptors carry full bus
/// addresses; a narrow caller must stage them at addresses its counterpart
/// can reach. The view does not police that.
#[derive(Clone)]
pub struct WindowedBus {
    ram: SharedRam,
    gateway: GatewayLink,
    bank_base: u32,
}

impl WindowedBus {
    pub(crate) fn new(ram: SharedRam, gateway: GatewayLink, bank_base: u32) -> Self {
        Self {
            ram,
            gateway,
            bank_base,
        }
    }

    fn translate(&self, addr: u32) -> Target {
        let mailbox = NARROW_MAILBOX_WINDOW as u32;
        let gateway = NARROW_GATEWAY_WINDOW as u32;
        if (mailbox..mailbox + proto::MAILBOX_SIZE).contains(&addr) {
            Target::Ram(proto::MAILBOX_BASE + (addr - mailbox))
        } else if (gateway..gateway + proto::GATEWAY_MMIO_SIZE).contains(&addr) {
            Target::Gateway(addr - gateway)
        } else {
            Target::Ram(self.bank_base + addr)
        }
    }

    fn check_range(&self, addr: u32, len: usize) -> BusResult<()> {
        if (addr as u64) + (len as u64) > NARROW_SPACE as u64 {
            return Err(BusError::OutOfRange {
                addr,
                len,
                size: NARROW_SPACE,
            });
        }
        Ok(())
    }

    /// Whether `[addr, addr+len)` translates to one contiguous RAM range.
    fn contiguous_ram(&self, addr: u32, len: usize) -> Option<u32> {
        if len == 0 {
            return Some(0);
        }
        let last = addr + (len as u32 - 1);
        match (self.translate(addr), self.translate(last)) {
            (Target::Ram(start), Target::Ram(end))
                if end - start == last - addr =>
            {
                Some(start)
            }
            _ => None,
        }
    }
}

impl BusAccess for WindowedBus {
    fn size(&self) -> u32 {
        NARROW_SPACE
    }

    fn read_into(&self, addr: u32, dst: &mut [u8]) -> BusResult<()> {
        self.check_range(addr, dst.len())?;
        if let Some(start) = self.contiguous_ram(addr, dst.len()) {
            return self.ram.read_into(start, dst);
        }
        for (i, slot) in dst.iter_mut().enumerate() {
            *slot = match self.translate(addr + i as u32) {
                Target::Ram(a) => self.ram.read_u8(a)?,
                Target::Gateway(off) => mmio_read(&self.gateway, off, 1) as u8,
            };
        }
        Ok(())
    }

    fn write_from(&self, addr: u32, src: &[u8]) -> BusResult<()> {
        self.check_range(addr, src.len())?;
        if let Some(start) = self.contiguous_ram(addr, src.len()) {
            return self.ram.write_from(start, src);
        }
        for (i, byte) in src.iter().enumerate() {
            match self.translate(addr + i as u32) {
                Target::Ram(a) => self.ram.write_u8(a, *byte)?,
                Target::Gateway(off) => mmio_write(&self.gateway, off, 1, u32::from(*byte)),
            }
        }
        Ok(())
    }

    fn read_u8_acquire(&self, addr: u32) -> BusResult<u8> {
        self.check_range(addr, 1)?;
        match self.translate(addr) {
            Target::Ram(a) => self.ram.read_u8_acquire(a),
            Target::Gateway(off) => Ok(mmio_read(&self.gateway, off, 1) as u8),
        }
    }

    fn write_u8_release(&self, addr: u32, value: u8) -> BusResult<()> {
        self.check_range(addr, 1)?;
        match self.translate(addr) {
            Target::Ram(a) => self.ram.write_u8_release(a, value),
            Target::Gateway(off) => {
                mmio_write(&self.gateway, off, 1, u32::from(value));
                Ok(())
            }
        }
    }

    fn read_u32_acquire(&self, addr: u32) -> BusResult<u32> {
        self.check_range(addr, 4)?;
        match self.translate(addr) {
            Target::Ram(a) => self.ram.read_u32_acquire(a),
            Target::Gateway(off) => Ok(mmio_read(&self.gateway, off, 4)),
        }
    }

    fn write_u32_release(&self, addr: u32, value: u32) -> BusResult<()> {
        self.check_range(addr, 4)?;
        match self.translate(addr) {
            Target::Ram(a) => self.ram.write_u32_release(a, value),
            Target::Gateway(off) => {
                mmio_write(&self.gateway, off, 4, value);
                Ok(())
            }
        }
    }
}
