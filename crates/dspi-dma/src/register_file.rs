use dspi_core::constants::MODULE_SIZE;
use hashbrown::HashMap;

use crate::Error;

/// Slot holding the DMA engine. Modules of a run occupy the following slots
/// in combination order.
pub const DMA_SLOT: usize = 0;

/// Memory mapped registers of the accelerator, one window per module slot.
///
/// Registers are 32 bit words addressed by byte offset within the slot's
/// window. Implementations must reject offsets outside the window.
pub trait RegisterFile {
    fn write(&mut self, slot: usize, offset: u32, value: u32) -> error_stack::Result<(), Error>;

    fn read(&self, slot: usize, offset: u32) -> error_stack::Result<u32, Error>;
}

/// A single recorded register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RegisterWrite {
    pub slot: usize,
    pub offset: u32,
    pub value: u32,
}

/// Register file backed by host memory.
///
/// Keeps the last value of every register and the log of all writes.
#[derive(Debug, Default)]
pub struct MemoryRegisterFile {
    slot_count: usize,
    values: HashMap<(usize, u32), u32>,
    writes: Vec<RegisterWrite>,
}

impl MemoryRegisterFile {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slot_count,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> &[RegisterWrite] {
        &self.writes
    }

    /// Writes made to one slot, in order.
    pub fn slot_writes(&self, slot: usize) -> impl Iterator<Item = &RegisterWrite> + '_ {
        self.writes.iter().filter(move |write| write.slot == slot)
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.writes.clear();
    }

    fn check_bounds(&self, slot: usize, offset: u32) -> error_stack::Result<(), Error> {
        debug_assert_eq!(offset % 4, 0, "unaligned register offset {offset:#x}");
        error_stack::ensure!(
            slot < self.slot_count && (offset as usize) < MODULE_SIZE,
            Error::RegisterOutOfBounds { slot, offset }
        );
        Ok(())
    }
}

impl RegisterFile for MemoryRegisterFile {
    fn write(&mut self, slot: usize, offset: u32, value: u32) -> error_stack::Result<(), Error> {
        self.check_bounds(slot, offset)?;
        self.values.insert((slot, offset), value);
        self.writes.push(RegisterWrite {
            slot,
            offset,
            value,
        });
        Ok(())
    }

    fn read(&self, slot: usize, offset: u32) -> error_stack::Result<u32, Error> {
        self.check_bounds(slot, offset)?;
        Ok(self.values.get(&(slot, offset)).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut registers = MemoryRegisterFile::new(2);
        registers.write(1, 0x40, 7).unwrap();
        registers.write(1, 0x40, 9).unwrap();
        assert_eq!(registers.read(1, 0x40).unwrap(), 9);
        assert_eq!(registers.read(0, 0x40).unwrap(), 0);
        assert_eq!(registers.writes().len(), 2);
        assert_eq!(registers.slot_writes(0).count(), 0);
    }

    #[test]
    fn test_out_of_window() {
        let mut registers = MemoryRegisterFile::new(1);
        let error = registers.write(1, 0, 0).unwrap_err();
        assert!(matches!(
            error.current_context(),
            Error::RegisterOutOfBounds { slot: 1, offset: 0 }
        ));
        assert!(registers.read(0, MODULE_SIZE as u32).is_err());
    }
}
