use dspi_core::constants::DDR_SIZE_PER_CYCLE;
use dspi_core::StreamId;
use error_stack::ResultExt;

use crate::{DmaSetupData, Error, RegisterFile, StreamDirection, DMA_SLOT};

/// The four crossbar configuration spaces of the DMA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossbarSelection {
    BufferToInterfaceChunk,
    BufferToInterfacePosition,
    InterfaceToBufferChunk,
    InterfaceToBufferPosition,
}

impl CrossbarSelection {
    fn base(self) -> u32 {
        match self {
            CrossbarSelection::BufferToInterfaceChunk => (2 << 17) + (1 << 16),
            CrossbarSelection::BufferToInterfacePosition => 2 << 17,
            CrossbarSelection::InterfaceToBufferChunk => (3 << 17) + (1 << 16),
            CrossbarSelection::InterfaceToBufferPosition => 3 << 17,
        }
    }
}

/// Longest burst the controller params word can hold, in DDR cycles.
const MAX_BURST_LENGTH: usize = 1 << 8;
const MULTICHANNEL_STREAM_COUNT: u32 = 4;
const MULTICHANNEL_BASE: u32 = 0x80000;

fn stream_offset(stream_id: StreamId) -> u32 {
    stream_id.index() as u32 * 4
}

/// Encodes DMA engine settings as register writes.
///
/// All raw DMA addresses live here.
pub struct DmaEngine<'a> {
    registers: &'a mut dyn RegisterFile,
    slot: usize,
}

impl<'a> DmaEngine<'a> {
    pub fn new(registers: &'a mut dyn RegisterFile) -> Self {
        Self {
            registers,
            slot: DMA_SLOT,
        }
    }

    fn write(&mut self, offset: u32, value: u32) -> error_stack::Result<(), Error> {
        self.registers.write(self.slot, offset, value)
    }

    pub fn set_controller_params(
        &mut self,
        direction: StreamDirection,
        stream_id: StreamId,
        burst_length: usize,
        records_per_burst: usize,
        buffer_start: usize,
        buffer_end: usize,
    ) -> error_stack::Result<(), Error> {
        error_stack::ensure!(
            (1..=MAX_BURST_LENGTH).contains(&burst_length),
            Error::BurstTooLong {
                burst_length,
                max: MAX_BURST_LENGTH,
            }
        );
        let base = match direction {
            StreamDirection::Input => 1 << 6,
            StreamDirection::Output => 1 << 16,
        };
        let value = ((burst_length as u32 - 1) << 24)
            + ((records_per_burst as u32).ilog2() << 16)
            + ((buffer_start as u32) << 8)
            + buffer_end as u32;
        self.write(base + stream_offset(stream_id), value)
    }

    pub fn set_stream_address(
        &mut self,
        direction: StreamDirection,
        stream_id: StreamId,
        address: u64,
    ) -> error_stack::Result<(), Error> {
        let base = match direction {
            StreamDirection::Input => 2 << 6,
            StreamDirection::Output => (1 << 16) + (1 << 6),
        };
        self.write(base + stream_offset(stream_id), (address >> 4) as u32)
    }

    /// Set the starting size of a stream in records.
    pub fn set_stream_size(
        &mut self,
        direction: StreamDirection,
        stream_id: StreamId,
        records: usize,
    ) -> error_stack::Result<(), Error> {
        let base = match direction {
            StreamDirection::Input => 3 << 6,
            StreamDirection::Output => (1 << 16) + (2 << 6),
        };
        self.write(base + stream_offset(stream_id), records as u32)
    }

    fn controller_offset(direction: StreamDirection) -> u32 {
        match direction {
            StreamDirection::Input => 0,
            StreamDirection::Output => (1 << 16) + (3 << 6),
        }
    }

    /// Start moving data for the given streams.
    pub fn start_controller(
        &mut self,
        direction: StreamDirection,
        active: impl IntoIterator<Item = StreamId>,
    ) -> error_stack::Result<(), Error> {
        let mask = active
            .into_iter()
            .fold(0u32, |mask, stream_id| mask | (1 << stream_id.index()));
        self.write(Self::controller_offset(direction), mask)
    }

    /// Clear the active stream mask, as the device does once every started
    /// stream of the direction is done.
    pub fn complete_controller(
        &mut self,
        direction: StreamDirection,
    ) -> error_stack::Result<(), Error> {
        self.write(Self::controller_offset(direction), 0)
    }

    /// Return true once every started stream of the direction is done.
    pub fn is_controller_finished(
        &self,
        direction: StreamDirection,
    ) -> error_stack::Result<bool, Error> {
        let value = self
            .registers
            .read(self.slot, Self::controller_offset(direction))?;
        Ok(value == 0)
    }

    /// Set how many chunks a record of the input stream spans.
    pub fn set_record_size(
        &mut self,
        stream_id: StreamId,
        chunks_per_record: usize,
    ) -> error_stack::Result<(), Error> {
        self.write(
            (1 << 17) + (1 << 8) + stream_offset(stream_id),
            chunks_per_record as u32 - 1,
        )
    }

    pub fn set_record_chunk_id(
        &mut self,
        stream_id: StreamId,
        cycle: usize,
        chunk_id: usize,
    ) -> error_stack::Result<(), Error> {
        self.write(
            (1 << 17) + (1 << 13) + ((stream_id.index() as u32) << 8) + ((cycle as u32) << 2),
            chunk_id as u32,
        )
    }

    pub fn set_crossbar_values(
        &mut self,
        selection: CrossbarSelection,
        stream_id: StreamId,
        chunk: usize,
        offset: usize,
        value: u32,
    ) -> error_stack::Result<(), Error> {
        self.write(
            selection.base()
                + ((stream_id.index() as u32) << 12)
                + ((chunk as u32) << 5)
                + ((offset as u32) << 2),
            value,
        )
    }

    /// Multichannel input streams occupy stream ids `0..count`.
    pub fn set_multichannel_stream_count(&mut self, count: usize) -> error_stack::Result<(), Error> {
        self.write(MULTICHANNEL_STREAM_COUNT, count as u32)
    }

    pub fn set_multichannel_records_per_burst(
        &mut self,
        stream_id: StreamId,
        records_per_burst: usize,
    ) -> error_stack::Result<(), Error> {
        self.write(
            MULTICHANNEL_BASE + stream_offset(stream_id),
            records_per_burst as u32,
        )
    }

    pub fn set_multichannel_burst_length(
        &mut self,
        stream_id: StreamId,
        burst_length: usize,
    ) -> error_stack::Result<(), Error> {
        self.write(
            MULTICHANNEL_BASE + (1 << 6) + stream_offset(stream_id),
            burst_length as u32 - 1,
        )
    }

    pub fn set_multichannel_active_channels(
        &mut self,
        stream_id: StreamId,
        channels: usize,
    ) -> error_stack::Result<(), Error> {
        self.write(
            MULTICHANNEL_BASE + (2 << 6) + stream_offset(stream_id),
            channels as u32,
        )
    }

    fn multichannel_channel_offset(stream_id: StreamId, channel_id: usize) -> u32 {
        ((stream_id.index() as u32) << 14) + ((channel_id as u32) << 2)
    }

    pub fn set_multichannel_address(
        &mut self,
        stream_id: StreamId,
        channel_id: usize,
        address: u64,
    ) -> error_stack::Result<(), Error> {
        self.write(
            MULTICHANNEL_BASE + (1 << 16) + Self::multichannel_channel_offset(stream_id, channel_id),
            (address >> 4) as u32,
        )
    }

    pub fn set_multichannel_size(
        &mut self,
        stream_id: StreamId,
        channel_id: usize,
        records: usize,
    ) -> error_stack::Result<(), Error> {
        self.write(
            MULTICHANNEL_BASE + (2 << 16) + Self::multichannel_channel_offset(stream_id, channel_id),
            records as u32 + 1,
        )
    }

    /// Write the controller, channel and crossbar settings of one stream.
    pub fn write_stream(&mut self, setup: &DmaSetupData) -> error_stack::Result<(), Error> {
        let stream_id = setup.stream_id;
        self.set_controller_params(
            setup.direction,
            stream_id,
            setup.burst_length,
            setup.records_per_burst,
            setup.buffer_start,
            setup.buffer_end,
        )?;

        match setup.direction {
            StreamDirection::Input => {
                self.set_record_size(stream_id, setup.chunks_per_record)?;
                for &(cycle, chunk_id) in &setup.record_chunk_ids {
                    self.set_record_chunk_id(stream_id, cycle, chunk_id)?;
                }
                if setup.is_multichannel {
                    self.set_multichannel_active_channels(stream_id, setup.channels.len())?;
                    for channel in &setup.channels {
                        self.set_multichannel_size(
                            stream_id,
                            channel.channel_id,
                            channel.record_count,
                        )?;
                        self.set_multichannel_address(
                            stream_id,
                            channel.channel_id,
                            channel.address,
                        )?;
                    }
                    self.set_multichannel_burst_length(stream_id, setup.burst_length)?;
                    self.set_multichannel_records_per_burst(stream_id, setup.records_per_burst)?;
                } else {
                    let channel = &setup.channels[0];
                    self.set_stream_address(setup.direction, stream_id, channel.address)?;
                    self.set_stream_size(setup.direction, stream_id, channel.record_count)?;
                }
            }
            StreamDirection::Output => {
                let channel = &setup.channels[0];
                self.set_stream_address(setup.direction, stream_id, channel.address)?;
                self.set_stream_size(setup.direction, stream_id, channel.record_count)?;
            }
        }

        let (chunk_selection, position_selection) = match setup.direction {
            StreamDirection::Input => (
                CrossbarSelection::BufferToInterfaceChunk,
                CrossbarSelection::BufferToInterfacePosition,
            ),
            StreamDirection::Output => (
                CrossbarSelection::InterfaceToBufferChunk,
                CrossbarSelection::InterfaceToBufferPosition,
            ),
        };
        for (chunk, entry) in setup.crossbar.iter().enumerate() {
            let chunk_words = entry.chunk_words();
            let position_words = entry.position_words();
            for offset in 0..DDR_SIZE_PER_CYCLE {
                self.set_crossbar_values(
                    chunk_selection,
                    stream_id,
                    chunk,
                    offset,
                    chunk_words[offset],
                )?;
                self.set_crossbar_values(
                    position_selection,
                    stream_id,
                    chunk,
                    offset,
                    position_words[offset],
                )?;
            }
        }
        Ok(())
    }

    /// Configure every stream of a run.
    pub fn setup(
        &mut self,
        inputs: &[DmaSetupData],
        outputs: &[DmaSetupData],
    ) -> error_stack::Result<(), Error> {
        for setup in inputs.iter().chain(outputs) {
            self.write_stream(setup)
                .change_context(Error::StreamSetup(setup.stream_id))?;
        }
        let multichannel = inputs.iter().filter(|setup| setup.is_multichannel).count();
        self.set_multichannel_stream_count(multichannel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{setup_streams, MemoryRegisterFile, StreamRequest};

    fn stream(id: usize) -> StreamId {
        StreamId::new(id).unwrap()
    }

    #[test]
    fn test_controller_params_encoding() {
        let mut registers = MemoryRegisterFile::new(1);
        let mut dma = DmaEngine::new(&mut registers);
        dma.set_controller_params(StreamDirection::Input, stream(2), 68, 16, 0, 7)
            .unwrap();
        dma.set_controller_params(StreamDirection::Output, stream(1), 8, 32, 8, 15)
            .unwrap();

        assert_eq!(
            registers.read(DMA_SLOT, (1 << 6) + 8).unwrap(),
            (67 << 24) + (4 << 16) + 7
        );
        assert_eq!(
            registers.read(DMA_SLOT, (1 << 16) + 4).unwrap(),
            (7 << 24) + (5 << 16) + (8 << 8) + 15
        );
    }

    #[test]
    fn test_stream_registers() {
        let mut registers = MemoryRegisterFile::new(1);
        let mut dma = DmaEngine::new(&mut registers);
        dma.set_stream_address(StreamDirection::Input, stream(1), 0x1230)
            .unwrap();
        dma.set_stream_size(StreamDirection::Output, stream(3), 10)
            .unwrap();
        dma.set_record_size(stream(0), 2).unwrap();
        dma.set_record_chunk_id(stream(1), 3, 1).unwrap();
        dma.start_controller(StreamDirection::Input, [stream(0), stream(3)])
            .unwrap();
        dma.set_multichannel_size(stream(1), 2, 5).unwrap();

        assert_eq!(registers.read(DMA_SLOT, (2 << 6) + 4).unwrap(), 0x123);
        assert_eq!(
            registers.read(DMA_SLOT, (1 << 16) + (2 << 6) + 12).unwrap(),
            10
        );
        assert_eq!(registers.read(DMA_SLOT, (1 << 17) + (1 << 8)).unwrap(), 1);
        assert_eq!(
            registers
                .read(DMA_SLOT, (1 << 17) + (1 << 13) + (1 << 8) + 12)
                .unwrap(),
            1
        );
        assert_eq!(registers.read(DMA_SLOT, 0).unwrap(), 0b1001);
        assert_eq!(
            registers
                .read(DMA_SLOT, 0x80000 + (2 << 16) + (1 << 14) + 8)
                .unwrap(),
            6
        );
    }

    #[test]
    fn test_crossbar_words_land_at_chunk_offsets() {
        let mut registers = MemoryRegisterFile::new(1);
        let mut dma = DmaEngine::new(&mut registers);
        dma.set_crossbar_values(
            CrossbarSelection::InterfaceToBufferPosition,
            stream(1),
            2,
            3,
            0xdead,
        )
        .unwrap();
        assert_eq!(
            registers
                .read(DMA_SLOT, (3 << 17) + (1 << 12) + (2 << 5) + (3 << 2))
                .unwrap(),
            0xdead
        );
    }

    #[test]
    fn test_setup_writes_all_streams() {
        let mut input = StreamRequest::new(stream(0), StreamDirection::Input, 4);
        input.record_count = 64;
        let output = StreamRequest::new(stream(0), StreamDirection::Output, 4);
        let inputs = setup_streams(&[input]).unwrap();
        let outputs = setup_streams(&[output]).unwrap();

        let mut registers = MemoryRegisterFile::new(1);
        let mut dma = DmaEngine::new(&mut registers);
        dma.setup(&inputs, &outputs).unwrap();

        // Input: params, record size, 32 chunk ids, address, size, 32 chunks of
        // 8 crossbar words. Output: params, address, size, crossbar. Then the
        // multichannel count.
        let expected = (1 + 1 + 32 + 2 + 32 * 8) + (1 + 2 + 32 * 8) + 1;
        assert_eq!(registers.writes().len(), expected);
        assert_eq!(registers.read(DMA_SLOT, 3 << 6).unwrap(), 64);
        assert_eq!(registers.read(DMA_SLOT, MULTICHANNEL_STREAM_COUNT).unwrap(), 0);
    }

    #[test]
    fn test_burst_length_limit() {
        let mut registers = MemoryRegisterFile::new(1);
        let mut dma = DmaEngine::new(&mut registers);
        dma.set_controller_params(StreamDirection::Input, stream(0), 256, 1, 0, 15)
            .unwrap();
        let error = dma
            .set_controller_params(StreamDirection::Input, stream(0), 257, 1, 0, 15)
            .unwrap_err();
        assert!(matches!(
            error.current_context(),
            Error::BurstTooLong {
                burst_length: 257,
                max: 256
            }
        ));
        assert_eq!(
            registers.read(DMA_SLOT, 1 << 6).unwrap(),
            (255 << 24) + 15
        );
        assert_eq!(registers.writes().len(), 1);
    }

    #[test]
    fn test_wide_record_is_rejected() {
        // A single record of 1100 integers takes 275 DDR cycles.
        let mut input = StreamRequest::new(stream(1), StreamDirection::Input, 1100);
        input.record_count = 1;
        let inputs = setup_streams(&[input]).unwrap();
        assert_eq!(inputs[0].burst_length, 275);

        let mut registers = MemoryRegisterFile::new(1);
        let error = DmaEngine::new(&mut registers)
            .setup(&inputs, &[])
            .unwrap_err();
        assert!(matches!(
            error.current_context(),
            Error::StreamSetup(id) if id.index() == 1
        ));
        assert!(error.frames().any(|frame| matches!(
            frame.downcast_ref::<Error>(),
            Some(Error::BurstTooLong { burst_length: 275, .. })
        )));
    }

    #[test]
    fn test_setup_writes_multichannel_stream() {
        let mut input = StreamRequest::new(stream(0), StreamDirection::Input, 4);
        input.address = 0x100;
        input.channels = Some(vec![2, 3, 1]);
        let inputs = setup_streams(&[input]).unwrap();

        let mut registers = MemoryRegisterFile::new(1);
        let mut dma = DmaEngine::new(&mut registers);
        dma.setup(&inputs, &[]).unwrap();

        let read = |offset| registers.read(DMA_SLOT, offset).unwrap();
        assert_eq!(read(MULTICHANNEL_STREAM_COUNT), 1);
        assert_eq!(read(MULTICHANNEL_BASE + (2 << 6)), 3);
        let sizes: Vec<_> = (0..3)
            .map(|channel| read(MULTICHANNEL_BASE + (2 << 16) + (channel << 2)))
            .collect();
        assert_eq!(sizes, vec![3, 4, 2]);
        let addresses: Vec<_> = (0..3)
            .map(|channel| read(MULTICHANNEL_BASE + (1 << 16) + (channel << 2)))
            .collect();
        assert_eq!(addresses, vec![0x10, 0x12, 0x15]);
        assert_eq!(read(MULTICHANNEL_BASE + (1 << 6)), 11);
        assert_eq!(read(MULTICHANNEL_BASE), 12);

        // The single channel address and size registers stay untouched.
        assert!(registers
            .writes()
            .iter()
            .all(|write| write.offset != 2 << 6 && write.offset != 3 << 6));
        // Params, record size, 32 chunk ids, active channels, 3 channels of
        // size and address, burst length, records per burst, 12 chunks of 8
        // crossbar words and the multichannel count.
        assert_eq!(registers.writes().len(), 1 + 1 + 32 + 1 + 6 + 2 + 12 * 8 + 1);
    }
}
