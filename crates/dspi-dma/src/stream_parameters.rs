use dspi_core::constants::{
    DATAPATH_LENGTH, DATAPATH_WIDTH, DDR_BURST_SIZE, DDR_SIZE_PER_CYCLE, MAX_RECORDS_PER_DDR_BURST,
    MULTICHANNEL_BUFFER_SPACE, MULTICHANNEL_CHANNEL_COUNT,
};

use crate::Error;

/// How many datapath chunks a record of `record_size` integers occupies.
pub fn chunks_per_record(record_size: usize) -> usize {
    assert!(record_size > 0, "record size must be positive");
    (record_size + DATAPATH_WIDTH - 1) / DATAPATH_WIDTH
}

/// The smallest power of two greater than or equal to `value`.
pub fn next_power_of_two(value: usize) -> usize {
    value.next_power_of_two()
}

/// Largest power-of-two record count fitting one DDR burst, capped at
/// [MAX_RECORDS_PER_DDR_BURST].
///
/// Records wider than a whole burst are transferred one at a time.
pub fn min_viable_records_per_burst(record_size: usize) -> usize {
    assert!(record_size > 0, "record size must be positive");
    let records_per_burst = DDR_BURST_SIZE / record_size;
    if records_per_burst == 0 {
        return 1;
    }
    (1 << records_per_burst.ilog2()).min(MAX_RECORDS_PER_DDR_BURST)
}

/// Records per burst on output streams.
///
/// The output buffer holds [MAX_RECORDS_PER_DDR_BURST] power-of-two sized
/// record slots.
pub fn output_records_per_burst(chunks_per_record: usize) -> usize {
    (MAX_RECORDS_PER_DDR_BURST / next_power_of_two(chunks_per_record)).max(1)
}

/// Records each channel of a multichannel stream can hold in the merge
/// buffer.
pub fn channel_buffer_size(chunks_per_record: usize) -> usize {
    // Space kept by the merge tree, one level per doubling of the channels.
    let mut reserved = 240;
    let mut level = 32;
    while level <= MULTICHANNEL_CHANNEL_COUNT {
        reserved += 2 * level;
        level *= 2;
    }
    // 16 records are always in flight in the pipeline.
    let buffered = (MULTICHANNEL_BUFFER_SPACE / chunks_per_record).saturating_sub(16);
    (buffered.saturating_sub(reserved) / MULTICHANNEL_CHANNEL_COUNT)
        .min(MULTICHANNEL_BUFFER_SPACE / MULTICHANNEL_CHANNEL_COUNT)
}

/// Records fetched per burst on each channel of a multichannel stream.
///
/// Starts from half of the channel's buffer and shrinks until a fetch moves
/// whole DDR cycles. Returns `None` when the records are too wide to buffer.
pub fn multichannel_records_per_burst(record_size: usize, chunks_per_record: usize) -> Option<usize> {
    let mut records = channel_buffer_size(chunks_per_record) / 2;
    while records > 0 && (records * record_size) % DDR_SIZE_PER_CYCLE != 0 {
        records -= 1;
    }
    (records > 0).then_some(records)
}

/// Clock cycles needed to move `records_per_burst` records of `record_size`
/// integers to or from DDR.
pub fn ddr_burst_length(record_size: usize, records_per_burst: usize) -> usize {
    (record_size * records_per_burst + DDR_SIZE_PER_CYCLE - 1) / DDR_SIZE_PER_CYCLE
}

/// The chunk of the current record handled in each interface cycle.
pub fn record_chunk_ids(chunks_per_record: usize) -> Vec<(usize, usize)> {
    let period = next_power_of_two(chunks_per_record);
    (0..DATAPATH_LENGTH)
        .map(|cycle| (cycle, cycle % period))
        .collect()
}

/// Burst geometry of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StreamGeometry {
    pub chunks_per_record: usize,
    pub records_per_burst: usize,
    /// Burst length in DDR clock cycles.
    pub burst_length: usize,
    pub is_multichannel: bool,
}

impl StreamGeometry {
    /// Geometry of a single channel input stream.
    ///
    /// `device_width` is the record width after the input crossbar, which
    /// differs from `record_size` when the stream is projected.
    pub fn input(record_size: usize, device_width: usize) -> Self {
        let records_per_burst = min_viable_records_per_burst(record_size.max(device_width));
        Self {
            chunks_per_record: chunks_per_record(device_width),
            records_per_burst,
            burst_length: ddr_burst_length(record_size, records_per_burst),
            is_multichannel: false,
        }
    }

    /// Geometry shared by every channel of a multichannel input stream.
    ///
    /// Bursts are sized by the merge buffer of each channel rather than by
    /// the DDR burst.
    pub fn multichannel(
        record_size: usize,
        device_width: usize,
    ) -> error_stack::Result<Self, Error> {
        let chunks_per_record = chunks_per_record(device_width);
        let records_per_burst = multichannel_records_per_burst(record_size, chunks_per_record)
            .ok_or_else(|| error_stack::report!(Error::MultichannelRecordTooWide(record_size)))?;
        Ok(Self {
            chunks_per_record,
            records_per_burst,
            burst_length: ddr_burst_length(record_size, records_per_burst),
            is_multichannel: true,
        })
    }

    /// Geometry of an output stream whose records arrive from the module
    /// chain in `chunks_per_record` chunks.
    pub fn output(record_size: usize, chunks_per_record: usize) -> Self {
        let records_per_burst = output_records_per_burst(chunks_per_record);
        Self {
            chunks_per_record,
            records_per_burst,
            burst_length: ddr_burst_length(record_size, records_per_burst),
            is_multichannel: false,
        }
    }
}

/// Burst geometry for an unprojected input stream of `record_size` integers.
pub fn build_stream_setup_data(
    record_size: usize,
    is_multichannel: bool,
) -> error_stack::Result<StreamGeometry, Error> {
    if is_multichannel {
        StreamGeometry::multichannel(record_size, record_size)
    } else {
        Ok(StreamGeometry::input(record_size, record_size))
    }
}
