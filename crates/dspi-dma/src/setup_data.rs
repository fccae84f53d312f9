use dspi_core::constants::MAX_IO_STREAM_COUNT;
use dspi_core::StreamId;
use error_stack::ResultExt;

use crate::{
    chunks_per_record, input_crossbar, output_crossbar, record_chunk_ids, CrossbarEntry, Error,
    StreamGeometry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StreamDirection {
    Input,
    Output,
}

/// What the DMA engine needs to know about one stream of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub stream_id: StreamId,
    pub direction: StreamDirection,
    /// Record width in host memory, in integers.
    pub record_size: usize,
    /// Records to transfer. Output streams start empty.
    pub record_count: usize,
    /// Host address of the stream's first record.
    pub address: u64,
    /// Columns to keep on input, or the device element feeding each host
    /// column on output. Empty means unchanged.
    pub projection: Vec<usize>,
    /// Chunks per record at the end of the module chain (output only).
    pub chunk_count: Option<usize>,
    /// Records per channel of a multichannel input stream.
    pub channels: Option<Vec<usize>>,
}

impl StreamRequest {
    pub fn new(stream_id: StreamId, direction: StreamDirection, record_size: usize) -> Self {
        Self {
            stream_id,
            direction,
            record_size,
            record_count: 0,
            address: 0,
            projection: vec![],
            chunk_count: None,
            channels: None,
        }
    }
}

/// Transfer parameters of one channel of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ChannelSetupData {
    pub channel_id: usize,
    pub record_count: usize,
    pub address: u64,
    /// Records moved by each burst on this channel.
    pub records_per_burst: usize,
    pub burst_length: usize,
}

/// Everything written to the DMA engine for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaSetupData {
    pub stream_id: StreamId,
    pub direction: StreamDirection,
    pub chunks_per_record: usize,
    pub records_per_burst: usize,
    pub burst_length: usize,
    pub is_multichannel: bool,
    /// First internal buffer slot owned by the stream.
    pub buffer_start: usize,
    /// Last internal buffer slot owned by the stream (inclusive).
    pub buffer_end: usize,
    pub record_chunk_ids: Vec<(usize, usize)>,
    pub crossbar: Vec<CrossbarEntry>,
    /// A single channel for ordinary streams.
    pub channels: Vec<ChannelSetupData>,
}

impl DmaSetupData {
    /// Derive the setup of a stream owning the given buffer window.
    pub fn new(
        request: &StreamRequest,
        (buffer_start, buffer_end): (usize, usize),
    ) -> error_stack::Result<Self, Error> {
        let record_size = request.record_size;
        let is_multichannel = request.channels.is_some();

        let (geometry, crossbar) = match request.direction {
            StreamDirection::Input => {
                let device_width = if request.projection.is_empty() {
                    record_size
                } else {
                    request.projection.len()
                };
                let geometry = if is_multichannel {
                    StreamGeometry::multichannel(record_size, device_width)
                        .change_context(Error::StreamSetup(request.stream_id))?
                } else {
                    StreamGeometry::input(record_size, device_width)
                };
                let crossbar =
                    input_crossbar(record_size, &request.projection, geometry.records_per_burst);
                (geometry, crossbar)
            }
            StreamDirection::Output => {
                let produced = chunks_per_record(record_size);
                let chunks = request.chunk_count.map_or(produced, |chunks| chunks.max(produced));
                let geometry = StreamGeometry::output(record_size, chunks);
                let crossbar = output_crossbar(
                    record_size,
                    &request.projection,
                    geometry.chunks_per_record,
                    geometry.records_per_burst,
                );
                (geometry, crossbar)
            }
        };
        let crossbar = crossbar.change_context(Error::StreamSetup(request.stream_id))?;

        let channels = match &request.channels {
            None => vec![ChannelSetupData {
                channel_id: 0,
                record_count: match request.direction {
                    StreamDirection::Input => request.record_count,
                    StreamDirection::Output => 0,
                },
                address: request.address,
                records_per_burst: geometry.records_per_burst,
                burst_length: geometry.burst_length,
            }],
            Some(records_per_channel) => {
                let mut address = request.address;
                records_per_channel
                    .iter()
                    .enumerate()
                    .map(|(channel_id, &record_count)| {
                        let channel = ChannelSetupData {
                            channel_id,
                            record_count,
                            address,
                            records_per_burst: geometry.records_per_burst,
                            burst_length: geometry.burst_length,
                        };
                        address +=
                            (record_size * record_count * std::mem::size_of::<u32>()) as u64;
                        channel
                    })
                    .collect()
            }
        };

        let setup = Self {
            stream_id: request.stream_id,
            direction: request.direction,
            chunks_per_record: geometry.chunks_per_record,
            records_per_burst: geometry.records_per_burst,
            burst_length: geometry.burst_length,
            is_multichannel,
            buffer_start,
            buffer_end,
            record_chunk_ids: record_chunk_ids(geometry.chunks_per_record),
            crossbar,
            channels,
        };
        tracing::debug!(
            "DMA setup for {} stream {}: {} chunks/record, {} records/burst, burst length {}, buffers {}..={}",
            setup.direction,
            setup.stream_id,
            setup.chunks_per_record,
            setup.records_per_burst,
            setup.burst_length,
            setup.buffer_start,
            setup.buffer_end
        );
        Ok(setup)
    }
}

/// Split the internal stream buffer evenly between `stream_count` streams.
///
/// Returns the inclusive `(start, end)` slot window of each stream.
pub fn allocate_buffers(stream_count: usize) -> error_stack::Result<Vec<(usize, usize)>, Error> {
    error_stack::ensure!(
        stream_count <= MAX_IO_STREAM_COUNT,
        Error::TooManyStreams {
            count: stream_count,
            slots: MAX_IO_STREAM_COUNT,
        }
    );
    if stream_count == 0 {
        return Ok(vec![]);
    }

    let size = MAX_IO_STREAM_COUNT / stream_count;
    Ok((0..stream_count)
        .map(|stream| (size * stream, size * stream + size - 1))
        .collect())
}

/// Build the setup of all streams of one direction.
pub fn setup_streams(requests: &[StreamRequest]) -> error_stack::Result<Vec<DmaSetupData>, Error> {
    let buffers = allocate_buffers(requests.len())?;
    requests
        .iter()
        .zip(buffers)
        .map(|(request, buffer)| DmaSetupData::new(request, buffer))
        .collect()
}
