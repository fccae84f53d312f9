use dspi_core::constants::{DATAPATH_WIDTH, DDR_SIZE_PER_CYCLE};
use itertools::Itertools;

use crate::{chunks_per_record, Error};

/// Selections for one lane array. `None` lanes carry no data.
pub type LaneSelection = [Option<u8>; DATAPATH_WIDTH];

/// Crossbar configuration for one device buffer chunk.
///
/// For input streams the chunk selection picks, per lane, the host chunk to
/// read that lane from, and the position selection then picks, per device
/// lane, the lane to take. Output streams apply the stages in reverse: the
/// position selection picks, per host lane, the device lane to take, and the
/// chunk selection names the host chunk the lane is written to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossbarEntry {
    pub chunk_selection: LaneSelection,
    pub position_selection: LaneSelection,
}

impl CrossbarEntry {
    pub fn chunk_words(&self) -> [u32; DATAPATH_WIDTH / DDR_SIZE_PER_CYCLE] {
        pack_words(&self.chunk_selection)
    }

    pub fn position_words(&self) -> [u32; DATAPATH_WIDTH / DDR_SIZE_PER_CYCLE] {
        pack_words(&self.position_selection)
    }
}

/// Pack lane selections four to a word, highest lane in the top byte.
fn pack_words(selection: &LaneSelection) -> [u32; DATAPATH_WIDTH / DDR_SIZE_PER_CYCLE] {
    let mut words = [0; DATAPATH_WIDTH / DDR_SIZE_PER_CYCLE];
    for (word, lanes) in words
        .iter_mut()
        .zip(selection.chunks_exact(DDR_SIZE_PER_CYCLE))
    {
        *word = lanes
            .iter()
            .rev()
            .fold(0, |word, lane| (word << 8) | lane.unwrap_or(0) as u32);
    }
    words
}

fn to_selection(value: usize, record_size: usize) -> error_stack::Result<u8, Error> {
    u8::try_from(value).map_err(|_| error_stack::report!(Error::RecordTooWide(record_size)))
}

fn select(
    slot: &mut Option<u8>,
    value: u8,
    chunk: usize,
    lane: usize,
) -> error_stack::Result<(), Error> {
    match *slot {
        Some(existing) if existing != value => {
            error_stack::bail!(Error::CrossbarClash {
                chunk,
                lane,
                existing,
                requested: value,
            })
        }
        _ => {
            *slot = Some(value);
            Ok(())
        }
    }
}

fn identity(record_size: usize) -> Vec<usize> {
    (0..record_size).collect()
}

/// Build the host to device crossbar for a burst of `records_per_burst`
/// records.
///
/// Each record has `record_size` integers in host memory. `projection` lists
/// the host columns placed on the device record in order; empty keeps the
/// record as is.
pub fn input_crossbar(
    record_size: usize,
    projection: &[usize],
    records_per_burst: usize,
) -> error_stack::Result<Vec<CrossbarEntry>, Error> {
    let projection = if projection.is_empty() {
        identity(record_size)
    } else {
        projection.to_vec()
    };
    if let Some(&column) = projection.iter().find(|column| **column >= record_size) {
        error_stack::bail!(Error::ProjectionMismatch {
            column,
            width: record_size,
        });
    }

    let device_chunks = chunks_per_record(projection.len());
    let mut entries = vec![CrossbarEntry::default(); records_per_burst * device_chunks];
    for record in 0..records_per_burst {
        for (element, column) in projection.iter().enumerate() {
            let chunk = record * device_chunks + element / DATAPATH_WIDTH;
            let position = element % DATAPATH_WIDTH;
            let host = record * record_size + column;
            let lane = host % DATAPATH_WIDTH;

            let entry = &mut entries[chunk];
            select(
                &mut entry.chunk_selection[lane],
                to_selection(host / DATAPATH_WIDTH, record_size)?,
                chunk,
                lane,
            )?;
            entry.position_selection[position] = Some(lane as u8);
        }
    }

    tracing::trace!(
        "Input crossbar for record size {record_size}: {}",
        format_entries(&entries)
    );
    Ok(entries)
}

/// Build the device to host crossbar for a burst of `records_per_burst`
/// records.
///
/// Device records span `chunks_per_record` chunks. Host record element `i`
/// is taken from device element `projection[i]`; empty means element `i`.
pub fn output_crossbar(
    record_size: usize,
    projection: &[usize],
    chunks_per_record: usize,
    records_per_burst: usize,
) -> error_stack::Result<Vec<CrossbarEntry>, Error> {
    let device_width = chunks_per_record * DATAPATH_WIDTH;
    let projection = if projection.is_empty() {
        identity(record_size)
    } else {
        projection.to_vec()
    };
    if projection.len() != record_size {
        error_stack::bail!(Error::ProjectionMismatch {
            column: projection.len(),
            width: record_size,
        });
    }
    if let Some(&column) = projection.iter().find(|column| **column >= device_width) {
        error_stack::bail!(Error::ProjectionMismatch {
            column,
            width: device_width,
        });
    }

    let mut entries = vec![CrossbarEntry::default(); records_per_burst * chunks_per_record];
    for record in 0..records_per_burst {
        for (element, source) in projection.iter().enumerate() {
            let chunk = record * chunks_per_record + source / DATAPATH_WIDTH;
            let position = source % DATAPATH_WIDTH;
            let host = record * record_size + element;
            let lane = host % DATAPATH_WIDTH;

            let entry = &mut entries[chunk];
            select(
                &mut entry.position_selection[lane],
                position as u8,
                chunk,
                lane,
            )?;
            select(
                &mut entry.chunk_selection[lane],
                to_selection(host / DATAPATH_WIDTH, record_size)?,
                chunk,
                lane,
            )?;
        }
    }

    tracing::trace!(
        "Output crossbar for record size {record_size}: {}",
        format_entries(&entries)
    );
    Ok(entries)
}

fn format_entries(entries: &[CrossbarEntry]) -> String {
    fn lanes(selection: &LaneSelection) -> String {
        selection
            .iter()
            .map(|lane| lane.map_or(-1, |lane| lane as i32))
            .join(",")
    }

    entries
        .iter()
        .map(|entry| {
            format!(
                "[{}] / [{}]",
                lanes(&entry.chunk_selection),
                lanes(&entry.position_selection)
            )
        })
        .join("; ")
}

/// A device buffer chunk. `None` lanes carry no data.
pub type DeviceChunk = [Option<u32>; DATAPATH_WIDTH];

/// Move a host burst through an input crossbar.
///
/// Returns one chunk per crossbar entry.
pub fn apply_input(entries: &[CrossbarEntry], host: &[u32]) -> Vec<DeviceChunk> {
    entries
        .iter()
        .map(|entry| {
            let mut chunk = [None; DATAPATH_WIDTH];
            for (position, lane) in entry.position_selection.iter().enumerate() {
                chunk[position] = lane.and_then(|lane| {
                    let lane = lane as usize;
                    let host_chunk = entry.chunk_selection[lane]? as usize;
                    host.get(host_chunk * DATAPATH_WIDTH + lane).copied()
                });
            }
            chunk
        })
        .collect()
}

/// Move device chunks through an output crossbar into a flat host burst.
///
/// Host integers nothing was written to are `None`.
pub fn apply_output(entries: &[CrossbarEntry], device: &[DeviceChunk]) -> Vec<Option<u32>> {
    let mut host = Vec::new();
    for (entry, chunk) in entries.iter().zip(device) {
        for lane in 0..DATAPATH_WIDTH {
            let (Some(position), Some(host_chunk)) =
                (entry.position_selection[lane], entry.chunk_selection[lane])
            else {
                continue;
            };
            let index = host_chunk as usize * DATAPATH_WIDTH + lane;
            if host.len() <= index {
                host.resize(index + 1, None);
            }
            host[index] = chunk[position as usize];
        }
    }
    host
}
