use hashbrown::HashMap;

/// Size of the host memory block reserved for each stream.
pub const STREAM_BLOCK_SIZE: u64 = 1 << 24;

/// Host memory blocks backing the streams read or written by runs.
///
/// A stream keeps its block for the whole schedule, so a run reading an
/// earlier run's output finds it where it was written.
#[derive(Debug, Clone, Default)]
pub struct StreamMemory {
    blocks: HashMap<String, u64>,
}

impl StreamMemory {
    /// The address of the stream's block, reserving one on first use.
    pub fn address_of(&mut self, stream: &str) -> u64 {
        if let Some(address) = self.blocks.get(stream) {
            return *address;
        }
        let address = (self.blocks.len() as u64 + 1) * STREAM_BLOCK_SIZE;
        self.blocks.insert(stream.to_owned(), address);
        address
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
