//! Fixed limits of the accelerator platform.

/// How many integers fit the datapath in the same cycle (one chunk).
pub const DATAPATH_WIDTH: usize = 16;

/// How many chunks the internal stream buffer holds.
pub const DATAPATH_LENGTH: usize = 32;

/// How many integers are transferred with a single DDR burst.
pub const DDR_BURST_SIZE: usize = 512;

/// How many integers are transferred to or from DDR in one clock cycle.
pub const DDR_SIZE_PER_CYCLE: usize = 4;

/// Upper bound on the records transferred in a single DDR burst.
pub const MAX_RECORDS_PER_DDR_BURST: usize = 32;

/// How many I/O streams may be active concurrently within one run.
pub const MAX_IO_STREAM_COUNT: usize = 16;

/// Size in bytes of the register window of a single module slot.
pub const MODULE_SIZE: usize = 1024 * 1024;

/// Default reconfigurable memory capacity when the configuration gives none.
pub const DEFAULT_RECONFIGURABLE_CAPACITY: usize = MAX_IO_STREAM_COUNT * MODULE_SIZE;

/// Chunks of merge buffer shared by the channels of a multichannel stream.
pub const MULTICHANNEL_BUFFER_SPACE: usize = 2048;

/// Channels synthesized for multichannel input streams.
pub const MULTICHANNEL_CHANNEL_COUNT: usize = 64;
