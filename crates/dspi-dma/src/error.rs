use dspi_core::StreamId;

#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "{count} streams do not fit the {slots} stream buffer slots")]
    TooManyStreams { count: usize, slots: usize },
    #[display(fmt = "projection column {column} outside record of width {width}")]
    ProjectionMismatch { column: usize, width: usize },
    #[display(
        fmt = "crossbar clash on lane {lane} of device chunk {chunk}: needs both {existing} and {requested}"
    )]
    CrossbarClash {
        chunk: usize,
        lane: usize,
        existing: u8,
        requested: u8,
    },
    #[display(fmt = "record of {_0} integers is too wide for the crossbar")]
    RecordTooWide(usize),
    #[display(fmt = "record of {_0} integers is too wide for a multichannel stream buffer")]
    MultichannelRecordTooWide(usize),
    #[display(fmt = "burst of {burst_length} cycles exceeds the {max} cycle limit")]
    BurstTooLong { burst_length: usize, max: usize },
    #[display(fmt = "register offset {offset:#x} outside the window of slot {slot}")]
    RegisterOutOfBounds { slot: usize, offset: u32 },
    #[display(fmt = "failed to configure DMA for stream {_0}")]
    StreamSetup(StreamId),
}

impl error_stack::Context for Error {}
