use crate::constants::MAX_IO_STREAM_COUNT;

/// Identifier of a concurrent I/O stream within one run.
///
/// Always less than [MAX_IO_STREAM_COUNT].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct StreamId(u8);

impl StreamId {
    pub const COUNT: usize = MAX_IO_STREAM_COUNT;

    pub fn new(id: usize) -> Option<Self> {
        (id < Self::COUNT).then_some(Self(id as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// All identifiers in ascending order.
    pub fn all() -> impl DoubleEndedIterator<Item = StreamId> {
        (0..Self::COUNT as u8).map(StreamId)
    }
}

impl TryFrom<u8> for StreamId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value as usize).ok_or_else(|| format!("stream id {value} out of range"))
    }
}

impl From<StreamId> for u8 {
    fn from(value: StreamId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_range() {
        assert_eq!(StreamId::new(15).map(StreamId::index), Some(15));
        assert_eq!(StreamId::new(16), None);
        assert_eq!(StreamId::all().count(), 16);
        assert_eq!(StreamId::all().next_back().unwrap().to_string(), "15");
    }
}
