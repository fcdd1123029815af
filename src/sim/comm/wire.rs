use arrayref::array_ref;
use byteorder::{ByteOrder, LittleEndian};
use rkyv::{
    de::deserializers::SharedDeserializeMap, from_bytes,
    ser::serializers::AllocSerializer, to_bytes,
    validation::validators::DefaultValidator, AlignedVec, Archive, CheckBytes,
    Deserialize, Serialize,
};

use super::error::Error;

/// Message purposes. Every (sender, tag) stream is FIFO on its own, so
/// tags also act as independent ordering domains between a pair of
/// ranks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Tag {
    /// Per-iteration activity flags and the combined termination result.
    Working,
    /// Per-rank configuration records scattered by rank 0.
    RankConfig,
    /// Batched updates from a sender's left boundary row.
    LeftBorder,
    /// Batched updates from a sender's right boundary row.
    RightBorder,
    /// Individual cell updates fired during relaxation.
    Migrant,
    /// Owned-slab label sequences gathered for board assembly.
    Board,
}

impl Tag {
    pub const ALL: [Tag; 6] = [
        Tag::Working,
        Tag::RankConfig,
        Tag::LeftBorder,
        Tag::RightBorder,
        Tag::Migrant,
        Tag::Board,
    ];
}

/// One lattice site update: y | z | state, little-endian. There is no x
/// coordinate on the wire; the receiver maps the sending rank to one of
/// its ghost rows.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SingleCell {
    pub y: i32,
    pub z: i32,
    pub state: i32,
}

impl SingleCell {
    pub const WIRE_SIZE: usize = 12;

    pub fn write_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.y.to_le_bytes());
        buf.extend_from_slice(&self.z.to_le_bytes());
        buf.extend_from_slice(&self.state.to_le_bytes());
    }

    pub fn read_from(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < Self::WIRE_SIZE {
            return Err(Error::TruncatedRecord);
        }
        let raw = array_ref![buf, 0, SingleCell::WIRE_SIZE];
        Ok(Self {
            y: LittleEndian::read_i32(&raw[0..4]),
            z: LittleEndian::read_i32(&raw[4..8]),
            state: LittleEndian::read_i32(&raw[8..12]),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_SIZE);
        self.write_into(&mut buf);
        buf
    }
}

/// A border batch is a u32 record count followed by that many records.
pub fn encode_batch(cells: &[SingleCell]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + cells.len() * SingleCell::WIRE_SIZE);
    buf.extend_from_slice(&(cells.len() as u32).to_le_bytes());
    for cell in cells {
        cell.write_into(&mut buf);
    }
    buf
}

pub fn decode_batch(buf: &[u8]) -> Result<Vec<SingleCell>, Error> {
    if buf.len() < 4 {
        return Err(Error::TruncatedRecord);
    }
    let count = LittleEndian::read_u32(&buf[0..4]) as usize;
    if buf.len() != 4 + count * SingleCell::WIRE_SIZE {
        return Err(Error::TruncatedRecord);
    }
    let mut cells = Vec::with_capacity(count);
    for i in 0..count {
        cells.push(SingleCell::read_from(&buf[4 + i * SingleCell::WIRE_SIZE..])?);
    }
    Ok(cells)
}

/// Archives a structured control payload for transmission.
pub fn encode_payload<T>(value: &T) -> Result<Vec<u8>, Error>
where
    T: Serialize<AllocSerializer<256>>,
{
    let bytes = to_bytes::<_, 256>(value).map_err(|_| Error::BadPayload)?;
    Ok(bytes.into_vec())
}

/// Validates and deserializes a payload produced by [`encode_payload`].
/// The bytes are copied into an aligned buffer first; channel payloads
/// carry no alignment guarantee.
pub fn decode_payload<T>(buf: &[u8]) -> Result<T, Error>
where
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>>
        + Deserialize<T, SharedDeserializeMap>,
{
    let mut aligned = AlignedVec::with_capacity(buf.len());
    aligned.extend_from_slice(buf);
    from_bytes::<T>(&aligned).map_err(|_| Error::BadPayload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_framing() {
        let cells = vec![
            SingleCell { y: 0, z: 3, state: 7 },
            SingleCell { y: 2, z: 1, state: 4 },
        ];
        let buf = encode_batch(&cells);
        assert_eq!(buf.len(), 4 + 2 * SingleCell::WIRE_SIZE);
        assert_eq!(decode_batch(&buf).unwrap(), cells);

        let empty = encode_batch(&[]);
        assert_eq!(decode_batch(&empty).unwrap(), vec![]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert_eq!(SingleCell::read_from(&[1, 2, 3]), Err(Error::TruncatedRecord));
        // count claims one record but none follow
        assert_eq!(decode_batch(&1u32.to_le_bytes()), Err(Error::TruncatedRecord));
    }

    #[test]
    fn payload_survives_an_unaligned_copy() {
        let labels: Vec<i32> = vec![1, 1, 2, 3];
        let mut shifted = vec![0u8];
        shifted.extend(encode_payload(&labels).unwrap());
        let decoded: Vec<i32> = decode_payload(&shifted[1..]).unwrap();
        assert_eq!(decoded, labels);
    }
}
