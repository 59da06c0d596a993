use crate::error::{Result, SqliteError};

const SINGLE_BYTE_BIT_MAP: u8 = 0x80;
const MAX_VARINT_LEN: usize = 9;

// type to represent a decoded varint and identify how many bytes where read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteVarint {
    pub byte_size: usize,
    pub varint: u64,
}

// sqlite varints differ from protobuf style varints:
// big endian groups of 7 bits, and the 9th byte contributes all 8 of its bits
pub fn parse_sqlite_varint(buffer: &[u8], start_offset: usize) -> Result<SqliteVarint> {
    let mut offset = start_offset;
    let mut varint = 0_u64;

    loop {
        let Some(&curr_byte) = buffer.get(offset) else {
            return Err(SqliteError::format(
                "varint",
                format!("truncated at byte offset {offset}"),
            ));
        };
        offset += 1;

        if offset - start_offset == MAX_VARINT_LEN {
            varint = (varint << 8) | curr_byte as u64;
            break;
        }

        varint = (varint << 7) | (curr_byte & !SINGLE_BYTE_BIT_MAP) as u64;
        if curr_byte & SINGLE_BYTE_BIT_MAP == 0 {
            break;
        }
    }

    Ok(SqliteVarint {
        byte_size: offset - start_offset,
        varint,
    })
}

pub fn encode_sqlite_varint(value: u64) -> Vec<u8> {
    // anything wider than 56 bits needs the 9 byte form
    if value & 0xFF00_0000_0000_0000 != 0 {
        let mut out = vec![0_u8; MAX_VARINT_LEN];
        out[8] = value as u8;
        let mut rest = value >> 8;
        for b in out[..8].iter_mut().rev() {
            *b = (rest as u8 & !SINGLE_BYTE_BIT_MAP) | SINGLE_BYTE_BIT_MAP;
            rest >>= 7;
        }
        return out;
    }

    let mut groups: Vec<u8> = Vec::with_capacity(8);
    let mut rest = value;
    loop {
        groups.push(rest as u8 & !SINGLE_BYTE_BIT_MAP);
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    groups.reverse();

    let last = groups.len() - 1;
    for b in &mut groups[..last] {
        *b |= SINGLE_BYTE_BIT_MAP;
    }
    groups
}

/// Sequential big-endian reader over a fixed byte region.
///
/// Every read is bounds checked; running off the end of the region is a
/// format error naming the region the cursor was created for.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buffer: &'a [u8],
    position: usize,
    region: &'static str,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buffer: &'a [u8], region: &'static str) -> ByteCursor<'a> {
        ByteCursor {
            buffer,
            position: 0,
            region,
        }
    }

    pub fn at(buffer: &'a [u8], position: usize, region: &'static str) -> ByteCursor<'a> {
        ByteCursor {
            buffer,
            position,
            region,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.position.checked_add(len).filter(|end| *end <= self.buffer.len());
        let Some(end) = end else {
            return Err(SqliteError::format(
                self.region,
                format!(
                    "need {len} bytes at offset {}, only {} available",
                    self.position,
                    self.remaining()
                ),
            ));
        };
        let bytes = &self.buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian two's complement integer of `width` bytes (1..=8)
    /// and sign extends it to 64 bits.
    pub fn read_signed(&mut self, width: usize) -> Result<i64> {
        debug_assert!((1..=8).contains(&width));
        let bytes = self.read_bytes(width)?;
        let mut value = 0_i64;
        for b in bytes {
            value = (value << 8) | *b as i64;
        }
        let shift = (8 - width) * 8;
        Ok((value << shift) >> shift)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let SqliteVarint { byte_size, varint } =
            parse_sqlite_varint(self.buffer, self.position).map_err(|_| {
                SqliteError::format(
                    self.region,
                    format!("truncated varint at offset {}", self.position),
                )
            })?;
        self.position += byte_size;
        Ok(varint)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_byte_varint() {
        let res = parse_sqlite_varint(&[0x7F, 0xFF], 0).unwrap();
        assert_eq!(
            res,
            SqliteVarint {
                byte_size: 1,
                varint: 127
            }
        );
    }

    #[test]
    fn two_byte_varint() {
        // 0x81 0x00 -> 1 << 7
        let res = parse_sqlite_varint(&[0x81, 0x00], 0).unwrap();
        assert_eq!(res.varint, 128);
        assert_eq!(res.byte_size, 2);
    }

    #[test]
    fn ninth_byte_uses_all_bits() {
        let mut bytes = vec![0xFF_u8; 8];
        bytes.push(0xFF);
        let res = parse_sqlite_varint(&bytes, 0).unwrap();
        assert_eq!(res.varint, u64::MAX);
        assert_eq!(res.byte_size, 9);

        // the 9th byte has no continuation bit, so a trailing byte is never consumed
        bytes.push(0x01);
        let res = parse_sqlite_varint(&bytes, 0).unwrap();
        assert_eq!(res.byte_size, 9);
    }

    #[test]
    fn truncated_varint_is_a_format_error() {
        let err = parse_sqlite_varint(&[0x81, 0x82], 0).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn encoding_lengths() {
        assert_eq!(encode_sqlite_varint(0), vec![0x00]);
        assert_eq!(encode_sqlite_varint(127).len(), 1);
        assert_eq!(encode_sqlite_varint(128), vec![0x81, 0x00]);
        assert_eq!(encode_sqlite_varint(0x00FF_FFFF_FFFF_FFFF).len(), 8);
        assert_eq!(encode_sqlite_varint(0x0100_0000_0000_0000).len(), 9);
    }

    #[test]
    fn cursor_reads_big_endian() {
        let bytes = [0x01, 0x02, 0x00, 0x00, 0x01, 0x00, 0xFF];
        let mut cursor = ByteCursor::new(&bytes, "test");
        assert_eq!(cursor.read_u16().unwrap(), 0x0102);
        assert_eq!(cursor.read_u32().unwrap(), 0x0000_0100);
        assert_eq!(cursor.read_signed(1).unwrap(), -1);
        assert!(!cursor.has_remaining());
        assert!(cursor.read_u8().unwrap_err().is_format());
    }

    #[test]
    fn cursor_sign_extends_odd_widths() {
        let bytes = [0xFF, 0xFF, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        let mut cursor = ByteCursor::new(&bytes, "test");
        assert_eq!(cursor.read_signed(3).unwrap(), -2);
        assert_eq!(cursor.read_signed(6).unwrap(), 1);
    }

    proptest! {
        #[test]
        fn varint_round_trip(n in any::<u64>()) {
            let encoded = encode_sqlite_varint(n);
            let decoded = parse_sqlite_varint(&encoded, 0).unwrap();
            prop_assert_eq!(decoded.varint, n);
            prop_assert_eq!(decoded.byte_size, encoded.len());
        }
    }
}
