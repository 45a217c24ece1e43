/// Cursor over a raw fuzz buffer with bounded primitive extraction
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extraction failures. Both mean "abandon this run", never a defect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumeError {
    #[error("not enough data: wanted {wanted} bytes, {remaining} remaining")]
    Exhausted { wanted: usize, remaining: usize },

    #[error("record nesting exceeds depth limit {limit}")]
    DepthExceeded { limit: usize },
}

/// Bounds applied while turning bytes into structured values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerLimits {
    /// Longest string a length prefix may announce
    pub max_string_len: usize,
    /// Longest sequence a length byte may announce
    pub max_sequence_len: usize,
    /// Deepest record nesting
    pub max_depth: usize,
}

impl Default for ConsumerLimits {
    fn default() -> Self {
        Self {
            max_string_len: 64 * 1024,
            max_sequence_len: 16,
            max_depth: 8,
        }
    }
}

/// Raw fuzz bytes plus a read cursor.
///
/// Every successful extraction advances the cursor. A failed extraction
/// leaves it where it was.
#[derive(Debug)]
pub struct FuzzInput<'a> {
    data: &'a [u8],
    position: usize,
    depth: usize,
    limits: ConsumerLimits,
}

impl<'a> FuzzInput<'a> {
    pub fn new(data: &'a [u8], limits: ConsumerLimits) -> Self {
        Self {
            data,
            position: 0,
            depth: 0,
            limits,
        }
    }

    pub fn limits(&self) -> &ConsumerLimits {
        &self.limits
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take exactly `len` bytes.
    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], ConsumeError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(ConsumeError::Exhausted {
                wanted: len,
                remaining,
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&self.data[start..self.position])
    }

    fn get_array<const N: usize>(&mut self) -> Result<[u8; N], ConsumeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.get_bytes(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, ConsumeError> {
        Ok(self.get_array::<1>()?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, ConsumeError> {
        Ok(self.get_u8()? & 1 == 1)
    }

    pub fn get_u16(&mut self) -> Result<u16, ConsumeError> {
        Ok(u16::from_be_bytes(self.get_array()?))
    }

    pub fn get_u32(&mut self) -> Result<u32, ConsumeError> {
        Ok(u32::from_be_bytes(self.get_array()?))
    }

    pub fn get_u64(&mut self) -> Result<u64, ConsumeError> {
        Ok(u64::from_be_bytes(self.get_array()?))
    }

    /// Small integer taken from a single byte.
    pub fn get_int(&mut self) -> Result<i64, ConsumeError> {
        Ok(i64::from(self.get_u8()?))
    }

    /// Length-prefixed string: a big-endian u32 length, then that many bytes.
    ///
    /// Invalid UTF-8 is replaced rather than rejected so that every byte
    /// sequence still maps to exactly one string.
    pub fn get_string(&mut self) -> Result<String, ConsumeError> {
        let start = self.position;
        let len = self.get_u32()? as usize;
        let remaining = self.remaining();
        if len > self.limits.max_string_len || len > remaining {
            self.position = start;
            return Err(ConsumeError::Exhausted {
                wanted: len.saturating_add(4),
                remaining: remaining + 4,
            });
        }
        let bytes = self.get_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Length of the next sequence, bounded by the configured limit.
    pub fn get_sequence_len(&mut self) -> Result<usize, ConsumeError> {
        let len = self.get_u8()? as usize;
        Ok(match self.limits.max_sequence_len.checked_add(1) {
            Some(bound) => len % bound,
            None => len,
        })
    }

    /// Run `f` one record level deeper.
    pub fn descend<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ConsumeError>,
    ) -> Result<T, ConsumeError> {
        if self.depth >= self.limits.max_depth {
            return Err(ConsumeError::DepthExceeded {
                limit: self.limits.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Build a fresh value of `T` from the stream.
    pub fn populate<T: super::Generate>(&mut self) -> Result<T, ConsumeError> {
        T::generate(self)
    }

    /// Overwrite `value` field by field. On failure the fields produced so
    /// far are kept.
    pub fn populate_into<T: super::Generate>(&mut self, value: &mut T) -> Result<(), ConsumeError> {
        value.fill(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(data: &[u8]) -> FuzzInput<'_> {
        FuzzInput::new(data, ConsumerLimits::default())
    }

    #[test]
    fn test_get_int_reads_one_byte() {
        let mut c = input(&[7, 200]);
        assert_eq!(c.get_int(), Ok(7));
        assert_eq!(c.get_int(), Ok(200));
        assert!(c.get_int().is_err());
    }

    #[test]
    fn test_get_string_round_trip() {
        let mut c = input(&[0, 0, 0, 3, b'a', b'b', b'c', 9]);
        assert_eq!(c.get_string().unwrap(), "abc");
        assert_eq!(c.position(), 7);
        assert_eq!(c.remaining(), 1);
    }

    #[test]
    fn test_short_string_does_not_consume() {
        let mut c = input(&[0, 0, 0, 10, b'a']);
        let err = c.get_string().unwrap_err();
        assert!(matches!(err, ConsumeError::Exhausted { .. }));
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn test_string_limit_enforced() {
        let limits = ConsumerLimits {
            max_string_len: 2,
            ..ConsumerLimits::default()
        };
        let mut c = FuzzInput::new(&[0, 0, 0, 3, b'a', b'b', b'c'], limits);
        assert!(c.get_string().is_err());
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn test_exhausted_u32_does_not_consume() {
        let mut c = input(&[1, 2]);
        assert!(c.get_u32().is_err());
        assert_eq!(c.remaining(), 2);
    }

    #[test]
    fn test_sequence_len_is_bounded() {
        let limits = ConsumerLimits {
            max_sequence_len: 3,
            ..ConsumerLimits::default()
        };
        let mut c = FuzzInput::new(&[255], limits);
        assert!(c.get_sequence_len().unwrap() <= 3);
    }

    #[test]
    fn test_unbounded_sequence_len_takes_the_byte() {
        let limits = ConsumerLimits {
            max_sequence_len: usize::MAX,
            ..ConsumerLimits::default()
        };
        let mut c = FuzzInput::new(&[255, 0], limits);
        assert_eq!(c.get_sequence_len().unwrap(), 255);
        assert_eq!(c.get_sequence_len().unwrap(), 0);
    }

    #[test]
    fn test_descend_enforces_depth() {
        let limits = ConsumerLimits {
            max_depth: 1,
            ..ConsumerLimits::default()
        };
        let mut c = FuzzInput::new(&[], limits);
        let nested = c.descend(|c| c.descend(|_| Ok(())));
        assert_eq!(nested, Err(ConsumeError::DepthExceeded { limit: 1 }));
        // depth is restored after the failed attempt
        assert_eq!(c.descend(|_| Ok(1)), Ok(1));
    }
}
