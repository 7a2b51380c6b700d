use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::GalleryError;

/// Record magic and versions for the persisted identity layout.
const RECORD_MAGIC: [u8; 4] = [b'G', b'A', b'I', b'T'];
const RECORD_VERSION: u8 = 2;
const RECORD_VERSION_V1: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 8 + 8 + 4;
const HEADER_LEN_V1: usize = 4 + 1 + 8 + 4;

/// An enrolled subject and its reference embedding.
#[derive(Clone, PartialEq)]
pub struct Identity {
    /// Opaque, stable identifier (usually an account id).
    pub id: String,

    /// Reference embedding. Always `dim` values long for the owning gallery.
    pub vector: Vec<f32>,

    /// Time of the latest enrollment.
    pub enrolled_at: DateTime<Utc>,

    /// Gallery-wide enrollment counter at the latest enrollment. Strictly
    /// increasing per gallery; 0 for records written before it existed.
    pub seq: u64,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .field("enrolled_at", &self.enrolled_at)
            .field("vector_len", &self.vector.len())
            .finish()
    }
}

impl Identity {
    /// Creates an identity with enrollment number `seq`, stamped with the
    /// current time truncated to the microsecond resolution of the
    /// persisted layout.
    pub fn new(id: impl Into<String>, vector: Vec<f32>, seq: u64) -> Self {
        let now = Utc::now();
        let enrolled_at = DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now);
        Self {
            id: id.into(),
            vector,
            enrolled_at,
            seq,
        }
    }

    /// Returns the dimensionality of the reference vector.
    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    /// Orders identities by enrollment: `seq`, then `enrolled_at` and `id`
    /// for legacy records that share `seq` 0.
    pub fn enrollment_order(&self, other: &Identity) -> Ordering {
        self.seq
            .cmp(&other.seq)
            .then_with(|| self.enrolled_at.cmp(&other.enrolled_at))
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Serializes the record value (the id is stored as the key).
    ///
    /// ```text
    /// [4B magic "GAIT"] [1B version=2]
    /// [8B enrolled_at, unix microseconds, i64]
    /// [8B seq, u64]
    /// [4B dim, u32]
    /// [dim x 4B float32 vector]
    /// ```
    ///
    /// All multi-byte values are little-endian. Version 1 records (no `seq`)
    /// are still decoded, with `seq` 0.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.vector.len() * 4);
        buf.extend_from_slice(&RECORD_MAGIC);
        buf.push(RECORD_VERSION);
        buf.extend_from_slice(&self.enrolled_at.timestamp_micros().to_le_bytes());
        buf.extend_from_slice(&self.seq.to_le_bytes());
        buf.extend_from_slice(&(self.vector.len() as u32).to_le_bytes());
        for &v in &self.vector {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    /// Deserializes a record value produced by [`Identity::encode`].
    pub fn decode(id: &str, data: &[u8]) -> Result<Self, GalleryError> {
        let corrupt = |reason: String| GalleryError::Corrupt {
            id: id.to_string(),
            reason,
        };

        if data.len() < HEADER_LEN_V1 {
            return Err(corrupt(format!("record too short: {} bytes", data.len())));
        }
        if data[0..4] != RECORD_MAGIC {
            return Err(corrupt(format!("invalid magic {:?}", &data[0..4])));
        }
        let header_len = match data[4] {
            RECORD_VERSION => HEADER_LEN,
            RECORD_VERSION_V1 => HEADER_LEN_V1,
            v => return Err(corrupt(format!("unsupported version {v}"))),
        };
        if data.len() < header_len {
            return Err(corrupt(format!("record too short: {} bytes", data.len())));
        }

        let micros = i64::from_le_bytes(le_bytes(&data[5..13]));
        let enrolled_at = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| corrupt(format!("timestamp out of range: {micros}")))?;

        let (seq, dim_at) = if header_len == HEADER_LEN {
            (u64::from_le_bytes(le_bytes(&data[13..21])), 21)
        } else {
            (0, 13)
        };
        let dim = u32::from_le_bytes(le_bytes(&data[dim_at..dim_at + 4])) as usize;

        let body = &data[header_len..];
        if body.len() != dim * 4 {
            return Err(corrupt(format!(
                "vector length {} bytes, want {} for dim {dim}",
                body.len(),
                dim * 4
            )));
        }

        let vector = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self {
            id: id.to_string(),
            vector,
            enrolled_at,
            seq,
        })
    }

    /// Reports whether `vector` is bit-for-bit equal to the stored one.
    pub fn same_vector(&self, vector: &[f32]) -> bool {
        self.vector.len() == vector.len()
            && self
                .vector
                .iter()
                .zip(vector)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

fn le_bytes<const N: usize>(b: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(b);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_preserves_bits() {
        let v = vec![1.0, -0.0, f32::MIN_POSITIVE, 1.0e-42, f32::MAX, 0.1];
        let ident = Identity::new("alice", v.clone(), 7);
        let data = ident.encode();
        assert_eq!(data.len(), HEADER_LEN + v.len() * 4);

        let back = Identity::decode("alice", &data).unwrap();
        assert_eq!(back.id, "alice");
        assert_eq!(back.enrolled_at, ident.enrolled_at);
        assert_eq!(back.seq, 7);
        assert!(back.same_vector(&v));
    }

    #[test]
    fn layout_is_little_endian() {
        let mut ident = Identity::new("bob", vec![1.0], 3);
        ident.enrolled_at = DateTime::from_timestamp_micros(1).unwrap();
        let data = ident.encode();
        assert_eq!(&data[0..4], b"GAIT");
        assert_eq!(data[4], 2);
        assert_eq!(&data[5..13], &1i64.to_le_bytes());
        assert_eq!(&data[13..21], &3u64.to_le_bytes());
        assert_eq!(&data[21..25], &1u32.to_le_bytes());
        assert_eq!(&data[25..29], &1.0f32.to_le_bytes());
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut data = Identity::new("x", vec![0.5; 4], 1).encode();
        data[0] = b'X';
        assert!(matches!(
            Identity::decode("x", &data),
            Err(GalleryError::Corrupt { .. })
        ));
    }

    #[test]
    fn decode_rejects_truncated_vector() {
        let data = Identity::new("x", vec![0.5; 4], 1).encode();
        let err = Identity::decode("x", &data[..data.len() - 1]).unwrap_err();
        assert!(err.to_string().contains("vector length"), "got {err}");
    }

    #[test]
    fn decode_rejects_short_header() {
        assert!(Identity::decode("x", b"GAIT").is_err());
    }

    #[test]
    fn decode_reads_version_1_records() {
        let mut data = Vec::new();
        data.extend_from_slice(b"GAIT");
        data.push(1);
        data.extend_from_slice(&5i64.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&0.5f32.to_le_bytes());
        data.extend_from_slice(&(-1.0f32).to_le_bytes());

        let ident = Identity::decode("old", &data).unwrap();
        assert_eq!(ident.seq, 0);
        assert_eq!(ident.enrolled_at.timestamp_micros(), 5);
        assert_eq!(ident.vector, vec![0.5, -1.0]);
    }

    #[test]
    fn enrollment_order_prefers_seq_over_clock() {
        let mut first = Identity::new("zed", vec![1.0], 1);
        let mut second = Identity::new("amy", vec![1.0], 2);
        // Same microsecond, or a clock that stepped back.
        first.enrolled_at = DateTime::from_timestamp_micros(10).unwrap();
        second.enrolled_at = DateTime::from_timestamp_micros(10).unwrap();
        assert_eq!(first.enrollment_order(&second), Ordering::Less);
        second.enrolled_at = DateTime::from_timestamp_micros(9).unwrap();
        assert_eq!(first.enrollment_order(&second), Ordering::Less);
    }

    #[test]
    fn same_vector_distinguishes_signed_zero() {
        let ident = Identity::new("z", vec![0.0], 1);
        assert!(ident.same_vector(&[0.0]));
        assert!(!ident.same_vector(&[-0.0]));
        assert!(!ident.same_vector(&[0.0, 0.0]));
    }
}
