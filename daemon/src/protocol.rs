//! Wire protocol for telemetry datagrams (fixed-width, little-endian)

use crate::error::{GuardianError, Result};

/// Size in bytes of one encoded [`Sample`].
pub const WIRE_SIZE: usize = 7 * 8 + 3 * 4;

/// One decoded performance-counter reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ns: u64,
    pub cache_references: u64,
    pub cache_misses: u64,
    pub branch_instructions: u64,
    pub branch_misses: u64,
    pub cycles: u64,
    pub instructions: u64,
    pub cache_miss_rate: f32,
    pub branch_miss_rate: f32,
    pub ipc: f32,
}

/// Raw counter deltas for one sampling interval, before rates are derived.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub cache_references: u64,
    pub cache_misses: u64,
    pub branch_instructions: u64,
    pub branch_misses: u64,
    pub cycles: u64,
    pub instructions: u64,
}

fn ratio(num: u64, den: u64) -> f32 {
    if den > 0 {
        num as f32 / den as f32
    } else {
        0.0
    }
}

impl Sample {
    /// Builds a sample the way the collector does: rates are derived from
    /// the counters and are zero when their denominator is zero.
    pub fn from_counters(timestamp_ns: u64, c: Counters) -> Self {
        Self {
            timestamp_ns,
            cache_references: c.cache_references,
            cache_misses: c.cache_misses,
            branch_instructions: c.branch_instructions,
            branch_misses: c.branch_misses,
            cycles: c.cycles,
            instructions: c.instructions,
            cache_miss_rate: ratio(c.cache_misses, c.instructions),
            branch_miss_rate: ratio(c.branch_misses, c.branch_instructions),
            ipc: ratio(c.instructions, c.cycles),
        }
    }

    pub fn encode(&self) -> [u8; WIRE_SIZE] {
        let mut buf = [0u8; WIRE_SIZE];
        let words = [
            self.timestamp_ns,
            self.cache_references,
            self.cache_misses,
            self.branch_instructions,
            self.branch_misses,
            self.cycles,
            self.instructions,
        ];
        for (i, w) in words.iter().enumerate() {
            buf[i * 8..i * 8 + 8].copy_from_slice(&w.to_le_bytes());
        }
        let rates = [self.cache_miss_rate, self.branch_miss_rate, self.ipc];
        for (i, r) in rates.iter().enumerate() {
            let off = 56 + i * 4;
            buf[off..off + 4].copy_from_slice(&r.to_le_bytes());
        }
        buf
    }
}

/// Decodes one datagram. Trailing bytes beyond [`WIRE_SIZE`] are ignored;
/// nothing besides the length is validated.
pub fn decode(bytes: &[u8]) -> Result<Sample> {
    if bytes.len() < WIRE_SIZE {
        return Err(GuardianError::Decode { got: bytes.len(), need: WIRE_SIZE });
    }
    let u64_at = |i: usize| {
        let mut w = [0u8; 8];
        w.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
        u64::from_le_bytes(w)
    };
    let f32_at = |i: usize| {
        let off = 56 + i * 4;
        let mut w = [0u8; 4];
        w.copy_from_slice(&bytes[off..off + 4]);
        f32::from_le_bytes(w)
    };
    Ok(Sample {
        timestamp_ns: u64_at(0),
        cache_references: u64_at(1),
        cache_misses: u64_at(2),
        branch_instructions: u64_at(3),
        branch_misses: u64_at(4),
        cycles: u64_at(5),
        instructions: u64_at(6),
        cache_miss_rate: f32_at(0),
        branch_miss_rate: f32_at(1),
        ipc: f32_at(2),
    })
}
