//! Seeded xorshift64* generator for reproducible scenarios.

#[derive(Clone, Copy, Debug)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// A zero seed would stick at zero, so it is replaced by a fixed constant.
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn gen_range(&mut self, low: usize, high_inclusive: usize) -> usize {
        assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }

    /// Independent stream for worker `index`.
    pub fn fork(&self, index: u64) -> Self {
        Self::new(self.state ^ (index + 1).wrapping_mul(0xA24B_AED4_963E_E407))
    }
}

/// Parse a seed given in decimal or `0x` hex, with optional `_` separators.
pub fn parse_seed(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|&c| c != '_').collect();
    match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => cleaned.parse().ok(),
    }
}
