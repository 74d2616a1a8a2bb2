// Buzhash rolling window hash.
//
// A 32-bit hash over a fixed window: every step rotates the accumulator left
// by one bit and XORs in a pseudorandom constant for the incoming byte.
// Sliding the window by one byte costs one rotate and three XORs.

/// Initial accumulator value.
pub const SEED: u32 = 0x83D3_1DF4;

/// Per-byte pseudorandom constants.
static NOISE: [u32; 256] = [
    0x9BE502A4, 0xBA7180EA, 0x324E474F, 0x0AAB8451, 0x0CED3810, 0x2158A968, 0x6BBD3771, 0x75A02529,
    0x41F05C14, 0xC2264B87, 0x1F67B359, 0xCD2D031D, 0x49DC0C04, 0xA04AE45C, 0x6ADE28A7, 0x2D0254FF,
    0xDEC60C7C, 0xDEF5C084, 0x0F77FFC8, 0x112021F6, 0x5F6D581E, 0xE35EA3DF, 0x3216BFB4, 0xD5A3083D,
    0x7E63E9CD, 0xAA9208F6, 0xDA3F3978, 0xFE0E2547, 0x09DFB020, 0xD97472C5, 0xBBCE2EDE, 0x121AEBD2,
    0x0E9FDBEB, 0x7B6F5D9C, 0x84938E43, 0x30694F2D, 0x86B7A7F8, 0xEFAF5876, 0x263812E6, 0xB6E48DDF,
    0xCE8ED980, 0x4DF591E1, 0x75257B35, 0x2F88DCFF, 0xA461FE44, 0xCA613B4D, 0xD9803F73, 0xEA056205,
    0xCCCA7A89, 0x0F2DBB07, 0xC53E359E, 0xE80D0137, 0x2B2D2A5D, 0xCFC1391A, 0x2BB3B6C5, 0xB66AEA3C,
    0x00EA419E, 0xCE5ADA84, 0xAE1D6712, 0x12F576BA, 0x117FCBC4, 0xA9D4C775, 0x25B3D616, 0xEFDA65A8,
    0xAFF3EF5B, 0x00627E68, 0x668D1E99, 0x088D0EEF, 0xF8FAC24D, 0xE77457C7, 0x68D3BEB4, 0x921D2ACB,
    0x9410EAC9, 0xD7F24399, 0xCBDEC497, 0x98C99AE1, 0x65802B2C, 0x81E1C3C4, 0xA130BB09, 0x17A87BAD,
    0xA70367D6, 0x148658D4, 0x02F33377, 0x8620D8B6, 0xBDAC25BD, 0xB0A6DE51, 0xD64C4571, 0xA4185BA0,
    0xA342D70F, 0x3F1DC4C1, 0x042DC3CE, 0x0DE89F43, 0xA69B1867, 0x3C064E11, 0xAD1E2C3E, 0x9660E8CD,
    0xD36B09CA, 0x4888F228, 0x61A9AC3C, 0xD9561118, 0x3532797E, 0x71A35C22, 0xECC1376C, 0xAB31E656,
    0x88BD0D35, 0x423B20DD, 0x38E4651C, 0x3C6397A4, 0x4A7B12D9, 0x08B1CF33, 0xD0604137, 0xB035FDB8,
    0x4916DA23, 0xA9349493, 0xD83DAA9B, 0x145F7D95, 0x868531D6, 0xACB18F17, 0x9CD33B6F, 0x193E42B9,
    0x26DFDC42, 0x5069D8FA, 0x5BEE24EE, 0x5475D4C6, 0x315B2C0C, 0xF764EF45, 0x01B6F4EB, 0x60BA3225,
    0x8A16777C, 0x4C05CD28, 0x53E8C1D2, 0xC8A76CE5, 0x8045C1E6, 0x61328752, 0x2EBAD322, 0x3444F3E2,
    0x91B8AF11, 0xB0CEE675, 0x55DBFF5A, 0xF7061EE0, 0x27D7D639, 0xA4AEF8C9, 0x42FF0E4F, 0x62755468,
    0x1C6CA3F3, 0xE4F522D1, 0x2765FCB3, 0xE20C8A95, 0x3A69AEA7, 0x56AB2C4F, 0x8551E688, 0xE0BC14C2,
    0x278676BF, 0x893B6102, 0xB4F0AB3B, 0xB55DDDA9, 0xA04C521F, 0xC980088E, 0x912AEAC1, 0x08519BAD,
    0x991302D3, 0x5B91A25B, 0x696D9854, 0x9AD8B4BF, 0x41CB7E21, 0xA65D1E03, 0x85791D29, 0x89478AA7,
    0x4581E337, 0x59BAE0B1, 0xE0FC9DF3, 0x45D9002C, 0x7837464F, 0xDA22DE3A, 0x1DC544BD, 0x601D8BAD,
    0x668B0ABC, 0x7A5EBFB1, 0x3AC0B624, 0x5EE16D7D, 0x9BFAC387, 0xBE8EF20C, 0x8D2AE384, 0x819DC7D5,
    0x7C4951E7, 0xE60DA716, 0x0C5B0073, 0xB43B3D97, 0xCE9974ED, 0x0F691DA9, 0x4B616D60, 0x8FA9E819,
    0x3F390333, 0x6F62FAD6, 0x5A32B67C, 0x3BE6F1C3, 0x05851103, 0xFF28828D, 0xAA43A56A, 0x075D7DD5,
    0x248C4B7E, 0x52FDE3EB, 0xF72E2EDA, 0x5DA6F75F, 0x2F5148D9, 0xCAE2AEAE, 0xFDA6F3E5, 0xFF60D8FF,
    0x2ADC02D2, 0x1DBDBD4C, 0xD410AD7C, 0x8C284AAE, 0x392EF8E0, 0x37D48B3A, 0x6792FE9D, 0xAD32DDFA,
    0x1545F24E, 0x3A260F73, 0xB724CA36, 0xC510D751, 0x4F8DF992, 0x000B8B37, 0x292E9B3D, 0xA32F250F,
    0x8263D144, 0xFCAE0516, 0x1EAE2183, 0xD4AF2027, 0xC64AFAE3, 0xE7B34FE4, 0xDF864AEA, 0x80CC71C5,
    0x0E814DF3, 0x66CC5F41, 0x853A497A, 0xA2886213, 0x5E34A2EA, 0x0F53BA47, 0x718C484A, 0xFA0F0B12,
    0x33CC59FF, 0x72B48E07, 0x8B6F57BC, 0x29CF886D, 0x1950955B, 0xCD52910C, 0x4CECEF65, 0x05C2CBFE,
    0x49DF4F6A, 0x1F4C3F34, 0xFADC1A09, 0xF2D65A24, 0x117F5594, 0xDE3A84E6, 0x48DB3024, 0xD10CA9B5,
];

/// Noise constant for `byte`.
#[inline(always)]
pub fn noise(byte: u8) -> u32 {
    NOISE[byte as usize]
}

/// Buzhash state for one window width.
#[derive(Debug, Clone, Copy)]
pub struct RollingHash {
    window: usize,
    /// Rotation applied to the outgoing byte's term (`window mod 32`).
    out_shift: u32,
    /// Seed correction folded into every outgoing term.
    seed_fix: u32,
}

impl RollingHash {
    pub fn new(window: usize) -> Self {
        debug_assert!(window > 0);
        Self {
            window,
            out_shift: (window % 32) as u32,
            seed_fix: SEED ^ SEED.rotate_left(1),
        }
    }

    /// Window width in bytes.
    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    /// From-scratch hash of `base[..window]`.
    #[inline]
    pub fn checksum(&self, base: &[u8]) -> u32 {
        debug_assert!(base.len() >= self.window);
        base[..self.window]
            .iter()
            .fold(SEED, |x, &b| x.rotate_left(1) ^ noise(b))
    }

    /// Slide the window one byte: `outgoing` leaves at the front and
    /// `incoming` enters at the back.
    #[inline(always)]
    pub fn roll(&self, hash: u32, outgoing: u8, incoming: u8) -> u32 {
        let out = (noise(outgoing) ^ self.seed_fix).rotate_left(self.out_shift);
        hash.rotate_left(1) ^ noise(incoming) ^ out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_bytes(n: usize, seed: u64) -> Vec<u8> {
        let mut s = seed;
        (0..n)
            .map(|_| {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
                (s >> 33) as u8
            })
            .collect()
    }

    #[test]
    fn single_byte_window() {
        let rh = RollingHash::new(1);
        assert_eq!(rh.checksum(&[0]), SEED.rotate_left(1) ^ noise(0));
        assert_eq!(rh.checksum(&[0xFF]), SEED.rotate_left(1) ^ noise(0xFF));
    }

    #[test]
    fn checksum_reads_only_the_window() {
        let rh = RollingHash::new(16);
        let a = b"0123456789abcdefXXXX";
        let b = b"0123456789abcdefYYYY";
        assert_eq!(rh.checksum(a), rh.checksum(b));
        assert_ne!(rh.checksum(a), rh.checksum(&a[1..]));
    }

    #[test]
    fn rolling_chain_matches_fresh_checksum() {
        let data = lcg_bytes(600, 7);
        for window in [1, 4, 16, 31, 32, 33, 64, 100] {
            let rh = RollingHash::new(window);
            let mut h = rh.checksum(&data);
            for i in 0..data.len() - window {
                h = rh.roll(h, data[i], data[i + window]);
                assert_eq!(h, rh.checksum(&data[i + 1..]), "window {window} offset {i}");
            }
        }
    }

    #[test]
    fn noise_table_endpoints() {
        assert_eq!(noise(0), 0x9BE5_02A4);
        assert_eq!(noise(255), 0xD10C_A9B5);
    }
}
