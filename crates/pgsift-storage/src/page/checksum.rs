//! Page checksum computation and verification.
//!
//! The engine checksums pages with an FNV-1a variant run over 32 parallel
//! lanes of 32-bit words (so the compiler can vectorize it), two extra
//! zero-mixing rounds, an XOR fold, then a fold to 16 bits seeded with the
//! page's block number. The checksum field itself is treated as zero while
//! hashing. An all-zero page is "not initialized" and always verifies.

use pgsift_common::PAGE_SIZE;
use serde::Serialize;

const N_LANES: usize = 32;
const FNV_PRIME: u32 = 16_777_619;

/// Per-lane seed values, fixed by the on-disk format.
const LANE_SEEDS: [u32; N_LANES] = [
    0x5B1F_36E9, 0xB852_5960, 0x02AB_50AA, 0x1DE6_6D2A, 0x79FF_467A, 0x9BB9_F8A3, 0x217E_7CD2,
    0x83E1_3D2C, 0xF8D4_474F, 0xE39E_B970, 0x42C6_AE16, 0x9932_16FA, 0x7B09_3B5D, 0x98DA_FF3C,
    0xF718_902A, 0x0B1C_9CDB, 0xE58F_764B, 0x1876_36BC, 0x5D7B_3BB1, 0xE73D_E7DE, 0x737B_3F90,
    0xA4FE_3C2C, 0x43A7_62D9, 0xCEE8_41EE, 0x4B8D_2882, 0x570E_FC5A, 0x3B1E_7E3A, 0x139B_66ED,
    0x5318_E5C2, 0xF461_07E4, 0x1680_5BCD, 0x6F4F_9004,
];

/// Word index of the 32-bit word containing the checksum field (bytes 8-9).
const CHECKSUM_WORD: usize = 2;

#[inline]
fn mix(sum: u32, value: u32) -> u32 {
    let tmp = sum ^ value;
    tmp.wrapping_mul(FNV_PRIME) ^ (tmp >> 17)
}

/// Computes the checksum of a full page for the given block number.
///
/// The stored checksum field is ignored, so this works on pages whose
/// checksum is absent, stale or being verified.
#[must_use]
pub fn page_checksum(page: &[u8], block: u32) -> u16 {
    debug_assert!(page.len() >= PAGE_SIZE);

    let mut sums = LANE_SEEDS;
    let rounds = PAGE_SIZE / (4 * N_LANES);

    for round in 0..rounds {
        for (lane, sum) in sums.iter_mut().enumerate() {
            let idx = (round * N_LANES + lane) * 4;
            let mut word = crate::bytes::u32(page, idx);
            if round * N_LANES + lane == CHECKSUM_WORD {
                // Hash as if the checksum field were zero
                word &= 0xFFFF_0000;
            }
            *sum = mix(*sum, word);
        }
    }

    // Two zero rounds push every input bit through the final mixing
    for _ in 0..2 {
        for sum in &mut sums {
            *sum = mix(*sum, 0);
        }
    }

    let folded = sums.iter().fold(0u32, |acc, s| acc ^ s) ^ block;
    ((folded % 65_535) + 1) as u16
}

/// Outcome of verifying one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ChecksumOutcome {
    /// Stored and computed checksums match.
    Valid,
    /// The page is all zeroes and has never been initialized.
    Uninitialized,
    /// Stored and computed checksums differ.
    Invalid {
        /// Checksum stored in the page header.
        stored: u16,
        /// Checksum computed from the page contents.
        computed: u16,
    },
}

impl ChecksumOutcome {
    /// Returns true unless the checksums differ.
    #[must_use]
    pub fn is_ok(self) -> bool {
        !matches!(self, Self::Invalid { .. })
    }
}

/// Verifies the checksum of one page.
#[must_use]
pub fn verify_page(page: &[u8], block: u32) -> ChecksumOutcome {
    if page.iter().all(|&b| b == 0) {
        return ChecksumOutcome::Uninitialized;
    }
    let stored = crate::bytes::u16(page, 8);
    let computed = page_checksum(page, block);
    if stored == computed {
        ChecksumOutcome::Valid
    } else {
        ChecksumOutcome::Invalid { stored, computed }
    }
}

/// Checksum verification counts for one relation file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileChecksumReport {
    /// Total pages inspected.
    pub blocks: usize,
    /// Pages whose checksum matched.
    pub valid: usize,
    /// Pages whose checksum did not match.
    pub invalid: usize,
    /// All-zero pages.
    pub uninitialized: usize,
    /// Block numbers of the mismatching pages.
    pub invalid_blocks: Vec<u32>,
}

impl FileChecksumReport {
    /// Merges another report's counts into this one.
    pub fn merge(&mut self, other: &FileChecksumReport) {
        self.blocks += other.blocks;
        self.valid += other.valid;
        self.invalid += other.invalid;
        self.uninitialized += other.uninitialized;
        self.invalid_blocks.extend_from_slice(&other.invalid_blocks);
    }
}

/// Verifies every page of a relation file. `first_block` is the global
/// block number of the file's first page (nonzero for later segments).
#[must_use]
pub fn verify_file(data: &[u8], first_block: u32) -> FileChecksumReport {
    let mut report = FileChecksumReport::default();

    for (i, page) in data.chunks_exact(PAGE_SIZE).enumerate() {
        let block = first_block + i as u32;
        report.blocks += 1;
        match verify_page(page, block) {
            ChecksumOutcome::Valid => report.valid += 1,
            ChecksumOutcome::Uninitialized => report.uninitialized += 1,
            ChecksumOutcome::Invalid { .. } => {
                report.invalid += 1;
                report.invalid_blocks.push(block);
            }
        }
    }

    report
}
