//! Nozzle masks for bench testing and the canned print jobs

use core::fmt;

use crate::xaar128::mask::NozzleMask;
use crate::xaar128::timing::Timing;
use crate::xaar128::{MASK_BYTES, NOZZLES};

/// Nozzles covered by one bit of a coarse pattern
pub const COARSE_GROUP: usize = NOZZLES / 8;

/// Expand 8 bits to a full mask, one bit per group of 16 neighbouring nozzles
///
/// Bit 0 covers nozzles 0..15, bit 7 covers nozzles 112..127.
pub fn coarse(bits: u8) -> NozzleMask {
    let mut bytes = [0u8; MASK_BYTES];
    for (i, pair) in bytes.chunks_exact_mut(2).enumerate() {
        if bits & (1 << i) != 0 {
            pair.fill(0xFF);
        }
    }
    NozzleMask::new(bytes)
}

/// Mask with only nozzle `n` switched on. Out of range nozzles give a blank mask.
pub fn single_nozzle(n: usize) -> NozzleMask {
    NozzleMask::BLANK.with_nozzle(n, true)
}

/// Fixed pseudo random bytes used by [`TestPattern::Random`]
const SCATTER: [u8; MASK_BYTES] = [
    0xfe, 0x23, 0x8e, 0x28, 0xff, 0xa2, 0x79, 0x54, 0xfe, 0x23, 0x8e, 0x28, 0xff, 0xa2, 0x79,
    0x54,
];

/// Built-in nozzle test patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPattern {
    /// Blank mask, runs the protocol without ejecting ink
    Blank,
    /// Fixed scattered selection, fired twice per repeat
    Random,
    /// Every nozzle once, in order
    Walk,
    /// Every nozzle at once
    Solid,
}

impl TestPattern {
    /// Every pattern, in console order
    pub const ALL: [TestPattern; 4] = [
        TestPattern::Blank,
        TestPattern::Random,
        TestPattern::Walk,
        TestPattern::Solid,
    ];

    /// Pattern bound to a console key
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(TestPattern::Blank),
            '1' => Some(TestPattern::Random),
            '2' => Some(TestPattern::Walk),
            '9' => Some(TestPattern::Solid),
            _ => None,
        }
    }

    /// Console key of the pattern
    pub fn key(&self) -> char {
        match self {
            TestPattern::Blank => '0',
            TestPattern::Random => '1',
            TestPattern::Walk => '2',
            TestPattern::Solid => '9',
        }
    }

    /// How many times the console runs the pattern
    pub fn repeats(&self) -> u32 {
        match self {
            TestPattern::Walk => 3,
            _ => 10,
        }
    }

    /// Pause after every firing, `None` when masks are fired back to back
    pub fn gap_ms(&self) -> Option<u32> {
        match self {
            TestPattern::Walk => None,
            _ => Some(Timing::PATTERN_GAP_MS),
        }
    }

    /// Masks fired for one repeat of the pattern
    pub fn masks(&self) -> Vec<NozzleMask> {
        match self {
            TestPattern::Blank => vec![NozzleMask::BLANK],
            TestPattern::Random => vec![NozzleMask::new(SCATTER); 2],
            TestPattern::Walk => (0..NOZZLES).map(single_nozzle).collect(),
            TestPattern::Solid => vec![NozzleMask::SOLID],
        }
    }
}

impl fmt::Display for TestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestPattern::Blank => "no ink",
            TestPattern::Random => "some random pattern",
            TestPattern::Walk => "every nozzle once",
            TestPattern::Solid => "all black",
        };
        write!(f, "Pattern 0{}: {}", self.key(), name)
    }
}

/// Canned print jobs
///
/// Both home the carriage, back off from the endstop, then print coarse bands. Each
/// band is fired [`PrintJob::SHOTS_PER_BAND`] times with a one step retract after
/// every firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintJob {
    /// 16 bands cycling through full, odd and even nozzle groups
    Bands,
    /// 32 full bands
    Solid,
}

impl PrintJob {
    /// Firings per band
    pub const SHOTS_PER_BAND: u32 = 20;

    /// Carriage move after every firing
    pub const STEP_PER_SHOT: i32 = -1;

    /// Carriage move from the endstop to the start of the print
    pub fn back_off(&self) -> i32 {
        match self {
            PrintJob::Bands => -1400,
            PrintJob::Solid => -1000,
        }
    }

    /// Coarse pattern of every band, in print order
    pub fn bands(&self) -> Vec<u8> {
        match self {
            PrintJob::Bands => [0xff, 0xaa, 0x55].into_iter().cycle().take(16).collect(),
            PrintJob::Solid => vec![0xff; 32],
        }
    }

    /// Total number of firings in the job
    pub fn shots(&self) -> u32 {
        self.bands().len() as u32 * Self::SHOTS_PER_BAND
    }
}

impl fmt::Display for PrintJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintJob::Bands => write!(f, "band test print"),
            PrintJob::Solid => write!(f, "solid test print"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_bit_zero_is_first_sixteen_nozzles() {
        let mask = coarse(0x01);
        assert_eq!(mask.count_on() as usize, COARSE_GROUP);
        assert!((0..16).all(|n| mask.is_on(n)));
        assert!(!mask.is_on(16));
    }

    #[test]
    fn coarse_expands_every_bit_to_two_bytes() {
        assert_eq!(coarse(0xff), NozzleMask::SOLID);
        assert_eq!(coarse(0x00), NozzleMask::BLANK);
        assert_eq!(
            coarse(0xaa).as_bytes(),
            &[0, 0, 0xff, 0xff, 0, 0, 0xff, 0xff, 0, 0, 0xff, 0xff, 0, 0, 0xff, 0xff]
        );
        assert!(coarse(0x80).is_on(127));
    }

    #[test]
    fn single_nozzle_bit_position() {
        assert_eq!(single_nozzle(0).as_bytes()[0], 0x80);
        assert_eq!(single_nozzle(9).as_bytes()[1], 0x40);
        assert_eq!(single_nozzle(127).as_bytes()[15], 0x01);
        assert_eq!(single_nozzle(128), NozzleMask::BLANK);
    }

    #[test]
    fn walk_visits_every_nozzle_once() {
        let masks = TestPattern::Walk.masks();
        assert_eq!(masks.len(), NOZZLES);
        for (n, mask) in masks.iter().enumerate() {
            assert_eq!(mask.count_on(), 1);
            assert!(mask.is_on(n));
        }
    }

    #[test]
    fn console_keys_round_trip() {
        for pattern in TestPattern::ALL {
            assert_eq!(TestPattern::from_char(pattern.key()), Some(pattern));
        }
        assert_eq!(TestPattern::from_char('5'), None);
    }

    #[test]
    fn repeat_counts_and_gaps() {
        let repeats: Vec<u32> = TestPattern::ALL.iter().map(|p| p.repeats()).collect();
        assert_eq!(repeats, [10, 10, 3, 10]);
        assert_eq!(TestPattern::Random.masks().len(), 2);
        assert_eq!(TestPattern::Solid.gap_ms(), Some(50));
        assert_eq!(TestPattern::Walk.gap_ms(), None);
    }

    #[test]
    fn band_job_cycles_and_ends_full() {
        let bands = PrintJob::Bands.bands();
        assert_eq!(bands.len(), 16);
        assert_eq!(&bands[..4], &[0xff, 0xaa, 0x55, 0xff]);
        assert_eq!(bands.last(), Some(&0xff));
        assert_eq!(PrintJob::Bands.shots(), 320);
        assert_eq!(PrintJob::Solid.shots(), 640);
    }
}
