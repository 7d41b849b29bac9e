//! Nozzle masks and shift register channels

use core::fmt;
use core::ops::Range;

use crate::xaar128::{Error, Line, CHANNEL_BYTES, MASK_BYTES, NOZZLES, NOZZLES_PER_CHANNEL};

/// One of the two shift register domains inside the head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Nozzles 0..63
    A,
    /// Nozzles 64..127
    B,
}

impl Channel {
    /// Channels in the order they are loaded for a firing
    pub const LOAD_ORDER: [Channel; 2] = [Channel::A, Channel::B];

    /// Chip select line of this channel
    pub const fn select_line(self) -> Line {
        match self {
            Channel::A => Line::SelectA,
            Channel::B => Line::SelectB,
        }
    }

    /// Nozzles covered by this channel
    pub const fn nozzles(self) -> Range<usize> {
        match self {
            Channel::A => 0..NOZZLES_PER_CHANNEL,
            Channel::B => NOZZLES_PER_CHANNEL..NOZZLES,
        }
    }

    const fn bytes(self) -> Range<usize> {
        match self {
            Channel::A => 0..CHANNEL_BYTES,
            Channel::B => CHANNEL_BYTES..MASK_BYTES,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::A => write!(f, "A"),
            Channel::B => write!(f, "B"),
        }
    }
}

/// 128 bit nozzle firing mask
///
/// Nozzle `n` lives in byte `n / 8`, most significant bit first, so nozzle 0 is
/// bit 7 of byte 0 and nozzle 127 is bit 0 of byte 15.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NozzleMask([u8; MASK_BYTES]);

impl NozzleMask {
    /// Mask with every nozzle off. Firing it runs the full protocol without ejecting ink.
    pub const BLANK: NozzleMask = NozzleMask([0x00; MASK_BYTES]);

    /// Mask with every nozzle on
    pub const SOLID: NozzleMask = NozzleMask([0xFF; MASK_BYTES]);

    /// Create a mask from its 16 raw bytes
    pub const fn new(bytes: [u8; MASK_BYTES]) -> Self {
        NozzleMask(bytes)
    }

    /// Create a mask from a slice, rejecting anything that is not 16 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; MASK_BYTES] = bytes
            .try_into()
            .map_err(|_| Error::MaskLength { len: bytes.len() })?;
        Ok(NozzleMask(bytes))
    }

    /// Raw bytes in shift order
    pub const fn as_bytes(&self) -> &[u8; MASK_BYTES] {
        &self.0
    }

    /// The 8 bytes loaded into the given channel
    pub fn channel(&self, channel: Channel) -> [u8; CHANNEL_BYTES] {
        let mut half = [0u8; CHANNEL_BYTES];
        half.copy_from_slice(&self.0[channel.bytes()]);
        half
    }

    /// Whether nozzle `n` is selected. Nozzles past 127 are never selected.
    pub fn is_on(&self, nozzle: usize) -> bool {
        if nozzle >= NOZZLES {
            return false;
        }
        self.0[nozzle / 8] & (0x80 >> (nozzle % 8)) != 0
    }

    /// Return a copy of this mask with nozzle `n` switched on or off
    ///
    /// Nozzles past 127 are ignored.
    #[must_use]
    pub fn with_nozzle(mut self, nozzle: usize, on: bool) -> Self {
        if nozzle < NOZZLES {
            let bit = 0x80 >> (nozzle % 8);
            if on {
                self.0[nozzle / 8] |= bit;
            } else {
                self.0[nozzle / 8] &= !bit;
            }
        }
        self
    }

    /// Number of nozzles switched on
    pub fn count_on(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }

    /// Iterate the mask bits in shift order, nozzle 0 first
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..NOZZLES).map(move |n| self.is_on(n))
    }
}

impl From<[u8; MASK_BYTES]> for NozzleMask {
    fn from(bytes: [u8; MASK_BYTES]) -> Self {
        NozzleMask(bytes)
    }
}

impl TryFrom<&[u8]> for NozzleMask {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        NozzleMask::from_slice(bytes)
    }
}

impl fmt::Debug for NozzleMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NozzleMask(")?;
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}
