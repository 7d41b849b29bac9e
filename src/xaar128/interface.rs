//! Bit-banged shift register link to the two printhead channels
//!
//! This is not a hardware SPI peripheral. Every clock edge is a GPIO write, so the
//! bit rate is whatever the write loop manages (a few hundred kHz on an ESP32-S3).
//! Data is captured by the head on the rising SCK edge and MOSI is always settled
//! while SCK is low.
use embedded_hal::digital::OutputPin;

use crate::xaar128::mask::{Channel, NozzleMask};
use crate::xaar128::{drive, Error, Line, CHANNEL_BYTES};

/// The shared clock and data lines plus one active-low chip select per channel
pub struct BitSerialLink<OUT> {
    /// Shift clock, idles high
    sck: OUT,
    /// Data into the head
    mosi: OUT,
    /// Chip select for nozzles 0..63
    select_a: OUT,
    /// Chip select for nozzles 64..127
    select_b: OUT,
}

impl<OUT> BitSerialLink<OUT> {
    /// Bundle the link lines. Call [`BitSerialLink::idle`] before the first transfer.
    pub fn new(sck: OUT, mosi: OUT, select_a: OUT, select_b: OUT) -> Self {
        BitSerialLink {
            sck,
            mosi,
            select_a,
            select_b,
        }
    }
}

impl<OUT> BitSerialLink<OUT>
where
    OUT: OutputPin,
{
    /// Put the link into its idle state: both channels deselected, data low, clock high
    pub fn idle(&mut self) -> Result<(), Error> {
        drive(&mut self.select_a, Line::SelectA, true)?;
        drive(&mut self.select_b, Line::SelectB, true)?;
        drive(&mut self.mosi, Line::Mosi, false)?;
        drive(&mut self.sck, Line::Sck, true)
    }

    /// Shift 8 bytes into one channel, most significant bit first
    ///
    /// The chip select is asserted before the first bit and released after the last.
    /// For every bit SCK goes low, MOSI takes the bit value and SCK goes high again.
    pub fn shift_channel(
        &mut self,
        channel: Channel,
        bytes: &[u8; CHANNEL_BYTES],
    ) -> Result<(), Error> {
        self.select(channel, true)?;

        for &byte in bytes {
            let mut d = byte;
            for _ in 0..8 {
                drive(&mut self.sck, Line::Sck, false)?;
                drive(&mut self.mosi, Line::Mosi, d & 0x80 == 0x80)?;
                d <<= 1;
                drive(&mut self.sck, Line::Sck, true)?;
            }
        }

        self.select(channel, false)
    }

    /// Load a full mask, channel A first, then channel B, and leave SCK high
    ///
    /// The two chip selects are never low at the same time.
    ///
    /// If a line fails partway, the link is returned to idle (best effort) so no chip
    /// select is left asserted, and the first error is returned.
    pub fn load(&mut self, mask: &NozzleMask) -> Result<(), Error> {
        let result = Channel::LOAD_ORDER
            .into_iter()
            .try_for_each(|channel| self.shift_channel(channel, &mask.channel(channel)))
            .and_then(|()| drive(&mut self.sck, Line::Sck, true));
        if result.is_err() {
            let _ = self.idle();
        }
        result
    }

    fn select(&mut self, channel: Channel, asserted: bool) -> Result<(), Error> {
        let pin = match channel {
            Channel::A => &mut self.select_a,
            Channel::B => &mut self.select_b,
        };
        // active low
        drive(pin, channel.select_line(), !asserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Bench, SimOutput};

    fn link(bench: &Bench) -> BitSerialLink<SimOutput> {
        let mut link = BitSerialLink::new(
            bench.output(Line::Sck),
            bench.output(Line::Mosi),
            bench.output(Line::SelectA),
            bench.output(Line::SelectB),
        );
        link.idle().unwrap();
        bench.clear_events();
        link
    }

    #[test]
    fn shifts_msb_first_with_select_asserted() {
        let bench = Bench::new();
        let mut link = link(&bench);

        link.shift_channel(Channel::B, &[0xA5, 0, 0, 0, 0, 0, 0, 0x01])
            .unwrap();

        let bits = bench.shifted_bits();
        assert_eq!(bits.len(), 64);
        assert!(bits.iter().all(|b| b.selected == (false, true)));
        let first: Vec<bool> = bits[..8].iter().map(|b| b.data).collect();
        assert_eq!(
            first,
            [true, false, true, false, false, true, false, true]
        );
        assert!(bits[63].data);
        assert_eq!(bench.level(Line::SelectB), Some(true));
    }

    #[test]
    fn select_brackets_the_transfer() {
        let bench = Bench::new();
        let mut link = link(&bench);

        link.shift_channel(Channel::A, &[0xFF; CHANNEL_BYTES]).unwrap();

        let writes = bench.writes();
        assert_eq!(writes.first(), Some(&(Line::SelectA, false)));
        assert_eq!(writes.last(), Some(&(Line::SelectA, true)));
    }

    #[test]
    fn data_settles_before_rising_edge() {
        let bench = Bench::new();
        let mut link = link(&bench);

        link.shift_channel(Channel::A, &[0x0F; CHANNEL_BYTES]).unwrap();

        // Every clock cycle is exactly: SCK low, MOSI, SCK high
        let writes = bench.writes();
        for cycle in writes[1..writes.len() - 1].chunks(3) {
            assert_eq!(cycle[0], (Line::Sck, false));
            assert_eq!(cycle[1].0, Line::Mosi);
            assert_eq!(cycle[2], (Line::Sck, true));
        }
    }

    #[test]
    fn load_never_selects_both_channels() {
        let bench = Bench::new();
        let mut link = link(&bench);

        link.load(&NozzleMask::SOLID).unwrap();

        let bits = bench.shifted_bits();
        assert_eq!(bits.len(), 128);
        assert!(bits[..64].iter().all(|b| b.selected == (true, false)));
        assert!(bits[64..].iter().all(|b| b.selected == (false, true)));
        assert_eq!(bench.level(Line::Sck), Some(true));
    }

    #[test]
    fn failed_load_releases_chip_selects() {
        let bench = Bench::new();
        let mut link = link(&bench);
        bench.fail_line(Line::Mosi);

        assert_eq!(link.load(&NozzleMask::SOLID), Err(Error::Line(Line::Mosi)));
        assert_eq!(bench.level(Line::SelectA), Some(true));
        assert_eq!(bench.level(Line::SelectB), Some(true));
    }

    #[test]
    fn line_failure_is_named() {
        let bench = Bench::new();
        let mut link = link(&bench);
        bench.fail_line(Line::Mosi);

        assert_eq!(
            link.shift_channel(Channel::A, &[0; CHANNEL_BYTES]),
            Err(Error::Line(Line::Mosi))
        );
    }
}
