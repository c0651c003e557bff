//! Row of eight LEDs wired to PIO port B

use crate::io::pio::Pio;

/// LED image, index 0 = leftmost = PB bit 7
#[derive(Clone, Debug, Default)]
pub(crate) struct Leds {
    state: [bool; 8],
}

impl Leds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> [bool; 8] {
        self.state
    }

    /// Refreshes the image from PB; true when any LED changed
    ///
    /// Only output-configured bits light up; an input-configured bit shows a
    /// dark LED no matter what PB holds.
    pub fn sync(&mut self, pio: &Pio) -> bool {
        let pb = pio.pb();
        let cb = pio.cb();
        let mut changed = false;
        for (index, led) in self.state.iter_mut().enumerate() {
            let mask = 0b1000_0000 >> index;
            let on = cb & mask == 0 && pb & mask != 0;
            if *led != on {
                *led = on;
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::pio::PioPorts;

    #[test]
    fn input_bits_stay_dark() {
        let mut pio = Pio::new();
        pio.write(PioPorts::CB, 0b1000_0000).unwrap();
        pio.write(PioPorts::PB, 0b1100_0000).unwrap();

        let mut leds = Leds::new();
        assert!(leds.sync(&pio));
        assert_eq!(
            leds.state(),
            [false, true, false, false, false, false, false, false]
        );
        assert!(!leds.sync(&pio));
    }
}
