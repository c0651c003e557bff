//! Bank of eight toggle switches wired to PIO port A

use crate::io::pio::Pio;

/// Switch bank state, index 0 = leftmost = PA bit 7
#[derive(Clone, Debug, Default)]
pub(crate) struct Switches {
    state: [bool; 8],
}

impl Switches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, index: usize) {
        self.state[index] = !self.state[index];
    }

    pub fn state(&self) -> [bool; 8] {
        self.state
    }

    /// Drives the input-configured bits of PA from the switch positions
    ///
    /// Output-configured bits are left to the program. Called after every
    /// toggle and after any CPU write to PA or CA, so flipping a direction
    /// bit immediately re-exposes the physical switch.
    pub fn sync(&self, pio: &mut Pio) {
        let mut pa = pio.pa();
        let ca = pio.ca();
        for (index, on) in self.state.iter().enumerate() {
            let mask = 0b1000_0000 >> index;
            if ca & mask == 0 {
                continue;
            }
            if *on {
                pa |= mask;
            } else {
                pa &= !mask;
            }
        }
        pio.set_pa(pa);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::pio::PioPorts;

    #[test]
    fn only_input_bits_follow_the_switches() {
        let mut pio = Pio::new();
        pio.write(PioPorts::CA, 0b1111_0000).unwrap();
        pio.write(PioPorts::PA, 0b0000_1111).unwrap();

        let mut switches = Switches::new();
        switches.toggle(0);
        switches.toggle(4);
        switches.sync(&mut pio);

        // bit 7 is input and follows switch 0; bit 3 is output and ignores
        // switch 4
        assert_eq!(pio.pa(), 0b1000_1111);
    }
}
