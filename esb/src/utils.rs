use core::fmt;

/// `Debug`-formats its contents as a hexadecimal byte slice.
#[derive(Copy, Clone)]
pub struct HexSlice<T>(pub T)
where
    T: AsRef<[u8]>;

impl<T: AsRef<[u8]>> fmt::Debug for HexSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, byte) in self.0.as_ref().iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        f.write_str("]")
    }
}

impl<T: AsRef<[u8]>> AsRef<T> for HexSlice<T> {
    fn as_ref(&self) -> &T {
        &self.0
    }
}

/// Reverses the bits within a single byte.
///
/// The radio transmits addresses LSB-first, while the on-air protocol this stack is compatible
/// with specifies addresses MSB-first. Base addresses must be bit-reversed (and then byte-swapped,
/// see [`crate::packet::convert_base_address`]) before being loaded into the radio's address
/// registers.
pub const fn reverse_bits_byte(b: u8) -> u8 {
    b.reverse_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverses_bits() {
        assert_eq!(reverse_bits_byte(0b1000_0000), 0b0000_0001);
        assert_eq!(reverse_bits_byte(0xE7), 0xE7u8.reverse_bits());
        assert_eq!(reverse_bits_byte(0x00), 0x00);
    }
}
