
pub trait WriteU16 {
    fn write_u16(&mut self, val: u16);
}

// Little endian.
impl WriteU16 for Vec<u8> {
    fn write_u16(&mut self, val: u16) {
        let lower = val as u8;
        let upper = (val >> u8::BITS) as u8;
        self.extend([lower, upper]);
    }
}

pub fn read_u16(lower: u8, upper: u8) -> u16 {
    (lower as u16) | ((upper as u16) << u8::BITS)
}
