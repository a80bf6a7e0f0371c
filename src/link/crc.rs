//! CRC-16/DNP.
//!
//! Reflected polynomial 0xA6BC (0x3D65 normal form), initial value 0, final
//! value complemented. Transmitted little-endian after the header and after
//! every data block.

const POLY_REFLECTED: u16 = 0xA6BC;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLY_REFLECTED
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the DNP3 CRC of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let crc = data.iter().fold(0u16, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ byte as u16) & 0xFF) as usize]
    });
    !crc
}

/// Append the CRC of `data` to `out`, little-endian.
pub fn append_crc(data: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&crc16(data).to_le_bytes());
}

/// Check that `block` is `data` followed by its little-endian CRC.
pub fn is_valid_block(block: &[u8]) -> bool {
    match block.len().checked_sub(2) {
        Some(split) => {
            let (data, crc) = block.split_at(split);
            crc16(data).to_le_bytes() == [crc[0], crc[1]]
        }
        None => false,
    }
}
