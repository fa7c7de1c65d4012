// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRC16 as used by Modbus RTU.

/// Reflected representation of the polynomial 0x8005.
const POLYNOMIAL: u16 = 0xA001;

const INITIAL_VALUE: u16 = 0xFFFF;

/// Calculate the CRC (Cyclic Redundancy Check) sum.
///
/// The result must be transmitted low byte first.
#[must_use]
pub fn compute(data: &[u8]) -> u16 {
    let mut crc = INITIAL_VALUE;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Reads the trailing CRC of an ADU, low byte first.
pub(crate) fn trailing(adu: &[u8]) -> Option<u16> {
    let (&hi, rest) = adu.split_last()?;
    let &lo = rest.last()?;
    Some(u16::from_le_bytes([lo, hi]))
}

/// Check the trailing CRC of an ADU against its contents.
#[must_use]
pub fn validate(adu: &[u8]) -> bool {
    let Some(actual) = trailing(adu) else {
        return false;
    };
    compute(&adu[..adu.len() - 2]) == actual
}
