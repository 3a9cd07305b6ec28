// Copyright 2026 Michael Weinrich
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Flash reads through the CODESCAN register.
//!
//! CODESCAN is a 30-bit scan register behind IR 0: a 16-bit address, a
//! 6-bit control field and a returned data byte, all MSB-first inside the
//! LSB-first scan (see [`crate::bits`]). The read path is pipelined two
//! deep, so a scan returns the byte addressed two scans earlier.

use crate::bits::{pack_codescan, reverse8};
use crate::phy::TapIo;
use crate::sinowealth::jtag::instructions;
use crate::tap::Tap;

/// CODESCAN control value for a flash read (MSB-first field value).
pub const CTRL_READ: u8 = 0x04;

/// One raw CODESCAN scan at `addr`.
///
/// Because of the pipeline, the returned byte lags the requested address by
/// two scans; use [`FlashReader`] for coherent sequential reads. The two
/// trailing idle clocks are required: without them the pipeline returns
/// garbage after a handful of scans.
pub fn codescan_read<P: TapIo>(tap: &mut Tap<P>, addr: u16) -> u8 {
    tap.ir(instructions::CODESCAN);
    let raw = tap.dr::<30>(pack_codescan(addr, CTRL_READ, 0) as u64) as u32;
    tap.idle_clocks(2);
    reverse8(((raw >> 22) & 0xFF) as u8)
}

/// Sequential flash reader over the CODESCAN pipeline.
///
/// Construction selects CODESCAN and performs two priming scans, so the
/// first [`FlashReader::next_byte`] returns the byte at the start address.
/// Dropping the reader resets the TAP to Test-Logic-Reset, closing the
/// scan cleanly.
pub struct FlashReader<'a, P: TapIo> {
    tap: &'a mut Tap<P>,
    addr: u16,
    data: u8,
}

impl<'a, P: TapIo> FlashReader<'a, P> {
    pub fn new(tap: &'a mut Tap<P>, addr: u16) -> Self {
        tap.ir(instructions::CODESCAN);
        let mut reader = Self { tap, addr, data: 0 };
        // Two scans to fill the pipeline: afterwards `data` holds the byte
        // at the start address and the wire address is start + 2.
        reader.read_next();
        reader.read_next();
        reader
    }

    /// Address of the byte [`FlashReader::current`] returns.
    pub fn address(&self) -> u16 {
        self.addr.wrapping_sub(2)
    }

    /// The byte at the current address, without advancing.
    pub fn current(&self) -> u8 {
        self.data
    }

    /// Return the current byte and advance by one.
    pub fn next_byte(&mut self) -> u8 {
        let byte = self.data;
        self.read_next();
        byte
    }

    /// Fill `buf` with consecutive bytes starting at the current address.
    pub fn read_into(&mut self, buf: &mut [u8]) {
        for byte in buf {
            *byte = self.next_byte();
        }
    }

    fn read_next(&mut self) {
        let raw = self
            .tap
            .dr::<30>(pack_codescan(self.addr, CTRL_READ, 0) as u64) as u32;
        self.tap.idle_clocks(2);
        self.data = reverse8(((raw >> 22) & 0xFF) as u8);
        self.addr = self.addr.wrapping_add(1);
    }
}

impl<P: TapIo> Drop for FlashReader<'_, P> {
    fn drop(&mut self) {
        self.tap.reset();
    }
}
