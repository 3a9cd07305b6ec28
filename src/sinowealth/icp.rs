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

//! In-circuit programming protocol.
//!
//! ICP is a byte-oriented framing on the same four wires, active after the
//! 0x69 mode byte has been negotiated. Command and data bytes go out
//! MSB-first, responses come back LSB-first, and every byte is followed by
//! one idle clock. Flash writes and erases are guarded by unlock byte
//! sequences that must be replayed verbatim.

use crate::bits::reverse8;
use crate::phy::Phy;
use crate::pins::JtagPins;

/// ICP command bytes.
pub mod commands {
    pub const SET_IB_OFFSET_L: u8 = 0x40;
    pub const SET_IB_OFFSET_H: u8 = 0x41;
    pub const SET_IB_DATA: u8 = 0x42;
    pub const GET_IB_OFFSET: u8 = 0x43;
    pub const READ_FLASH: u8 = 0x44;
    pub const SET_EXTENDED: u8 = 0x46;
    pub const PING: u8 = 0x49;
    pub const READ_CUSTOM: u8 = 0x4A;
    pub const SET_XPAGE: u8 = 0x4C;

    pub const WRITE_UNLOCK: u8 = 0x6E;
    pub const ERASE_UNLOCK: u8 = 0xE6;
    pub const PREAMBLE: [u8; 4] = [0x15, 0x0A, 0x09, 0x06];
    pub const WRITE_TERM: [u8; 4] = [0x00, 0xAA, 0x00, 0x00];
}

/// Settle time before the first ping after entering ICP mode.
/// TODO: confirm the minimum against silicon; 800 us is the value the
/// reference adapter has always used.
pub const INIT_DELAY_US: u32 = 800;

/// Gap between data bytes during a flash write burst.
pub const WRITE_GAP_US: u32 = 5;

/// Worst-case block erase time.
pub const ERASE_WAIT_MS: u32 = 300;

/// Address whose offset readback is used as a liveness check.
const VERIFY_ADDRESS: u16 = 0xFF69;

/// ICP protocol adapter borrowing the PHY.
///
/// The PHY must already be in ICP mode; the adapter only frames bytes and
/// sequences commands on top of the shift primitive.
pub struct Icp<'a, IO: JtagPins> {
    phy: &'a mut Phy<IO>,
}

impl<'a, IO: JtagPins> Icp<'a, IO> {
    pub fn new(phy: &'a mut Phy<IO>) -> Self {
        Self { phy }
    }

    /// Settle and ping the target.
    pub fn init(&mut self) {
        self.phy.delay_us(INIT_DELAY_US);
        self.ping();
    }

    /// Transmit one byte MSB-first, then one idle clock.
    pub fn send_byte(&mut self, byte: u8) {
        self.phy.shift(reverse8(byte) as u64, 8, false);
        self.phy.next_state(false);
    }

    /// Clock in one byte (LSB-first capture), then one idle clock.
    pub fn receive_byte(&mut self) -> u8 {
        let byte = self.phy.shift(0, 8, false) as u8;
        self.phy.next_state(false);
        byte
    }

    pub fn ping(&mut self) {
        self.send_byte(commands::PING);
        self.send_byte(0xFF);
    }

    /// Readback liveness check: set a known offset and read it back.
    pub fn verify(&mut self) -> bool {
        self.set_address(VERIFY_ADDRESS);

        self.send_byte(commands::GET_IB_OFFSET);
        let low = self.receive_byte();
        let _ = self.receive_byte(); // discard high byte

        low == (VERIFY_ADDRESS & 0xFF) as u8
    }

    /// Set the 16-bit in-buffer offset for subsequent operations.
    pub fn set_address(&mut self, address: u16) {
        self.send_byte(commands::SET_IB_OFFSET_L);
        self.send_byte((address & 0xFF) as u8);
        self.send_byte(commands::SET_IB_OFFSET_H);
        self.send_byte((address >> 8) as u8);
    }

    /// Read `buf.len()` bytes of flash starting at `address`.
    pub fn read_flash(&mut self, address: u16, buf: &mut [u8]) {
        self.set_address(address);
        self.send_byte(commands::READ_FLASH);

        for byte in buf {
            *byte = self.receive_byte();
        }
    }

    /// Write a run of bytes starting at `address`.
    ///
    /// The block must have been erased first. Returns false for an empty
    /// buffer, true once the unlock/terminate choreography has been sent.
    pub fn write_flash(&mut self, address: u16, data: &[u8]) -> bool {
        if data.is_empty() {
            return false;
        }
        self.set_address(address);

        self.send_byte(commands::SET_IB_DATA);
        self.send_byte(data[0]);

        self.send_byte(commands::WRITE_UNLOCK);
        for byte in commands::PREAMBLE {
            self.send_byte(byte);
        }

        for &byte in &data[1..] {
            self.send_byte(byte);
            self.phy.delay_us(WRITE_GAP_US);
            self.send_byte(0x00);
        }

        for byte in commands::WRITE_TERM {
            self.send_byte(byte);
        }
        self.phy.delay_us(WRITE_GAP_US);

        true
    }

    /// Erase the flash block containing `address`.
    ///
    /// Returns the TDO status level sampled after the erase wait; high
    /// means the target reported completion.
    pub fn erase_flash(&mut self, address: u16) -> bool {
        self.set_address(address);

        self.send_byte(commands::SET_IB_DATA);
        self.send_byte(0x00);

        self.send_byte(commands::ERASE_UNLOCK);
        for byte in commands::PREAMBLE {
            self.send_byte(byte);
        }

        self.send_byte(0x00);
        self.phy.delay_us(ERASE_WAIT_MS * 1000);
        self.send_byte(0x00);
        let status = self.phy.sample_tdo();
        self.send_byte(0x00);

        status
    }

    /// Leave ICP for the Ready state.
    pub fn exit(&mut self) {
        self.phy.reset();
    }
}
