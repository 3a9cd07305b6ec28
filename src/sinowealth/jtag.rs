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

//! SinoWealth debug-port programming over JTAG.
//!
//! The part exposes a private 4-bit instruction set next to IDCODE. Debug
//! bring-up is a fixed register choreography; two non-equivalent variants
//! exist and both are kept:
//!
//! * [`SinowealthJtag::init`] — the full sequence ending in a halted core
//!   with the flash debug gate opened by an injected `MOV 0FFh, #80h`,
//!   verified with an IDCODE probe.
//! * [`SinowealthJtag::postinit`] — the register-only variant without the
//!   halt and opcode injection, reproduced bit-exactly from the reference
//!   capture.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::bits::reverse8;
use crate::phy::TapIo;
use crate::tap::{State, Tap};

/// Vendor instruction values (4-bit IR).
pub mod instructions {
    /// Flash read/write scan register (30-bit DR).
    pub const CODESCAN: u8 = 0x00;
    /// Debug command register (4-bit DR).
    pub const DEBUG: u8 = 0x02;
    /// Configuration register (23-bit write, 64-bit read DR).
    pub const CONFIG: u8 = 0x03;
    /// Resume the core.
    pub const RUN: u8 = 0x04;
    /// Halt the core; also carries the 8-bit opcode injection scans.
    pub const HALT: u8 = 0x0C;
    /// Vendor identification register (16-bit DR).
    pub const IDCODE: u8 = 0x0E;
}

/// DEBUG register command nibbles.
pub mod debug_commands {
    pub const ENABLE: u8 = 0x4;
    pub const HALT: u8 = 0x1;
}

/// CONFIG address of the debug control word.
pub const DEBUG_CTRL: u8 = 0x40;

/// CONFIG addresses whose mirrored 8051 SFRs (address + 0x80) are cleared
/// during bring-up.
pub const SFR_MIRRORS: [u8; 8] = [0x63, 0x67, 0x6B, 0x6F, 0x73, 0x77, 0x7B, 0x7F];

/// Bring-up result, stable across the RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    /// IDCODE read back all-zeros or all-ones; the target is not
    /// responding on JTAG.
    ErrIdcode = 1,
    /// Reserved for a bounded erase/write poll; never produced today.
    ErrFlashTimeout = 2,
}

bitflags! {
    /// Status nibble of a CONFIG read.
    pub struct ConfigStatus: u8 {
        const OP_COMPLETE = 1 << 0;
        const WAIT_EXTEND = 1 << 3;
    }
}

/// Decoded 64-bit CONFIG read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigResponse {
    pub status: ConfigStatus,
    pub data: u8,
    pub response: [u8; 6],
}

/// Split a captured 64-bit CONFIG word into its fields.
///
/// The status nibble is scattered over DR bits [1:0] and [11:10]; the data
/// byte sits in [9:2] and six response bytes follow from bit 16 up,
/// LSB-first.
pub fn unpack_config_read(raw: u64) -> ConfigResponse {
    let status = ((raw & 0b11) as u8) | ((((raw >> 10) & 0b11) as u8) << 2);
    let data = ((raw >> 2) & 0xFF) as u8;
    let mut response = [0u8; 6];
    for (i, byte) in response.iter_mut().enumerate() {
        *byte = ((raw >> (16 + 8 * i)) & 0xFF) as u8;
    }
    ConfigResponse {
        status: ConfigStatus::from_bits_truncate(status),
        data,
        response,
    }
}

/// Pack a CONFIG write: 7-bit address in DR bits [22:16], data in [15:0].
fn config_word(addr: u8, data: u16) -> u64 {
    debug_assert!(addr < 0x80);
    ((addr as u64) << 16) | data as u64
}

/// Vendor operations grafted onto the TAP controller.
pub trait SinowealthJtag {
    /// Write a DEBUG command nibble.
    fn debug_command(&mut self, cmd: u8);
    /// Write a CONFIG register.
    fn config_write(&mut self, addr: u8, data: u16);
    /// Read the 64-bit CONFIG response register.
    fn config_read(&mut self) -> ConfigResponse;
    /// Read the vendor 16-bit identification register.
    fn idcode16(&mut self) -> u16;
    /// Full debug bring-up: enable the debug subsystem, clear the
    /// breakpoint SFR mirrors, halt the core, open the flash debug gate by
    /// injecting `MOV 0FFh, #80h`, and probe IDCODE.
    fn init(&mut self) -> Status;
    /// Register-only bring-up without the halt and opcode injection. Not
    /// equivalent to [`SinowealthJtag::init`]; the register values are a
    /// bit-exact replay of the reference capture.
    fn postinit(&mut self);
}

impl<P: TapIo> SinowealthJtag for Tap<P> {
    fn debug_command(&mut self, cmd: u8) {
        self.ir(instructions::DEBUG);
        self.dr::<4>(cmd as u64);
    }

    fn config_write(&mut self, addr: u8, data: u16) {
        self.ir(instructions::CONFIG);
        self.dr::<23>(config_word(addr, data));
    }

    fn config_read(&mut self) -> ConfigResponse {
        self.ir(instructions::CONFIG);
        unpack_config_read(self.dr::<64>(0))
    }

    fn idcode16(&mut self) -> u16 {
        self.ir(instructions::IDCODE);
        self.dr::<16>(0) as u16
    }

    fn init(&mut self) -> Status {
        self.goto_state(State::RunTestIdle);
        self.idle_clocks(2);

        self.debug_command(debug_commands::ENABLE);

        self.config_write(DEBUG_CTRL, 0x3000);
        self.phy_mut().delay_us(50);
        self.config_write(DEBUG_CTRL, 0x2000);
        self.config_write(DEBUG_CTRL, 0x0000);

        for addr in SFR_MIRRORS {
            self.config_write(addr, 0x0000);
        }

        self.debug_command(debug_commands::HALT);
        self.ir(instructions::HALT);

        // MOV 0FFh, #80h: SFR 0xFF bit 7 gates the flash debug interface.
        // Opcode bytes go out MSB-first through the 8-bit HALT scan.
        for byte in [0x75u8, 0xFF, 0x80] {
            self.dr::<8>(reverse8(byte) as u64);
        }

        match self.idcode16() {
            0x0000 | 0xFFFF => Status::ErrIdcode,
            _ => Status::Ok,
        }
    }

    fn postinit(&mut self) {
        self.goto_state(State::RunTestIdle);
        self.idle_clocks(2);

        self.ir(instructions::DEBUG);
        self.dr::<4>(4);
        self.idle_clocks(1);

        self.ir(instructions::CONFIG);
        self.dr::<23>(0x403000);
        self.idle_clocks(1);
        self.phy_mut().delay_us(50);
        self.dr::<23>(0x402000);
        self.idle_clocks(1);
        self.dr::<23>(0x400000);
        self.idle_clocks(1);

        for word in [
            0x630000u64, 0x670000, 0x6B0000, 0x6F0000, 0x730000, 0x770000, 0x7B0000, 0x7F0000,
        ] {
            self.dr::<23>(word);
            self.idle_clocks(1);
        }

        self.ir(instructions::DEBUG);
        self.dr::<4>(1);
        self.idle_clocks(1);

        self.ir(instructions::HALT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScanLog {
        scans: Vec<(u64, u8)>,
        delays: Vec<u32>,
        capture: u64,
    }

    impl ScanLog {
        fn new() -> Self {
            Self {
                scans: Vec::new(),
                delays: Vec::new(),
                capture: 0,
            }
        }
    }

    impl TapIo for ScanLog {
        fn next_state(&mut self, _tms: bool) {}
        fn shift(&mut self, out: u64, bits: u8, _exit_on_last: bool) -> u64 {
            self.scans.push((out, bits));
            self.capture
        }
        fn delay_us(&mut self, us: u32) {
            self.delays.push(us);
        }
    }

    /// All shifts, IR and DR interleaved, in wire order.
    fn scans(tap: &Tap<ScanLog>) -> &[(u64, u8)] {
        &tap.phy().scans
    }

    #[test]
    fn config_word_packs_address_high() {
        assert_eq!(config_word(0x40, 0x3000), 0x403000);
        assert_eq!(config_word(0x63, 0x0000), 0x630000);
    }

    #[test]
    fn config_read_unpacks_fields() {
        // status nibble 0b1001 -> op_complete + wait_extend
        let raw: u64 = 0b01 // bits [1:0] -> status low bits
            | (0xA5 << 2) // data byte
            | (0b10 << 10) // bits [11:10] -> status high bits
            | (0x11u64 << 16)
            | (0x22u64 << 24)
            | (0x33u64 << 32)
            | (0x44u64 << 40)
            | (0x55u64 << 48)
            | (0x66u64 << 56);
        let decoded = unpack_config_read(raw);
        assert!(decoded.status.contains(ConfigStatus::OP_COMPLETE));
        assert!(decoded.status.contains(ConfigStatus::WAIT_EXTEND));
        assert_eq!(decoded.data, 0xA5);
        assert_eq!(decoded.response, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    }

    #[test]
    fn init_sequence_scans_in_order() {
        let mut tap = Tap::new(ScanLog::new());
        let status = tap.init();
        // ScanLog captures zero, so the IDCODE probe fails.
        assert_eq!(status, Status::ErrIdcode);

        let mut expected: Vec<(u64, u8)> = vec![
            (instructions::DEBUG as u64, 4),
            (debug_commands::ENABLE as u64, 4),
            (instructions::CONFIG as u64, 4),
            (0x403000, 23),
            (instructions::CONFIG as u64, 4),
            (0x402000, 23),
            (instructions::CONFIG as u64, 4),
            (0x400000, 23),
        ];
        for addr in SFR_MIRRORS {
            expected.push((instructions::CONFIG as u64, 4));
            expected.push(((addr as u64) << 16, 23));
        }
        expected.push((instructions::DEBUG as u64, 4));
        expected.push((debug_commands::HALT as u64, 4));
        expected.push((instructions::HALT as u64, 4));
        for byte in [0x75u8, 0xFF, 0x80] {
            expected.push((reverse8(byte) as u64, 8));
        }
        expected.push((instructions::IDCODE as u64, 4));
        expected.push((0, 16));

        assert_eq!(scans(&tap), expected.as_slice());
        assert_eq!(tap.phy().delays, vec![50]);
    }

    #[test]
    fn init_accepts_a_live_idcode() {
        let mut tap = Tap::new(ScanLog::new());
        tap.phy_mut().capture = 0x1234;
        assert_eq!(tap.init(), Status::Ok);
    }

    #[test]
    fn init_rejects_stuck_high_idcode() {
        let mut tap = Tap::new(ScanLog::new());
        tap.phy_mut().capture = u64::MAX;
        assert_eq!(tap.init(), Status::ErrIdcode);
    }

    #[test]
    fn postinit_replays_reference_words() {
        let mut tap = Tap::new(ScanLog::new());
        tap.postinit();

        let expected: Vec<(u64, u8)> = vec![
            (instructions::DEBUG as u64, 4),
            (4, 4),
            (instructions::CONFIG as u64, 4),
            (0x403000, 23),
            (0x402000, 23),
            (0x400000, 23),
            (0x630000, 23),
            (0x670000, 23),
            (0x6B0000, 23),
            (0x6F0000, 23),
            (0x730000, 23),
            (0x770000, 23),
            (0x7B0000, 23),
            (0x7F0000, 23),
            (instructions::DEBUG as u64, 4),
            (1, 4),
            (instructions::HALT as u64, 4),
        ];
        assert_eq!(scans(&tap), expected.as_slice());
        assert_eq!(tap.phy().delays, vec![50]);
    }
}
