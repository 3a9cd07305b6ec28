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

//! IEEE 1149.1 TAP controller with state tracking and IR/DR helpers.
//!
//! The controller is generic over [`TapIo`] so the same logic drives real
//! pins in firmware and a recording fake in the tests. Tracked state is
//! advanced on exactly the TCK edges that advance the hardware; routing to
//! an arbitrary state uses a breadth-first search over the sixteen-state
//! graph and therefore always takes a shortest TMS path.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::phy::TapIo;

/// The sixteen TAP controller states. The numbering matches the RPC
/// encoding, so the transition function is a pure function of `(u8, bool)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum State {
    TestLogicReset = 0,
    RunTestIdle = 1,
    SelectDrScan = 2,
    CaptureDr = 3,
    ShiftDr = 4,
    Exit1Dr = 5,
    PauseDr = 6,
    Exit2Dr = 7,
    UpdateDr = 8,
    SelectIrScan = 9,
    CaptureIr = 10,
    ShiftIr = 11,
    Exit1Ir = 12,
    PauseIr = 13,
    Exit2Ir = 14,
    UpdateIr = 15,
}

/// Standard instruction values for a 4-bit SinoWealth IR.
pub mod instructions {
    pub const IDCODE: u8 = 0x0E;
}

/// Successor state for one TCK edge with the given TMS level.
pub const fn next_state(s: State, tms: bool) -> State {
    use State::*;
    match s {
        TestLogicReset => {
            if tms {
                TestLogicReset
            } else {
                RunTestIdle
            }
        }
        RunTestIdle => {
            if tms {
                SelectDrScan
            } else {
                RunTestIdle
            }
        }
        SelectDrScan => {
            if tms {
                SelectIrScan
            } else {
                CaptureDr
            }
        }
        CaptureDr | ShiftDr => {
            if tms {
                Exit1Dr
            } else {
                ShiftDr
            }
        }
        Exit1Dr => {
            if tms {
                UpdateDr
            } else {
                PauseDr
            }
        }
        PauseDr => {
            if tms {
                Exit2Dr
            } else {
                PauseDr
            }
        }
        Exit2Dr => {
            if tms {
                UpdateDr
            } else {
                ShiftDr
            }
        }
        UpdateDr => {
            if tms {
                SelectDrScan
            } else {
                RunTestIdle
            }
        }
        SelectIrScan => {
            if tms {
                TestLogicReset
            } else {
                CaptureIr
            }
        }
        CaptureIr | ShiftIr => {
            if tms {
                Exit1Ir
            } else {
                ShiftIr
            }
        }
        Exit1Ir => {
            if tms {
                UpdateIr
            } else {
                PauseIr
            }
        }
        PauseIr => {
            if tms {
                Exit2Ir
            } else {
                PauseIr
            }
        }
        Exit2Ir => {
            if tms {
                UpdateIr
            } else {
                ShiftIr
            }
        }
        UpdateIr => {
            if tms {
                SelectDrScan
            } else {
                RunTestIdle
            }
        }
    }
}

const fn state_from_index(i: u8) -> State {
    // Discriminants are 0..=15 and dense.
    match i {
        0 => State::TestLogicReset,
        1 => State::RunTestIdle,
        2 => State::SelectDrScan,
        3 => State::CaptureDr,
        4 => State::ShiftDr,
        5 => State::Exit1Dr,
        6 => State::PauseDr,
        7 => State::Exit2Dr,
        8 => State::UpdateDr,
        9 => State::SelectIrScan,
        10 => State::CaptureIr,
        11 => State::ShiftIr,
        12 => State::Exit1Ir,
        13 => State::PauseIr,
        14 => State::Exit2Ir,
        _ => State::UpdateIr,
    }
}

/// TAP controller owning its signalling channel.
pub struct Tap<P: TapIo> {
    phy: P,
    state: State,
    ir_bits: u8,
}

impl<P: TapIo> Tap<P> {
    /// Controller with the SinoWealth 4-bit IR.
    pub fn new(phy: P) -> Self {
        Self::with_ir_width(phy, 4)
    }

    /// Controller with a device-specific IR width (1..=8 bits).
    pub fn with_ir_width(phy: P, ir_bits: u8) -> Self {
        debug_assert!(ir_bits >= 1 && ir_bits <= 8);
        Self {
            phy,
            state: State::TestLogicReset,
            ir_bits,
        }
    }

    /// The underlying signalling channel, for delays and for protocols
    /// layered beside the TAP.
    pub fn phy_mut(&mut self) -> &mut P {
        &mut self.phy
    }

    pub fn phy(&self) -> &P {
        &self.phy
    }

    /// Currently tracked state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Force Test-Logic-Reset by holding TMS high for five clocks, which
    /// is sufficient from any state.
    pub fn reset(&mut self) {
        for _ in 0..5 {
            self.phy.next_state(true);
        }
        self.state = State::TestLogicReset;
    }

    /// Apply a single TMS transition and track it.
    fn step(&mut self, tms: bool) {
        self.phy.next_state(tms);
        self.state = next_state(self.state, tms);
    }

    /// Move to `target` along a shortest TMS path.
    ///
    /// Breadth-first search over the sixteen-node graph; on equal-length
    /// paths the TMS=0 edge wins because it is explored first.
    pub fn goto_state(&mut self, target: State) {
        if self.state == target {
            return;
        }

        let start = u8::from(self.state);
        let goal = u8::from(target);

        let mut queue = [0u8; 16];
        let mut prev = [0u8; 16];
        let mut prev_tms = [false; 16];
        let mut visited = [false; 16];

        let mut head = 0usize;
        let mut tail = 0usize;
        visited[start as usize] = true;
        queue[tail] = start;
        tail += 1;

        while head < tail && !visited[goal as usize] {
            let s = queue[head];
            head += 1;
            for tms in [false, true] {
                let ns = u8::from(next_state(state_from_index(s), tms));
                if !visited[ns as usize] {
                    visited[ns as usize] = true;
                    prev[ns as usize] = s;
                    prev_tms[ns as usize] = tms;
                    queue[tail] = ns;
                    tail += 1;
                }
            }
        }

        if !visited[goal as usize] {
            return;
        }

        let mut seq = [false; 16];
        let mut len = 0usize;
        let mut cur = goal;
        while cur != start {
            seq[len] = prev_tms[cur as usize];
            len += 1;
            cur = prev[cur as usize];
        }

        while len > 0 {
            len -= 1;
            self.step(seq[len]);
        }
    }

    /// Shift an instruction and return the captured IR bits.
    ///
    /// Ends in Update-IR.
    pub fn ir(&mut self, out: u8) -> u8 {
        self.goto_state(State::ShiftIr);
        let capture = self.phy.shift(out as u64, self.ir_bits, true) as u8;
        self.state = State::Exit1Ir;
        self.step(true);
        capture
    }

    /// Shift a `BITS`-wide data register value and return the capture.
    ///
    /// Ends in Update-DR.
    pub fn dr<const BITS: usize>(&mut self, out: u64) -> u64 {
        const { assert!(BITS >= 1 && BITS <= 64) };
        self.goto_state(State::ShiftDr);
        let capture = self.phy.shift(out, BITS as u8, true);
        self.state = State::Exit1Dr;
        self.step(true);
        capture
    }

    /// Select BYPASS by shifting all-ones into the IR.
    pub fn bypass(&mut self) {
        let ones = if self.ir_bits >= 8 {
            0xFF
        } else {
            (1u8 << self.ir_bits) - 1
        };
        self.ir(ones);
    }

    /// Select IDCODE and read the standard 32-bit identification register.
    pub fn idcode(&mut self) -> u32 {
        self.ir(instructions::IDCODE);
        self.dr::<32>(0) as u32
    }

    /// Emit extra clocks with TMS low.
    ///
    /// Only stable in Run-Test/Idle, Shift-DR/IR and Pause-DR/IR; from an
    /// Update or Exit state the first clock still moves the TAP.
    pub fn idle_clocks(&mut self, count: u8) {
        for _ in 0..count {
            self.step(false);
        }
    }

    /// Give up ownership of the signalling channel.
    pub fn release(self) -> P {
        self.phy
    }
}
