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

//! Probe PHY: deterministic signalling on TCK/TMS/TDI/TDO.
//!
//! The PHY owns the pins, the current SinoWealth mode and all wire timing.
//! It produces the non-JTAG wake-up waveform that moves the target into its
//! diagnostic Ready state, negotiates mode switches with the 10-bit mode
//! frame, and provides the two signalling primitives everything above is
//! built from: a single TMS step and an n-bit LSB-first shift.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::pins::JtagPins;

/// SinoWealth interface mode. The discriminants are the on-wire mode bytes;
/// `NotInitialized` is a local sentinel and is never transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    Ready = 0x00,
    Jtag = 0xA5,
    Icp = 0x69,
    NotInitialized = 0xFF,
}

/// PHY wire timing and pin options.
#[derive(Debug, Clone, Copy)]
pub struct PhyConfig {
    /// TCK half-period in microseconds (1 us ~ 500 kHz, 2 us ~ 250 kHz).
    pub half_period_us: u32,
    /// Pull TDO up while it is an input (set false for push-pull targets).
    pub tdo_pullup: bool,
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            half_period_us: 1,
            tdo_pullup: true,
        }
    }
}

/// Vref poll period while waiting for target power.
const VREF_POLL_US: u32 = 200;

/// Wake-up waveform cadence: one half-cycle per 2 us.
const WAKE_HALF_US: u32 = 2;
/// Wake-up toggle counts, in phase order. The target stays out of Ready
/// mode if any count or the phase ordering changes.
const WAKE_TMS_SYNC: u16 = 165;
const WAKE_TDI_SYNC: u16 = 105;
const WAKE_TCK_SYNC: u16 = 90;
const WAKE_TMS_HOLD: u16 = 25600;

/// TCK pulses with TMS high needed to leave JTAG mode.
const JTAG_EXIT_CLOCKS: u8 = 35;

/// Signalling capability consumed by the TAP controller.
///
/// The production implementation is [`Phy`]; tests substitute an
/// implementation that records the bit stream instead of driving pins.
pub trait TapIo {
    /// Drive TMS and pulse TCK once.
    fn next_state(&mut self, tms: bool);
    /// Shift `bits` (1..=64) LSB-first out of `out` while capturing TDO
    /// LSB-first into the return value. With `exit_on_last` the final bit
    /// is clocked with TMS high, stepping a Shift state into Exit1.
    fn shift(&mut self, out: u64, bits: u8, exit_on_last: bool) -> u64;
    /// Busy-wait.
    fn delay_us(&mut self, us: u32);
}

/// Bit-banged PHY over a [`JtagPins`] pin set.
pub struct Phy<IO: JtagPins> {
    io: IO,
    config: PhyConfig,
    mode: Mode,
}

impl<IO: JtagPins> Phy<IO> {
    pub fn new(io: IO) -> Self {
        Self::with_config(io, PhyConfig::default())
    }

    pub fn with_config(io: IO, config: PhyConfig) -> Self {
        Self {
            io,
            config,
            mode: Mode::NotInitialized,
        }
    }

    /// Current SinoWealth mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Park all five pins as inputs, pull-ups off.
    ///
    /// Run before any other pin access so the port starts from a known
    /// state regardless of MCU reset defaults.
    pub fn preinit_gpio(&mut self) {
        self.io.to_vref_in();
        self.io.to_tck_in();
        self.io.to_tms_in();
        self.io.to_tdi_in();
        self.io.to_tdo_in(false);
    }

    /// Block until the target supplies Vref.
    ///
    /// Polls every 200 us and toggles the status indicator every 256 polls
    /// (~51 ms) so a stalled wait is visible on the board.
    pub fn wait_for_vref(&mut self) {
        let mut count: u8 = 0;
        let mut indicator = false;
        while !self.io.get_vref() {
            count = count.wrapping_add(1);
            if count == 0 {
                indicator = !indicator;
                self.io.set_status(indicator);
            }
            self.io.delay_us(VREF_POLL_US);
        }
        self.io.set_status(false);
    }

    /// Bring the target into its diagnostic Ready mode.
    ///
    /// Idempotent: a second call returns without touching the pins. The
    /// wake-up waveform is not JTAG; it is the vendor's fixed toggle
    /// sequence and runs with the TAP signals repurposed as plain GPIOs.
    pub fn init(&mut self, wait_vref: bool) {
        if self.mode != Mode::NotInitialized {
            return;
        }

        self.preinit_gpio();

        if wait_vref {
            self.wait_for_vref();
        }

        // Enable outputs at JTAG idle levels, then raise all three for the
        // wake-up preamble.
        self.io.to_tck_out(false);
        self.io.to_tms_out(true);
        self.io.to_tdi_out(false);
        self.io.to_tdo_in(self.config.tdo_pullup);

        self.io.set_tck(true);
        self.io.set_tdi(true);
        self.io.set_tms(true);

        self.io.delay_us(500);
        self.io.set_tck(false);
        self.io.delay_us(1);
        self.io.set_tck(true);
        self.io.delay_us(50);

        for _ in 0..WAKE_TMS_SYNC {
            self.io.set_tms(false);
            self.io.delay_us(WAKE_HALF_US);
            self.io.set_tms(true);
            self.io.delay_us(WAKE_HALF_US);
        }

        for _ in 0..WAKE_TDI_SYNC {
            self.io.set_tdi(false);
            self.io.delay_us(WAKE_HALF_US);
            self.io.set_tdi(true);
            self.io.delay_us(WAKE_HALF_US);
        }

        for _ in 0..WAKE_TCK_SYNC {
            self.io.set_tck(false);
            self.io.delay_us(WAKE_HALF_US);
            self.io.set_tck(true);
            self.io.delay_us(WAKE_HALF_US);
        }

        for _ in 0..WAKE_TMS_HOLD {
            self.io.set_tms(false);
            self.io.delay_us(WAKE_HALF_US);
            self.io.set_tms(true);
            self.io.delay_us(WAKE_HALF_US);
        }

        self.io.delay_us(8);
        self.io.set_tms(false);

        self.mode = Mode::Ready;
    }

    /// Return all pins to high-impedance and forget the target state.
    pub fn stop(&mut self) {
        self.io.to_tck_in();
        self.io.to_tms_in();
        self.io.to_tdi_in();
        self.io.to_tdo_in(false);
        self.mode = Mode::NotInitialized;
    }

    /// Switch to a new SinoWealth mode.
    ///
    /// No-op when already in the target mode or not initialized. Any
    /// non-Ready mode is exited through [`Phy::reset`] first, then the mode
    /// byte goes out as a 10-bit LSB-first frame (byte plus two zero bits)
    /// with TMS held low throughout.
    pub fn select_mode(&mut self, target: Mode) -> Mode {
        if self.mode == target
            || self.mode == Mode::NotInitialized
            || target == Mode::NotInitialized
        {
            return self.mode;
        }

        if self.mode != Mode::Ready {
            self.reset();
        }

        self.shift(u8::from(target) as u64, 10, false);
        self.mode = target;
        self.mode
    }

    /// Exit the current vendor mode back to Ready.
    ///
    /// Ready is held with TCK high and TMS low.
    pub fn reset(&mut self) -> Mode {
        match self.mode {
            Mode::Jtag => {
                // TMS high for 35 clocks leaves JTAG.
                for _ in 0..JTAG_EXIT_CLOCKS {
                    self.next_state(true);
                }
                self.io.set_tck(true);
                self.io.set_tms(false);
                self.mode = Mode::Ready;
            }
            Mode::Icp => {
                // Pulsing TMS with the clock held high leaves ICP.
                self.io.set_tck(true);
                self.io.set_tms(true);
                self.delay_half();
                self.io.set_tms(false);
                self.delay_half();
                self.mode = Mode::Ready;
            }
            Mode::Ready | Mode::NotInitialized => {}
        }

        self.mode
    }

    /// Drive TMS and pulse TCK low-high-low.
    pub fn next_state(&mut self, tms: bool) {
        self.io.set_tms(tms);
        self.pulse_tck();
    }

    /// Shift `bits` (1..=64) LSB-first, sampling TDO after each rising
    /// edge. See [`TapIo::shift`] for the TMS handling on the last bit.
    pub fn shift(&mut self, out: u64, bits: u8, exit_on_last: bool) -> u64 {
        debug_assert!(bits >= 1 && bits <= 64);
        if bits == 0 {
            return 0;
        }

        let mut out = out;
        let mut capture: u64 = 0;
        for i in 0..bits {
            let is_last = i + 1 == bits;
            self.io.set_tms(exit_on_last && is_last);
            self.io.set_tdi(out & 1 != 0);

            self.io.set_tck(false);
            self.delay_half();
            self.io.set_tck(true);
            self.delay_half();

            if self.io.get_tdo() {
                capture |= 1 << i;
            }

            self.io.set_tck(false);
            out >>= 1;
        }

        capture
    }

    /// Raw TDO level, outside of any shift.
    pub fn sample_tdo(&mut self) -> bool {
        self.io.get_tdo()
    }

    pub fn delay_us(&mut self, us: u32) {
        self.io.delay_us(us);
    }

    fn delay_half(&mut self) {
        self.io.delay_us(self.config.half_period_us);
    }

    fn pulse_tck(&mut self) {
        self.io.set_tck(false);
        self.delay_half();
        self.io.set_tck(true);
        self.delay_half();
        self.io.set_tck(false);
    }

    /// Give up ownership of the pin set.
    pub fn release(self) -> IO {
        self.io
    }
}

#[cfg(test)]
impl Phy<crate::mock::MockPins> {
    pub(crate) fn mock(&self) -> &crate::mock::MockPins {
        &self.io
    }
    pub(crate) fn mock_mut(&mut self) -> &mut crate::mock::MockPins {
        &mut self.io
    }
}

impl<IO: JtagPins> TapIo for Phy<IO> {
    fn next_state(&mut self, tms: bool) {
        Phy::next_state(self, tms);
    }

    fn shift(&mut self, out: u64, bits: u8, exit_on_last: bool) -> u64 {
        Phy::shift(self, out, bits, exit_on_last)
    }

    fn delay_us(&mut self, us: u32) {
        Phy::delay_us(self, us);
    }
}
