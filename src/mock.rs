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

//! Recording pin set for the test suite.
//!
//! Records every direction change, level write and delay in order, and
//! plays back queued TDO samples, so tests can assert the exact waveform a
//! driver produced and steer what it reads back.

use std::collections::VecDeque;

use crate::pins::JtagPins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Tck,
    Tms,
    Tdi,
    Tdo,
    Vref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Pin switched to output at the given initial level.
    DirOut(Signal, bool),
    /// Pin switched to input; the flag is the requested pull-up.
    DirIn(Signal, bool),
    /// Output level write.
    Level(Signal, bool),
    /// Busy-wait of the given length.
    DelayUs(u32),
    /// Status indicator write.
    Status(bool),
}

pub struct MockPins {
    pub events: Vec<Event>,
    /// Queued TDO samples, consumed one per read.
    pub tdo: VecDeque<bool>,
    /// TDO level once the queue is exhausted.
    pub tdo_default: bool,
    /// Number of Vref polls that read low before the rail comes up.
    pub vref_high_after: u32,
}

impl MockPins {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            tdo: VecDeque::new(),
            tdo_default: false,
            vref_high_after: 0,
        }
    }

    pub fn feed_tdo(&mut self, bits: impl IntoIterator<Item = bool>) {
        self.tdo.extend(bits);
    }

    /// Queue a byte as eight LSB-first TDO samples.
    pub fn feed_tdo_byte(&mut self, byte: u8) {
        self.feed_tdo((0..8).map(move |i| byte & (1 << i) != 0));
    }

    /// (TMS, TDI) levels at each TCK rising edge, in order.
    pub fn clocked_bits(&self) -> Vec<(bool, bool)> {
        let mut tck = false;
        let mut tms = false;
        let mut tdi = false;
        let mut bits = Vec::new();
        for event in &self.events {
            match *event {
                Event::Level(Signal::Tck, level) | Event::DirOut(Signal::Tck, level) => {
                    if level && !tck {
                        bits.push((tms, tdi));
                    }
                    tck = level;
                }
                Event::Level(Signal::Tms, level) | Event::DirOut(Signal::Tms, level) => {
                    tms = level;
                }
                Event::Level(Signal::Tdi, level) | Event::DirOut(Signal::Tdi, level) => {
                    tdi = level;
                }
                _ => {}
            }
        }
        bits
    }
}

impl JtagPins for MockPins {
    fn to_tck_out(&mut self, level: bool) {
        self.events.push(Event::DirOut(Signal::Tck, level));
    }
    fn to_tck_in(&mut self) {
        self.events.push(Event::DirIn(Signal::Tck, false));
    }
    fn to_tms_out(&mut self, level: bool) {
        self.events.push(Event::DirOut(Signal::Tms, level));
    }
    fn to_tms_in(&mut self) {
        self.events.push(Event::DirIn(Signal::Tms, false));
    }
    fn to_tdi_out(&mut self, level: bool) {
        self.events.push(Event::DirOut(Signal::Tdi, level));
    }
    fn to_tdi_in(&mut self) {
        self.events.push(Event::DirIn(Signal::Tdi, false));
    }
    fn to_tdo_in(&mut self, pullup: bool) {
        self.events.push(Event::DirIn(Signal::Tdo, pullup));
    }
    fn to_vref_in(&mut self) {
        self.events.push(Event::DirIn(Signal::Vref, false));
    }

    fn set_tck(&mut self, level: bool) {
        self.events.push(Event::Level(Signal::Tck, level));
    }
    fn set_tms(&mut self, level: bool) {
        self.events.push(Event::Level(Signal::Tms, level));
    }
    fn set_tdi(&mut self, level: bool) {
        self.events.push(Event::Level(Signal::Tdi, level));
    }
    fn get_tdo(&mut self) -> bool {
        self.tdo.pop_front().unwrap_or(self.tdo_default)
    }
    fn get_vref(&mut self) -> bool {
        if self.vref_high_after == 0 {
            true
        } else {
            self.vref_high_after -= 1;
            false
        }
    }

    fn set_status(&mut self, on: bool) {
        self.events.push(Event::Status(on));
    }

    fn delay_us(&mut self, us: u32) {
        self.events.push(Event::DelayUs(us));
    }
}
