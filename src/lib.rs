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

//! Bit-banged JTAG/ICP adapter core for SinoWealth 8051-family MCUs.
//!
//! Layers, bottom up: [`pins`] holds the GPIO and timing primitives,
//! [`phy`] turns them into deterministic wire signalling (including the
//! vendor wake-up waveform and mode handshake), [`tap`] is the IEEE 1149.1
//! state machine, and [`sinowealth`] carries the vendor protocols on top —
//! debug-port bring-up, CODESCAN flash reads and the ICP programming
//! command set. [`dispatch`] maps host command frames onto all of it; the
//! byte transport itself lives outside this crate.

#![cfg_attr(not(test), no_std)]

pub mod bits;
pub mod cursor;
pub mod dispatch;
pub mod phy;
pub mod pins;
pub mod sinowealth;
pub mod tap;

#[cfg(test)]
pub(crate) mod mock;

pub use crate::dispatch::{Adapter, Command, CommandError};
pub use crate::phy::{Mode, Phy, PhyConfig, TapIo};
pub use crate::pins::{DelayFunc, JtagPins, JtagPinSet};
pub use crate::sinowealth::{codescan_read, FlashReader, Icp, SinowealthJtag, Status};
pub use crate::tap::{State, Tap};
