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

//! Host command dispatch.
//!
//! The transport (USB CDC, UART, whatever carries the bytes) lives outside
//! this crate; it hands request frames in and ships response frames out.
//! A frame is a sequence of commands, each a one-byte id followed by its
//! little-endian arguments. Every command echoes its id into the response,
//! followed by its return payload.
//!
//! The [`Adapter`] is the single owner of the probe state — PHY mode and
//! tracked TAP state are only ever mutated from here or below, never from
//! two places.

use num_enum::{IntoPrimitive, TryFromPrimitive, TryFromPrimitiveError};

use crate::cursor::{FrameError, FrameReader, FrameWriter};
use crate::phy::{Mode, Phy};
use crate::pins::JtagPins;
use crate::sinowealth::flash::{codescan_read, FlashReader};
use crate::sinowealth::icp::Icp;
use crate::sinowealth::jtag::SinowealthJtag;
use crate::tap::{State, Tap};

/// RPC command ids, banked per subsystem so additions never renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    PhyInit = 0x01,
    PhyReset = 0x02,
    PhyStop = 0x03,
    TapInit = 0x10,
    TapState = 0x11,
    TapReset = 0x12,
    TapGotoState = 0x13,
    TapIr = 0x14,
    TapDr = 0x15,
    TapBypass = 0x16,
    TapIdcode = 0x17,
    TapIdleClocks = 0x18,
    TapCodescanRead = 0x19,
    FlashRead = 0x20,
    IcpInit = 0x30,
    IcpVerify = 0x31,
    IcpRead = 0x32,
    IcpErase = 0x33,
    IcpWrite = 0x34,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command id.
    InvalidCommand,
    /// An argument is outside its domain (TAP state, DR width).
    InvalidArgument,
    /// Request too short or response buffer too small.
    Frame(FrameError),
}

impl From<FrameError> for CommandError {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

impl From<TryFromPrimitiveError<Command>> for CommandError {
    fn from(_: TryFromPrimitiveError<Command>) -> Self {
        Self::InvalidCommand
    }
}

impl From<TryFromPrimitiveError<State>> for CommandError {
    fn from(_: TryFromPrimitiveError<State>) -> Self {
        Self::InvalidArgument
    }
}

/// Bytes returned by a `FlashRead` block command.
pub const FLASH_BLOCK_LEN: usize = 128;

/// Probe adapter: sole holder of the PHY/TAP/ICP state.
pub struct Adapter<IO: JtagPins> {
    tap: Tap<Phy<IO>>,
}

impl<IO: JtagPins> Adapter<IO> {
    pub fn new(io: IO) -> Self {
        Self {
            tap: Tap::new(Phy::new(io)),
        }
    }

    pub fn from_phy(phy: Phy<IO>) -> Self {
        Self { tap: Tap::new(phy) }
    }

    fn phy(&mut self) -> &mut Phy<IO> {
        self.tap.phy_mut()
    }

    /// Process one request frame, appending one response per command.
    ///
    /// Returns the number of request bytes consumed and response bytes
    /// produced. Processing stops at the first malformed command; whatever
    /// was completed before it stays in the response buffer.
    pub fn process(
        &mut self,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<(usize, usize), CommandError> {
        let mut reader = FrameReader::new(request);
        let mut writer = FrameWriter::new(response);

        while reader.remaining() > 0 {
            let command = Command::try_from(reader.read_u8()?)?;
            writer.write_u8(command.into())?;
            self.run_command(command, &mut reader, &mut writer)?;
        }

        Ok((reader.position(), writer.position()))
    }

    fn run_command(
        &mut self,
        command: Command,
        reader: &mut FrameReader<'_>,
        writer: &mut FrameWriter<'_>,
    ) -> Result<(), CommandError> {
        match command {
            Command::PhyInit => {
                self.phy().init(true);
            }
            Command::PhyReset => {
                let mode = self.phy().reset();
                writer.write_u8((mode == Mode::Ready) as u8)?;
            }
            Command::PhyStop => {
                self.phy().stop();
            }
            Command::TapInit => {
                self.phy().select_mode(Mode::Jtag);
                self.tap.reset();
                let status = self.tap.init();
                writer.write_u8(status.into())?;
            }
            Command::TapState => {
                writer.write_u8(self.tap.state().into())?;
            }
            Command::TapReset => {
                self.tap.reset();
            }
            Command::TapGotoState => {
                let target = State::try_from(reader.read_u8()?)?;
                self.tap.goto_state(target);
            }
            Command::TapIr => {
                let out = reader.read_u8()?;
                writer.write_u8(self.tap.ir(out))?;
            }
            Command::TapDr => {
                let out = reader.read_u32()? as u64;
                let bits = reader.read_u8()?;
                let capture = match bits {
                    4 => self.tap.dr::<4>(out),
                    8 => self.tap.dr::<8>(out),
                    16 => self.tap.dr::<16>(out),
                    23 => self.tap.dr::<23>(out),
                    30 => self.tap.dr::<30>(out),
                    32 => self.tap.dr::<32>(out),
                    _ => return Err(CommandError::InvalidArgument),
                };
                writer.write_u32(capture as u32)?;
            }
            Command::TapBypass => {
                self.tap.bypass();
            }
            Command::TapIdcode => {
                let idcode = self.tap.idcode();
                writer.write_u32(idcode)?;
            }
            Command::TapIdleClocks => {
                let count = reader.read_u8()?;
                self.tap.idle_clocks(count);
            }
            Command::TapCodescanRead => {
                let addr = reader.read_u16()?;
                writer.write_u8(codescan_read(&mut self.tap, addr))?;
            }
            Command::FlashRead => {
                let addr = reader.read_u16()?;
                let block = writer.reserve(FLASH_BLOCK_LEN)?;
                FlashReader::new(&mut self.tap, addr).read_into(block);
            }
            Command::IcpInit => {
                let phy = self.phy();
                phy.select_mode(Mode::Icp);
                Icp::new(phy).init();
            }
            Command::IcpVerify => {
                let phy = self.phy();
                phy.select_mode(Mode::Icp);
                let alive = Icp::new(phy).verify();
                writer.write_u8(alive as u8)?;
            }
            Command::IcpRead => {
                let addr = reader.read_u16()?;
                let len = reader.read_u8()? as usize;
                writer.write_u8(len as u8)?;
                let buf = writer.reserve(len)?;
                let phy = self.phy();
                phy.select_mode(Mode::Icp);
                Icp::new(phy).read_flash(addr, buf);
            }
            Command::IcpErase => {
                let addr = reader.read_u16()?;
                let phy = self.phy();
                phy.select_mode(Mode::Icp);
                let status = Icp::new(phy).erase_flash(addr);
                writer.write_u8(status as u8)?;
            }
            Command::IcpWrite => {
                let addr = reader.read_u16()?;
                let len = reader.read_u8()? as usize;
                let data = reader.read_bytes(len)?;
                let phy = self.phy();
                phy.select_mode(Mode::Icp);
                let ok = Icp::new(phy).write_flash(addr, data);
                writer.write_u8(ok as u8)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPins;
    use crate::sinowealth::jtag::Status;

    fn ready_adapter() -> Adapter<MockPins> {
        let mut phy = Phy::new(MockPins::new());
        phy.init(false);
        phy.mock_mut().events.clear();
        Adapter::from_phy(phy)
    }

    fn run(adapter: &mut Adapter<MockPins>, request: &[u8]) -> Vec<u8> {
        let mut response = [0u8; 256];
        let (consumed, produced) = adapter.process(request, &mut response).unwrap();
        assert_eq!(consumed, request.len());
        response[..produced].to_vec()
    }

    #[test]
    fn tap_state_reports_tracked_state() {
        let mut adapter = ready_adapter();
        let response = run(&mut adapter, &[Command::TapState.into()]);
        assert_eq!(response, vec![0x11, 0x00]); // Test-Logic-Reset
    }

    #[test]
    fn goto_state_then_state_round_trips() {
        let mut adapter = ready_adapter();
        let response = run(
            &mut adapter,
            &[
                Command::TapGotoState.into(),
                State::RunTestIdle.into(),
                Command::TapState.into(),
            ],
        );
        assert_eq!(response, vec![0x13, 0x11, 0x01]);
    }

    #[test]
    fn tap_dr_dispatches_on_width() {
        let mut adapter = ready_adapter();
        // out = 0x403000, 23 bits
        let response = run(
            &mut adapter,
            &[Command::TapDr.into(), 0x00, 0x30, 0x40, 0x00, 23],
        );
        assert_eq!(response[0], 0x15);
        assert_eq!(response.len(), 5); // id + u32 capture
        assert_eq!(adapter.tap.state(), State::UpdateDr);
    }

    #[test]
    fn tap_dr_rejects_unknown_width() {
        let mut adapter = ready_adapter();
        let mut response = [0u8; 16];
        let err = adapter
            .process(&[Command::TapDr.into(), 0, 0, 0, 0, 13], &mut response)
            .unwrap_err();
        assert_eq!(err, CommandError::InvalidArgument);
    }

    #[test]
    fn goto_state_rejects_out_of_range_target() {
        let mut adapter = ready_adapter();
        let mut response = [0u8; 16];
        let err = adapter
            .process(&[Command::TapGotoState.into(), 16], &mut response)
            .unwrap_err();
        assert_eq!(err, CommandError::InvalidArgument);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut adapter = ready_adapter();
        let mut response = [0u8; 16];
        let err = adapter.process(&[0xEE], &mut response).unwrap_err();
        assert_eq!(err, CommandError::InvalidCommand);
    }

    #[test]
    fn truncated_arguments_are_rejected() {
        let mut adapter = ready_adapter();
        let mut response = [0u8; 16];
        let err = adapter
            .process(&[Command::TapCodescanRead.into(), 0x34], &mut response)
            .unwrap_err();
        assert_eq!(err, CommandError::Frame(FrameError::Truncated));
    }

    #[test]
    fn phy_reset_reports_ready() {
        let mut adapter = ready_adapter();
        let response = run(&mut adapter, &[Command::PhyReset.into()]);
        assert_eq!(response, vec![0x02, 0x01]);
    }

    #[test]
    fn tap_init_switches_to_jtag_and_reports_status() {
        let mut adapter = ready_adapter();
        let response = run(&mut adapter, &[Command::TapInit.into()]);
        // Mock TDO idles low, so the IDCODE probe reads zero.
        assert_eq!(response, vec![0x10, u8::from(Status::ErrIdcode)]);
        assert_eq!(adapter.phy().mode(), Mode::Jtag);
    }

    #[test]
    fn flash_read_returns_a_full_block() {
        let mut adapter = ready_adapter();
        adapter.phy().select_mode(Mode::Jtag);
        let response = run(&mut adapter, &[Command::FlashRead.into(), 0x00, 0x10]);
        assert_eq!(response.len(), 1 + FLASH_BLOCK_LEN);
        assert_eq!(response[0], 0x20);
        // The reader's drop left the TAP in Test-Logic-Reset.
        assert_eq!(adapter.tap.state(), State::TestLogicReset);
    }

    #[test]
    fn icp_write_consumes_length_prefixed_payload() {
        let mut adapter = ready_adapter();
        let response = run(
            &mut adapter,
            &[Command::IcpWrite.into(), 0x00, 0x01, 2, 0xAA, 0xBB],
        );
        assert_eq!(response, vec![0x34, 0x01]);
        assert_eq!(adapter.phy().mode(), Mode::Icp);
    }

    #[test]
    fn icp_read_prefixes_payload_with_length() {
        let mut adapter = ready_adapter();
        let response = run(&mut adapter, &[Command::IcpRead.into(), 0x00, 0x02, 3]);
        assert_eq!(response.len(), 1 + 1 + 3);
        assert_eq!(&response[..2], &[0x32, 3]);
    }

    #[test]
    fn commands_chain_within_one_frame() {
        let mut adapter = ready_adapter();
        let response = run(
            &mut adapter,
            &[
                Command::TapReset.into(),
                Command::TapIdleClocks.into(),
                2,
                Command::TapState.into(),
            ],
        );
        // Reset, two idle clocks into Run-Test/Idle, then the state query.
        assert_eq!(response, vec![0x12, 0x18, 0x11, 0x01]);
    }
}
