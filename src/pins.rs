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

//! Pin-level primitives for the bit-banged probe.
//!
//! [`JtagPins`] is the lowest seam in the stack: direction flips, level
//! writes and level reads on the five probe signals, plus the busy-wait
//! delay everything above is timed with. [`JtagPinSet`] is the production
//! implementation over `embedded-hal` pin pairs; the test suite substitutes
//! a recording implementation.

use embedded_hal::digital::v2::{InputPin, IoPin, OutputPin, PinState};

/// Microsecond-granularity busy-wait delay.
///
/// Every timing in the SinoWealth entry and flash protocols is specified in
/// microseconds, so implementations are expected to be calibrated to the
/// CPU clock (e.g. a cycle-counted spin loop).
pub trait DelayFunc {
    fn delay_us(&self, us: u32);
}

/// Direction, level and timing primitives on the probe pins.
///
/// TCK/TMS/TDI/TDO are bidirectional so the whole port can be parked
/// high-impedance; Vref is sense-only. `set_status` drives an optional
/// wait indicator and defaults to a no-op.
pub trait JtagPins {
    fn to_tck_out(&mut self, level: bool);
    fn to_tck_in(&mut self);
    fn to_tms_out(&mut self, level: bool);
    fn to_tms_in(&mut self);
    fn to_tdi_out(&mut self, level: bool);
    fn to_tdi_in(&mut self);
    /// Switch TDO to input. `pullup` asks for a weak pull-up where the
    /// hardware supports one.
    fn to_tdo_in(&mut self, pullup: bool);
    fn to_vref_in(&mut self);

    fn set_tck(&mut self, level: bool);
    fn set_tms(&mut self, level: bool);
    fn set_tdi(&mut self, level: bool);
    fn get_tdo(&mut self) -> bool;
    fn get_vref(&mut self) -> bool;

    fn set_status(&mut self, _on: bool) {}

    fn delay_us(&mut self, us: u32);
}

fn turn_to_in<I, O>(pin_in: &mut Option<I>, pin_out: &mut Option<O>)
where
    I: InputPin + IoPin<I, O>,
    O: OutputPin + IoPin<I, O>,
{
    let mut pin = None;
    core::mem::swap(&mut pin, pin_out);
    if let Some(pin_out) = pin {
        *pin_in = Some(
            pin_out
                .into_input_pin()
                .unwrap_or_else(|_| panic!("Failed to turn pin to input.")),
        );
    }
}

fn turn_to_out<I, O>(pin_in: &mut Option<I>, pin_out: &mut Option<O>, level: bool)
where
    I: InputPin + IoPin<I, O>,
    O: OutputPin + IoPin<I, O>,
{
    let mut pin = None;
    core::mem::swap(&mut pin, pin_in);
    if let Some(pin_in) = pin {
        let state = if level { PinState::High } else { PinState::Low };
        *pin_out = Some(
            pin_in
                .into_output_pin(state)
                .unwrap_or_else(|_| panic!("Failed to turn pin to output.")),
        );
    }
}

fn set_output<I, O>(pin_out: &mut Option<O>, level: bool)
where
    I: InputPin + IoPin<I, O>,
    O: OutputPin + IoPin<I, O>,
{
    pin_out.as_mut().and_then(|p| {
        if level {
            p.set_high().ok()
        } else {
            p.set_low().ok()
        }
    });
}

fn get_input<I, O>(pin_in: &mut Option<I>) -> bool
where
    I: InputPin + IoPin<I, O>,
    O: OutputPin + IoPin<I, O>,
{
    if let Some(pin_in) = pin_in {
        pin_in
            .is_high()
            .unwrap_or_else(|_| panic!("Failed to get input pin is high"))
    } else {
        false
    }
}

/// Bit-bang pin set over `embedded-hal` pin pairs.
///
/// Each bidirectional signal is held as an input/output pair of `Option`s
/// and converted in place on direction changes. Pull-up selection on TDO is
/// board wiring on most HALs and is not expressible through `IoPin`, so the
/// `pullup` request is accepted and ignored here.
pub struct JtagPinSet<
    TckInputPin,
    TckOutputPin,
    TmsInputPin,
    TmsOutputPin,
    TdiInputPin,
    TdiOutputPin,
    TdoInputPin,
    TdoOutputPin,
    VrefPin,
    StatusPin,
    DelayFn,
> where
    TckInputPin: InputPin + IoPin<TckInputPin, TckOutputPin>,
    TckOutputPin: OutputPin + IoPin<TckInputPin, TckOutputPin>,
    TmsInputPin: InputPin + IoPin<TmsInputPin, TmsOutputPin>,
    TmsOutputPin: OutputPin + IoPin<TmsInputPin, TmsOutputPin>,
    TdiInputPin: InputPin + IoPin<TdiInputPin, TdiOutputPin>,
    TdiOutputPin: OutputPin + IoPin<TdiInputPin, TdiOutputPin>,
    TdoInputPin: InputPin + IoPin<TdoInputPin, TdoOutputPin>,
    TdoOutputPin: OutputPin + IoPin<TdoInputPin, TdoOutputPin>,
    VrefPin: InputPin,
    StatusPin: OutputPin,
    DelayFn: DelayFunc,
{
    tck_in: Option<TckInputPin>,
    tck_out: Option<TckOutputPin>,
    tms_in: Option<TmsInputPin>,
    tms_out: Option<TmsOutputPin>,
    tdi_in: Option<TdiInputPin>,
    tdi_out: Option<TdiOutputPin>,
    tdo_in: Option<TdoInputPin>,
    tdo_out: Option<TdoOutputPin>,
    vref: VrefPin,
    status: Option<StatusPin>,
    delay: DelayFn,
}

impl<
        TckInputPin,
        TckOutputPin,
        TmsInputPin,
        TmsOutputPin,
        TdiInputPin,
        TdiOutputPin,
        TdoInputPin,
        TdoOutputPin,
        VrefPin,
        StatusPin,
        DelayFn,
    >
    JtagPinSet<
        TckInputPin,
        TckOutputPin,
        TmsInputPin,
        TmsOutputPin,
        TdiInputPin,
        TdiOutputPin,
        TdoInputPin,
        TdoOutputPin,
        VrefPin,
        StatusPin,
        DelayFn,
    >
where
    TckInputPin: InputPin + IoPin<TckInputPin, TckOutputPin>,
    TckOutputPin: OutputPin + IoPin<TckInputPin, TckOutputPin>,
    TmsInputPin: InputPin + IoPin<TmsInputPin, TmsOutputPin>,
    TmsOutputPin: OutputPin + IoPin<TmsInputPin, TmsOutputPin>,
    TdiInputPin: InputPin + IoPin<TdiInputPin, TdiOutputPin>,
    TdiOutputPin: OutputPin + IoPin<TdiInputPin, TdiOutputPin>,
    TdoInputPin: InputPin + IoPin<TdoInputPin, TdoOutputPin>,
    TdoOutputPin: OutputPin + IoPin<TdoInputPin, TdoOutputPin>,
    VrefPin: InputPin,
    StatusPin: OutputPin,
    DelayFn: DelayFunc,
{
    pub fn new(
        tck: TckInputPin,
        tms: TmsInputPin,
        tdi: TdiInputPin,
        tdo: TdoInputPin,
        vref: VrefPin,
        status: Option<StatusPin>,
        delay: DelayFn,
    ) -> Self {
        Self {
            tck_in: Some(tck),
            tck_out: None,
            tms_in: Some(tms),
            tms_out: None,
            tdi_in: Some(tdi),
            tdi_out: None,
            tdo_in: Some(tdo),
            tdo_out: None,
            vref,
            status,
            delay,
        }
    }
}

impl<
        TckInputPin,
        TckOutputPin,
        TmsInputPin,
        TmsOutputPin,
        TdiInputPin,
        TdiOutputPin,
        TdoInputPin,
        TdoOutputPin,
        VrefPin,
        StatusPin,
        DelayFn,
    > JtagPins
    for JtagPinSet<
        TckInputPin,
        TckOutputPin,
        TmsInputPin,
        TmsOutputPin,
        TdiInputPin,
        TdiOutputPin,
        TdoInputPin,
        TdoOutputPin,
        VrefPin,
        StatusPin,
        DelayFn,
    >
where
    TckInputPin: InputPin + IoPin<TckInputPin, TckOutputPin>,
    TckOutputPin: OutputPin + IoPin<TckInputPin, TckOutputPin>,
    TmsInputPin: InputPin + IoPin<TmsInputPin, TmsOutputPin>,
    TmsOutputPin: OutputPin + IoPin<TmsInputPin, TmsOutputPin>,
    TdiInputPin: InputPin + IoPin<TdiInputPin, TdiOutputPin>,
    TdiOutputPin: OutputPin + IoPin<TdiInputPin, TdiOutputPin>,
    TdoInputPin: InputPin + IoPin<TdoInputPin, TdoOutputPin>,
    TdoOutputPin: OutputPin + IoPin<TdoInputPin, TdoOutputPin>,
    VrefPin: InputPin,
    StatusPin: OutputPin,
    DelayFn: DelayFunc,
{
    fn to_tck_out(&mut self, level: bool) {
        turn_to_out(&mut self.tck_in, &mut self.tck_out, level);
    }
    fn to_tck_in(&mut self) {
        turn_to_in(&mut self.tck_in, &mut self.tck_out);
    }
    fn to_tms_out(&mut self, level: bool) {
        turn_to_out(&mut self.tms_in, &mut self.tms_out, level);
    }
    fn to_tms_in(&mut self) {
        turn_to_in(&mut self.tms_in, &mut self.tms_out);
    }
    fn to_tdi_out(&mut self, level: bool) {
        turn_to_out(&mut self.tdi_in, &mut self.tdi_out, level);
    }
    fn to_tdi_in(&mut self) {
        turn_to_in(&mut self.tdi_in, &mut self.tdi_out);
    }
    fn to_tdo_in(&mut self, _pullup: bool) {
        turn_to_in(&mut self.tdo_in, &mut self.tdo_out);
    }
    fn to_vref_in(&mut self) {}

    fn set_tck(&mut self, level: bool) {
        set_output(&mut self.tck_out, level);
    }
    fn set_tms(&mut self, level: bool) {
        set_output(&mut self.tms_out, level);
    }
    fn set_tdi(&mut self, level: bool) {
        set_output(&mut self.tdi_out, level);
    }
    fn get_tdo(&mut self) -> bool {
        get_input(&mut self.tdo_in)
    }
    fn get_vref(&mut self) -> bool {
        self.vref.is_high().unwrap_or(false)
    }

    fn set_status(&mut self, on: bool) {
        if let Some(status) = self.status.as_mut() {
            if on {
                status.set_high().ok();
            } else {
                status.set_low().ok();
            }
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
