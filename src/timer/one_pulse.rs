//! One-pulse mode: an input edge on one channel starts the counter, the
//! other channel outputs the pulse.

use super::low_level::{check_filter, InputCaptureMode, InputTISelection, OcConfig, Timer};
use super::{Channel, ChannelMode, ChannelState, Error, GeneralInstance};
use crate::pac::timer::vals;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OnePulseMode {
    /// The counter stops at the next update event.
    Single,
    /// The counter keeps running after the first pulse.
    Repetitive,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OnePulseConfig {
    /// The pulse. `pulse` is the delay from the trigger edge.
    pub output: OcConfig,
    pub input_polarity: InputCaptureMode,
    pub input_selection: InputTISelection,
    pub input_filter: u8,
}

impl<'d, T: GeneralInstance> Timer<'d, T> {
    /// Couple channels 1 and 2: `output` gets the pulse, `input` is the
    /// trigger. The slave mode controller is put in trigger mode on
    /// TI1FP1 or TI2FP2.
    pub fn init_one_pulse(
        &mut self,
        config: &OnePulseConfig,
        output: Channel,
        input: Channel,
        mode: OnePulseMode,
    ) -> Result<(), Error> {
        self.ensure_initialised()?;
        if !matches!(
            (output, input),
            (Channel::Ch1, Channel::Ch2) | (Channel::Ch2, Channel::Ch1)
        ) {
            return Err(Error::InvalidChannel);
        }
        check_filter(config.input_filter)?;

        self.write_oc(output, &config.output);
        self.write_ic(input, config.input_polarity, config.input_selection, config.input_filter);

        let ts = match input {
            Channel::Ch1 => vals::Ts::TI1FP1,
            _ => vals::Ts::TI2FP2,
        };
        let r = self.regs();
        r.smcr().modify(|w| {
            w.set_ts(ts);
            w.set_sms(vals::Sms::TRIGGERMODE);
        });
        r.cr1().modify(|w| w.set_opm(mode == OnePulseMode::Single));

        self.modes[output.index()] = ChannelMode::OnePulseOutput;
        self.modes[input.index()] = ChannelMode::OnePulseInput;
        Ok(())
    }

    /// Arm both channels. The counter is started by the trigger edge.
    pub fn start_one_pulse(&mut self) -> Result<(), Error> {
        self.start_one_pulse_inner(false)
    }

    /// Arm both channels with their capture/compare interrupts.
    pub fn start_one_pulse_it(&mut self) -> Result<(), Error> {
        self.start_one_pulse_inner(true)
    }

    fn start_one_pulse_inner(&mut self, it: bool) -> Result<(), Error> {
        let paired = self.modes[..2]
            .iter()
            .all(|m| matches!(m, ChannelMode::OnePulseOutput | ChannelMode::OnePulseInput));
        if !paired || self.channel_state[..2].iter().any(|s| *s != ChannelState::Ready) {
            return Err(Error::InvalidState);
        }
        self.channel_state[0] = ChannelState::Busy;
        self.channel_state[1] = ChannelState::Busy;

        let r = self.regs();
        if it {
            r.dier().modify(|w| {
                w.set_ccie(0, true);
                w.set_ccie(1, true);
            });
        }
        r.ccer().modify(|w| {
            w.set_cce(0, true);
            w.set_cce(1, true);
        });
        self.enable_outputs();
        Ok(())
    }

    pub fn stop_one_pulse(&mut self) {
        self.stop_one_pulse_inner(false)
    }

    pub fn stop_one_pulse_it(&mut self) {
        self.stop_one_pulse_inner(true)
    }

    fn stop_one_pulse_inner(&mut self, it: bool) {
        let r = self.regs();
        if it {
            r.dier().modify(|w| {
                w.set_ccie(0, false);
                w.set_ccie(1, false);
            });
        }
        r.ccer().modify(|w| {
            w.set_cce(0, false);
            w.set_cce(1, false);
        });
        self.disable_outputs_if_idle();
        self.disable_counter_if_idle();
        self.channel_state[0] = ChannelState::Ready;
        self.channel_state[1] = ChannelState::Ready;
    }
}
