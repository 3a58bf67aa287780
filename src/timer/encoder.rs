//! Quadrature encoder and Hall sensor interfaces (channels 1 and 2).

use super::low_level::{check_filter, InputCaptureMode, InputTISelection, OcConfig, OutputCompareMode, Timer};
use super::{Channel, ChannelMode, ChannelState, Error, GeneralInstance};
use crate::pac::timer::vals;

/// Which edges count.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncoderMode {
    /// Count on TI1 edges.
    Ti1,
    /// Count on TI2 edges.
    Ti2,
    /// Count on both, four counts per cycle.
    Ti12,
}

impl From<EncoderMode> for vals::Sms {
    fn from(mode: EncoderMode) -> Self {
        match mode {
            EncoderMode::Ti1 => vals::Sms::ENCODERMODE1,
            EncoderMode::Ti2 => vals::Sms::ENCODERMODE2,
            EncoderMode::Ti12 => vals::Sms::ENCODERMODE3,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderInput {
    /// Rising or falling; both edges is not a valid encoder polarity.
    pub polarity: InputCaptureMode,
    pub selection: InputTISelection,
    pub prescaler: vals::Icpsc,
    pub filter: u8,
}

impl Default for EncoderInput {
    fn default() -> Self {
        Self {
            polarity: InputCaptureMode::Rising,
            selection: InputTISelection::Direct,
            prescaler: vals::Icpsc::DIV1,
            filter: 0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderConfig {
    pub mode: EncoderMode,
    pub ch1: EncoderInput,
    pub ch2: EncoderInput,
}

/// Encoder channels to start or stop.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncoderChannels {
    Ch1,
    Ch2,
    Both,
}

impl EncoderChannels {
    fn indices(self) -> &'static [usize] {
        match self {
            EncoderChannels::Ch1 => &[0],
            EncoderChannels::Ch2 => &[1],
            EncoderChannels::Both => &[0, 1],
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HallSensorConfig {
    pub polarity: InputCaptureMode,
    pub prescaler: vals::Icpsc,
    pub filter: u8,
    /// Delay between a Hall edge and the commutation pulse on TRGO, in counter ticks.
    pub commutation_delay: u16,
}

impl<'d, T: GeneralInstance> Timer<'d, T> {
    /// Put channels 1 and 2 in encoder mode.
    pub fn init_encoder(&mut self, config: &EncoderConfig) -> Result<(), Error> {
        self.ensure_initialised()?;
        for input in [&config.ch1, &config.ch2] {
            if input.polarity == InputCaptureMode::BothEdges {
                return Err(Error::InvalidParameter);
            }
            check_filter(input.filter)?;
        }

        let r = self.regs();
        r.smcr().modify(|w| w.set_sms(config.mode.into()));
        r.ccmr_input(0).modify(|w| {
            w.set_ccs(0, config.ch1.selection.into());
            w.set_ccs(1, config.ch2.selection.into());
            w.set_icpsc(0, config.ch1.prescaler);
            w.set_icpsc(1, config.ch2.prescaler);
            w.set_icf(0, config.ch1.filter);
            w.set_icf(1, config.ch2.filter);
        });
        r.ccer().modify(|w| {
            for (i, input) in [config.ch1, config.ch2].iter().enumerate() {
                w.set_cce(i, false);
                w.set_ccp(i, input.polarity == InputCaptureMode::Falling);
                w.set_ccnp(i, false);
            }
        });

        self.modes[0] = ChannelMode::Encoder;
        self.modes[1] = ChannelMode::Encoder;
        Ok(())
    }

    /// Enable the encoder inputs and the counter.
    pub fn start_encoder(&mut self, channels: EncoderChannels) -> Result<(), Error> {
        self.start_encoder_inner(channels, false)
    }

    pub fn start_encoder_it(&mut self, channels: EncoderChannels) -> Result<(), Error> {
        self.start_encoder_inner(channels, true)
    }

    fn start_encoder_inner(&mut self, channels: EncoderChannels, it: bool) -> Result<(), Error> {
        let idx = channels.indices();
        if idx
            .iter()
            .any(|&i| self.modes[i] != ChannelMode::Encoder || self.channel_state[i] != ChannelState::Ready)
        {
            return Err(Error::InvalidState);
        }

        let r = self.regs();
        for &i in idx {
            self.channel_state[i] = ChannelState::Busy;
            if it {
                r.dier().modify(|w| w.set_ccie(i, true));
            }
            r.ccer().modify(|w| w.set_cce(i, true));
        }
        r.cr1().modify(|w| w.set_cen(true));
        Ok(())
    }

    pub fn stop_encoder(&mut self, channels: EncoderChannels) {
        self.stop_encoder_inner(channels, false)
    }

    pub fn stop_encoder_it(&mut self, channels: EncoderChannels) {
        self.stop_encoder_inner(channels, true)
    }

    fn stop_encoder_inner(&mut self, channels: EncoderChannels, it: bool) {
        let r = self.regs();
        for &i in channels.indices() {
            if it {
                r.dier().modify(|w| w.set_ccie(i, false));
            }
            r.ccer().modify(|w| w.set_cce(i, false));
            self.channel_state[i] = ChannelState::Ready;
        }
        self.disable_counter_if_idle();
    }

    /// Counting direction, as last seen by the encoder interface.
    pub fn encoder_direction(&self) -> vals::Dir {
        self.regs().cr1().read().dir()
    }

    /// Hall sensor interface: the XOR of TI1..TI3 is captured on channel 1
    /// and resets the counter; channel 2 fires the commutation pulse on TRGO
    /// after `commutation_delay`.
    ///
    /// Start it with [`start_channel`](Self::start_channel) on channel 1.
    pub fn init_hall_sensor(&mut self, config: &HallSensorConfig) -> Result<(), Error> {
        self.ensure_initialised()?;
        check_filter(config.filter)?;

        let r = self.regs();
        r.cr2().modify(|w| w.set_ti1s(true));
        self.write_ic(Channel::Ch1, config.polarity, InputTISelection::TRC, config.filter);
        self.set_ic_prescaler(Channel::Ch1, config.prescaler);

        r.smcr().modify(|w| {
            w.set_ts(vals::Ts::TI1F_ED);
            w.set_sms(vals::Sms::RESETMODE);
        });

        self.write_oc(
            Channel::Ch2,
            &OcConfig::output_compare(OutputCompareMode::PwmMode2, config.commutation_delay),
        );
        r.cr2().modify(|w| w.set_mms(vals::Mms::COMPAREOC2));

        self.modes[0] = ChannelMode::InputCapture;
        self.modes[1] = ChannelMode::Pwm;
        Ok(())
    }
}
