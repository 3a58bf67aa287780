//! Complementary outputs, break and dead-time (advanced timers).

use super::low_level::Timer;
use super::{AdvancedInstance, Channel, ChannelMode, ChannelState, Error};
use crate::pac::timer::vals::{self, Ckd};

/// Break input polarity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BreakPolarity {
    ActiveLow,
    ActiveHigh,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BreakDeadTimeConfig {
    /// Off-state selection for run mode.
    pub off_state_run: bool,
    /// Off-state selection for idle mode.
    pub off_state_idle: bool,
    pub lock: vals::Lock,
    /// Raw DTG value, see [`dead_time_from_ticks`].
    pub dead_time: u8,
    pub break_enable: bool,
    pub break_polarity: BreakPolarity,
    /// Set MOE again at the next update event after a break.
    pub automatic_output: bool,
}

impl Default for BreakDeadTimeConfig {
    fn default() -> Self {
        Self {
            off_state_run: false,
            off_state_idle: false,
            lock: vals::Lock::OFF,
            dead_time: 0,
            break_enable: false,
            break_polarity: BreakPolarity::ActiveLow,
            automatic_output: false,
        }
    }
}

/// What loads the preloaded CCxE/CCxNE/OCxM bits.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommutationSource {
    /// COMG only.
    Software,
    /// COMG or a rising edge on TRGI.
    Trigger,
}

impl<'d, T: AdvancedInstance> Timer<'d, T> {
    /// Enable the complementary output of a channel.
    pub fn start_complementary(&mut self, channel: Channel) -> Result<(), Error> {
        self.start_complementary_inner(channel, false)
    }

    /// Enable the complementary output with the capture/compare and break interrupts.
    pub fn start_complementary_it(&mut self, channel: Channel) -> Result<(), Error> {
        self.start_complementary_inner(channel, true)
    }

    fn start_complementary_inner(&mut self, channel: Channel, it: bool) -> Result<(), Error> {
        // no complementary channel 4
        if channel == Channel::Ch4 {
            return Err(Error::InvalidChannel);
        }
        let i = channel.index();
        if !matches!(self.modes[i], ChannelMode::OutputCompare | ChannelMode::Pwm)
            || self.n_channel_state[i] != ChannelState::Ready
        {
            return Err(Error::InvalidState);
        }
        self.n_channel_state[i] = ChannelState::Busy;

        let r = self.regs();
        if it {
            r.dier().modify(|w| {
                w.set_ccie(i, true);
                w.set_bie(true);
            });
        }
        r.ccer().modify(|w| w.set_ccne(i, true));
        self.enable_outputs();
        self.enable_counter();
        Ok(())
    }

    /// Disable the complementary output. MOE and the counter stay on while
    /// any other output is enabled.
    pub fn stop_complementary(&mut self, channel: Channel) -> Result<(), Error> {
        self.stop_complementary_inner(channel, false)
    }

    pub fn stop_complementary_it(&mut self, channel: Channel) -> Result<(), Error> {
        self.stop_complementary_inner(channel, true)
    }

    fn stop_complementary_inner(&mut self, channel: Channel, it: bool) -> Result<(), Error> {
        if channel == Channel::Ch4 {
            return Err(Error::InvalidChannel);
        }
        let i = channel.index();
        let r = self.regs();

        r.ccer().modify(|w| w.set_ccne(i, false));
        if it {
            r.dier().modify(|w| w.set_ccie(i, false));
            if r.ccer().read().0 & crate::pac::timer::regs::Ccer::CCNE_MASK == 0 {
                r.dier().modify(|w| w.set_bie(false));
            }
        }
        self.disable_outputs_if_idle();
        self.disable_counter_if_idle();
        if self.n_channel_state[i] == ChannelState::Busy {
            self.n_channel_state[i] = ChannelState::Ready;
        }
        Ok(())
    }

    pub fn complementary_channel_state(&self, channel: Channel) -> ChannelState {
        self.n_channel_state[channel.index()]
    }

    /// Program BDTR. MOE keeps its current value.
    pub fn config_break_dead_time(&mut self, config: &BreakDeadTimeConfig) -> Result<(), Error> {
        self.ensure_initialised()?;
        self.regs().bdtr().modify(|w| {
            w.set_dtg(config.dead_time);
            w.set_lock(config.lock);
            w.set_ossi(config.off_state_idle);
            w.set_ossr(config.off_state_run);
            w.set_bke(config.break_enable);
            w.set_bkp(config.break_polarity == BreakPolarity::ActiveHigh);
            w.set_aoe(config.automatic_output);
        });
        Ok(())
    }

    /// Set the dead time in timer clock ticks, picking the closest
    /// representable value.
    pub fn set_dead_time(&mut self, ticks: u16) {
        let (ckd, dtg) = dead_time_from_ticks(ticks);
        self.set_clock_division(ckd);
        self.regs().bdtr().modify(|w| w.set_dtg(dtg));
    }

    /// Set state of MOE-bit in BDTR register to en-/disable output
    pub fn set_moe(&mut self, enable: bool) {
        self.regs().bdtr().modify(|w| w.set_moe(enable));
    }

    /// Preload the channel enable and mode bits, loaded on commutation events.
    ///
    /// `trigger` selects `ITR0..=ITR3` as TRGI when given.
    pub fn config_commutation(&mut self, trigger: Option<u8>, source: CommutationSource) -> Result<(), Error> {
        self.config_commutation_inner(trigger, source, false)
    }

    /// Like [`config_commutation`](Self::config_commutation), with the commutation interrupt.
    pub fn config_commutation_it(&mut self, trigger: Option<u8>, source: CommutationSource) -> Result<(), Error> {
        self.config_commutation_inner(trigger, source, true)
    }

    fn config_commutation_inner(&mut self, trigger: Option<u8>, source: CommutationSource, it: bool) -> Result<(), Error> {
        self.ensure_initialised()?;
        if trigger.is_some_and(|n| n > 3) {
            return Err(Error::InvalidParameter);
        }

        let r = self.regs();
        if let Some(n) = trigger {
            r.smcr().modify(|w| w.set_ts(vals::Ts(n)));
        }
        r.cr2().modify(|w| {
            w.set_ccpc(true);
            w.set_ccus(source == CommutationSource::Trigger);
        });
        r.dier().modify(|w| {
            w.set_comie(it);
            w.set_comde(false);
        });
        Ok(())
    }
}

/// Closest `(CKD, DTG)` pair for a dead time in timer clock ticks.
///
/// ```text
/// DTG[7]   = 0   => DT = DTG[6:0] * tDTS              0 .. 127
/// DTG[7:6] = 10  => DT = (64 + DTG[5:0]) * 2 * tDTS   128 .. 254
/// DTG[7:5] = 110 => DT = (32 + DTG[4:0]) * 8 * tDTS   256 .. 504
/// DTG[7:5] = 111 => DT = (32 + DTG[4:0]) * 16 * tDTS  512 .. 1008
/// ```
///
/// with `tDTS` the timer clock divided by 1, 2 or 4 (CKD).
pub fn dead_time_from_ticks(ticks: u16) -> (Ckd, u8) {
    let mut error = u16::MAX;
    let mut ckd = Ckd::DIV1;
    let mut bits = 0u8;

    for (this_ckd, outdiv) in [(Ckd::DIV1, 1u16), (Ckd::DIV2, 2), (Ckd::DIV4, 4)] {
        let target = ticks / outdiv;
        let (these_bits, result) = if target < 128 {
            (target as u8, target)
        } else if target < 256 {
            (0x80 | (target / 2 - 64) as u8, target - target % 2)
        } else if target < 512 {
            (0xC0 | (target / 8 - 32) as u8, target - target % 8)
        } else if target < 1024 {
            let t = target.min(1008);
            (0xE0 | (t / 16 - 32) as u8, t - t % 16)
        } else {
            (u8::MAX, 1008)
        };

        let this_error = ticks.abs_diff(result * outdiv);
        if error > this_error {
            ckd = this_ckd;
            bits = these_bits;
            error = this_error;
        }

        if error == 0 {
            break;
        }
    }

    (ckd, bits)
}
