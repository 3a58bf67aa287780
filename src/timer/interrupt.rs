//! Event callbacks and the interrupt dispatcher.

use super::low_level::Timer;
use super::{Channel, ChannelMode, GeneralInstance};
use crate::pac::timer::regs::Sr;

/// Events a callback can be registered for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallbackId {
    /// Update event.
    PeriodElapsed = 0,
    /// Compare match on an output compare channel.
    OcDelayElapsed = 1,
    /// Capture on an input capture, encoder or one-pulse trigger channel.
    IcCapture = 2,
    /// Compare match on a PWM or one-pulse output channel.
    PwmPulseFinished = 3,
    Trigger = 4,
    Commutation = 5,
    Break = 6,
}

pub(super) const CALLBACK_COUNT: usize = 7;

/// Event handler. During capture/compare events
/// [`Timer::active_channel`] names the channel.
pub type Callback<'d, T> = fn(&mut Timer<'d, T>);

fn cc_event(mode: ChannelMode) -> Option<CallbackId> {
    match mode {
        ChannelMode::Unconfigured => None,
        ChannelMode::OutputCompare => Some(CallbackId::OcDelayElapsed),
        ChannelMode::Pwm | ChannelMode::OnePulseOutput => Some(CallbackId::PwmPulseFinished),
        ChannelMode::InputCapture | ChannelMode::OnePulseInput | ChannelMode::Encoder => Some(CallbackId::IcCapture),
    }
}

impl<'d, T: GeneralInstance> Timer<'d, T> {
    pub fn register_callback(&mut self, id: CallbackId, callback: Callback<'d, T>) {
        self.callbacks[id as usize] = Some(callback);
    }

    pub fn unregister_callback(&mut self, id: CallbackId) {
        self.callbacks[id as usize] = None;
    }

    /// Channel whose capture/compare event is being handled.
    pub fn active_channel(&self) -> Option<Channel> {
        self.active_channel
    }

    /// Handle pending events in the order CC1, CC2, CC3, CC4, update, break,
    /// trigger, commutation.
    ///
    /// Call this from the timer's interrupt handler. An event is handled when
    /// both its flag and its interrupt enable are set. The status register is
    /// read once and every handled flag is cleared in a single write before
    /// the first callback runs; flags raised after the read stay pending for
    /// the next interrupt. Capture/compare events go to the callback that
    /// matches the mode the channel was configured for.
    pub fn on_interrupt(&mut self) {
        let r = self.regs();
        let sr = r.sr().read();
        let dier = r.dier().read();

        let mut pending = Sr(0);
        for i in 0..Channel::ALL.len() {
            pending.set_ccif(i, sr.ccif(i) && dier.ccie(i));
        }
        pending.set_uif(sr.uif() && dier.uie());
        pending.set_bif(sr.bif() && dier.bie());
        pending.set_tif(sr.tif() && dier.tie());
        pending.set_comif(sr.comif() && dier.comie());
        if pending.0 == 0 {
            return;
        }
        r.sr().write_value(Sr::clearing(pending));

        for ch in Channel::ALL {
            let i = ch.index();
            if pending.ccif(i) {
                self.active_channel = Some(ch);
                if let Some(id) = cc_event(self.modes[i]) {
                    self.fire(id);
                }
                self.active_channel = None;
            }
        }

        if pending.uif() {
            self.fire(CallbackId::PeriodElapsed);
        }
        if pending.bif() {
            self.fire(CallbackId::Break);
        }
        if pending.tif() {
            self.fire(CallbackId::Trigger);
        }
        if pending.comif() {
            self.fire(CallbackId::Commutation);
        }
    }

    fn fire(&mut self, id: CallbackId) {
        if let Some(callback) = self.callbacks[id as usize] {
            callback(self);
        }
    }
}
