//! `embedded-hal` PWM view of a timer channel.

use core::convert::Infallible;

use super::low_level::Timer;
use super::{Channel, Error, GeneralInstance};

/// A PWM channel borrowed from a [`Timer`].
pub struct PwmChannel<'a, 'd, T: GeneralInstance> {
    timer: &'a mut Timer<'d, T>,
    channel: Channel,
}

impl<'d, T: GeneralInstance> Timer<'d, T> {
    /// Borrow a channel as an [`embedded_hal::pwm::SetDutyCycle`].
    pub fn pwm_channel(&mut self, channel: Channel) -> PwmChannel<'_, 'd, T> {
        PwmChannel { timer: self, channel }
    }

    /// Duty value for 100%: one past the reload value.
    pub fn max_duty(&self) -> u16 {
        (self.period() as u32 + 1).min(u16::MAX as u32) as u16
    }
}

impl<'a, 'd, T: GeneralInstance> PwmChannel<'a, 'd, T> {
    pub fn enable(&mut self) -> Result<(), Error> {
        self.timer.start_channel(self.channel)
    }

    pub fn disable(&mut self) {
        self.timer.stop_channel(self.channel)
    }
}

impl<'a, 'd, T: GeneralInstance> embedded_hal::pwm::ErrorType for PwmChannel<'a, 'd, T> {
    type Error = Infallible;
}

impl<'a, 'd, T: GeneralInstance> embedded_hal::pwm::SetDutyCycle for PwmChannel<'a, 'd, T> {
    fn max_duty_cycle(&self) -> u16 {
        self.timer.max_duty()
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.timer.set_compare(self.channel, duty);
        Ok(())
    }
}
