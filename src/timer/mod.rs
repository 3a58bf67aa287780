//! Timers.
//!
//! Instance types:
//!
//! - GeneralInstance: TIM2, four capture/compare channels
//! - AdvancedInstance: TIM1, adds complementary outputs, break and dead-time,
//!   the repetition counter and commutation events
//!
//! [`Timer`] remembers what every channel was configured for. Starting,
//! stopping and interrupt dispatch follow that stored mode rather than
//! re-reading the CCMR selection bits.

use crate::pac;
use crate::peripheral::RccPeripheral;

pub mod complementary_pwm;
pub mod encoder;
pub mod interrupt;
pub mod low_level;
pub mod one_pulse;
pub mod pwm;

pub use interrupt::{Callback, CallbackId};
pub use low_level::Timer;

/// Timer channel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Channel 1.
    Ch1,
    /// Channel 2.
    Ch2,
    /// Channel 3.
    Ch3,
    /// Channel 4.
    Ch4,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Ch1, Channel::Ch2, Channel::Ch3, Channel::Ch4];

    /// Get the channel index (0..3)
    pub fn index(&self) -> usize {
        match self {
            Channel::Ch1 => 0,
            Channel::Ch2 => 1,
            Channel::Ch3 => 2,
            Channel::Ch4 => 3,
        }
    }
}

/// Timer driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The timer or channel is not in a state that allows the operation.
    InvalidState,
    /// The channel cannot be used for this operation.
    InvalidChannel,
    /// A setting does not fit its register field.
    InvalidParameter,
}

/// Timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Time base not initialised.
    Reset,
    Ready,
    /// Counter started through [`Timer::start`].
    Busy,
}

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    Reset,
    Ready,
    /// Channel started.
    Busy,
}

/// What a channel was last configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelMode {
    Unconfigured,
    OutputCompare,
    Pwm,
    InputCapture,
    /// Pulse output of a one-pulse pair.
    OnePulseOutput,
    /// Trigger input of a one-pulse pair.
    OnePulseInput,
    Encoder,
}

impl ChannelMode {
    /// Whether the channel captures (as opposed to compares).
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            ChannelMode::InputCapture | ChannelMode::OnePulseInput | ChannelMode::Encoder
        )
    }
}

pub(crate) trait SealedInstance {
    fn regs() -> pac::timer::Tim;
}

/// Core timer instance.
#[allow(private_bounds)]
pub trait CoreInstance: SealedInstance + RccPeripheral + 'static {
    /// NVIC line shared by every event of this timer.
    const INTERRUPT: pac::Interrupt;

    /// Whether the timer has complementary outputs and a main output enable.
    const ADVANCED: bool;
}

/// General-purpose 16-bit timer with 4 channels instance.
pub trait GeneralInstance: CoreInstance {}

/// Advanced 16-bit timer with 4 channels instance.
pub trait AdvancedInstance: GeneralInstance {}

macro_rules! impl_timer {
    ($inst:ident, $advanced:expr) => {
        impl SealedInstance for crate::peripherals::$inst {
            fn regs() -> pac::timer::Tim {
                pac::$inst
            }
        }

        impl CoreInstance for crate::peripherals::$inst {
            const INTERRUPT: pac::Interrupt = pac::Interrupt::$inst;
            const ADVANCED: bool = $advanced;
        }

        impl GeneralInstance for crate::peripherals::$inst {}
    };
}

impl_timer!(TIM1, true);
impl_timer!(TIM2, false);

impl AdvancedInstance for crate::peripherals::TIM1 {}

#[cfg(test)]
mod tests;
