//! GPIO
//!
//! Four ports of eight pins. Each pin is an input (floating, pull-up or
//! pull-down), a push-pull or open-drain output, or routed to one of up to
//! sixteen alternate functions (timer channels, serial, ...).

use core::convert::Infallible;

use crate::pac::gpio::{vals, Gpio};
use crate::{impl_peripheral, into_ref, pac, peripherals, Peripheral, PeripheralRef};

/// Number of alternate functions a pin can select.
pub const AF_COUNT: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Alternate function number out of range, the pin is left unchanged.
    InvalidAlternateFunction(u8),
}

/// GPIO flexible pin.
///
/// This pin can either be a disconnected, input, or output pin, or both. The level register bit will remain
/// set while not in output mode, so the pin's level will be 'remembered' when it is not in output
/// mode.
pub struct Flex<'d, T: Pin> {
    pub(crate) pin: PeripheralRef<'d, T>,
}

impl<'d, T: Pin> Flex<'d, T> {
    /// Wrap the pin in a `Flex`.
    ///
    /// The pin remains disconnected. The initial output level is unspecified, but can be changed
    /// before the pin is put into output mode.
    #[inline]
    pub fn new(pin: impl Peripheral<P = T> + 'd) -> Self {
        into_ref!(pin);
        // Pin will be in disconnected state.
        Self { pin }
    }

    #[inline]
    pub fn degrade(self) -> Flex<'d, AnyPin> {
        // Safety: We are about to drop the other copy of this pin, so
        // this clone is safe.
        let pin = unsafe { self.pin.clone_unchecked() };

        // We don't want to run the destructor here, because that would
        // deconfigure the pin.
        core::mem::forget(self);

        Flex {
            pin: pin.map_into::<AnyPin>(),
        }
    }

    /// Put the pin into input mode.
    #[inline]
    pub fn set_as_input(&mut self, pull: Pull) {
        critical_section::with(|_| {
            self.pin.set_as_input(pull);
        });
    }

    /// Put the pin into push-pull output mode.
    ///
    /// The pin level will be whatever was set before (or low by default). If you want it to begin
    /// at a specific level, call `set_high`/`set_low` on the pin first.
    #[inline]
    pub fn set_as_output(&mut self, speed: Speed) {
        critical_section::with(|_| {
            self.pin.set_as_output(OutputType::PushPull, speed);
        });
    }

    /// Put the pin into open-drain output mode. The input stays readable,
    /// so this also serves bidirectional lines.
    #[inline]
    pub fn set_as_input_output(&mut self, speed: Speed) {
        critical_section::with(|_| {
            self.pin.set_as_output(OutputType::OpenDrain, speed);
        });
    }

    /// Hand the pin to a peripheral. `af` must be below [`AF_COUNT`].
    #[inline]
    pub fn set_as_af(&mut self, af: u8, output_type: OutputType) -> Result<(), Error> {
        critical_section::with(|_| self.pin.set_as_af(af, output_type))
    }

    #[inline]
    pub fn set_pull(&mut self, pull: Pull) {
        critical_section::with(|_| {
            self.pin.set_pull(pull);
        });
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        !self.is_low()
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        !self.pin.block().idr().read().pin(self.pin._pin() as usize)
    }

    #[inline]
    pub fn get_level(&self) -> Level {
        self.is_high().into()
    }

    #[inline]
    pub fn is_set_high(&self) -> bool {
        !self.is_set_low()
    }

    /// Is the output pin set as low?
    #[inline]
    pub fn is_set_low(&self) -> bool {
        !self.pin.block().odr().read().pin(self.pin._pin() as usize)
    }

    /// What level output is set to
    #[inline]
    pub fn get_output_level(&self) -> Level {
        self.is_set_high().into()
    }

    #[inline]
    pub fn set_high(&mut self) {
        self.pin.set_high();
    }

    /// Set the output as low.
    #[inline]
    pub fn set_low(&mut self) {
        self.pin.set_low();
    }

    #[inline]
    pub fn set_level(&mut self, level: Level) {
        match level {
            Level::Low => self.pin.set_low(),
            Level::High => self.pin.set_high(),
        }
    }

    /// Toggle pin output
    #[inline]
    pub fn toggle(&mut self) {
        if self.is_set_low() {
            self.set_high()
        } else {
            self.set_low()
        }
    }
}

impl<'d, T: Pin> Drop for Flex<'d, T> {
    #[inline]
    fn drop(&mut self) {
        critical_section::with(|_| {
            self.pin.set_as_disconnected();
        });
    }
}

/// Pull setting for an input.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    None,
    Up,
    Down,
}

impl From<Pull> for vals::Pupd {
    fn from(pull: Pull) -> Self {
        match pull {
            Pull::None => vals::Pupd::FLOATING,
            Pull::Up => vals::Pupd::PULLUP,
            Pull::Down => vals::Pupd::PULLDOWN,
        }
    }
}

/// Output drive strength.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    #[default]
    Low,
    High,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputType {
    PushPull,
    OpenDrain,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(val: bool) -> Self {
        match val {
            true => Self::High,
            false => Self::Low,
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> bool {
        match level {
            Level::Low => false,
            Level::High => true,
        }
    }
}

/// GPIO input driver.
pub struct Input<'d, T: Pin> {
    pub(crate) pin: Flex<'d, T>,
}

impl<'d, T: Pin> Input<'d, T> {
    #[inline]
    pub fn new(pin: impl Peripheral<P = T> + 'd, pull: Pull) -> Self {
        let mut pin = Flex::new(pin);
        pin.set_as_input(pull);
        Self { pin }
    }

    #[inline]
    pub fn degrade(self) -> Input<'d, AnyPin> {
        Input {
            pin: self.pin.degrade(),
        }
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.pin.is_high()
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        self.pin.is_low()
    }

    #[inline]
    pub fn get_level(&self) -> Level {
        self.pin.get_level()
    }
}

/// GPIO output driver.
///
/// Note that pins will **return to their floating state** when `Output` is dropped.
/// If pins should retain their state indefinitely, either keep ownership of the
/// `Output`, or pass it to [`core::mem::forget`].
pub struct Output<'d, T: Pin> {
    pub(crate) pin: Flex<'d, T>,
}

impl<'d, T: Pin> Output<'d, T> {
    #[inline]
    pub fn new(pin: impl Peripheral<P = T> + 'd, initial_output: Level, speed: Speed) -> Self {
        let mut pin = Flex::new(pin);
        pin.set_level(initial_output);
        pin.set_as_output(speed);
        Self { pin }
    }

    #[inline]
    pub fn degrade(self) -> Output<'d, AnyPin> {
        Output {
            pin: self.pin.degrade(),
        }
    }

    /// Set the output as high.
    #[inline]
    pub fn set_high(&mut self) {
        self.pin.set_high();
    }

    /// Set the output as low.
    #[inline]
    pub fn set_low(&mut self) {
        self.pin.set_low();
    }

    /// Set the output level.
    #[inline]
    pub fn set_level(&mut self, level: Level) {
        self.pin.set_level(level)
    }

    /// Is the output pin set as high?
    #[inline]
    pub fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }

    /// Is the output pin set as low?
    #[inline]
    pub fn is_set_low(&self) -> bool {
        self.pin.is_set_low()
    }

    /// What level output is set to
    #[inline]
    pub fn get_output_level(&self) -> Level {
        self.pin.get_output_level()
    }

    /// Toggle pin output
    #[inline]
    pub fn toggle(&mut self) {
        self.pin.toggle();
    }
}

const PORTS: [Gpio; 4] = [pac::GPIOA, pac::GPIOB, pac::GPIOC, pac::GPIOD];

// Register sequences, shared by every pin type.

fn write_level(r: Gpio, n: usize, level: Level) {
    match level {
        Level::High => r.odset().write(|w| w.set_pin(n, true)),
        Level::Low => r.odclr().write(|w| w.set_pin(n, true)),
    }
}

fn configure_input(r: Gpio, n: usize, pull: Pull) {
    r.pupdr().modify(|w| w.set_pupd(n, pull.into()));
    r.dircr().modify(|w| w.set_pin(n, false));
}

fn configure_output(r: Gpio, n: usize, output_type: OutputType, speed: Speed) {
    r.otyper().modify(|w| w.set_pin(n, output_type == OutputType::OpenDrain));
    r.drvcr().modify(|w| w.set_pin(n, speed == Speed::High));
    r.afr().modify(|w| w.set_afsel(n, 0));
    r.dircr().modify(|w| w.set_pin(n, true));
}

fn configure_af(r: Gpio, n: usize, af: u8, output_type: OutputType) -> Result<(), Error> {
    if af >= AF_COUNT {
        return Err(Error::InvalidAlternateFunction(af));
    }
    r.afr().modify(|w| w.set_afsel(n, af));
    r.otyper().modify(|w| w.set_pin(n, output_type == OutputType::OpenDrain));
    r.dircr().modify(|w| w.set_pin(n, true));
    Ok(())
}

pub(crate) mod sealed {
    use super::*;

    pub trait Pin {
        fn pin_port(&self) -> u8;

        #[inline]
        fn _pin(&self) -> u8 {
            self.pin_port() % 8
        }
        #[inline]
        fn _port(&self) -> u8 {
            self.pin_port() / 8
        }

        #[inline]
        fn block(&self) -> Gpio {
            PORTS[self._port() as usize]
        }

        /// Set the output as high.
        #[inline]
        fn set_high(&self) {
            write_level(self.block(), self._pin() as usize, Level::High);
        }

        /// Set the output as low.
        #[inline]
        fn set_low(&self) {
            write_level(self.block(), self._pin() as usize, Level::Low);
        }

        #[inline]
        fn set_as_input(&self, pull: Pull) {
            configure_input(self.block(), self._pin() as usize, pull);
        }

        #[inline]
        fn set_as_output(&self, output_type: OutputType, speed: Speed) {
            configure_output(self.block(), self._pin() as usize, output_type, speed);
        }

        #[inline]
        fn set_pull(&self, pull: Pull) {
            let n = self._pin() as usize;
            self.block().pupdr().modify(|w| w.set_pupd(n, pull.into()));
        }

        /// Route the pin to alternate function `af`. Inputs of the selected
        /// peripheral see the pin whatever the direction bit says.
        #[inline]
        fn set_as_af(&self, af: u8, output_type: OutputType) -> Result<(), Error> {
            configure_af(self.block(), self._pin() as usize, af, output_type)
        }

        /// Set the pin as "disconnected": floating input on the GPIO function.
        ///
        /// Drivers should set_as_disconnected pins when dropped.
        #[inline]
        fn set_as_disconnected(&self) {
            let r = self.block();
            let n = self._pin() as usize;
            r.afr().modify(|w| w.set_afsel(n, 0));
            configure_input(r, n, Pull::None);
        }
    }
}

pub trait Pin: Peripheral<P = Self> + Into<AnyPin> + sealed::Pin + Sized + 'static {
    /// Number of the pin within the port (0..7)
    #[inline]
    fn pin(&self) -> u8 {
        self._pin()
    }

    /// Port of the pin
    #[inline]
    fn port(&self) -> u8 {
        self._port()
    }

    /// Convert from concrete pin type PX_XX to type erased `AnyPin`.
    #[inline]
    fn degrade(self) -> AnyPin {
        AnyPin {
            pin_port: self.pin_port(),
        }
    }
}

// Type-erased GPIO pin
pub struct AnyPin {
    pin_port: u8,
}

impl AnyPin {
    /// # Safety
    ///
    /// The pin must not be in use elsewhere.
    #[inline]
    pub unsafe fn steal(pin_port: u8) -> Self {
        Self { pin_port }
    }
}

impl_peripheral!(AnyPin);
impl Pin for AnyPin {}
impl sealed::Pin for AnyPin {
    #[inline]
    fn pin_port(&self) -> u8 {
        self.pin_port
    }
}

macro_rules! impl_pins {
    ($($pin_name:ident => $port_num:expr, $pin_num:expr;)*) => {
        $(
            impl Pin for peripherals::$pin_name {}

            impl sealed::Pin for peripherals::$pin_name {
                #[inline]
                fn pin_port(&self) -> u8 {
                    $port_num * 8 + $pin_num
                }
            }

            impl From<peripherals::$pin_name> for AnyPin {
                fn from(x: peripherals::$pin_name) -> Self {
                    x.degrade()
                }
            }
        )*
    };
}

impl_pins! {
    PA0 => 0, 0; PA1 => 0, 1; PA2 => 0, 2; PA3 => 0, 3;
    PA4 => 0, 4; PA5 => 0, 5; PA6 => 0, 6; PA7 => 0, 7;
    PB0 => 1, 0; PB1 => 1, 1; PB2 => 1, 2; PB3 => 1, 3;
    PB4 => 1, 4; PB5 => 1, 5; PB6 => 1, 6; PB7 => 1, 7;
    PC0 => 2, 0; PC1 => 2, 1; PC2 => 2, 2; PC3 => 2, 3;
    PC4 => 2, 4; PC5 => 2, 5; PC6 => 2, 6; PC7 => 2, 7;
    PD0 => 3, 0; PD1 => 3, 1; PD2 => 3, 2; PD3 => 3, 3;
    PD4 => 3, 4; PD5 => 3, 5; PD6 => 3, 6; PD7 => 3, 7;
}

/// Enable the clock of every GPIO port.
pub(crate) fn init(cs: critical_section::CriticalSection) {
    use crate::peripheral::SealedRccPeripheral;

    peripherals::GPIOA::enable_and_reset_with_cs(cs);
    peripherals::GPIOB::enable_and_reset_with_cs(cs);
    peripherals::GPIOC::enable_and_reset_with_cs(cs);
    peripherals::GPIOD::enable_and_reset_with_cs(cs);
}

impl<'d, T: Pin> embedded_hal::digital::ErrorType for Input<'d, T> {
    type Error = Infallible;
}

impl<'d, T: Pin> embedded_hal::digital::InputPin for Input<'d, T> {
    #[inline]
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_high())
    }

    #[inline]
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_low())
    }
}

impl<'d, T: Pin> embedded_hal::digital::ErrorType for Output<'d, T> {
    type Error = Infallible;
}

impl<'d, T: Pin> embedded_hal::digital::OutputPin for Output<'d, T> {
    #[inline]
    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(self.set_high())
    }

    #[inline]
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(self.set_low())
    }
}

impl<'d, T: Pin> embedded_hal::digital::StatefulOutputPin for Output<'d, T> {
    #[inline]
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_set_high())
    }

    /// Is the output pin set as low?
    #[inline]
    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_set_low())
    }
}

impl<'d, T: Pin> embedded_hal::digital::ErrorType for Flex<'d, T> {
    type Error = Infallible;
}

impl<'d, T: Pin> embedded_hal::digital::InputPin for Flex<'d, T> {
    #[inline]
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_high())
    }

    #[inline]
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_low())
    }
}

impl<'d, T: Pin> embedded_hal::digital::OutputPin for Flex<'d, T> {
    #[inline]
    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(self.set_high())
    }

    #[inline]
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(self.set_low())
    }
}

impl<'d, T: Pin> embedded_hal::digital::StatefulOutputPin for Flex<'d, T> {
    #[inline]
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_set_high())
    }

    /// Is the output pin set as low?
    #[inline]
    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_set_low())
    }
}
