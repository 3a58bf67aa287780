use critical_section::CriticalSection;

use crate::pac;
use crate::time::Hertz;

/// Which bus clock feeds a peripheral, and where its gate lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bus {
    /// `HCLKEN` bit, no software reset.
    Ahb(usize),
    /// `PCLKEN` bit, with the matching `PERIRST` bit.
    Apb(usize),
}

pub(crate) trait SealedRccPeripheral {
    const BUS: Bus;

    fn frequency() -> Hertz {
        let clocks = crate::rcc::clocks();
        match Self::BUS {
            Bus::Ahb(_) => clocks.hclk,
            Bus::Apb(_) => clocks.pclk,
        }
    }

    fn enable_and_reset_with_cs(_cs: CriticalSection) {
        gate_enable_and_reset(pac::RCC, Self::BUS);
    }

    fn disable_with_cs(_cs: CriticalSection) {
        gate_disable(pac::RCC, Self::BUS);
    }

    fn enable_and_reset() {
        critical_section::with(|cs| Self::enable_and_reset_with_cs(cs))
    }
    fn disable() {
        critical_section::with(|cs| Self::disable_with_cs(cs))
    }
}

#[allow(private_bounds)]
pub trait RccPeripheral: SealedRccPeripheral + 'static {}

pub(crate) fn gate_enable_and_reset(rcc: pac::rcc::Rcc, bus: Bus) {
    match bus {
        Bus::Ahb(bit) => rcc.hclken().modify(|w| w.set_en(bit, true)),
        Bus::Apb(bit) => {
            rcc.pclken().modify(|w| w.set_en(bit, true));
            rcc.perirst().modify(|w| w.set_en(bit, true));
            rcc.perirst().modify(|w| w.set_en(bit, false));
        }
    }
}

pub(crate) fn gate_disable(rcc: pac::rcc::Rcc, bus: Bus) {
    match bus {
        Bus::Ahb(bit) => rcc.hclken().modify(|w| w.set_en(bit, false)),
        Bus::Apb(bit) => rcc.pclken().modify(|w| w.set_en(bit, false)),
    }
}

macro_rules! impl_rcc_peripheral {
    ($($name:ident => $bus:expr;)*) => {
        $(
            impl crate::peripheral::SealedRccPeripheral for crate::peripherals::$name {
                const BUS: crate::peripheral::Bus = $bus;
            }
            impl crate::peripheral::RccPeripheral for crate::peripherals::$name {}
        )*
    };
}

impl_rcc_peripheral! {
    GPIOA => Bus::Ahb(0);
    GPIOB => Bus::Ahb(1);
    GPIOC => Bus::Ahb(2);
    GPIOD => Bus::Ahb(3);
    TIM1 => Bus::Apb(10);
    TIM2 => Bus::Apb(11);
}
