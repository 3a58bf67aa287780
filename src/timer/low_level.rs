//! Low-level timer driver.

use core::convert::Infallible;

use embassy_hal_internal::{into_ref, Peripheral, PeripheralRef};

use super::interrupt::{Callback, CALLBACK_COUNT};
use super::*;
use crate::pac::timer::regs::{Ccer, Sr};
use crate::pac::timer::vals;
use crate::time::Hertz;

/// Input capture mode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputCaptureMode {
    /// Rising edge only.
    Rising,
    /// Falling edge only.
    Falling,
    /// Both rising or falling edges.
    BothEdges,
}

impl InputCaptureMode {
    /// `(CCxP, CCxNP)`
    fn bits(self) -> (bool, bool) {
        match self {
            InputCaptureMode::Rising => (false, false),
            InputCaptureMode::Falling => (true, false),
            InputCaptureMode::BothEdges => (true, true),
        }
    }
}

/// Input TI selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputTISelection {
    /// The channel's own input.
    Direct,
    /// The neighbouring channel's input (TI1 <-> TI2, TI3 <-> TI4).
    Indirect,
    /// TRC
    TRC,
}

impl From<InputTISelection> for vals::Ccs {
    fn from(tisel: InputTISelection) -> Self {
        match tisel {
            InputTISelection::Direct => vals::Ccs::DIRECT,
            InputTISelection::Indirect => vals::Ccs::INDIRECT,
            InputTISelection::TRC => vals::Ccs::TRC,
        }
    }
}

/// Timer counting mode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CountingMode {
    #[default]
    /// The timer counts up to the reload value and then resets back to 0.
    EdgeAlignedUp,
    /// The timer counts down to 0 and then resets back to the reload value.
    EdgeAlignedDown,
    /// The timer counts up to the reload value and then counts back to 0.
    ///
    /// The output compare interrupt flags of channels configured in output are
    /// set when the counter is counting down.
    CenterAlignedDownInterrupts,
    /// The timer counts up to the reload value and then counts back to 0.
    ///
    /// The output compare interrupt flags of channels configured in output are
    /// set when the counter is counting up.
    CenterAlignedUpInterrupts,
    /// The timer counts up to the reload value and then counts back to 0.
    ///
    /// The output compare interrupt flags of channels configured in output are
    /// set when the counter is counting both up or down.
    CenterAlignedBothInterrupts,
}

impl CountingMode {
    /// Return whether this mode is edge-aligned (up or down).
    pub fn is_edge_aligned(&self) -> bool {
        matches!(self, CountingMode::EdgeAlignedUp | CountingMode::EdgeAlignedDown)
    }

    /// Return whether this mode is center-aligned.
    pub fn is_center_aligned(&self) -> bool {
        !self.is_edge_aligned()
    }
}

impl From<CountingMode> for (vals::Cms, vals::Dir) {
    fn from(value: CountingMode) -> Self {
        match value {
            CountingMode::EdgeAlignedUp => (vals::Cms::EDGEALIGNED, vals::Dir::UP),
            CountingMode::EdgeAlignedDown => (vals::Cms::EDGEALIGNED, vals::Dir::DOWN),
            CountingMode::CenterAlignedDownInterrupts => (vals::Cms::CENTERALIGNED1, vals::Dir::UP),
            CountingMode::CenterAlignedUpInterrupts => (vals::Cms::CENTERALIGNED2, vals::Dir::UP),
            CountingMode::CenterAlignedBothInterrupts => (vals::Cms::CENTERALIGNED3, vals::Dir::UP),
        }
    }
}

impl From<(vals::Cms, vals::Dir)> for CountingMode {
    fn from(value: (vals::Cms, vals::Dir)) -> Self {
        match value {
            (vals::Cms::CENTERALIGNED1, _) => CountingMode::CenterAlignedDownInterrupts,
            (vals::Cms::CENTERALIGNED2, _) => CountingMode::CenterAlignedUpInterrupts,
            (vals::Cms::CENTERALIGNED3, _) => CountingMode::CenterAlignedBothInterrupts,
            (_, vals::Dir::DOWN) => CountingMode::EdgeAlignedDown,
            _ => CountingMode::EdgeAlignedUp,
        }
    }
}

/// Output compare mode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputCompareMode {
    /// The comparison between the output compare register TIMx_CCRx and
    /// the counter TIMx_CNT has no effect on the outputs.
    /// (this mode is used to generate a timing base).
    Frozen,
    /// Set channel to active level on match.
    ActiveOnMatch,
    /// Set channel to inactive level on match.
    InactiveOnMatch,
    /// Toggle - OCxREF toggles when TIMx_CNT=TIMx_CCRx.
    Toggle,
    /// Force inactive level - OCxREF is forced low.
    ForceInactive,
    /// Force active level - OCxREF is forced high.
    ForceActive,
    /// PWM mode 1 - In upcounting, channel is active as long as TIMx_CNT<TIMx_CCRx
    /// else inactive. In downcounting, channel is inactive (OCxREF=0) as long as
    /// TIMx_CNT>TIMx_CCRx else active (OCxREF=1).
    PwmMode1,
    /// PWM mode 2 - In upcounting, channel is inactive as long as
    /// TIMx_CNT<TIMx_CCRx else active. In downcounting, channel is active as long as
    /// TIMx_CNT>TIMx_CCRx else inactive.
    PwmMode2,
}

impl From<OutputCompareMode> for vals::Ocm {
    fn from(mode: OutputCompareMode) -> Self {
        match mode {
            OutputCompareMode::Frozen => vals::Ocm::FROZEN,
            OutputCompareMode::ActiveOnMatch => vals::Ocm::ACTIVEONMATCH,
            OutputCompareMode::InactiveOnMatch => vals::Ocm::INACTIVEONMATCH,
            OutputCompareMode::Toggle => vals::Ocm::TOGGLE,
            OutputCompareMode::ForceInactive => vals::Ocm::FORCEINACTIVE,
            OutputCompareMode::ForceActive => vals::Ocm::FORCEACTIVE,
            OutputCompareMode::PwmMode1 => vals::Ocm::PWMMODE1,
            OutputCompareMode::PwmMode2 => vals::Ocm::PWMMODE2,
        }
    }
}

/// Timer output pin polarity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputPolarity {
    /// Active high (higher duty value makes the pin spend more time high).
    ActiveHigh,
    /// Active low (higher duty value makes the pin spend more time low).
    ActiveLow,
}

impl From<OutputPolarity> for bool {
    fn from(mode: OutputPolarity) -> Self {
        match mode {
            OutputPolarity::ActiveHigh => false,
            OutputPolarity::ActiveLow => true,
        }
    }
}

/// Output level while the main output is disabled (advanced timers).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdleState {
    #[default]
    Reset,
    Set,
}

impl From<IdleState> for bool {
    fn from(state: IdleState) -> Self {
        state == IdleState::Set
    }
}

/// Time base settings.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    pub prescaler: u16,
    pub counting_mode: CountingMode,
    /// Auto-reload value, the counter runs `0..=period`.
    pub period: u16,
    pub clock_division: vals::Ckd,
    /// Update events are generated every `repetition_counter + 1` overflows.
    /// Advanced timers only.
    pub repetition_counter: u8,
    pub auto_reload_preload: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            prescaler: 0,
            counting_mode: CountingMode::EdgeAlignedUp,
            period: u16::MAX,
            clock_division: vals::Ckd::DIV1,
            repetition_counter: 0,
            auto_reload_preload: false,
        }
    }
}

/// Output compare / PWM channel settings.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OcConfig {
    pub mode: OutputCompareMode,
    /// Compare value.
    pub pulse: u16,
    pub polarity: OutputPolarity,
    /// Complementary output, advanced timers only.
    pub n_polarity: OutputPolarity,
    /// Output compare fast enable, PWM only.
    pub fast_mode: bool,
    pub idle_state: IdleState,
    pub n_idle_state: IdleState,
}

impl OcConfig {
    pub const fn output_compare(mode: OutputCompareMode, pulse: u16) -> Self {
        Self {
            mode,
            pulse,
            polarity: OutputPolarity::ActiveHigh,
            n_polarity: OutputPolarity::ActiveHigh,
            fast_mode: false,
            idle_state: IdleState::Reset,
            n_idle_state: IdleState::Reset,
        }
    }

    /// PWM mode 1, active high.
    pub const fn pwm(pulse: u16) -> Self {
        Self::output_compare(OutputCompareMode::PwmMode1, pulse)
    }
}

/// Input capture channel settings.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IcConfig {
    pub polarity: InputCaptureMode,
    pub selection: InputTISelection,
    pub prescaler: vals::Icpsc,
    /// Input filter, 0 to 15.
    pub filter: u8,
}

impl Default for IcConfig {
    fn default() -> Self {
        Self {
            polarity: InputCaptureMode::Rising,
            selection: InputTISelection::Direct,
            prescaler: vals::Icpsc::DIV1,
            filter: 0,
        }
    }
}

/// External trigger (ETR) conditioning.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EtrConfig {
    /// Active on falling edges / low level.
    pub inverted: bool,
    pub prescaler: vals::Etps,
    /// 0 to 15.
    pub filter: u8,
}

impl Default for EtrConfig {
    fn default() -> Self {
        Self {
            inverted: false,
            prescaler: vals::Etps::DIV1,
            filter: 0,
        }
    }
}

/// Trigger input (TRGI) selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerSource {
    /// Internal trigger `ITR0..=ITR3`, another timer's TRGO.
    Itr(u8),
    /// TI1 edge detector, both edges.
    Ti1Edge { filter: u8 },
    /// Filtered TI1.
    Ti1 { polarity: InputCaptureMode, filter: u8 },
    /// Filtered TI2.
    Ti2 { polarity: InputCaptureMode, filter: u8 },
    /// Filtered external trigger.
    Etr(EtrConfig),
}

impl TriggerSource {
    fn validate(&self) -> Result<(), Error> {
        match *self {
            TriggerSource::Itr(n) if n > 3 => Err(Error::InvalidParameter),
            TriggerSource::Itr(_) => Ok(()),
            TriggerSource::Ti1Edge { filter }
            | TriggerSource::Ti1 { filter, .. }
            | TriggerSource::Ti2 { filter, .. }
            | TriggerSource::Etr(EtrConfig { filter, .. }) => check_filter(filter),
        }
    }
}

/// Counter clock.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Kernel clock (PCLK).
    Internal,
    /// External clock mode 2, ETR clocks the counter directly.
    Etr(EtrConfig),
    /// External clock mode 1, rising edges of the trigger input.
    External(TriggerSource),
}

/// Slave mode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveMode {
    Disabled,
    /// Trigger edges reinitialise the counter.
    Reset,
    /// The counter runs while the trigger is high.
    Gated,
    /// Trigger edges start the counter.
    Trigger,
    /// Trigger edges clock the counter.
    ExternalClock1,
}

impl From<SlaveMode> for vals::Sms {
    fn from(mode: SlaveMode) -> Self {
        match mode {
            SlaveMode::Disabled => vals::Sms::DISABLED,
            SlaveMode::Reset => vals::Sms::RESETMODE,
            SlaveMode::Gated => vals::Sms::GATEDMODE,
            SlaveMode::Trigger => vals::Sms::TRIGGERMODE,
            SlaveMode::ExternalClock1 => vals::Sms::EXTCLOCKMODE,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveConfig {
    pub mode: SlaveMode,
    pub trigger: TriggerSource,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterConfig {
    /// What drives TRGO.
    pub trigger_output: vals::Mms,
    /// Delay the trigger input so that master and slaves start together.
    pub master_slave_mode: bool,
}

/// Source that clears OCxREF.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OcrefClearSource {
    /// The OCREF_CLR input.
    OcrefClr,
    /// The filtered external trigger.
    Etr(EtrConfig),
}

/// Software generated event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Update,
    CaptureCompare(Channel),
    /// Advanced timers only.
    Commutation,
    Trigger,
    /// Advanced timers only.
    Break,
}

pub(super) fn check_filter(filter: u8) -> Result<(), Error> {
    if filter > 0x0F {
        Err(Error::InvalidParameter)
    } else {
        Ok(())
    }
}

/// Low-level timer driver.
pub struct Timer<'d, T: GeneralInstance> {
    _tim: PeripheralRef<'d, T>,
    regs: pac::timer::Tim,
    kernel_clock: Hertz,
    gated: bool,
    pub(super) state: State,
    pub(super) modes: [ChannelMode; 4],
    pub(super) channel_state: [ChannelState; 4],
    pub(super) n_channel_state: [ChannelState; 4],
    pub(super) active_channel: Option<Channel>,
    pub(super) callbacks: [Option<Callback<'d, T>>; CALLBACK_COUNT],
}

impl<'d, T: GeneralInstance> Drop for Timer<'d, T> {
    fn drop(&mut self) {
        if self.gated {
            T::disable()
        }
    }
}

impl<'d, T: GeneralInstance> Timer<'d, T> {
    /// Create a new timer driver and initialise its time base.
    pub fn new(tim: impl Peripheral<P = T> + 'd, config: TimerConfig) -> Self {
        T::enable_and_reset();

        let mut this = Self::from_regs(tim, T::regs(), T::frequency());
        this.gated = true;
        this.base_init(&config);
        this
    }

    /// Driver over any memory with the timer layout. The clock gate is left alone.
    pub(crate) fn from_regs(tim: impl Peripheral<P = T> + 'd, regs: pac::timer::Tim, kernel_clock: Hertz) -> Self {
        into_ref!(tim);

        Self {
            _tim: tim,
            regs,
            kernel_clock,
            gated: false,
            state: State::Reset,
            modes: [ChannelMode::Unconfigured; 4],
            channel_state: [ChannelState::Reset; 4],
            n_channel_state: [ChannelState::Reset; 4],
            active_channel: None,
            callbacks: [None; CALLBACK_COUNT],
        }
    }

    /// Get access to the timer registers.
    pub fn regs(&self) -> pac::timer::Tim {
        self.regs
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn channel_state(&self, channel: Channel) -> ChannelState {
        self.channel_state[channel.index()]
    }

    pub fn channel_mode(&self, channel: Channel) -> ChannelMode {
        self.modes[channel.index()]
    }

    /// Clock feeding the prescaler.
    pub fn kernel_clock(&self) -> Hertz {
        self.kernel_clock
    }

    /// Program CR1, ARR, PSC and RCR, then load them with an update event.
    ///
    /// Every channel becomes ready to be configured and started.
    pub fn base_init(&mut self, config: &TimerConfig) {
        let r = self.regs;
        let (cms, dir) = config.counting_mode.into();

        r.cr1().modify(|w| {
            w.set_dir(dir);
            w.set_cms(cms);
            w.set_ckd(config.clock_division);
            w.set_arpe(config.auto_reload_preload);
        });
        r.arr().write_value(config.period as u32);
        r.psc().write_value(config.prescaler as u32);
        if T::ADVANCED {
            r.rcr().write_value(config.repetition_counter as u32);
        }
        self.reload();

        self.channel_state = [ChannelState::Ready; 4];
        if T::ADVANCED {
            self.n_channel_state = [
                ChannelState::Ready,
                ChannelState::Ready,
                ChannelState::Ready,
                ChannelState::Reset,
            ];
        }
        self.state = State::Ready;
    }

    /// Stop everything and forget the channel setup.
    pub fn deinit(&mut self) {
        let r = self.regs;
        r.ccer().write_value(Ccer(0));
        r.dier().write_value(pac::timer::regs::Dier(0));
        if T::ADVANCED {
            r.bdtr().modify(|w| w.set_moe(false));
        }
        r.cr1().modify(|w| w.set_cen(false));

        self.modes = [ChannelMode::Unconfigured; 4];
        self.channel_state = [ChannelState::Reset; 4];
        self.n_channel_state = [ChannelState::Reset; 4];
        self.state = State::Reset;
    }

    /// Load PSC/ARR/RCR without raising the update flag.
    fn reload(&self) {
        let r = self.regs;
        r.cr1().modify(|w| w.set_urs(vals::Urs::COUNTERONLY));
        r.egr().write(|w| w.set_ug(true));
        r.cr1().modify(|w| w.set_urs(vals::Urs::ANYEVENT));
    }

    pub(super) fn ensure_initialised(&self) -> Result<(), Error> {
        if self.state == State::Reset {
            warn!("tim: time base not initialised");
            return Err(Error::InvalidState);
        }
        Ok(())
    }

    /// Start the counter.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.state != State::Ready {
            return Err(Error::InvalidState);
        }
        self.state = State::Busy;
        self.enable_counter();
        Ok(())
    }

    /// Start the counter with the update interrupt enabled.
    pub fn start_it(&mut self) -> Result<(), Error> {
        if self.state != State::Ready {
            return Err(Error::InvalidState);
        }
        self.regs.dier().modify(|w| w.set_uie(true));
        self.start()
    }

    /// Stop the counter, unless a channel output is still enabled.
    pub fn stop(&mut self) {
        self.disable_counter_if_idle();
        if self.state == State::Busy {
            self.state = State::Ready;
        }
    }

    pub fn stop_it(&mut self) {
        self.regs.dier().modify(|w| w.set_uie(false));
        self.stop();
    }

    /// Set CEN, except in trigger mode where the trigger input starts the counter.
    pub(super) fn enable_counter(&self) {
        if self.regs.smcr().read().sms() != vals::Sms::TRIGGERMODE {
            self.regs.cr1().modify(|w| w.set_cen(true));
        }
    }

    /// No CCxE and no CCxNE bit set.
    pub(super) fn outputs_idle(&self) -> bool {
        self.regs.ccer().read().0 & (Ccer::CCE_MASK | Ccer::CCNE_MASK) == 0
    }

    pub(super) fn disable_counter_if_idle(&self) {
        if self.outputs_idle() {
            self.regs.cr1().modify(|w| w.set_cen(false));
        }
    }

    /// Set MOE on advanced timers.
    pub(super) fn enable_outputs(&self) {
        if T::ADVANCED {
            self.regs.bdtr().modify(|w| w.set_moe(true));
        }
    }

    pub(super) fn disable_outputs_if_idle(&self) {
        if T::ADVANCED && self.outputs_idle() {
            self.regs.bdtr().modify(|w| w.set_moe(false));
        }
    }

    /// Reset the counter value to 0
    pub fn reset(&self) {
        self.regs.cnt().write_value(0);
    }

    pub fn counter(&self) -> u16 {
        self.regs.cnt().read() as u16
    }

    pub fn set_counter(&mut self, value: u16) {
        self.regs.cnt().write_value(value as u32);
    }

    pub fn period(&self) -> u16 {
        self.regs.arr().read() as u16
    }

    pub fn set_period(&mut self, period: u16) {
        self.regs.arr().write_value(period as u32);
    }

    pub fn set_prescaler(&mut self, prescaler: u16) {
        self.regs.psc().write_value(prescaler as u32);
    }

    /// Set the frequency of how many times per second the timer counts up to the max value or down to 0.
    ///
    /// This means that in the default edge-aligned mode,
    /// the timer counter will wrap around at the same frequency as is being set.
    /// In center-aligned mode the wrap-around frequency is effectively halved
    /// because it needs to count up and down.
    pub fn set_frequency(&mut self, frequency: Hertz) -> Result<(), Error> {
        let f = frequency.0;
        if f == 0 {
            return Err(Error::InvalidParameter);
        }
        let ticks_per_period = self.kernel_clock.0 / f;
        if ticks_per_period == 0 {
            return Err(Error::InvalidParameter);
        }
        let psc: u16 = ((ticks_per_period - 1) / (1 << 16))
            .try_into()
            .map_err(|_| Error::InvalidParameter)?;
        let divide_by = ticks_per_period / (u32::from(psc) + 1);

        // the timer counts `0..=arr`, we want it to count `0..divide_by`
        let arr = u16::try_from(divide_by - 1).map_err(|_| Error::InvalidParameter)?;

        let r = self.regs;
        r.psc().write_value(psc as u32);
        r.arr().write_value(arr as u32);
        self.reload();
        Ok(())
    }

    /// Get the timer frequency.
    pub fn frequency(&self) -> Hertz {
        let arr = self.regs.arr().read();
        let psc = self.regs.psc().read();
        self.kernel_clock / (arr + 1) / (psc + 1)
    }

    /// Set counting mode. The counter must be stopped.
    pub fn set_counting_mode(&mut self, mode: CountingMode) -> Result<(), Error> {
        // Changing from edge aligned to center aligned (and vice versa) is not allowed while the timer is running.
        if self.regs.cr1().read().cen() {
            return Err(Error::InvalidState);
        }
        let (cms, dir) = mode.into();
        self.regs.cr1().modify(|w| {
            w.set_dir(dir);
            w.set_cms(cms);
        });
        Ok(())
    }

    pub fn counting_mode(&self) -> CountingMode {
        let cr1 = self.regs.cr1().read();
        (cr1.cms(), cr1.dir()).into()
    }

    /// Set clock divider.
    pub fn set_clock_division(&mut self, ckd: vals::Ckd) {
        self.regs.cr1().modify(|w| w.set_ckd(ckd));
    }

    /// Enable/disable autoreload preload.
    pub fn set_autoreload_preload(&mut self, enable: bool) {
        self.regs.cr1().modify(|w| w.set_arpe(enable));
    }

    /// Wait for an update event. Clears the update flag.
    pub fn wait(&mut self) -> nb::Result<(), Infallible> {
        let sr = self.regs.sr();
        if sr.read().uif() {
            let mut uif = Sr(0);
            uif.set_uif(true);
            sr.write_value(Sr::clearing(uif));
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Configure a channel for output compare. The channel is left disabled.
    pub fn config_oc_channel(&mut self, channel: Channel, config: &OcConfig) -> Result<(), Error> {
        self.ensure_initialised()?;
        self.write_oc(channel, config);
        self.modes[channel.index()] = ChannelMode::OutputCompare;
        Ok(())
    }

    /// Configure a channel for PWM: output compare plus compare preload and
    /// the fast enable bit. The channel is left disabled.
    pub fn config_pwm_channel(&mut self, channel: Channel, config: &OcConfig) -> Result<(), Error> {
        self.ensure_initialised()?;
        self.write_oc(channel, config);

        let i = channel.index();
        self.regs.ccmr_output(i / 2).modify(|w| {
            w.set_ocpe(i % 2, true);
            w.set_ocfe(i % 2, config.fast_mode);
        });
        self.modes[i] = ChannelMode::Pwm;
        Ok(())
    }

    /// Configure a channel for input capture. The channel is left disabled.
    pub fn config_ic_channel(&mut self, channel: Channel, config: &IcConfig) -> Result<(), Error> {
        self.ensure_initialised()?;
        check_filter(config.filter)?;
        self.write_ic(channel, config.polarity, config.selection, config.filter);
        self.set_ic_prescaler(channel, config.prescaler);
        self.modes[channel.index()] = ChannelMode::InputCapture;
        Ok(())
    }

    /// Clear CCxE, rewrite mode, polarity and idle state, write CCRx.
    pub(super) fn write_oc(&self, channel: Channel, config: &OcConfig) {
        let r = self.regs;
        let i = channel.index();

        r.ccer().modify(|w| w.set_cce(i, false));
        r.ccmr_output(i / 2).modify(|w| {
            w.set_ccs(i % 2, vals::Ccs::OUTPUT);
            w.set_ocm(i % 2, config.mode.into());
        });
        r.ccer().modify(|w| {
            w.set_ccp(i, config.polarity.into());
            if T::ADVANCED && i < 3 {
                w.set_ccnp(i, config.n_polarity.into());
                w.set_ccne(i, false);
            }
        });
        if T::ADVANCED {
            r.cr2().modify(|w| {
                w.set_ois(i, config.idle_state.into());
                if i < 3 {
                    w.set_oisn(i, config.n_idle_state.into());
                }
            });
        }
        r.ccr(i).write_value(config.pulse as u32);
    }

    /// Clear CCxE, select the input and filter, set the edge polarity.
    pub(super) fn write_ic(&self, channel: Channel, polarity: InputCaptureMode, selection: InputTISelection, filter: u8) {
        let r = self.regs;
        let i = channel.index();

        r.ccer().modify(|w| w.set_cce(i, false));
        r.ccmr_input(i / 2).modify(|w| {
            w.set_ccs(i % 2, selection.into());
            w.set_icf(i % 2, filter);
        });
        let (p, np) = polarity.bits();
        r.ccer().modify(|w| {
            w.set_ccp(i, p);
            w.set_ccnp(i, np);
        });
    }

    /// Filter and polarity only, for trigger and clock inputs. The selection
    /// bits are left alone.
    fn write_input_stage(&self, channel: Channel, polarity: Option<InputCaptureMode>, filter: u8) {
        let r = self.regs;
        let i = channel.index();

        r.ccer().modify(|w| w.set_cce(i, false));
        r.ccmr_input(i / 2).modify(|w| w.set_icf(i % 2, filter));
        if let Some(polarity) = polarity {
            let (p, np) = polarity.bits();
            r.ccer().modify(|w| {
                w.set_ccp(i, p);
                w.set_ccnp(i, np);
            });
        }
    }

    /// Clear the old prescaler bits, then set the new ones.
    pub(super) fn set_ic_prescaler(&self, channel: Channel, prescaler: vals::Icpsc) {
        let i = channel.index();
        let ccmr = self.regs.ccmr_input(i / 2);
        ccmr.modify(|w| w.set_icpsc(i % 2, vals::Icpsc::DIV1));
        ccmr.modify(|w| w.set_icpsc(i % 2, prescaler));
    }

    fn write_etr(&self, config: &EtrConfig) {
        self.regs.smcr().modify(|w| {
            w.set_etp(config.inverted);
            w.set_etps(config.prescaler);
            w.set_etf(config.filter);
        });
    }

    fn apply_trigger(&self, trigger: TriggerSource) {
        let ts = match trigger {
            TriggerSource::Itr(n) => vals::Ts(n),
            TriggerSource::Ti1Edge { filter } => {
                self.write_input_stage(Channel::Ch1, None, filter);
                vals::Ts::TI1F_ED
            }
            TriggerSource::Ti1 { polarity, filter } => {
                self.write_input_stage(Channel::Ch1, Some(polarity), filter);
                vals::Ts::TI1FP1
            }
            TriggerSource::Ti2 { polarity, filter } => {
                self.write_input_stage(Channel::Ch2, Some(polarity), filter);
                vals::Ts::TI2FP2
            }
            TriggerSource::Etr(cfg) => {
                self.write_etr(&cfg);
                vals::Ts::ETRF
            }
        };
        self.regs.smcr().modify(|w| w.set_ts(ts));
    }

    /// Start a channel configured for output compare, PWM or input capture.
    ///
    /// Output channels also get MOE on advanced timers. The counter is
    /// enabled unless the timer waits for a trigger.
    pub fn start_channel(&mut self, channel: Channel) -> Result<(), Error> {
        self.start_channel_inner(channel, false)
    }

    /// Like [`start_channel`](Self::start_channel), with the channel's capture/compare interrupt.
    pub fn start_channel_it(&mut self, channel: Channel) -> Result<(), Error> {
        self.start_channel_inner(channel, true)
    }

    fn start_channel_inner(&mut self, channel: Channel, it: bool) -> Result<(), Error> {
        let i = channel.index();
        let output = match self.modes[i] {
            ChannelMode::OutputCompare | ChannelMode::Pwm => true,
            ChannelMode::InputCapture => false,
            mode => {
                warn!("tim: channel {} is set up as {:?}", i + 1, mode);
                return Err(Error::InvalidState);
            }
        };
        if self.channel_state[i] != ChannelState::Ready {
            return Err(Error::InvalidState);
        }
        self.channel_state[i] = ChannelState::Busy;

        let r = self.regs;
        if it {
            r.dier().modify(|w| w.set_ccie(i, true));
        }
        r.ccer().modify(|w| w.set_cce(i, true));
        if output {
            self.enable_outputs();
        }
        self.enable_counter();
        Ok(())
    }

    /// Disable a channel. The counter (and MOE) stay on while any other
    /// channel output is enabled.
    pub fn stop_channel(&mut self, channel: Channel) {
        self.stop_channel_inner(channel, false)
    }

    pub fn stop_channel_it(&mut self, channel: Channel) {
        self.stop_channel_inner(channel, true)
    }

    fn stop_channel_inner(&mut self, channel: Channel, it: bool) {
        let i = channel.index();
        let r = self.regs;
        if it {
            r.dier().modify(|w| w.set_ccie(i, false));
        }
        r.ccer().modify(|w| w.set_cce(i, false));
        self.disable_outputs_if_idle();
        self.disable_counter_if_idle();
        if self.channel_state[i] == ChannelState::Busy {
            self.channel_state[i] = ChannelState::Ready;
        }
    }

    /// Set compare value for a channel.
    pub fn set_compare(&mut self, channel: Channel, value: u16) {
        self.regs.ccr(channel.index()).write_value(value as u32);
    }

    /// Get compare value for a channel.
    pub fn compare(&self, channel: Channel) -> u16 {
        self.regs.ccr(channel.index()).read() as u16
    }

    /// Last value captured on an input channel.
    pub fn read_captured_value(&self, channel: Channel) -> u16 {
        self.compare(channel)
    }

    /// Generate an event in software.
    pub fn generate_event(&mut self, event: Event) -> Result<(), Error> {
        if matches!(event, Event::Commutation | Event::Break) && !T::ADVANCED {
            return Err(Error::InvalidParameter);
        }
        self.regs.egr().write(|w| match event {
            Event::Update => w.set_ug(true),
            Event::CaptureCompare(ch) => w.set_ccg(ch.index(), true),
            Event::Commutation => w.set_comg(true),
            Event::Trigger => w.set_tg(true),
            Event::Break => w.set_bg(true),
        });
        Ok(())
    }

    /// Select the counter clock.
    pub fn config_clock_source(&mut self, source: ClockSource) -> Result<(), Error> {
        self.ensure_initialised()?;
        match &source {
            ClockSource::Internal => {}
            ClockSource::Etr(cfg) => check_filter(cfg.filter)?,
            ClockSource::External(trigger) => trigger.validate()?,
        }

        self.regs.smcr().modify(|w| {
            w.set_sms(vals::Sms::DISABLED);
            w.set_ts(vals::Ts::ITR0);
            w.set_etf(0);
            w.set_etps(vals::Etps::DIV1);
            w.set_ece(false);
            w.set_etp(false);
        });

        match source {
            ClockSource::Internal => {}
            ClockSource::Etr(cfg) => {
                self.write_etr(&cfg);
                self.regs.smcr().modify(|w| w.set_ece(true));
            }
            ClockSource::External(trigger) => {
                self.apply_trigger(trigger);
                self.regs.smcr().modify(|w| w.set_sms(vals::Sms::EXTCLOCKMODE));
            }
        }
        Ok(())
    }

    /// Configure the slave mode controller with the trigger interrupt off.
    pub fn config_slave(&mut self, config: &SlaveConfig) -> Result<(), Error> {
        self.config_slave_inner(config, false)
    }

    /// Configure the slave mode controller with the trigger interrupt on.
    pub fn config_slave_it(&mut self, config: &SlaveConfig) -> Result<(), Error> {
        self.config_slave_inner(config, true)
    }

    fn config_slave_inner(&mut self, config: &SlaveConfig, it: bool) -> Result<(), Error> {
        self.ensure_initialised()?;
        config.trigger.validate()?;
        // the edge detector output is a pulse, it cannot gate
        if config.mode == SlaveMode::Gated && matches!(config.trigger, TriggerSource::Ti1Edge { .. }) {
            return Err(Error::InvalidParameter);
        }

        self.apply_trigger(config.trigger);
        self.regs.smcr().modify(|w| w.set_sms(config.mode.into()));
        self.regs.dier().modify(|w| {
            w.set_tie(it);
            w.set_tde(false);
        });
        Ok(())
    }

    /// Select TRGO and the master/slave synchronisation.
    pub fn config_master(&mut self, config: &MasterConfig) -> Result<(), Error> {
        self.ensure_initialised()?;
        self.regs.cr2().modify(|w| w.set_mms(config.trigger_output));
        self.regs.smcr().modify(|w| w.set_msm(config.master_slave_mode));
        Ok(())
    }

    /// Let OCxREF be cleared by an external event.
    pub fn config_ocref_clear(&mut self, channel: Channel, enable: bool, source: OcrefClearSource) -> Result<(), Error> {
        self.ensure_initialised()?;
        if let OcrefClearSource::Etr(cfg) = &source {
            check_filter(cfg.filter)?;
        }

        match source {
            OcrefClearSource::OcrefClr => self.regs.smcr().modify(|w| w.set_occs(false)),
            OcrefClearSource::Etr(cfg) => {
                self.write_etr(&cfg);
                self.regs.smcr().modify(|w| w.set_occs(true));
            }
        }
        let i = channel.index();
        self.regs.ccmr_output(i / 2).modify(|w| w.set_occe(i % 2, enable));
        Ok(())
    }
}
