use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering::SeqCst};
use std::sync::Mutex;

use embedded_hal::pwm::SetDutyCycle;

use super::complementary_pwm::{dead_time_from_ticks, BreakDeadTimeConfig, BreakPolarity, CommutationSource};
use super::encoder::{EncoderChannels, EncoderConfig, EncoderInput, EncoderMode, HallSensorConfig};
use super::low_level::*;
use super::one_pulse::{OnePulseConfig, OnePulseMode};
use super::*;
use crate::pac::timer::regs::Sr;
use crate::pac::timer::{vals, Tim};
use crate::peripherals::{TIM1, TIM2};
use crate::test_util::{tim_mem, RegMem, TIM_SIZE};
use crate::time::Hertz;

fn base() -> TimerConfig {
    TimerConfig {
        period: 999,
        ..Default::default()
    }
}

fn tim1(mem: &RegMem<TIM_SIZE>) -> Timer<'static, TIM1> {
    let regs = unsafe { Tim::from_ptr(mem.as_ptr()) };
    let mut t = Timer::from_regs(unsafe { TIM1::steal() }, regs, Hertz::mhz(24));
    t.base_init(&base());
    t
}

fn tim2(mem: &RegMem<TIM_SIZE>) -> Timer<'static, TIM2> {
    let regs = unsafe { Tim::from_ptr(mem.as_ptr()) };
    let mut t = Timer::from_regs(unsafe { TIM2::steal() }, regs, Hertz::mhz(24));
    t.base_init(&base());
    t
}

/// Run the dispatcher, then fold its status write back into the register the
/// way the hardware does: written zeros clear, written ones leave a flag as
/// it was.
fn dispatch<T: GeneralInstance>(t: &mut Timer<'_, T>) {
    let before = t.regs().sr().read().0;
    t.on_interrupt();
    let written = t.regs().sr().read().0;
    t.regs().sr().write_value(Sr(before & written));
}

fn cen<T: GeneralInstance>(t: &Timer<'_, T>) -> bool {
    t.regs().cr1().read().cen()
}

fn moe<T: GeneralInstance>(t: &Timer<'_, T>) -> bool {
    t.regs().bdtr().read().moe()
}

#[test]
fn base_init_loads_registers() {
    let mem = tim_mem();
    let regs = unsafe { Tim::from_ptr(mem.as_ptr()) };
    let mut t = Timer::from_regs(unsafe { TIM1::steal() }, regs, Hertz::mhz(24));
    assert_eq!(t.state(), State::Reset);
    assert_eq!(t.config_pwm_channel(Channel::Ch1, &OcConfig::pwm(1)), Err(Error::InvalidState));

    t.base_init(&TimerConfig {
        prescaler: 23,
        counting_mode: CountingMode::CenterAlignedBothInterrupts,
        period: 499,
        clock_division: vals::Ckd::DIV2,
        repetition_counter: 3,
        auto_reload_preload: true,
    });

    let cr1 = t.regs().cr1().read();
    assert_eq!(cr1.cms(), vals::Cms::CENTERALIGNED3);
    assert_eq!(cr1.ckd(), vals::Ckd::DIV2);
    assert!(cr1.arpe());
    assert_eq!(cr1.urs(), vals::Urs::ANYEVENT);
    assert_eq!(t.regs().psc().read(), 23);
    assert_eq!(t.regs().arr().read(), 499);
    assert_eq!(t.regs().rcr().read(), 3);
    assert!(t.regs().egr().read().ug());
    assert_eq!(t.state(), State::Ready);
    assert_eq!(t.channel_state(Channel::Ch4), ChannelState::Ready);
    assert_eq!(t.complementary_channel_state(Channel::Ch4), ChannelState::Reset);
    assert_eq!(t.counting_mode(), CountingMode::CenterAlignedBothInterrupts);
}

#[test]
fn general_timer_ignores_repetition_counter() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.base_init(&TimerConfig {
        repetition_counter: 5,
        ..base()
    });
    assert_eq!(t.regs().rcr().read(), 0);
}

#[test]
fn counter_runs_until_every_channel_is_disabled() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.config_pwm_channel(Channel::Ch1, &OcConfig::pwm(100)).unwrap();
    t.config_pwm_channel(Channel::Ch2, &OcConfig::pwm(200)).unwrap();
    t.start_channel(Channel::Ch1).unwrap();
    t.start_channel(Channel::Ch2).unwrap();
    assert!(cen(&t));

    t.stop_channel(Channel::Ch1);
    assert!(cen(&t));
    assert!(!t.regs().ccer().read().cce(0));

    t.stop_channel(Channel::Ch2);
    assert!(!cen(&t));
    assert_eq!(t.channel_state(Channel::Ch2), ChannelState::Ready);
}

#[test]
fn complementary_output_keeps_counter_and_moe() {
    let mem = tim_mem();
    let mut t = tim1(&mem);
    t.config_pwm_channel(Channel::Ch1, &OcConfig::pwm(100)).unwrap();
    t.start_channel(Channel::Ch1).unwrap();
    t.start_complementary(Channel::Ch1).unwrap();
    assert!(moe(&t));

    t.stop_channel(Channel::Ch1);
    assert!(cen(&t));
    assert!(moe(&t));

    t.stop_complementary(Channel::Ch1).unwrap();
    assert!(!cen(&t));
    assert!(!moe(&t));
}

#[test]
fn channel_four_has_no_complementary_output() {
    let mem = tim_mem();
    let mut t = tim1(&mem);
    t.config_pwm_channel(Channel::Ch4, &OcConfig::pwm(1)).unwrap();
    assert_eq!(t.start_complementary(Channel::Ch4), Err(Error::InvalidChannel));
    assert_eq!(t.stop_complementary_it(Channel::Ch4), Err(Error::InvalidChannel));
}

#[test]
fn moe_only_on_advanced_timer() {
    let mem1 = tim_mem();
    let mut t1 = tim1(&mem1);
    t1.config_oc_channel(Channel::Ch3, &OcConfig::output_compare(OutputCompareMode::Toggle, 5))
        .unwrap();
    t1.start_channel(Channel::Ch3).unwrap();
    assert!(moe(&t1));

    let mem2 = tim_mem();
    let mut t2 = tim2(&mem2);
    t2.config_oc_channel(Channel::Ch3, &OcConfig::output_compare(OutputCompareMode::Toggle, 5))
        .unwrap();
    t2.start_channel(Channel::Ch3).unwrap();
    assert!(!moe(&t2));
}

#[test]
fn output_config_leaves_channel_disabled() {
    let mem = tim_mem();
    let mut t = tim1(&mem);
    t.config_pwm_channel(Channel::Ch2, &OcConfig::pwm(10)).unwrap();
    t.start_channel(Channel::Ch2).unwrap();
    t.start_complementary(Channel::Ch2).unwrap();

    let cfg = OcConfig {
        mode: OutputCompareMode::ActiveOnMatch,
        pulse: 321,
        polarity: OutputPolarity::ActiveLow,
        n_polarity: OutputPolarity::ActiveLow,
        fast_mode: false,
        idle_state: IdleState::Set,
        n_idle_state: IdleState::Reset,
    };
    t.config_oc_channel(Channel::Ch2, &cfg).unwrap();

    let ccer = t.regs().ccer().read();
    assert!(!ccer.cce(1));
    assert!(!ccer.ccne(1));
    assert!(ccer.ccp(1));
    assert!(ccer.ccnp(1));
    let ccmr = t.regs().ccmr_output(0).read();
    assert_eq!(ccmr.ocm(1), vals::Ocm::ACTIVEONMATCH);
    assert_eq!(ccmr.ccs(1), vals::Ccs::OUTPUT);
    assert!(t.regs().cr2().read().ois(1));
    assert!(!t.regs().cr2().read().oisn(1));
    assert_eq!(t.compare(Channel::Ch2), 321);
    assert_eq!(t.channel_mode(Channel::Ch2), ChannelMode::OutputCompare);
}

#[test]
fn pwm_config_sets_preload_and_fast_mode() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    let cfg = OcConfig {
        fast_mode: true,
        ..OcConfig::pwm(50)
    };
    t.config_pwm_channel(Channel::Ch3, &cfg).unwrap();
    let ccmr = t.regs().ccmr_output(1).read();
    assert!(ccmr.ocpe(0));
    assert!(ccmr.ocfe(0));
    assert_eq!(ccmr.ocm(0), vals::Ocm::PWMMODE1);
    assert!(!t.regs().ccer().read().cce(2));
}

#[test]
fn input_capture_prescaler_replaces_old_bits() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.regs().ccmr_input(1).modify(|w| w.set_icpsc(1, vals::Icpsc::DIV8));

    let cfg = IcConfig {
        polarity: InputCaptureMode::BothEdges,
        selection: InputTISelection::Indirect,
        prescaler: vals::Icpsc::DIV2,
        filter: 9,
    };
    t.config_ic_channel(Channel::Ch4, &cfg).unwrap();

    let ccmr = t.regs().ccmr_input(1).read();
    assert_eq!(ccmr.icpsc(1), vals::Icpsc::DIV2);
    assert_eq!(ccmr.ccs(1), vals::Ccs::INDIRECT);
    assert_eq!(ccmr.icf(1), 9);
    let ccer = t.regs().ccer().read();
    assert!(ccer.ccp(3) && ccer.ccnp(3));
    assert!(!ccer.cce(3));
}

#[test]
fn input_filter_is_range_checked() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    let cfg = IcConfig {
        filter: 16,
        ..Default::default()
    };
    assert_eq!(t.config_ic_channel(Channel::Ch1, &cfg), Err(Error::InvalidParameter));
    assert_eq!(t.channel_mode(Channel::Ch1), ChannelMode::Unconfigured);
}

#[test]
fn start_needs_a_configured_ready_channel() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    assert_eq!(t.start_channel(Channel::Ch1), Err(Error::InvalidState));

    t.config_pwm_channel(Channel::Ch1, &OcConfig::pwm(1)).unwrap();
    t.start_channel(Channel::Ch1).unwrap();
    assert_eq!(t.channel_state(Channel::Ch1), ChannelState::Busy);
    assert_eq!(t.start_channel(Channel::Ch1), Err(Error::InvalidState));
}

#[test]
fn trigger_mode_leaves_counter_to_the_trigger() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.config_slave(&SlaveConfig {
        mode: SlaveMode::Trigger,
        trigger: TriggerSource::Itr(1),
    })
    .unwrap();
    t.config_pwm_channel(Channel::Ch1, &OcConfig::pwm(1)).unwrap();
    t.start_channel(Channel::Ch1).unwrap();
    assert!(!cen(&t));
    assert!(t.regs().ccer().read().cce(0));
}

#[test]
fn base_start_stop() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.start_it().unwrap();
    assert!(cen(&t));
    assert!(t.regs().dier().read().uie());
    assert_eq!(t.state(), State::Busy);
    assert_eq!(t.start(), Err(Error::InvalidState));

    t.stop_it();
    assert!(!cen(&t));
    assert!(!t.regs().dier().read().uie());
    assert_eq!(t.state(), State::Ready);
}

#[test]
fn base_stop_keeps_counter_for_running_channel() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.config_pwm_channel(Channel::Ch2, &OcConfig::pwm(1)).unwrap();
    t.start_channel(Channel::Ch2).unwrap();
    t.start().unwrap();
    t.stop();
    assert!(cen(&t));
}

#[test]
fn capture_event_goes_to_capture_callback_only() {
    static CAPTURES: AtomicU32 = AtomicU32::new(0);
    static PULSES: AtomicU32 = AtomicU32::new(0);
    static CHANNEL: AtomicUsize = AtomicUsize::new(usize::MAX);

    fn on_capture(t: &mut Timer<'_, TIM2>) {
        CAPTURES.fetch_add(1, SeqCst);
        CHANNEL.store(t.active_channel().map_or(usize::MAX, |c| c.index()), SeqCst);
    }
    fn on_pulse(_: &mut Timer<'_, TIM2>) {
        PULSES.fetch_add(1, SeqCst);
    }

    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.register_callback(CallbackId::IcCapture, on_capture);
    t.register_callback(CallbackId::PwmPulseFinished, on_pulse);
    t.config_ic_channel(Channel::Ch1, &IcConfig::default()).unwrap();
    t.config_pwm_channel(Channel::Ch2, &OcConfig::pwm(10)).unwrap();
    t.start_channel_it(Channel::Ch1).unwrap();
    t.start_channel_it(Channel::Ch2).unwrap();

    t.regs().sr().modify(|w| w.set_ccif(0, true));
    dispatch(&mut t);
    assert_eq!(CAPTURES.load(SeqCst), 1);
    assert_eq!(PULSES.load(SeqCst), 0);
    assert_eq!(CHANNEL.load(SeqCst), 0);
    assert!(!t.regs().sr().read().ccif(0));
    assert_eq!(t.active_channel(), None);

    // flag already clear
    dispatch(&mut t);
    assert_eq!(CAPTURES.load(SeqCst), 1);

    t.regs().sr().modify(|w| w.set_ccif(1, true));
    dispatch(&mut t);
    assert_eq!(CAPTURES.load(SeqCst), 1);
    assert_eq!(PULSES.load(SeqCst), 1);
}

#[test]
fn output_compare_event_goes_to_delay_elapsed() {
    static DELAYS: AtomicU32 = AtomicU32::new(0);
    static CAPTURES: AtomicU32 = AtomicU32::new(0);

    fn on_delay(_: &mut Timer<'_, TIM1>) {
        DELAYS.fetch_add(1, SeqCst);
    }
    fn on_capture(_: &mut Timer<'_, TIM1>) {
        CAPTURES.fetch_add(1, SeqCst);
    }

    let mem = tim_mem();
    let mut t = tim1(&mem);
    t.register_callback(CallbackId::OcDelayElapsed, on_delay);
    t.register_callback(CallbackId::IcCapture, on_capture);
    t.config_oc_channel(Channel::Ch3, &OcConfig::output_compare(OutputCompareMode::Frozen, 7))
        .unwrap();
    t.start_channel_it(Channel::Ch3).unwrap();

    t.regs().sr().modify(|w| w.set_ccif(2, true));
    dispatch(&mut t);
    assert_eq!(DELAYS.load(SeqCst), 1);
    assert_eq!(CAPTURES.load(SeqCst), 0);

    t.unregister_callback(CallbackId::OcDelayElapsed);
    t.regs().sr().modify(|w| w.set_ccif(2, true));
    dispatch(&mut t);
    assert_eq!(DELAYS.load(SeqCst), 1);
    assert!(!t.regs().sr().read().ccif(2));
}

#[test]
fn masked_or_unconfigured_events_run_nothing() {
    static CALLS: AtomicU32 = AtomicU32::new(0);

    fn count(_: &mut Timer<'_, TIM2>) {
        CALLS.fetch_add(1, SeqCst);
    }

    let mem = tim_mem();
    let mut t = tim2(&mem);
    for id in [CallbackId::IcCapture, CallbackId::OcDelayElapsed, CallbackId::PwmPulseFinished] {
        t.register_callback(id, count);
    }

    // interrupt disabled: flag stays pending
    t.config_ic_channel(Channel::Ch1, &IcConfig::default()).unwrap();
    t.regs().sr().modify(|w| w.set_ccif(0, true));
    dispatch(&mut t);
    assert!(t.regs().sr().read().ccif(0));

    // unconfigured channel: flag is cleared, no callback
    t.regs().dier().modify(|w| w.set_ccie(3, true));
    t.regs().sr().modify(|w| w.set_ccif(3, true));
    dispatch(&mut t);
    assert!(!t.regs().sr().read().ccif(3));
    assert_eq!(CALLS.load(SeqCst), 0);
}

#[test]
fn clearing_one_flag_leaves_the_others_pending() {
    static CAPTURES: AtomicU32 = AtomicU32::new(0);

    fn on_capture(_: &mut Timer<'_, TIM2>) {
        CAPTURES.fetch_add(1, SeqCst);
    }

    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.register_callback(CallbackId::IcCapture, on_capture);
    t.config_ic_channel(Channel::Ch1, &IcConfig::default()).unwrap();
    t.config_ic_channel(Channel::Ch2, &IcConfig::default()).unwrap();
    t.start_channel_it(Channel::Ch1).unwrap();

    // CH2 captured but its interrupt is still off
    t.regs().sr().write(|w| {
        w.set_ccif(0, true);
        w.set_ccif(1, true);
    });
    t.on_interrupt();
    assert_eq!(CAPTURES.load(SeqCst), 1);

    // only CC1IF is written as zero, so a flag raised after the read survives
    let written = t.regs().sr().read();
    assert_eq!(written.0, Sr::FLAGS & !0b10);
    assert!(!written.ccif(0));
    assert!(written.ccif(1));

    t.regs().sr().write(|w| w.set_ccif(1, true));
    t.start_channel_it(Channel::Ch2).unwrap();
    dispatch(&mut t);
    assert_eq!(CAPTURES.load(SeqCst), 2);
    assert_eq!(t.regs().sr().read().0, 0);
}

#[test]
fn dispatch_order_is_fixed() {
    static ORDER: Mutex<Vec<CallbackId>> = Mutex::new(Vec::new());

    fn record(id: CallbackId) {
        ORDER.lock().unwrap().push(id);
    }
    fn delay(_: &mut Timer<'_, TIM1>) {
        record(CallbackId::OcDelayElapsed)
    }
    fn capture(_: &mut Timer<'_, TIM1>) {
        record(CallbackId::IcCapture)
    }
    fn period(_: &mut Timer<'_, TIM1>) {
        record(CallbackId::PeriodElapsed)
    }
    fn brk(_: &mut Timer<'_, TIM1>) {
        record(CallbackId::Break)
    }
    fn trigger(_: &mut Timer<'_, TIM1>) {
        record(CallbackId::Trigger)
    }
    fn commutation(_: &mut Timer<'_, TIM1>) {
        record(CallbackId::Commutation)
    }

    let mem = tim_mem();
    let mut t = tim1(&mem);
    t.register_callback(CallbackId::OcDelayElapsed, delay);
    t.register_callback(CallbackId::IcCapture, capture);
    t.register_callback(CallbackId::PeriodElapsed, period);
    t.register_callback(CallbackId::Break, brk);
    t.register_callback(CallbackId::Trigger, trigger);
    t.register_callback(CallbackId::Commutation, commutation);

    t.config_oc_channel(Channel::Ch1, &OcConfig::output_compare(OutputCompareMode::Frozen, 1))
        .unwrap();
    t.config_ic_channel(Channel::Ch2, &IcConfig::default()).unwrap();
    t.regs().dier().write(|w| {
        w.set_ccie(0, true);
        w.set_ccie(1, true);
        w.set_uie(true);
        w.set_bie(true);
        w.set_tie(true);
        w.set_comie(true);
    });
    t.regs().sr().write(|w| {
        w.set_comif(true);
        w.set_tif(true);
        w.set_bif(true);
        w.set_uif(true);
        w.set_ccif(1, true);
        w.set_ccif(0, true);
    });

    dispatch(&mut t);

    assert_eq!(
        *ORDER.lock().unwrap(),
        [
            CallbackId::OcDelayElapsed,
            CallbackId::IcCapture,
            CallbackId::PeriodElapsed,
            CallbackId::Break,
            CallbackId::Trigger,
            CallbackId::Commutation,
        ]
    );
    assert_eq!(t.regs().sr().read().0, 0);
}

#[test]
fn one_pulse_arms_channels_without_starting_counter() {
    let mem = tim_mem();
    let mut t = tim1(&mem);
    let cfg = OnePulseConfig {
        output: OcConfig::output_compare(OutputCompareMode::PwmMode2, 16),
        input_polarity: InputCaptureMode::Rising,
        input_selection: InputTISelection::Direct,
        input_filter: 0,
    };
    t.init_one_pulse(&cfg, Channel::Ch1, Channel::Ch2, OnePulseMode::Single)
        .unwrap();

    let smcr = t.regs().smcr().read();
    assert_eq!(smcr.sms(), vals::Sms::TRIGGERMODE);
    assert_eq!(smcr.ts(), vals::Ts::TI2FP2);
    assert!(t.regs().cr1().read().opm());
    assert_eq!(t.channel_mode(Channel::Ch1), ChannelMode::OnePulseOutput);
    assert_eq!(t.channel_mode(Channel::Ch2), ChannelMode::OnePulseInput);
    assert_eq!(t.start_channel(Channel::Ch1), Err(Error::InvalidState));

    t.start_one_pulse().unwrap();
    let ccer = t.regs().ccer().read();
    assert!(ccer.cce(0) && ccer.cce(1));
    assert!(moe(&t));
    assert!(!cen(&t));

    t.stop_one_pulse();
    assert!(!moe(&t));
    assert_eq!(t.channel_state(Channel::Ch1), ChannelState::Ready);
}

#[test]
fn one_pulse_needs_channels_one_and_two() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    let cfg = OnePulseConfig {
        output: OcConfig::pwm(1),
        input_polarity: InputCaptureMode::Falling,
        input_selection: InputTISelection::Direct,
        input_filter: 0,
    };
    assert_eq!(
        t.init_one_pulse(&cfg, Channel::Ch1, Channel::Ch3, OnePulseMode::Repetitive),
        Err(Error::InvalidChannel)
    );
    assert_eq!(
        t.init_one_pulse(&cfg, Channel::Ch2, Channel::Ch2, OnePulseMode::Repetitive),
        Err(Error::InvalidChannel)
    );
    assert_eq!(t.start_one_pulse(), Err(Error::InvalidState));

    t.init_one_pulse(&cfg, Channel::Ch2, Channel::Ch1, OnePulseMode::Repetitive)
        .unwrap();
    assert_eq!(t.regs().smcr().read().ts(), vals::Ts::TI1FP1);
    assert!(!t.regs().cr1().read().opm());
}

#[test]
fn encoder_setup_and_start() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    let bad = EncoderConfig {
        mode: EncoderMode::Ti12,
        ch1: EncoderInput {
            polarity: InputCaptureMode::BothEdges,
            ..Default::default()
        },
        ch2: EncoderInput::default(),
    };
    assert_eq!(t.init_encoder(&bad), Err(Error::InvalidParameter));

    let cfg = EncoderConfig {
        mode: EncoderMode::Ti12,
        ch1: EncoderInput {
            filter: 4,
            ..Default::default()
        },
        ch2: EncoderInput {
            polarity: InputCaptureMode::Falling,
            ..Default::default()
        },
    };
    t.init_encoder(&cfg).unwrap();
    assert_eq!(t.regs().smcr().read().sms(), vals::Sms::ENCODERMODE3);
    assert_eq!(t.regs().ccmr_input(0).read().icf(0), 4);
    assert!(t.regs().ccer().read().ccp(1));

    t.start_encoder(EncoderChannels::Both).unwrap();
    assert!(cen(&t));
    assert_eq!(t.regs().ccer().read().0 & 0x11, 0x11);

    t.stop_encoder(EncoderChannels::Ch1);
    assert!(cen(&t));
    t.stop_encoder(EncoderChannels::Ch2);
    assert!(!cen(&t));
}

#[test]
fn hall_sensor_wiring() {
    let mem = tim_mem();
    let mut t = tim1(&mem);
    t.init_hall_sensor(&HallSensorConfig {
        polarity: InputCaptureMode::Rising,
        prescaler: vals::Icpsc::DIV1,
        filter: 3,
        commutation_delay: 40,
    })
    .unwrap();

    let r = t.regs();
    assert!(r.cr2().read().ti1s());
    assert_eq!(r.cr2().read().mms(), vals::Mms::COMPAREOC2);
    assert_eq!(r.ccmr_input(0).read().ccs(0), vals::Ccs::TRC);
    assert_eq!(r.smcr().read().ts(), vals::Ts::TI1F_ED);
    assert_eq!(r.smcr().read().sms(), vals::Sms::RESETMODE);
    assert_eq!(r.ccmr_output(0).read().ocm(1), vals::Ocm::PWMMODE2);
    assert_eq!(t.compare(Channel::Ch2), 40);

    t.start_channel(Channel::Ch1).unwrap();
    assert!(r.ccer().read().cce(0));
}

#[test]
fn clock_source_and_slave_settings() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    let etr = EtrConfig {
        inverted: true,
        prescaler: vals::Etps::DIV4,
        filter: 16,
    };
    assert_eq!(
        t.config_clock_source(ClockSource::External(TriggerSource::Etr(etr))),
        Err(Error::InvalidParameter)
    );

    let etr = EtrConfig { filter: 5, ..etr };
    t.config_clock_source(ClockSource::External(TriggerSource::Etr(etr))).unwrap();
    let smcr = t.regs().smcr().read();
    assert_eq!(smcr.sms(), vals::Sms::EXTCLOCKMODE);
    assert_eq!(smcr.ts(), vals::Ts::ETRF);
    assert_eq!(smcr.etf(), 5);
    assert!(smcr.etp());

    t.config_clock_source(ClockSource::Internal).unwrap();
    assert_eq!(t.regs().smcr().read().0, 0);

    assert_eq!(
        t.config_slave(&SlaveConfig {
            mode: SlaveMode::Gated,
            trigger: TriggerSource::Ti1Edge { filter: 0 },
        }),
        Err(Error::InvalidParameter)
    );
    t.config_slave_it(&SlaveConfig {
        mode: SlaveMode::Reset,
        trigger: TriggerSource::Ti2 {
            polarity: InputCaptureMode::Falling,
            filter: 2,
        },
    })
    .unwrap();
    assert_eq!(t.regs().smcr().read().ts(), vals::Ts::TI2FP2);
    assert!(t.regs().dier().read().tie());
    assert!(t.regs().ccer().read().ccp(1));

    t.config_master(&MasterConfig {
        trigger_output: vals::Mms::UPDATE,
        master_slave_mode: true,
    })
    .unwrap();
    assert_eq!(t.regs().cr2().read().mms(), vals::Mms::UPDATE);
    assert!(t.regs().smcr().read().msm());
}

#[test]
fn ocref_clear_selects_source() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.config_ocref_clear(Channel::Ch3, true, OcrefClearSource::Etr(EtrConfig::default()))
        .unwrap();
    assert!(t.regs().smcr().read().occs());
    assert!(t.regs().ccmr_output(1).read().occe(0));
}

#[test]
fn break_dead_time_and_commutation() {
    let mem = tim_mem();
    let mut t = tim1(&mem);
    t.set_moe(true);
    t.config_break_dead_time(&BreakDeadTimeConfig {
        dead_time: 0x40,
        break_enable: true,
        break_polarity: BreakPolarity::ActiveHigh,
        lock: vals::Lock::LEVEL1,
        ..Default::default()
    })
    .unwrap();
    let bdtr = t.regs().bdtr().read();
    assert_eq!(bdtr.dtg(), 0x40);
    assert!(bdtr.bke() && bdtr.bkp());
    assert_eq!(bdtr.lock(), vals::Lock::LEVEL1);
    assert!(bdtr.moe());

    assert_eq!(
        t.config_commutation(Some(4), CommutationSource::Trigger),
        Err(Error::InvalidParameter)
    );
    t.config_commutation_it(Some(2), CommutationSource::Trigger).unwrap();
    assert!(t.regs().cr2().read().ccpc());
    assert!(t.regs().cr2().read().ccus());
    assert!(t.regs().dier().read().comie());
    assert_eq!(t.regs().smcr().read().ts(), vals::Ts::ITR2);

    t.generate_event(Event::Commutation).unwrap();
    assert!(t.regs().egr().read().comg());
}

#[test]
fn general_timer_has_no_break_events() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    assert_eq!(t.generate_event(Event::Break), Err(Error::InvalidParameter));
    t.generate_event(Event::CaptureCompare(Channel::Ch2)).unwrap();
    assert!(t.regs().egr().read().ccg(1));
}

#[test]
fn dead_time_search() {
    assert_eq!(dead_time_from_ticks(100), (vals::Ckd::DIV1, 100));
    assert_eq!(dead_time_from_ticks(200), (vals::Ckd::DIV1, 0xA4));
    assert_eq!(dead_time_from_ticks(1000), (vals::Ckd::DIV4, 0xBD));
    assert_eq!(dead_time_from_ticks(u16::MAX), (vals::Ckd::DIV4, 0xFF));

    let mem = tim_mem();
    let mut t = tim1(&mem);
    t.set_dead_time(1000);
    assert_eq!(t.regs().cr1().read().ckd(), vals::Ckd::DIV4);
    assert_eq!(t.regs().bdtr().read().dtg(), 0xBD);
}

#[test]
fn frequency_picks_prescaler_and_reload() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.set_frequency(Hertz::khz(1)).unwrap();
    assert_eq!(t.regs().psc().read(), 0);
    assert_eq!(t.regs().arr().read(), 23_999);
    assert_eq!(t.frequency(), Hertz::khz(1));

    t.set_frequency(Hertz(1)).unwrap();
    assert_eq!(t.regs().psc().read(), 366);
    assert_eq!(t.regs().arr().read(), 65_394);

    assert_eq!(t.set_frequency(Hertz(0)), Err(Error::InvalidParameter));
    assert_eq!(t.set_frequency(Hertz::mhz(48)), Err(Error::InvalidParameter));
}

#[test]
fn counting_mode_only_changes_while_stopped() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.set_counting_mode(CountingMode::EdgeAlignedDown).unwrap();
    assert_eq!(t.counting_mode(), CountingMode::EdgeAlignedDown);
    t.start().unwrap();
    assert_eq!(
        t.set_counting_mode(CountingMode::CenterAlignedUpInterrupts),
        Err(Error::InvalidState)
    );
}

#[test]
fn wait_polls_update_flag() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    assert_eq!(t.wait(), Err(nb::Error::WouldBlock));
    t.regs().sr().modify(|w| w.set_uif(true));
    assert_eq!(t.wait(), Ok(()));
    assert!(!t.regs().sr().read().uif());
}

#[test]
fn pwm_channel_duty_cycle() {
    let mem = tim_mem();
    let mut t = tim2(&mem);
    t.config_pwm_channel(Channel::Ch1, &OcConfig::pwm(0)).unwrap();

    let mut ch = t.pwm_channel(Channel::Ch1);
    assert_eq!(ch.max_duty_cycle(), 1000);
    ch.set_duty_cycle_percent(25).unwrap();
    ch.enable().unwrap();
    assert_eq!(t.compare(Channel::Ch1), 250);
    assert!(cen(&t));

    t.set_period(u16::MAX);
    assert_eq!(t.max_duty(), u16::MAX);
}

#[test]
fn deinit_forgets_channels() {
    let mem = tim_mem();
    let mut t = tim1(&mem);
    t.config_pwm_channel(Channel::Ch1, &OcConfig::pwm(1)).unwrap();
    t.start_channel_it(Channel::Ch1).unwrap();
    t.deinit();
    assert_eq!(t.state(), State::Reset);
    assert_eq!(t.channel_mode(Channel::Ch1), ChannelMode::Unconfigured);
    assert_eq!(t.regs().ccer().read().0, 0);
    assert!(!cen(&t));
    assert!(!moe(&t));
}
