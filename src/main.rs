#![no_std]
#![no_main]

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::adc::{self, Adc, SampleTime};
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::mode::Async;
use embassy_stm32::time::hz;
use embassy_stm32::usart::{self, UartTx};
use embassy_stm32::{bind_interrupts, peripherals, Config};
use embassy_sync::channel::Channel;
use embassy_time::Instant;
use optotach::config::{PEAK_THRESHOLD, SERIAL_BAUD};
use optotach::{
    debug, DcTracker, Detection, EdgeDetector, FrameChannel, FrameSender, PeriodMonitor,
};

bind_interrupts!(struct Irqs {
    ADC1_COMP => adc::InterruptHandler<peripherals::ADC1>;
});

/// Hand-off slot between the sampling loop and the drain task; its single
/// entry doubles as the transmitter's busy flag.
static FRAMES: FrameChannel = Channel::new();

/// Low 16 bits of the free-running tick counter. The truncation is the
/// modulo-2^16 wrap the period math is written against.
fn now_ticks() -> u16 {
    Instant::now().as_ticks() as u16
}

// Drains queued frames into the UART. The sampling loop yields to the
// executor on every conversion wait, so this task is never starved no
// matter how busy sampling is.
#[embassy_executor::task]
async fn frame_tx(mut tx: UartTx<'static, Async>, frames: &'static FrameChannel) {
    loop {
        let frame = frames.receive().await;
        if tx.write(frame.as_bytes()).await.is_err() {
            debug!("UART write failed, frame lost");
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // Nucleo-F091RC clocking: 8 MHz from the ST-LINK MCO into HSE in bypass
    // mode, PLL x6 for the 48 MHz maximum system clock, both buses
    // undivided.
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;

        config.rcc.hse = Some(Hse {
            freq: hz(8_000_000),
            mode: HseMode::Bypass,
        });
        config.rcc.pll = Some(Pll {
            src: PllSource::HSE,
            prediv: PllPreDiv::DIV1,
            mul: PllMul::MUL6,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV1;
    }
    let p = embassy_stm32::init(config);

    let mut uart_config = usart::Config::default();
    uart_config.baudrate = SERIAL_BAUD;
    let tx = UartTx::new(p.USART1, p.PA9, p.DMA1_CH2, uart_config).unwrap();
    spawner.spawn(frame_tx(tx, &FRAMES)).unwrap();

    let mut adc = Adc::new(p.ADC1, Irqs);
    adc.set_sample_time(SampleTime::CYCLES71_5);
    let mut opto_in = p.PA0; // photodiode
    let mut current_in = p.PA6; // current transducer
    let mut voltage_in = p.PA7; // voltage transducer

    // Pulse train mirroring detected edges, for consumers that prefer an
    // electrical tachometer signal over the serial stream.
    let mut pulse_out = Output::new(p.PA8, Level::Low, Speed::Low);
    // Nucleo user LED: lights once any frame has been dropped.
    let mut status_led = Output::new(p.PA5, Level::Low, Speed::Low);

    let mut tracker = DcTracker::new();
    let mut detector = EdgeDetector::new(PEAK_THRESHOLD);
    let mut monitor = PeriodMonitor::new(now_ticks());
    let mut sender = FrameSender::new(&FRAMES);

    debug!("optotach sampling");

    loop {
        let sample = adc.read(&mut opto_in).await;
        let timestamp = now_ticks();

        let detection = detector.detect(sample, tracker.update(sample));
        match detection {
            Detection::Edge => pulse_out.set_high(),
            Detection::Idle => pulse_out.set_low(),
            Detection::Hold => {}
        }

        let Some(publish) = monitor.observe(detection == Detection::Edge, timestamp) else {
            continue;
        };
        debug!("report: {}", publish);

        // One conversion each on the auxiliary channels, then hand the
        // report off and reflect the overrun latch on the status LED.
        let voltage = adc.read(&mut voltage_in).await;
        let current = adc.read(&mut current_in).await;

        if !sender.try_send(publish.period_ticks(), voltage, current) {
            debug!("previous frame still in flight, reading dropped");
        }
        status_led.set_level(if sender.overrun() {
            Level::High
        } else {
            Level::Low
        });
    }
}
