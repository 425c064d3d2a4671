#![cfg(not(feature = "host"))]
#![no_std]
#![no_main]
#![allow(dead_code, reason = "Compile-time verification only")]

use core::fmt::Write as _;

use bus_envoy::Result;
use bus_envoy::bme280::{self, Bme280, Oversampling};
use bus_envoy::i2c::{I2cDevice, I2cMaster, SharedI2cBus};
use bus_envoy::lis3::Lis3TransportI2c;
use bus_envoy::lis302dl::{self, Lis302dl, MeasurementRate, Scale};
use bus_envoy::ssd1306::{self, Ssd1306};
use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::i2c::{Async, Config as I2cConfig, I2c, InterruptHandler};
use embassy_rp::peripherals::I2C0;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Delay, Duration, Ticker};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::Text;
use heapless::String;
use panic_probe as _;
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    I2C0_IRQ => InterruptHandler<I2C0>;
});

type Bus = SharedI2cBus<CriticalSectionRawMutex, I2c<'static, I2C0, Async>>;

/// Latest readings, handed from the sensor tasks to the display task.
static TILT: Signal<CriticalSectionRawMutex, i8> = Signal::new();
static TEMPERATURE: Signal<CriticalSectionRawMutex, i32> = Signal::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    if let Err(err) = inner_main(spawner).await {
        panic!("Initialization failed: {:?}", err);
    }
}

async fn inner_main(spawner: Spawner) -> Result<()> {
    let p = embassy_rp::init(Default::default());

    let mut config = I2cConfig::default();
    config.frequency = 400_000;
    let i2c = I2c::new_async(p.I2C0, p.PIN_5, p.PIN_4, Irqs, config);

    static BUS: StaticCell<Bus> = StaticCell::new();
    let bus: &'static Bus = BUS.init(SharedI2cBus::new(I2cMaster::new(i2c)));

    // Three devices, one bus, three independent tasks.
    defmt::unwrap!(spawner.spawn(accelerometer_task(bus)));
    defmt::unwrap!(spawner.spawn(climate_task(bus)));
    defmt::unwrap!(spawner.spawn(display_task(bus)));
    Ok(())
}

#[embassy_executor::task]
async fn accelerometer_task(bus: &'static Bus) -> ! {
    let device = I2cDevice::new(bus, lis302dl::ADDRESS);
    let mut accelerometer = Lis302dl::new(Lis3TransportI2c::new(device));
    if let Err(err) = accelerometer.who_am_i().await {
        warn!("accelerometer missing: {:?}", err);
    }
    defmt::unwrap!(
        accelerometer
            .configure(Scale::G2, MeasurementRate::Hz100)
            .await
    );

    let mut ticker = Ticker::every(Duration::from_millis(10));
    loop {
        match accelerometer.read_acceleration().await {
            Ok(data) => TILT.signal(data.raw(lis302dl::Axis::X)),
            Err(err) => warn!("accelerometer: {:?}", err),
        }
        ticker.next().await;
    }
}

#[embassy_executor::task]
async fn climate_task(bus: &'static Bus) -> ! {
    let mut sensor = Bme280::new(I2cDevice::new(bus, bme280::ADDRESS));
    let mut delay = Delay;
    let config = bme280::Config {
        pressure: Oversampling::X16,
        ..bme280::Config::default()
    };
    let chip = defmt::unwrap!(sensor.initialize(config, &mut delay).await);
    info!("climate sensor: {:?}", chip);

    let mut ticker = Ticker::every(Duration::from_secs(1));
    loop {
        ticker.next().await;
        match sensor.read_data().await {
            Ok(data) => {
                info!(
                    "{} centi-C, {} Pa, {:?} milli-%RH",
                    data.temperature(),
                    data.pressure(),
                    data.humidity()
                );
                TEMPERATURE.signal(data.temperature());
            }
            Err(err) => warn!("climate sensor: {:?}", err),
        }
    }
}

#[embassy_executor::task]
async fn display_task(bus: &'static Bus) -> ! {
    let mut display = Ssd1306::new(I2cDevice::new(bus, ssd1306::ADDRESS));
    defmt::unwrap!(display.initialize().await);

    let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    let mut tilt = 0_i8;
    let mut temperature = 0_i32;
    let mut ticker = Ticker::every(Duration::from_millis(100));
    loop {
        if let Some(value) = TILT.try_take() {
            tilt = value;
        }
        if let Some(value) = TEMPERATURE.try_take() {
            temperature = value;
        }

        let mut line: String<32> = String::new();
        let _ = write!(line, "x {tilt:4}  t {}.{:02}", temperature / 100, temperature % 100);
        let frame = display.frame_mut();
        let _ = frame.clear(BinaryColor::Off);
        let _ = Text::new(&line, Point::new(0, 10), style).draw(frame);
        if let Err(err) = display.write_display().await {
            warn!("display: {:?}", err);
        }
        ticker.next().await;
    }
}
