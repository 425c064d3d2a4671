#![cfg(not(feature = "host"))]
#![no_std]
#![no_main]
#![allow(dead_code, reason = "Compile-time verification only")]

use core::pin::pin;

use bus_envoy::Result;
use bus_envoy::bme280::{self, Bme280, Mode};
use bus_envoy::i2c::{I2cDevice, I2cMaster, SharedI2cBus};
use bus_envoy::lis3::Lis3TransportI2c;
use bus_envoy::lis302dl::{self, Axis, Lis302dl, MeasurementRate, Scale};
use bus_envoy::resumable::{Resumable, Resume, block_on};
use cortex_m_rt::entry;
use defmt::{info, warn};
use defmt_rtt as _;
use embassy_rp::bind_interrupts;
use embassy_rp::i2c::{Async, Config as I2cConfig, I2c, InterruptHandler};
use embassy_rp::peripherals::I2C0;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::{Delay, Duration, Instant};
use panic_probe as _;
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    I2C0_IRQ => InterruptHandler<I2C0>;
});

type Bus = SharedI2cBus<NoopRawMutex, I2c<'static, I2C0, Async>>;
type Accelerometer = Lis302dl<Lis3TransportI2c<'static, NoopRawMutex, I2c<'static, I2C0, Async>>>;
type Climate = Bme280<'static, NoopRawMutex, I2c<'static, I2C0, Async>>;

// Each job owns its driver and hands it back when done, so the slot can be refilled.
async fn sample_acceleration(mut accelerometer: Accelerometer) -> (Accelerometer, Result<i8>) {
    let result = accelerometer
        .read_acceleration()
        .await
        .map(|data| data.raw(Axis::Z));
    (accelerometer, result)
}

async fn sample_climate(mut sensor: Climate) -> (Climate, Result<bme280::Data>) {
    let result = sensor.measure_forced(&mut Delay).await;
    (sensor, result)
}

#[entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());

    let mut config = I2cConfig::default();
    config.frequency = 400_000;
    let i2c = I2c::new_async(p.I2C0, p.PIN_5, p.PIN_4, Irqs, config);

    static BUS: StaticCell<Bus> = StaticCell::new();
    let bus: &'static Bus = BUS.init(SharedI2cBus::new(I2cMaster::new(i2c)));

    // Setup runs to completion before the loop starts.
    let mut accelerometer = Lis302dl::new(Lis3TransportI2c::new(I2cDevice::new(
        bus,
        lis302dl::ADDRESS,
    )));
    defmt::unwrap!(block_on(
        accelerometer.configure(Scale::G2, MeasurementRate::Hz100)
    ));
    let mut climate = Bme280::new(I2cDevice::new(bus, bme280::ADDRESS));
    let climate_config = bme280::Config {
        mode: Mode::Sleep,
        ..bme280::Config::default()
    };
    defmt::unwrap!(block_on(climate.initialize(climate_config, &mut Delay)));

    let acceleration_slot = pin!(None);
    let climate_slot = pin!(None);
    let mut acceleration_job = Resumable::new(acceleration_slot);
    let mut climate_job = Resumable::new(climate_slot);
    acceleration_job.start(sample_acceleration(accelerometer));
    climate_job.start(sample_climate(climate));

    let mut last_report = Instant::now();
    let mut idle_spins = 0_u32;
    loop {
        if let Resume::Finished((accelerometer, result)) = acceleration_job.resume() {
            match result {
                Ok(z) => info!("z {}", z),
                Err(err) => warn!("accelerometer: {:?}", err),
            }
            acceleration_job.start(sample_acceleration(accelerometer));
        }

        if let Resume::Finished((climate, result)) = climate_job.resume() {
            match result {
                Ok(data) => info!("{} centi-C {} Pa", data.temperature(), data.pressure()),
                Err(err) => warn!("climate sensor: {:?}", err),
            }
            climate_job.start(sample_climate(climate));
        }

        // Work the bus never blocks.
        idle_spins = idle_spins.wrapping_add(1);
        if last_report.elapsed() > Duration::from_secs(5) {
            info!("superloop: {} spins", idle_spins);
            idle_spins = 0;
            last_report = Instant::now();
        }
    }
}
