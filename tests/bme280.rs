mod common;

use bus_envoy::Error;
use bus_envoy::bme280::{
    self, Bme280, Calibration, Chip, Config, Data, DataDouble, Filter, Mode, Oversampling, Raw,
    Standby, split_adc_20,
};
use bus_envoy::i2c::{I2cDevice, I2cMaster, SharedI2cBus};
use common::{FakeDevice, FakeI2c, I2cLog, NoopDelay, writes_to};
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

const SENSOR_A: Calibration = Calibration {
    t1: 28192,
    t2: 26148,
    t3: 50,
    p1: 38104,
    p2: -10853,
    p3: 3024,
    p4: 10657,
    p5: 13,
    p6: -7,
    p7: 9900,
    p8: -10230,
    p9: 4285,
    h1: 75,
    h2: 359,
    h3: 0,
    h4: 326,
    h5: 0,
    h6: 30,
};

const SENSOR_B: Calibration = Calibration {
    t1: 28533,
    t2: 27194,
    t3: 50,
    p1: 38286,
    p2: -10616,
    p3: 3024,
    p4: 4099,
    p5: 40,
    p6: -7,
    p7: 9900,
    p8: -10230,
    p9: 4285,
    h1: 75,
    h2: 356,
    h3: 0,
    h4: 334,
    h5: 0,
    h6: 30,
};

/// BMP280 datasheet example.
const DATASHEET: Calibration = Calibration {
    t1: 27504,
    t2: 26435,
    t3: -1000,
    p1: 36477,
    p2: -10685,
    p3: 3024,
    p4: 2855,
    p5: 140,
    p6: -7,
    p7: 15500,
    p8: -14600,
    p9: 6000,
    h1: 0,
    h2: 0,
    h3: 0,
    h4: 0,
    h5: 0,
    h6: 0,
};

/// A breakout board reading 25.13 °C.
const BREAKOUT: Calibration = Calibration {
    t1: 27974,
    t2: 26594,
    t3: 50,
    p1: 38207,
    p2: -10702,
    p3: 3024,
    p4: 7917,
    p5: -188,
    p6: -7,
    p7: 9900,
    p8: -10230,
    p9: 4285,
    h1: 75,
    h2: 358,
    h3: 0,
    h4: 328,
    h5: 0,
    h6: 30,
};

struct Sweep {
    calibration: Calibration,
    temperature: (u32, u32),
    pressure: (u32, u32),
}

const SWEEPS: [Sweep; 4] = [
    Sweep {
        calibration: SENSOR_A,
        temperature: (0x4ECA0, 0xB0AA0),
        pressure: (0x01000, 0xE0000),
    },
    Sweep {
        calibration: SENSOR_B,
        temperature: (0x51530, 0xAF720),
        pressure: (0x01000, 0xE0000),
    },
    Sweep {
        calibration: DATASHEET,
        temperature: (519_888, 519_889),
        pressure: (0x01000, 0xE0000),
    },
    Sweep {
        calibration: BREAKOUT,
        temperature: (0x809F0, 0x809F0),
        pressure: (0x62090, 0x62090),
    },
];

fn raw(adc_pressure: u32, adc_temperature: u32, adc_humidity: u16) -> Raw {
    let [p0, p1, p2] = split_adc_20(adc_pressure);
    let [t0, t1, t2] = split_adc_20(adc_temperature);
    let [h0, h1] = adc_humidity.to_be_bytes();
    [p0, p1, p2, t0, t1, t2, h0, h1]
}

fn calibration_registers(calibration: &Calibration) -> ([u8; 26], [u8; 7]) {
    let mut low = [0_u8; 26];
    let words = [
        calibration.t1.to_le_bytes(),
        calibration.t2.to_le_bytes(),
        calibration.t3.to_le_bytes(),
        calibration.p1.to_le_bytes(),
        calibration.p2.to_le_bytes(),
        calibration.p3.to_le_bytes(),
        calibration.p4.to_le_bytes(),
        calibration.p5.to_le_bytes(),
        calibration.p6.to_le_bytes(),
        calibration.p7.to_le_bytes(),
        calibration.p8.to_le_bytes(),
        calibration.p9.to_le_bytes(),
    ];
    for (index, word) in words.iter().enumerate() {
        low[index * 2..index * 2 + 2].copy_from_slice(word);
    }
    low[25] = calibration.h1;

    let [h2_lsb, h2_msb] = calibration.h2.to_le_bytes();
    let h4 = calibration.h4;
    let h5 = calibration.h5;
    let high = [
        h2_lsb,
        h2_msb,
        calibration.h3,
        (h4 >> 4) as u8,
        ((h5 & 0x0F) as u8) << 4 | (h4 & 0x0F) as u8,
        (h5 >> 4) as u8,
        calibration.h6 as u8,
    ];
    (low, high)
}

// ============================================================================
// Compensation
// ============================================================================

#[test]
fn datasheet_example_compensates_exactly() {
    let data = Data::new(raw(415_148, 519_888, 0), DATASHEET, Chip::Bmp280);

    assert_eq!(data.adc_temperature(), 519_888);
    assert_eq!(data.adc_pressure(), 415_148);
    assert_eq!(data.t_fine(), 128_422);
    assert_eq!(data.temperature(), 2508);
    assert_eq!(data.pressure(), 100_653);
    assert_eq!(data.humidity(), None);
    assert_eq!(DataDouble::from(data).humidity(), None);
}

#[test]
fn breakout_reading_matches_its_display() {
    let data = Data::new(raw(0x62090, 0x809F0, 0x6F00), BREAKOUT, Chip::Bme280);

    assert_eq!(data.temperature(), 2513);
    assert_eq!(data.pressure(), 85_000);
    assert_eq!(data.humidity(), Some(41_248));

    let double = DataDouble::from(data);
    assert!((double.temperature() - 25.13).abs() < 0.01);
    assert!((double.pressure() - 85_000.49).abs() < 0.01);
    assert!(double.humidity().is_some_and(|humidity| (humidity - 41.248).abs() < 0.01));
}

#[test]
fn integer_temperature_tracks_floating_point() {
    for sweep in &SWEEPS {
        let (min, max) = sweep.temperature;
        let mut max_error = 0;
        for adc in min..=max {
            let data = Data::new(raw(0, adc, 0), sweep.calibration, Chip::Bme280);
            let double = DataDouble::from(data);
            let expected = (double.temperature() * 100.0).round() as i32;
            max_error = max_error.max((data.temperature() - expected).abs());
        }
        assert!(max_error <= 1, "temperature error {max_error} for {min:#x}..={max:#x}");
    }
}

#[test]
fn integer_pressure_tracks_floating_point() {
    for sweep in &SWEEPS {
        let (temperature_min, temperature_max) = sweep.temperature;
        let (pressure_min, pressure_max) = sweep.pressure;
        let temperature_step = ((temperature_max - temperature_min) / 10).max(1);
        let pressure_step = ((pressure_max - pressure_min) / 10).max(1);
        let mut max_error = 0.0_f64;
        let mut total_error = 0.0_f64;

        for adc_temperature in (temperature_min..=temperature_max).step_by(temperature_step as usize)
        {
            for adc_pressure in (pressure_min..=pressure_max).step_by(pressure_step as usize) {
                let data = Data::new(
                    raw(adc_pressure, adc_temperature, 0),
                    sweep.calibration,
                    Chip::Bme280,
                );
                let fixed = f64::from(data.pressure());
                let double = DataDouble::from(data).pressure();
                if !(30_000.0..=110_000.0).contains(&fixed)
                    || !(30_000.0..=110_000.0).contains(&double)
                {
                    continue;
                }
                let error = (fixed - double).abs();
                max_error = max_error.max(error);
                total_error += error;
            }
        }
        assert!(max_error <= 50.0, "pressure error {max_error}");
        assert!(total_error <= 2455.0, "total pressure error {total_error}");
    }
}

#[test]
fn integer_humidity_tracks_floating_point() {
    for adc_humidity in (0x5000_u16..=0xA000).step_by(0x400) {
        let data = Data::new(raw(0x62090, 0x809F0, adc_humidity), SENSOR_A, Chip::Bme280);
        let fixed = f64::from(data.humidity_q22_10().expect("BME280 reports humidity")) / 1024.0;
        let double = DataDouble::from(data)
            .humidity()
            .expect("BME280 reports humidity");
        assert!((0.0..=100.0).contains(&fixed));
        assert!(
            (fixed - double).abs() < 0.05,
            "humidity {fixed} vs {double} at {adc_humidity:#x}"
        );
    }
}

#[test]
fn humidity_calibration_unpacks_shared_nibbles() {
    let calibration = Calibration {
        h4: -300,
        h5: -50,
        ..SENSOR_A
    };
    let (low, high) = calibration_registers(&calibration);

    let decoded = Calibration::from_temperature_pressure_block(&low).with_humidity_block(&high);

    assert_eq!(decoded, calibration);
}

// ============================================================================
// Driver
// ============================================================================

fn sensor_bus(chip_id: u8, calibration: &Calibration, data: Raw) -> (FakeI2c, I2cLog) {
    let (low, high) = calibration_registers(calibration);
    let device = FakeDevice::new()
        .with_register(0xD0, chip_id)
        .with_registers(0x88, &low)
        .with_registers(0xE1, &high)
        .with_registers(0xF7, &data);
    let fake = FakeI2c::new().with_device(0x76, device);
    let log = fake.log();
    (fake, log)
}

#[test]
fn config_encodes_the_control_registers() {
    let config = Config {
        temperature: Oversampling::X2,
        pressure: Oversampling::X16,
        humidity: Oversampling::X1,
        mode: Mode::Normal,
        filter: Filter::X16,
        standby: Standby::Ms0_5,
    };

    assert_eq!(config.ctrl_meas(), 0b010_101_11);
    assert_eq!(config.ctrl_hum(), 0b001);
    assert_eq!(config.config(), 0b000_100_00);
    assert_eq!(Config::default().max_measurement_time_us(Chip::Bme280), 9300);
    assert_eq!(Config::default().max_measurement_time_us(Chip::Bmp280), 6425);
}

#[test]
fn initialize_reads_calibration_and_writes_config() {
    let (fake, log) = sensor_bus(0x60, &BREAKOUT, raw(0x62090, 0x809F0, 0x6F00));
    let bus: SharedI2cBus<NoopRawMutex, _> = SharedI2cBus::new(I2cMaster::new(fake));
    let mut sensor = Bme280::new(I2cDevice::new(&bus, bme280::ADDRESS));
    let mut delay = NoopDelay::default();

    let chip = block_on(sensor.initialize(Config::default(), &mut delay))
        .expect("initialize must succeed");

    assert_eq!(chip, Chip::Bme280);
    assert_eq!(sensor.calibration(), &BREAKOUT);
    assert_eq!(
        writes_to(&log, 0x76),
        vec![
            vec![0xD0],
            vec![0xE0, 0xB6],
            vec![0xF3],
            vec![0x88],
            vec![0xE1],
            vec![0xF2, 0x01],
            vec![0xF5, 0xA0],
            vec![0xF4, 0x27],
        ]
    );
    assert!(delay.total_ns >= 2_000_000);
}

#[test]
fn forced_measurement_waits_and_reads() {
    let (fake, log) = sensor_bus(0x60, &BREAKOUT, raw(0x62090, 0x809F0, 0x6F00));
    let bus: SharedI2cBus<NoopRawMutex, _> = SharedI2cBus::new(I2cMaster::new(fake));
    let mut sensor = Bme280::new(I2cDevice::new(&bus, bme280::ADDRESS));
    let mut delay = NoopDelay::default();
    let config = Config {
        mode: Mode::Sleep,
        ..Config::default()
    };

    block_on(sensor.initialize(config, &mut delay)).expect("initialize must succeed");
    log.borrow_mut().clear();
    delay.total_ns = 0;
    let data = block_on(sensor.measure_forced(&mut delay)).expect("measurement must succeed");

    assert_eq!(data.temperature(), 2513);
    assert_eq!(data.pressure(), 85_000);
    assert_eq!(data.humidity(), Some(41_248));
    assert_eq!(sensor.data(), &data);
    assert_eq!(
        writes_to(&log, 0x76),
        vec![vec![0xF4, 0x25], vec![0xF3], vec![0xF7]]
    );
    assert_eq!(delay.total_ns, u64::from(sensor.max_measurement_time_us()) * 1000);
}

#[test]
fn bmp280_skips_humidity() {
    let (fake, log) = sensor_bus(0x58, &DATASHEET, raw(415_148, 519_888, 0xFFFF));
    let bus: SharedI2cBus<NoopRawMutex, _> = SharedI2cBus::new(I2cMaster::new(fake));
    let mut sensor = Bme280::new(I2cDevice::new(&bus, bme280::ADDRESS));
    let mut delay = NoopDelay::default();

    assert_eq!(
        block_on(sensor.initialize(Config::default(), &mut delay)),
        Ok(Chip::Bmp280)
    );
    let data = block_on(sensor.read_data()).expect("read must succeed");

    assert_eq!(data.temperature(), 2508);
    assert_eq!(data.pressure(), 100_653);
    assert_eq!(data.humidity(), None);
    assert_eq!(&data.raw()[6..], &[0, 0]);
    let writes = writes_to(&log, 0x76);
    assert!(!writes.contains(&vec![0xE1]));
    assert!(!writes.iter().any(|write| write.first() == Some(&0xF2)));
}

#[test]
fn unknown_chip_is_rejected() {
    let (fake, _) = sensor_bus(0x55, &SENSOR_A, [0; 8]);
    let bus: SharedI2cBus<NoopRawMutex, _> = SharedI2cBus::new(I2cMaster::new(fake));
    let mut sensor = Bme280::new(I2cDevice::new(&bus, bme280::ADDRESS_ALTERNATE));
    let mut delay = NoopDelay::default();

    assert_eq!(
        block_on(sensor.initialize(Config::default(), &mut delay)),
        Err(Error::I2c(embedded_hal::i2c::ErrorKind::NoAcknowledge(
            embedded_hal::i2c::NoAcknowledgeSource::Address
        )))
    );

    let mut sensor = Bme280::new(I2cDevice::new(&bus, bme280::ADDRESS));
    assert_eq!(
        block_on(sensor.initialize(Config::default(), &mut delay)),
        Err(Error::UnexpectedIdentity(0x55))
    );
}

#[test]
fn stuck_calibration_copy_times_out() {
    let (mut fake, _) = sensor_bus(0x60, &SENSOR_A, [0; 8]);
    if let Some(device) = fake.devices.get_mut(&0x76) {
        device.registers[0xF3] = 0x01;
    }
    let bus: SharedI2cBus<NoopRawMutex, _> = SharedI2cBus::new(I2cMaster::new(fake));
    let mut sensor = Bme280::new(I2cDevice::new(&bus, bme280::ADDRESS));
    let mut delay = NoopDelay::default();

    assert_eq!(
        block_on(sensor.initialize(Config::default(), &mut delay)),
        Err(Error::Timeout)
    );
}
