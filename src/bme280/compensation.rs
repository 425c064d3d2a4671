//! Bosch compensation formulas: integer (what the driver returns) and `f64` (reference).
#![allow(
    clippy::arithmetic_side_effects,
    reason = "reference formulas; intermediates are sized for 20-bit ADC inputs"
)]

use super::Chip;

/// Factory trimming parameters, read once from NVM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[expect(missing_docs, reason = "names follow the datasheet (dig_T1 ...)")]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Decode the block at `0x88..=0xA1`. Humidity parameters stay zero.
    #[must_use]
    pub fn from_temperature_pressure_block(block: &[u8; 26]) -> Self {
        let unsigned = |index: usize| u16::from_le_bytes([block[index], block[index + 1]]);
        let signed = |index: usize| i16::from_le_bytes([block[index], block[index + 1]]);
        Self {
            t1: unsigned(0),
            t2: signed(2),
            t3: signed(4),
            p1: unsigned(6),
            p2: signed(8),
            p3: signed(10),
            p4: signed(12),
            p5: signed(14),
            p6: signed(16),
            p7: signed(18),
            p8: signed(20),
            p9: signed(22),
            h1: block[25],
            ..Self::default()
        }
    }

    /// Add the humidity parameters from the block at `0xE1..=0xE7`.
    ///
    /// `H4` and `H5` are signed 12-bit values sharing the nibbles of `0xE5`.
    #[must_use]
    pub fn with_humidity_block(self, block: &[u8; 7]) -> Self {
        let [h2_lsb, h2_msb, h3, e4, e5, e6, h6] = *block;
        Self {
            h2: i16::from_le_bytes([h2_lsb, h2_msb]),
            h3,
            h4: (i16::from(i8::from_ne_bytes([e4])) << 4) | i16::from(e5 & 0x0F),
            h5: (i16::from(i8::from_ne_bytes([e6])) << 4) | i16::from(e5 >> 4),
            h6: i8::from_ne_bytes([h6]),
            ..self
        }
    }
}

/// Raw burst from `0xF7..=0xFE`: pressure (3 bytes), temperature (3), humidity (2).
pub type Raw = [u8; 8];

fn adc_20(msb: u8, lsb: u8, xlsb: u8) -> i32 {
    (i32::from(msb) << 12) | (i32::from(lsb) << 4) | (i32::from(xlsb) >> 4)
}

/// Pack a 20-bit ADC value the way the sensor presents it.
#[must_use]
pub const fn split_adc_20(adc: u32) -> [u8; 3] {
    [(adc >> 12) as u8, (adc >> 4) as u8, ((adc & 0x0F) << 4) as u8]
}

// ============================================================================
// Integer
// ============================================================================

/// One measurement with the calibration needed to compensate it.
///
/// Results are computed on demand from the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Data {
    raw: Raw,
    calibration: Calibration,
    chip: Chip,
}

impl Data {
    /// Wrap a raw burst.
    #[must_use]
    pub const fn new(raw: Raw, calibration: Calibration, chip: Chip) -> Self {
        Self {
            raw,
            calibration,
            chip,
        }
    }

    /// The raw burst.
    #[must_use]
    pub const fn raw(&self) -> &Raw {
        &self.raw
    }

    /// Replace the raw pressure bytes.
    pub fn set_adc_pressure(&mut self, adc: u32) {
        let [msb, lsb, xlsb] = split_adc_20(adc);
        self.raw[0] = msb;
        self.raw[1] = lsb;
        self.raw[2] = xlsb;
    }

    /// Replace the raw temperature bytes.
    pub fn set_adc_temperature(&mut self, adc: u32) {
        let [msb, lsb, xlsb] = split_adc_20(adc);
        self.raw[3] = msb;
        self.raw[4] = lsb;
        self.raw[5] = xlsb;
    }

    /// Uncompensated pressure, 20 bits.
    #[must_use]
    pub fn adc_pressure(&self) -> i32 {
        adc_20(self.raw[0], self.raw[1], self.raw[2])
    }

    /// Uncompensated temperature, 20 bits.
    #[must_use]
    pub fn adc_temperature(&self) -> i32 {
        adc_20(self.raw[3], self.raw[4], self.raw[5])
    }

    /// Uncompensated humidity, 16 bits.
    #[must_use]
    pub fn adc_humidity(&self) -> i32 {
        i32::from(u16::from_be_bytes([self.raw[6], self.raw[7]]))
    }

    /// Fine temperature shared by the pressure and humidity formulas.
    #[must_use]
    pub fn t_fine(&self) -> i32 {
        let calibration = &self.calibration;
        let adc = self.adc_temperature();
        let t1 = i32::from(calibration.t1);
        let var1 = (((adc >> 3) - (t1 << 1)) * i32::from(calibration.t2)) >> 11;
        let delta = (adc >> 4) - t1;
        let var2 = (((delta * delta) >> 12) * i32::from(calibration.t3)) >> 14;
        var1 + var2
    }

    /// Temperature in 0.01 °C (`2508` = 25.08 °C).
    #[must_use]
    pub fn temperature(&self) -> i32 {
        (self.t_fine() * 5 + 128) >> 8
    }

    /// Pressure in Pa as unsigned Q24.8 (`24674867` = 96386.2 Pa).
    ///
    /// Returns 0 when the calibration would divide by zero.
    #[must_use]
    pub fn pressure_q24_8(&self) -> u32 {
        let calibration = &self.calibration;
        let mut var1 = i64::from(self.t_fine()) - 128_000;
        let mut var2 = var1 * var1 * i64::from(calibration.p6);
        var2 += (var1 * i64::from(calibration.p5)) << 17;
        var2 += i64::from(calibration.p4) << 35;
        var1 = ((var1 * var1 * i64::from(calibration.p3)) >> 8)
            + ((var1 * i64::from(calibration.p2)) << 12);
        var1 = (((1_i64 << 47) + var1) * i64::from(calibration.p1)) >> 33;
        if var1 == 0 {
            return 0;
        }
        let mut pressure = 1_048_576 - i64::from(self.adc_pressure());
        pressure = (((pressure << 31) - var2) * 3125) / var1;
        var1 = (i64::from(calibration.p9) * (pressure >> 13) * (pressure >> 13)) >> 25;
        var2 = (i64::from(calibration.p8) * pressure) >> 19;
        pressure = ((pressure + var1 + var2) >> 8) + (i64::from(calibration.p7) << 4);
        u32::try_from(pressure).unwrap_or(0)
    }

    /// Pressure in Pa.
    #[must_use]
    pub fn pressure(&self) -> u32 {
        self.pressure_q24_8() >> 8
    }

    /// Relative humidity in %RH as unsigned Q22.10 (`47445` = 46.333 %RH).
    ///
    /// `None` on a BMP280.
    #[must_use]
    pub fn humidity_q22_10(&self) -> Option<u32> {
        if !self.chip.has_humidity() {
            return None;
        }
        let calibration = &self.calibration;
        let adc = i64::from(self.adc_humidity());
        let x = i64::from(self.t_fine()) - 76_800;
        let h1 = i64::from(calibration.h1);
        let h2 = i64::from(calibration.h2);
        let h3 = i64::from(calibration.h3);
        let h4 = i64::from(calibration.h4);
        let h5 = i64::from(calibration.h5);
        let h6 = i64::from(calibration.h6);

        let offset = (((adc << 14) - (h4 << 20) - (h5 * x)) + 16_384) >> 15;
        let slope = (((((x * h6) >> 10) * (((x * h3) >> 11) + 32_768)) >> 10) + 2_097_152) * h2
            + 8192;
        let mut humidity = offset * (slope >> 14);
        humidity -= ((((humidity >> 15) * (humidity >> 15)) >> 7) * h1) >> 4;
        let humidity = humidity.clamp(0, 419_430_400);
        u32::try_from(humidity >> 12).ok()
    }

    /// Relative humidity in 0.001 %RH. `None` on a BMP280.
    #[must_use]
    pub fn humidity(&self) -> Option<u32> {
        self.humidity_q22_10().map(|q| (q * 1000) >> 10)
    }
}

// ============================================================================
// f64
// ============================================================================

/// `f64` compensation, for checking the integer results.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DataDouble {
    raw: Raw,
    calibration: Calibration,
    chip: Chip,
}

impl DataDouble {
    /// Wrap a raw burst.
    #[must_use]
    pub const fn new(raw: Raw, calibration: Calibration, chip: Chip) -> Self {
        Self {
            raw,
            calibration,
            chip,
        }
    }

    /// Fine temperature, truncated to an integer as the sensor formulas expect.
    #[must_use]
    pub fn t_fine(&self) -> i32 {
        self.temperature_terms() as i32
    }

    fn temperature_terms(&self) -> f64 {
        let calibration = &self.calibration;
        let adc = f64::from(adc_20(self.raw[3], self.raw[4], self.raw[5]));
        let t1 = f64::from(calibration.t1);
        let var1 = (adc / 16_384.0 - t1 / 1024.0) * f64::from(calibration.t2);
        let delta = adc / 131_072.0 - t1 / 8192.0;
        let var2 = delta * delta * f64::from(calibration.t3);
        var1 + var2
    }

    /// Temperature in °C.
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature_terms() / 5120.0
    }

    /// Pressure in Pa. Returns 0 when the calibration would divide by zero.
    #[must_use]
    pub fn pressure(&self) -> f64 {
        let calibration = &self.calibration;
        let mut var1 = f64::from(self.t_fine()) / 2.0 - 64_000.0;
        let mut var2 = var1 * var1 * f64::from(calibration.p6) / 32_768.0;
        var2 += var1 * f64::from(calibration.p5) * 2.0;
        var2 = var2 / 4.0 + f64::from(calibration.p4) * 65_536.0;
        var1 = (f64::from(calibration.p3) * var1 * var1 / 524_288.0
            + f64::from(calibration.p2) * var1)
            / 524_288.0;
        var1 = (1.0 + var1 / 32_768.0) * f64::from(calibration.p1);
        if var1 == 0.0 {
            return 0.0;
        }
        let adc = f64::from(adc_20(self.raw[0], self.raw[1], self.raw[2]));
        let mut pressure = 1_048_576.0 - adc;
        pressure = (pressure - var2 / 4096.0) * 6250.0 / var1;
        var1 = f64::from(calibration.p9) * pressure * pressure / 2_147_483_648.0;
        var2 = pressure * f64::from(calibration.p8) / 32_768.0;
        pressure + (var1 + var2 + f64::from(calibration.p7)) / 16.0
    }

    /// Relative humidity in %RH, clamped to 0..=100. `None` on a BMP280.
    #[must_use]
    pub fn humidity(&self) -> Option<f64> {
        if !self.chip.has_humidity() {
            return None;
        }
        let calibration = &self.calibration;
        let adc = f64::from(u16::from_be_bytes([self.raw[6], self.raw[7]]));
        let x = f64::from(self.t_fine()) - 76_800.0;
        let mut humidity = (adc
            - (f64::from(calibration.h4) * 64.0 + f64::from(calibration.h5) / 16_384.0 * x))
            * (f64::from(calibration.h2) / 65_536.0
                * (1.0
                    + f64::from(calibration.h6) / 67_108_864.0
                        * x
                        * (1.0 + f64::from(calibration.h3) / 67_108_864.0 * x)));
        humidity *= 1.0 - f64::from(calibration.h1) * humidity / 524_288.0;
        Some(humidity.clamp(0.0, 100.0))
    }
}

impl From<Data> for DataDouble {
    fn from(data: Data) -> Self {
        Self::new(data.raw, data.calibration, data.chip)
    }
}
