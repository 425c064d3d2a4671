mod common;

use bus_envoy::Error;
use bus_envoy::i2c::{I2cDevice, I2cMaster, SharedI2cBus};
use bus_envoy::ssd1306::{
    self, BUFFER_SIZE, Command, Frame, Rotation, ScrollDirection, ScrollInterval, Ssd1306,
};
use common::{FakeDevice, FakeI2c, I2cEvent, writes_to};
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

fn display_bus() -> (SharedI2cBus<NoopRawMutex, FakeI2c>, common::I2cLog) {
    let fake = FakeI2c::new().with_device(0x3C, FakeDevice::new());
    let log = fake.log();
    (SharedI2cBus::new(I2cMaster::new(fake)), log)
}

#[test]
fn frame_uses_page_layout() {
    let mut frame = Frame::new();
    frame.set_pixel(3, 10, true);
    frame.set_pixel(127, 63, true);
    frame.set_pixel(128, 0, true);

    assert!(frame.pixel(3, 10));
    assert!(!frame.pixel(3, 11));
    assert!(!frame.pixel(128, 0));
    assert_eq!(frame.as_bytes()[128 + 3], 0b0000_0100);
    assert_eq!(frame.as_bytes()[BUFFER_SIZE - 1], 0b1000_0000);

    frame.set_pixel(3, 10, false);
    assert_eq!(frame.as_bytes()[128 + 3], 0);
}

#[test]
fn frame_is_an_embedded_graphics_target() {
    let mut frame = Frame::default();
    assert_eq!(frame.size(), Size::new(128, 64));

    Rectangle::new(Point::new(0, 0), Size::new(4, 8))
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
        .draw(&mut frame)
        .expect("drawing on a frame is infallible");
    Pixel(Point::new(-1, 5), BinaryColor::On)
        .draw(&mut frame)
        .expect("drawing on a frame is infallible");

    assert_eq!(&frame.as_bytes()[0..5], &[0xFF, 0xFF, 0xFF, 0xFF, 0x00]);
    assert_eq!(frame.as_bytes().iter().filter(|byte| **byte != 0).count(), 4);
}

#[test]
fn initialize_sends_the_power_up_sequence() {
    let (bus, log) = display_bus();
    let mut display = Ssd1306::new(I2cDevice::new(&bus, ssd1306::ADDRESS));

    block_on(display.initialize()).expect("initialize must succeed");

    let writes = writes_to(&log, 0x3C);
    assert_eq!(writes.len(), 18);
    assert_eq!(writes[0], vec![0x80, 0xAE]);
    assert_eq!(writes[1], vec![0x80, 0xD5, 0x80, 0x80]);
    assert_eq!(writes[4], vec![0x80, 0x40]);
    assert_eq!(writes[7], vec![0x80, 0xA1]);
    assert_eq!(writes[8], vec![0x80, 0xC8]);
    assert_eq!(writes[15], vec![0x80, 0x21, 0x80, 0x00, 0x80, 0x7F]);
    assert_eq!(writes[17], vec![0x80, 0xAF]);
}

#[test]
fn initialize_stops_at_the_first_failure() {
    let fake = FakeI2c::new();
    let log = fake.log();
    let bus: SharedI2cBus<NoopRawMutex, _> = SharedI2cBus::new(I2cMaster::new(fake));
    let mut display = Ssd1306::new(I2cDevice::new(&bus, ssd1306::ADDRESS));

    assert!(block_on(display.initialize()).is_err());
    assert_eq!(block_on(display.ping()), Ok(false));
    let starts = log
        .borrow()
        .iter()
        .filter(|event| matches!(event, I2cEvent::Start(_)))
        .count();
    assert_eq!(starts, 2);
}

#[test]
fn too_many_arguments_are_rejected_without_traffic() {
    let (bus, log) = display_bus();
    let mut display = Ssd1306::new(I2cDevice::new(&bus, ssd1306::ADDRESS));

    assert_eq!(
        block_on(display.write_command(Command::SetRightHorizontalScroll, &[0; 7])),
        Err(Error::BufferTooSmall {
            needed: 16,
            capacity: 14
        })
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn settings_send_single_commands() {
    let (bus, log) = display_bus();
    let mut display = Ssd1306::new(I2cDevice::new(&bus, ssd1306::ADDRESS));

    block_on(async {
        display.set_contrast(0x7F).await?;
        display.set_inverted(true).await?;
        display.set_rotation(Rotation::Rotated180).await?;
        display.set_display_on(false).await
    })
    .expect("settings must succeed");

    assert_eq!(
        writes_to(&log, 0x3C),
        vec![
            vec![0x80, 0x81, 0x80, 0x7F],
            vec![0x80, 0xA7],
            vec![0x80, 0xA0],
            vec![0x80, 0xC0],
            vec![0x80, 0xAE],
        ]
    );
}

#[test]
fn horizontal_scroll_is_deactivated_configured_and_activated() {
    let (bus, log) = display_bus();
    let mut display = Ssd1306::new(I2cDevice::new(&bus, ssd1306::ADDRESS));

    block_on(display.start_horizontal_scroll(
        ScrollDirection::Right,
        2,
        9,
        ScrollInterval::Frames2,
    ))
    .expect("scroll must succeed");
    block_on(display.stop_scroll()).expect("stop must succeed");

    assert_eq!(
        writes_to(&log, 0x3C),
        vec![
            vec![0x80, 0x2E],
            vec![
                0x80, 0x26, 0x80, 0x00, 0x80, 0x02, 0x80, 0x07, 0x80, 0x07, 0x80, 0x00, 0x80,
                0xFF,
            ],
            vec![0x80, 0x2F],
            vec![0x80, 0x2E],
        ]
    );
}

#[test]
fn write_display_sends_the_frame_in_one_transaction() {
    let (bus, log) = display_bus();
    let mut display = Ssd1306::new(I2cDevice::new(&bus, ssd1306::ADDRESS));
    display.frame_mut().set_pixel(0, 0, true);

    block_on(display.write_display()).expect("frame write must succeed");

    let log = log.borrow();
    assert_eq!(log.first(), Some(&I2cEvent::Start(0x3C)));
    assert_eq!(log.get(1), Some(&I2cEvent::Write(0x3C, vec![0x40])));
    match log.get(2) {
        Some(I2cEvent::Write(0x3C, bytes)) => {
            assert_eq!(bytes.len(), BUFFER_SIZE);
            assert_eq!(bytes[0], 0x01);
            assert_eq!(bytes.as_slice(), display.frame().as_bytes());
        }
        other => panic!("expected the frame payload, got {other:?}"),
    }
    assert_eq!(log.get(3), Some(&I2cEvent::Stop(0x3C)));
    assert_eq!(log.len(), 4);
}
