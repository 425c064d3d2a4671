mod common;

use core::pin::pin;

use bus_envoy::i2c::{Address, I2cDevice, I2cMaster, SharedI2cBus, WriteTransaction};
use bus_envoy::resumable::{Resumable, Resume};
use common::{FakeDevice, FakeI2c, I2cEvent};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

const SENSOR: Address = Address::from_const(0x1D);

async fn count_steps(steps: u32) -> u32 {
    for _ in 0..steps {
        yield_now().await;
    }
    steps
}

#[test]
fn resume_steps_until_finished() {
    let slot = pin!(Some(count_steps(3)));
    let mut task = Resumable::new(slot);

    for _ in 0..3 {
        assert_eq!(task.resume(), Resume::Running);
        assert!(task.is_running());
    }
    assert_eq!(task.resume(), Resume::Finished(3));
    assert!(!task.is_running());
    assert_eq!(task.resume(), Resume::Idle);
}

#[test]
fn start_refuses_while_running_and_accepts_after() {
    let slot = pin!(None);
    let mut task = Resumable::new(slot);

    assert!(task.start(count_steps(1)));
    assert!(!task.start(count_steps(5)));
    assert!(task.resume().is_running());
    assert_eq!(task.resume().finished(), Some(1));

    assert!(task.start(count_steps(0)));
    assert_eq!(task.resume(), Resume::Finished(0));
}

#[test]
fn stop_on_an_empty_slot_reports_nothing_stopped() {
    let slot = pin!(None::<core::future::Ready<()>>);
    let mut task = Resumable::new(slot);

    assert!(!task.stop());
    assert_eq!(task.resume(), Resume::Idle);
}

#[test]
fn finish_blocking_runs_to_completion() {
    let slot = pin!(Some(count_steps(10)));
    let mut task = Resumable::new(slot);

    assert_eq!(task.resume(), Resume::Running);
    assert_eq!(task.finish_blocking(), Some(10));
    assert_eq!(task.finish_blocking(), None);
}

#[test]
fn superloop_reads_a_register_between_other_work() {
    let fake = FakeI2c::new()
        .with_device(0x1D, FakeDevice::new().with_register(0x0F, 0x3B))
        .yielding();
    let bus: SharedI2cBus<NoopRawMutex, _> = SharedI2cBus::new(I2cMaster::new(fake));
    let mut device = I2cDevice::new(&bus, SENSOR);

    let slot = pin!(Some(device.read_register(0x0F)));
    let mut task = Resumable::new(slot);
    let mut other_work = 0;
    let identity = loop {
        match task.resume() {
            Resume::Finished(result) => break result,
            Resume::Running => other_work += 1,
            Resume::Idle => unreachable!("the slot was filled"),
        }
    };

    assert_eq!(identity, Ok(0x3B));
    assert!(other_work > 0);
}

#[test]
fn stop_mid_transaction_releases_the_bus() {
    let fake = FakeI2c::new()
        .with_device(0x1D, FakeDevice::new())
        .yielding();
    let log = fake.log();
    let bus: SharedI2cBus<NoopRawMutex, _> = SharedI2cBus::new(I2cMaster::new(fake));
    let mut device = I2cDevice::new(&bus, SENSOR);
    let mut transaction = WriteTransaction::new(SENSOR);
    transaction
        .configure_write(&[0x20, 0x47])
        .expect("idle transaction must accept a configuration");

    {
        let slot = pin!(Some(device.run(&mut transaction)));
        let mut task = Resumable::new(slot);
        assert_eq!(task.resume(), Resume::Running);
        assert!(bus.try_lock().is_err());

        assert!(task.stop());
        assert!(!task.is_running());
        assert!(bus.try_lock().is_ok());
    }

    assert_eq!(
        transaction.state(),
        bus_envoy::i2c::TransactionState::Error
    );
    assert_eq!(*log.borrow(), vec![I2cEvent::Start(0x1D)]);
}
