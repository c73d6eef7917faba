use embedded_hal_mock::delay::MockNoop;
use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction};
use pretty_assertions::assert_eq;

use meter_units::dual_kmeter::{self, Channel};
use meter_units::kmeter_iso;
use meter_units::{DualKmeter, KmeterIso, PeriodicMeasurement};

fn read8(addr: u8, reg: u8, v: u8) -> Transaction {
    Transaction::write_read(addr, vec![reg], vec![v])
}

fn read_temp(addr: u8, reg: u8, centi: i32) -> Transaction {
    Transaction::write_read(addr, vec![reg], centi.to_le_bytes().to_vec())
}

#[test]
fn two_units_share_one_bus() {
    let dual_address = dual_kmeter::dip_switch_address(0);
    let expectations = [
        // KmeterISO begin
        read8(kmeter_iso::ADDRESS, 0xFE, 0x01),
        // DualKmeter begin
        read8(dual_address, 0xFE, 0x02),
        Transaction::write(dual_address, vec![0x20, 0x00]),
        read8(dual_address, 0x20, 0x00),
        // First round
        read8(0x66, 0x20, 0x00),
        read_temp(0x66, 0x00, 2150),
        read8(dual_address, 0x30, 0x00),
        read_temp(dual_address, 0x00, 40000),
        // Second round, the thermocouple converter is still busy
        read8(0x66, 0x20, 0x00),
        read_temp(0x66, 0x00, 2175),
        read8(dual_address, 0x30, 0x01),
    ];
    let mut mock = I2cMock::new(&expectations);
    let bus = shared_bus::BusManagerSimple::new(mock.clone());

    let mut iso = KmeterIso::new(bus.acquire_i2c(), MockNoop::new(), kmeter_iso::ADDRESS);
    let mut dual = DualKmeter::new(bus.acquire_i2c(), MockNoop::new(), dual_address);
    iso.begin().unwrap();
    dual.begin().unwrap();
    assert_eq!(dual.channel(), Channel::One);

    for now in [0, 100] {
        assert!(iso.update(now, false));
        assert_eq!(dual.update(now, false), now == 0);
    }

    assert_eq!(iso.available(), 1);
    assert_eq!(iso.temperature(), 21.75);
    assert_eq!(dual.latest().map(|d| d.temperature()), Some(400.0));
    assert_eq!(dual.latest().map(|d| d.channel), Some(Channel::One));

    mock.done();
}
