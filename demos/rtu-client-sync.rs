// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous RTU client example

fn main() -> anyhow::Result<()> {
    use tokio_modbus_rtu::prelude::*;

    env_logger::init();

    let tty_path = "/dev/ttyUSB0";
    let slave = Slave(0x17);

    let config = Config::new(tty_path)
        .with_baud_rate(19200)
        .with_parity(Parity::Even);

    let mut ctx = sync::rtu::connect_slave(&config, slave)?;
    println!("Reading a sensor value");
    let rsp = ctx.read_holding_registers(0x082B, 2)?;
    println!("Sensor value is: {rsp:?}");

    println!("Discarded {} byte(s) of pending input", ctx.flush()?);
    ctx.disconnect()?;

    Ok(())
}
