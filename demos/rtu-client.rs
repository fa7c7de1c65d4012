// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous RTU client example

use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    use tokio_modbus_rtu::prelude::*;

    env_logger::init();

    let tty_path = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_owned());
    let slave = Slave(0x01);

    let config = Config::new(tty_path)
        .with_baud_rate(115_200)
        .with_response_timeout(Duration::from_millis(500))
        .with_max_retries(3);

    let mut ctx = rtu::connect_slave(&config, slave).await?;

    println!("Reading holding registers");
    let rsp = ctx.read_holding_registers(0x0000, 10).await?;
    println!("Holding registers: {rsp:?}");

    println!("Writing holding registers");
    let cnt = ctx.write_multiple_registers(0x0000, &[1, 2, 3]).await?;
    println!("Wrote {cnt} register(s)");

    println!("Reading input registers");
    match ctx.read_input_registers(0x0000, 4).await {
        Ok(rsp) => println!("Input registers: {rsp:?}"),
        Err(Error::Exception { exception, .. }) => println!("Rejected by slave: {exception}"),
        Err(err) => return Err(err.into()),
    }

    println!("Disconnecting");
    ctx.disconnect().await?;

    Ok(())
}
