// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Several tasks sharing a single serial line

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    use tokio_modbus_rtu::prelude::*;

    const SLAVE_1: Slave = Slave(0x01);
    const SLAVE_2: Slave = Slave(0x02);

    env_logger::init();

    let config = Config::new("/dev/ttyUSB0").with_baud_rate(19200);
    println!("Configuration: {config:?}");

    let shared = rtu::connect(&config).await?.into_shared();

    let tasks = [SLAVE_1, SLAVE_2].map(|slave| {
        let mut ctx = shared.clone();
        ctx.set_slave(slave);
        tokio::spawn(async move {
            let rsp = ctx.read_holding_registers(0x082B, 2).await?;
            println!("Sensor value for device {slave} is: {rsp:?}");
            Ok::<_, Error>(())
        })
    });
    for task in tasks {
        task.await??;
    }

    Ok(())
}
