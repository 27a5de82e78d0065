//! Polls an AM2315 on a Raspberry Pi and prints every reading.
//!
//! Stops after the first failed measurement, like the driver's poller does.

use am2315::{Config, DeviceAddress, Poller, linux};

const PERIOD_MS: u32 = 2_000;

fn main() {
    let config = Config {
        address: DeviceAddress::AM2315,
        ..Config::default()
    };

    let (mut sensor, info) = match linux::open(config) {
        Ok(opened) => opened,
        Err(err) => {
            eprintln!("could not initialize the AM2315 on /dev/i2c-{}: {err}", config.bus);
            std::process::exit(1);
        }
    };

    let others: Vec<String> = info
        .responding
        .iter()
        .map(|address| format!("{:#04x}", address.get()))
        .collect();
    println!(
        "sensor ready at {:#04x}, bus shows [{}]",
        info.address.get(),
        others.join(", ")
    );

    let poller = Poller::new();
    poller.start(
        &mut sensor,
        PERIOD_MS,
        |sample| {
            println!(
                "[{:>8} ms] relative humidity={:.1}%; temperature={:.1}C",
                sample.timestamp.as_millis(),
                sample.humidity_percent,
                sample.temperature_celsius
            )
        },
        |err| eprintln!("measurement failed, polling stopped: {err}"),
    );
}
