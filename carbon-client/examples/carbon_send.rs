use std::{thread::sleep, time::Duration};

use carbon_client::CarbonClientBuilder;

fn main() {
    tracing_subscriber::fmt::init();

    let mut client = CarbonClientBuilder::default()
        .with_flush_interval(Duration::from_secs(5))
        .build()
        .expect("failed to build Carbon client");

    client.init("localhost", 2003).expect("failed to resolve Carbon server");

    // Loop over and over, pretending to take measurements.
    let mut iterations: u64 = 0;
    loop {
        iterations += 1;
        if let Err(e) = client.send("demo.carbon_send.iterations", iterations, None) {
            eprintln!("failed to send: {}", e);
        }

        sleep(Duration::from_millis(250));
    }
}
