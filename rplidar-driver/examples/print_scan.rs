use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, Command};
use rplidar_driver::{
    check_device_health, get_device_info, run_driver_with_transport, DriverConfig, Result,
    SerialTransport,
};

fn get_port_name() -> String {
    let matches = Command::new("Lidar scan printer.")
        .about("Reads LiDAR scans and prints them to stdout.")
        .disable_version_flag(true)
        .arg(
            Arg::new("port")
                .help("Serial port device name.")
                .required(true),
        )
        .get_matches();

    let port_name = matches.get_one::<String>("port").unwrap();
    port_name.to_string()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port_name = get_port_name();
    let config = DriverConfig::default();

    let mut transport = SerialTransport::open(&port_name, config.baud_rate)?;
    check_device_health(&mut transport)?;
    let info = get_device_info(&mut transport)?;
    println!("Model number : {}", info.model_number);
    println!(
        "Firmware     : {}.{}",
        info.firmware_major_version, info.firmware_minor_version
    );
    println!("Hardware     : {}", info.hardware_version);
    println!(
        "Serial number: {}",
        info.serial_number
            .map(|b| format!("{:02X}", b))
            .join("")
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let mut lidar = run_driver_with_transport(Box::new(transport), config)?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_secs(1));

        let scan = lidar.get_scan();
        println!("New scan: angle | distance | quality");
        for bearing in 0..scan.distances_mm.len() {
            println!(
                "{:15} | {:5} mm | {:3}",
                bearing, scan.distances_mm[bearing], scan.qualities[bearing]
            );
        }
    }

    lidar.request_stop();
    lidar.join()
}
