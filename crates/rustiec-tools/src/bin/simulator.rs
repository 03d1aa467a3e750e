use clap::Parser;
use rustiec_client::SimulatedStation;
use rustiec_core::element::{BinaryCounterReading, InformationElement};
use rustiec_core::types::{Quality, TypeId};
use rustiec_link::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "iec104-simulator")]
struct Args {
    #[arg(long, default_value = "0.0.0.0:2404")]
    bind: SocketAddr,
    /// Common address of the station.
    #[arg(long, default_value_t = 1)]
    ca: u16,
    /// Number of float measurements, IOA 100 onwards.
    #[arg(long, default_value_t = 3)]
    floats: u32,
    /// Number of single points, IOA 1 onwards.
    #[arg(long, default_value_t = 2)]
    singles: u32,
    /// Number of integrated totals, IOA 500 onwards.
    #[arg(long, default_value_t = 1)]
    counters: u32,
    #[arg(long, default_value_t = 10)]
    max_connections: usize,
    /// Period of spontaneous measurement changes; 0 disables them.
    #[arg(long, default_value_t = 2000)]
    period_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let station = Arc::new(SimulatedStation::new(args.ca));

    for i in 0..args.singles {
        station.set_point(
            1 + i,
            TypeId::SinglePoint,
            InformationElement::SinglePoint {
                value: false,
                quality: Quality::GOOD,
            },
        )?;
    }
    for i in 0..args.floats {
        station.set_point(
            100 + i,
            TypeId::MeasuredFloat,
            InformationElement::Float {
                value: 0.0,
                quality: Quality::GOOD,
            },
        )?;
    }
    for i in 0..args.counters {
        station.set_point(
            500 + i,
            TypeId::IntegratedTotals,
            InformationElement::Counter(BinaryCounterReading::default()),
        )?;
    }

    let server = station
        .serve(ServerConfig::new(args.bind).with_max_connections(args.max_connections))
        .await?;
    println!(
        "Simulated station CA {} on {} ({} SP, {} float, {} totals). Ctrl+C to stop.",
        args.ca,
        server.local_addr(),
        args.singles,
        args.floats,
        args.counters
    );

    if args.period_ms == 0 || args.floats == 0 {
        std::future::pending::<()>().await;
    }
    let mut ticker = tokio::time::interval(Duration::from_millis(args.period_ms));
    let mut tick: u32 = 0;
    loop {
        ticker.tick().await;
        tick = tick.wrapping_add(1);
        let ioa = 100 + tick % args.floats;
        let value = (tick as f32 * 0.5).sin() * 100.0;
        let reached = station.update(
            &server,
            ioa,
            InformationElement::Float {
                value,
                quality: Quality::GOOD,
            },
        )?;
        log::debug!("IOA {ioa} = {value:.2}, sent to {reached} client(s)");
    }
}
