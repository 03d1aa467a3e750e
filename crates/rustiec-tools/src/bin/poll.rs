use clap::Parser;
use rustiec_client::{ClientAdapter, DeviceReader, DeviceSettings};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "iec104-poll")]
struct Args {
    /// Device descriptor `ip|port|ca|originator|cotLen|caLen|ioaLen|maxReadTimes|blockRanges`.
    #[arg(long)]
    device: String,
    /// Number of polling rounds.
    #[arg(long, default_value_t = 10)]
    count: u32,
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let settings = DeviceSettings::from_descriptor(&args.device)?;
    if settings.block_ranges.is_empty() {
        eprintln!("descriptor has no block ranges to poll");
        std::process::exit(2);
    }
    let reader = DeviceReader::new(ClientAdapter::new(settings)?);

    for round in 1..=args.count {
        if !reader.is_device_healthy().await {
            eprintln!("round {round}: device unhealthy");
        }
        let values = reader.read_multi().await;
        if args.json {
            let rows: Vec<_> = values
                .iter()
                .map(|(ioa, s)| {
                    serde_json::json!({
                        "ioa": ioa,
                        "type": s.type_id.mnemonic(),
                        "value": s.value,
                        "good": s.is_good(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string(&rows)?);
        } else {
            println!("round {round}: {} point(s)", values.len());
            for (ioa, sample) in &values {
                println!("  {ioa:>8} {:<10} {}", sample.type_id.mnemonic(), sample.value);
            }
        }
        tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
    }

    reader.shutdown().await;
    Ok(())
}
