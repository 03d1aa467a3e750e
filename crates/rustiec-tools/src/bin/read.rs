use clap::Parser;
use rustiec_client::{ClientAdapter, DeviceReader, Reading};
use rustiec_tools::device_settings;
use std::net::IpAddr;

#[derive(Parser, Debug)]
#[command(name = "iec104-read")]
struct Args {
    #[arg(long)]
    ip: IpAddr,
    #[arg(long, default_value_t = 2404)]
    port: u16,
    #[arg(long, default_value_t = 1)]
    ca: u16,
    /// Point address, `<type>:<ioa>` or a bare IOA.
    #[arg(long)]
    address: String,
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let adapter = ClientAdapter::new(device_settings(args.ip, args.port, args.ca, args.timeout_ms))?;
    let reader = DeviceReader::new(adapter);

    let result = reader.read(&args.address).await;
    reader.shutdown().await;
    match result {
        Ok(Reading::Value(sample)) => {
            if args.json {
                let out = serde_json::json!({
                    "address": args.address,
                    "type": sample.type_id.mnemonic(),
                    "value": sample.value,
                    "good": sample.is_good(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!(
                    "{} ({}){}",
                    sample.value,
                    sample.type_id,
                    if sample.is_good() { "" } else { " [not good]" }
                );
            }
        }
        Ok(Reading::Substituted(text)) => println!("{text}"),
        Err(e) => {
            eprintln!("read failed: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
