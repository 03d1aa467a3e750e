use clap::Parser;
use rustiec_client::{parse_inferred, parse_value, resolve, ClientAdapter};
use rustiec_tools::{device_settings, ValueKindArg};
use std::net::IpAddr;

#[derive(Parser, Debug)]
#[command(name = "iec104-write")]
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
    #[arg(long)]
    value: String,
    /// Value interpretation; inferred from the text when omitted.
    #[arg(long, value_enum)]
    kind: Option<ValueKindArg>,
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let adapter = ClientAdapter::new(device_settings(args.ip, args.port, args.ca, args.timeout_ms))?;
    let point = resolve(&args.address, adapter.learned_types())?;
    let value = match args.kind {
        Some(kind) => parse_value(&args.value, kind.into_point_kind())?,
        None => parse_inferred(&args.value),
    };

    let result = adapter.write(point.ioa, point.type_id, &value).await;
    adapter.shutdown().await;
    match result {
        Ok(()) => println!("IOA {} <- {value}: confirmed", point.ioa),
        Err(e) => {
            eprintln!("write failed: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
