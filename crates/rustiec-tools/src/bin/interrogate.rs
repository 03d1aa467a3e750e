use clap::Parser;
use rustiec_core::element::QOI_STATION;
use rustiec_core::types::{Cause, TypeId};
use rustiec_link::{Session, SessionConfig, SessionEvent};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

#[derive(Parser, Debug)]
#[command(name = "iec104-interrogate")]
struct Args {
    #[arg(long)]
    ip: IpAddr,
    #[arg(long, default_value_t = 2404)]
    port: u16,
    #[arg(long, default_value_t = 1)]
    ca: u16,
    /// Qualifier of interrogation; 20 is station, 21..=36 are groups.
    #[arg(long, default_value_t = QOI_STATION)]
    qoi: u8,
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = Session::new(SessionConfig::default(), Arc::new(tx));
    session.connect(SocketAddr::new(args.ip, args.port)).await?;
    session.interrogation(args.ca, args.qoi).await?;

    let deadline = Instant::now() + Duration::from_millis(args.timeout_ms);
    let mut points = 0usize;
    loop {
        let asdu = match timeout_at(deadline, rx.recv()).await {
            Ok(Some(SessionEvent::Asdu(asdu))) => asdu,
            Ok(Some(SessionEvent::Closed(reason))) => {
                eprintln!("connection closed: {}", reason.unwrap_or_default());
                break;
            }
            Ok(None) | Err(_) => {
                eprintln!("no activation termination within {} ms", args.timeout_ms);
                break;
            }
        };
        if asdu.type_id == TypeId::Interrogation {
            if asdu.cot.negative {
                eprintln!("interrogation rejected ({:?})", asdu.cot.cause);
                break;
            }
            if asdu.cot.cause == Cause::ActivationTerm {
                break;
            }
            continue;
        }
        if args.json {
            println!("{}", serde_json::to_string(&asdu)?);
        } else {
            for (ioa, group) in asdu.points() {
                println!("{:>8} {} {:?}", ioa, asdu.type_id, group.element);
            }
        }
        points += asdu.element_count();
    }

    session.disconnect().await;
    println!("{points} point(s)");
    Ok(())
}
