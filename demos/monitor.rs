use ibootpdu::PduClient;
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> ibootpdu::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let host = args
        .get(1)
        .expect("usage: monitor <host> [--http] [--sequences a,b]");
    let use_http = args.iter().any(|a| a == "--http");
    let sequences = args
        .iter()
        .position(|a| a == "--sequences")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_default();

    let user = env::var("IBOOT_USER").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("IBOOT_PASSWORD").unwrap_or_default();

    let mut builder = PduClient::builder(host)
        .credentials(user, password)
        .sequences(&sequences)
        .on_event(|event| {
            println!("{event:?}");
        })
        .on_snapshot(|snapshot| {
            for (name, value) in &snapshot.statistics {
                if name.ends_with("#OutletControl") || name.ends_with("#Status") {
                    println!("{name}: {value}");
                }
            }
            for (name, value) in snapshot.statistics.iter().filter(|(k, _)| k.ends_with(')')) {
                println!("{name}: {value}");
            }
        });

    if use_http {
        builder = builder.protocol("http");
    }

    let client = builder.build()?;

    println!("Polling {}...", client.base_url());
    loop {
        match client.poll().await {
            Ok(snapshot) => {
                if let Ok(json) = serde_json::to_string(&*snapshot) {
                    tracing::debug!(snapshot = %json, "published");
                }
            }
            Err(e) => eprintln!("Poll error: {e}"),
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
}
