use std::env;

use evohome_client::{AuthScheme, EvohomeClient, HttpTransport, MessageLogMode};

#[tokio::main]
async fn main() -> evohome_client::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let (Some(username), Some(password)) = (args.get(1), args.get(2)) else {
        eprintln!("usage: temperatures <username> <password> [--backup <file>] [--log <file>]");
        std::process::exit(2);
    };
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
    };

    let transport = HttpTransport::builder(AuthScheme::OAuth)
        .credentials(username, password)
        .build()?;
    let mut builder = EvohomeClient::builder(transport);
    if let Some(path) = flag("--log") {
        builder = builder.message_log(MessageLogMode::Diffed, path);
    }
    let mut client = builder.build()?;

    client.installation().await?;
    let system_id = client.single_system()?.id.clone();

    for row in client.temperatures(&system_id).await? {
        let temp = row
            .temp
            .map(|t| format!("{t:.1}\u{00b0}C"))
            .unwrap_or_else(|| "unavailable".to_string());
        match row.setpoint {
            Some(sp) => println!("[{}] {} -> {sp:.1}\u{00b0}C", row.name, temp),
            None => println!("[hot water] {temp}"),
        }
    }

    if let Some(path) = flag("--backup") {
        client.backup_schedules_to(&system_id, path).await?;
        println!("Schedules saved to {path}");
    }

    Ok(())
}
