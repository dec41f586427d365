//! Simple IRC client example.
//!
//! Connects, joins a channel, and echoes greetings back, using the
//! high-level `Client` facade (registration, keepalive, and reconnect are
//! handled for you).

use ircflow::{Client, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut config = Config::new("irc.libera.chat", 6697, "example_bot");
    config.ssl = true;

    let client = Client::new(config)?;

    client
        .add_handler("PRIVMSG", |msg| {
            let Some(text) = &msg.trailing else { return };
            if text.to_lowercase().contains("hello") {
                println!("← {msg}");
            }
        })
        .await;

    client.connect().await?;
    client.join(&["#example"])?;
    client.message("#example", "Hello from ircflow!")?;

    let mut notify = client.subscribe();
    while notify.recv().await.is_ok() {}

    client.quit("Goodbye!").await;
    Ok(())
}
