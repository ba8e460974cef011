//! TCP Chat Client - Entry Point
//!
//! Asks for the server address and username when they are not given on the
//! command line, then chats until `quit`, end of input, or disconnect.

use clap::Parser;
use tokio::io::{stdin, stdout, AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use tcp_chat::chat_client::QUIT_COMMAND;
use tcp_chat::{ChatClient, ClientConfig};

const DEFAULT_SERVER: &str = "127.0.0.1";
const DEFAULT_USERNAME: &str = "anonymous";
const SERVER_QUESTION: &str = "Server IP address (localhost or 127.0.0.1): ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Diagnostics go to stderr so chat output on stdout stays verbatim
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tcp_chat=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::parse();
    let mut input = BufReader::new(stdin());

    let server = match config.server {
        Some(server) => server,
        None => prompt(&mut input, SERVER_QUESTION, DEFAULT_SERVER).await?,
    };

    let mut client = match ChatClient::connect(&server, config.port).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            return Err(e.into());
        }
    };
    println!("Connected to {}:{}", server, config.port);

    let username = match config.username {
        Some(username) => username,
        None => prompt(&mut input, "Your username: ", DEFAULT_USERNAME).await?,
    };
    client.set_username(&username).await?;

    println!("Start chatting (type '{}' to leave)", QUIT_COMMAND);
    client.run(input, stdout()).await?;
    Ok(())
}

/// Print `question` and read one line, falling back to `default` when it is empty
async fn prompt<I>(input: &mut I, question: &str, default: &str) -> std::io::Result<String>
where
    I: AsyncBufRead + Unpin,
{
    let mut out = stdout();
    out.write_all(question.as_bytes()).await?;
    out.flush().await?;

    let mut answer = String::new();
    input.read_line(&mut answer).await?;
    let answer = answer.trim_end_matches(['\r', '\n']);
    if answer.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(answer.to_string())
    }
}
