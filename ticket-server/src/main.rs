use std::net::SocketAddr;

use clap::Parser;
use ticket_server::{connection::Connection, session, tickets::TicketStore};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

type SharedTicketStore = &'static TicketStore;

#[derive(Parser, Debug)]
#[command(about = "Multi-client support ticketing server", version)]
struct Args {
    /// Address the server listens on
    #[arg(long, env = "TICKET_SERVER_ADDR", default_value = "127.0.0.1:12345")]
    addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // connect tracing to stdout, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = TicketStore::shared();

    let listener = TcpListener::bind(&args.addr).await?;
    tracing::info!("ticketing server listening on: {}", listener.local_addr()?);

    loop {
        let (conn, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!("failed to accept a connection: {}", err);
                continue;
            }
        };

        tokio::spawn(handle_connection(conn, peer, store));
    }
}

async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, store: SharedTicketStore) {
    tracing::debug!("{} connected", peer);

    let (reader, writer) = stream.split();
    let connection = Connection::new(reader, writer);

    // a broken connection only ends its own session
    if let Err(err) = session::serve(connection, store).await {
        tracing::debug!("session with {} ended with an error: {}", peer, err);
    }

    tracing::debug!("{} disconnected", peer);
}
