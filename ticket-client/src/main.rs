use anyhow::Context;
use clap::Parser;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};

// back pressure measurements
const LINE_BUFFER_COUNT: usize = 16;
const BLOCK_SIZE: usize = 2048;

const PROMPT: &str = "> ";

#[derive(Parser, Debug)]
#[command(about = "Interactive console for the ticketing server", version)]
struct Args {
    /// Host of the ticketing server
    #[arg(default_value = "127.0.0.1")]
    host: String,

    /// Port of the ticketing server
    #[arg(default_value_t = 12345)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let server = TcpStream::connect((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", args.host, args.port))?;
    let (sreader, swriter) = server.into_split();

    // once stdin runs dry the write half is closed, the replies still in flight keep coming
    let from_user = tokio::spawn(forward_lines(spawn_stdin_reader(), swriter));

    print_replies(sreader, tokio::io::stdout()).await?;
    println!("Server disconnected");

    // the server is gone, whatever the user still types has nowhere to go
    from_user.abort();

    Ok(())
}

// stdin is read on a plain thread, a blocking read there can't hold the runtime back on exit
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER_COUNT);

    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else {
                break;
            };

            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    rx
}

/// Sends every line to the server, then closes the writing side of the connection
async fn forward_lines<W>(mut lines: mpsc::Receiver<String>, mut writer: W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = lines.recv().await {
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }

    writer.shutdown().await?;

    Ok(())
}

/// Copies whatever the server sends until it closes the connection
///
/// replies are not framed, so a prompt follows every block that arrives.
async fn print_replies<R, W>(mut reader: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut block = vec![0u8; BLOCK_SIZE];
    loop {
        let rcount = reader.read(&mut block).await?;
        if rcount == 0 {
            break;
        }

        output.write_all(&block[..rcount]).await?;
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;
    }

    Ok(())
}
