use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

// longer lines are split, the remainder is read as the next line
pub const MAX_LINE_SIZE: usize = 1024;

/// A line oriented connection to a single client
pub struct Connection<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Reads a single line, without its line terminator
    ///
    /// returns None once the client has closed its side of the connection.
    pub async fn read_line(&mut self) -> tokio::io::Result<Option<String>> {
        let mut raw = Vec::with_capacity(MAX_LINE_SIZE);
        let rcount = (&mut self.reader)
            .take(MAX_LINE_SIZE as u64)
            .read_until(b'\n', &mut raw)
            .await?;
        if rcount == 0 {
            return Ok(None);
        }

        // a client typing garbage shouldn't cost it the session
        let line = String::from_utf8_lossy(&raw);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }

    /// Writes a reply as is and flushes it
    pub async fn send(&mut self, reply: &str) -> tokio::io::Result<()> {
        self.writer.write_all(reply.as_bytes()).await?;
        self.writer.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::{Connection, MAX_LINE_SIZE};

    #[tokio::test]
    async fn reads_lines_until_eof() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server);
        let mut connection = Connection::new(reader, writer);

        client
            .write_all(b"IDENT alice user\r\nhelp\nlist")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(
            connection.read_line().await.unwrap().as_deref(),
            Some("IDENT alice user")
        );
        assert_eq!(connection.read_line().await.unwrap().as_deref(), Some("help"));
        assert_eq!(connection.read_line().await.unwrap().as_deref(), Some("list"));
        assert_eq!(connection.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn splits_oversized_lines() {
        let (mut client, server) = tokio::io::duplex(4 * MAX_LINE_SIZE);
        let (reader, writer) = tokio::io::split(server);
        let mut connection = Connection::new(reader, writer);

        let mut payload = "a".repeat(MAX_LINE_SIZE + 10);
        payload.push('\n');
        client.write_all(payload.as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(
            connection.read_line().await.unwrap().map(|line| line.len()),
            Some(MAX_LINE_SIZE)
        );
        assert_eq!(
            connection.read_line().await.unwrap().map(|line| line.len()),
            Some(10)
        );
        assert_eq!(connection.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn replies_are_written_verbatim() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server);
        let mut connection = Connection::new(reader, writer);

        connection.send("Ticket taken.\n").await.unwrap();
        drop(connection);

        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "Ticket taken.\n");
    }
}
