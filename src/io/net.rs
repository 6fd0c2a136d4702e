use crate::{
    error::{IsolationError, Result},
    io::progress::emit_download_progress,
};
use reqwest::blocking::Client;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
    time::Duration,
};
use tracing::{debug, info};

const USER_AGENT: &str = concat!("voice-isolation/", env!("CARGO_PKG_VERSION"));

pub fn http_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60 * 60))
        .build()?;
    Ok(client)
}

/// Writer that reports every chunk to the download progress observer.
struct ProgressWriter<W> {
    inner: W,
    written: u64,
    total: u64,
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        emit_download_progress(self.written, self.total);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Stream `url` into `dest` through a `.part` file, renamed into place only
/// once the body is complete.
pub fn download_with_progress(client: &Client, url: &str, dest: &Path) -> Result<()> {
    let part = dest.with_extension("part");

    info!(url, dest = %dest.display(), "downloading model weights");
    let mut resp = client.get(url).send()?.error_for_status()?;
    let total = resp.content_length().unwrap_or(0);
    emit_download_progress(0, total);

    let mut writer = ProgressWriter {
        inner: BufWriter::new(File::create(&part)?),
        written: 0,
        total,
    };
    let copied = io::copy(&mut resp, &mut writer)?;
    writer.flush()?;
    drop(writer);

    if total > 0 && copied != total {
        fs::remove_file(&part).ok();
        return Err(IsolationError::ModelLoad(format!(
            "download of {url} ended after {copied} of {total} bytes"
        )));
    }

    if dest.exists() {
        fs::remove_file(dest).ok();
    }
    fs::rename(&part, dest)?;
    debug!(bytes = copied, "download complete");

    emit_download_progress(copied, copied.max(total));
    Ok(())
}
