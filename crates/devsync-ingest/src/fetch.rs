//! Archive fetcher
//!
//! Turns an archive reference into a lazy, single-pass byte stream. Nothing is
//! opened until the stream is first polled, so a missing file or an
//! unreachable host shows up as the first stream item rather than at call time.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::Url;

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Raw archive bytes, as they arrive
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Where an archive reference points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveLocation {
    Local(PathBuf),
    Remote(Url),
}

impl ArchiveLocation {
    /// References without a transport scheme are filesystem paths.
    pub fn resolve(reference: &str) -> Self {
        match Url::parse(reference) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(ArchiveLocation::Local)
                .unwrap_or_else(|_| ArchiveLocation::Local(PathBuf::from(url.path()))),
            // single-letter schemes are drive letters ("C:\exports\...")
            Ok(url) if url.scheme().len() > 1 => ArchiveLocation::Remote(url),
            _ => ArchiveLocation::Local(PathBuf::from(reference)),
        }
    }

    /// Last path segment, ignoring any query string or fragment on URLs
    pub fn file_name(&self) -> String {
        match self {
            ArchiveLocation::Local(path) => path
                .to_string_lossy()
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
            ArchiveLocation::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Opens archive references as byte streams
#[derive(Clone)]
pub struct ArchiveFetcher {
    client: Client,
}

impl ArchiveFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self { client })
    }

    /// Open `reference` for reading. A second read needs a second fetch.
    pub fn fetch(&self, reference: &str) -> ByteStream {
        info!(archive = %reference, "Downloading archive");

        match ArchiveLocation::resolve(reference) {
            ArchiveLocation::Local(path) => open_local(path),
            ArchiveLocation::Remote(url) => self.open_remote(url),
        }
    }

    fn open_remote(&self, url: Url) -> ByteStream {
        let client = self.client.clone();

        stream::once(async move {
            debug!(url = %url, "Requesting archive");
            let response = client
                .get(url)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(io::Error::other)?;

            Ok::<_, io::Error>(response.bytes_stream().map_err(io::Error::other))
        })
        .try_flatten()
        .boxed()
    }
}

fn open_local(path: PathBuf) -> ByteStream {
    stream::once(async move {
        debug!(path = %path.display(), "Opening local archive");
        tokio::fs::File::open(&path).await.map(ReaderStream::new)
    })
    .try_flatten()
    .boxed()
}
