use crate::client::authenticator::Session;
use crate::client::models::Photo;
use crate::consts::{
    UPLOAD_ADDITIONAL_INFO_KEY, UPLOAD_CHUNK_SIZE, UPLOAD_FINALIZED_STATE,
    UPLOAD_SESSION_ENDPOINT, UPLOAD_START_CONTENT_TYPE,
};
use crate::errors::{APIError, Result};
use crate::remote::Client;
use crate::remote::api_session::{ByteStream, HttpRequest, RequestBody};
use crate::remote::payloads::{UploadSessionRequest, UploadSessionResponse, UploadedMedia};
use chrono::Utc;
use log::{debug, info};
use reqwest::Url;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Receives the cumulative number of bytes handed to the transfer request.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

impl Client {
    /// Runs the three upload phases in order: open a resumable session, stream
    /// the bytes to the URL it returns, then inspect the finalize status.
    ///
    /// `reader` is not polled before the transfer URL is known.
    pub(crate) async fn upload<Reader>(
        &self,
        session: &Session,
        reader: Reader,
        size: u64,
        filename: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Photo>
    where
        Reader: AsyncRead + Send + Unpin + 'static,
    {
        let filename = if filename.is_empty() {
            Utc::now().timestamp_millis().to_string()
        } else {
            filename.to_owned()
        };

        info!("Opening upload session for {filename} ({size} bytes)");
        let put_url = self.start_upload_session(session, filename, size).await?;

        info!("Transferring {size} bytes");
        let request = HttpRequest::post(
            put_url,
            RequestBody::Stream(Self::byte_stream(reader, progress)),
        )
        .header("X-HTTP-Method-Override", "PUT")
        .header("Content-Type", "application/octet-stream");

        let response = self.transport.send(request).await?;
        if !response.is_ok() {
            return Err(APIError::RequestFailed {
                status: response.status,
            });
        }

        let media = Self::finalized_media(&response.body)?;
        info!("Upload finalized as {}", media.photoMediaKey);
        Ok(media.into_photo(Utc::now()))
    }

    async fn start_upload_session(
        &self,
        session: &Session,
        filename: String,
        size: u64,
    ) -> Result<Url> {
        let template = UploadSessionRequest::new(filename, size, session.user_id());
        let text = serde_json::to_string(&template)
            .map_err(|e| APIError::UploadSession(e.to_string()))?;

        let response = self
            .transport
            .send(HttpRequest::post(
                self.config.photos_url(UPLOAD_SESSION_ENDPOINT)?,
                RequestBody::Text {
                    content_type: UPLOAD_START_CONTENT_TYPE.to_owned(),
                    text,
                },
            ))
            .await?;

        if !response.is_ok() {
            return Err(APIError::UploadSession(format!(
                "session start answered with HTTP {}",
                response.status
            )));
        }

        let url = serde_json::from_str::<UploadSessionResponse>(&response.body)
            .ok()
            .and_then(|r| r.sessionStatus)
            .and_then(|s| s.externalFieldTransfers.into_iter().next())
            .and_then(|t| t.putInfo)
            .map(|p| p.url)
            .ok_or_else(|| {
                APIError::UploadSession("session status has no transfer url".to_owned())
            })?;

        debug!("Upload transfer url {url}");
        Url::parse(&url).map_err(|_| APIError::UrlError(url))
    }

    fn finalized_media(body: &str) -> Result<UploadedMedia> {
        let status = serde_json::from_str::<UploadSessionResponse>(body)
            .map_err(|e| APIError::malformed(format!("upload result: {e}")))?
            .sessionStatus
            .ok_or_else(|| APIError::UploadFailed {
                state: String::new(),
            })?;

        let state = status.state.unwrap_or_default();
        if state != UPLOAD_FINALIZED_STATE {
            return Err(APIError::UploadFailed { state });
        }

        let info = status
            .additionalInfo
            .as_ref()
            .and_then(|i| i.get(UPLOAD_ADDITIONAL_INFO_KEY))
            .and_then(|i| i.get("completionInfo"))
            .and_then(|i| i.get("customerSpecificInfo"))
            .cloned()
            .ok_or_else(|| APIError::malformed("finalized upload has no completion info"))?;

        serde_json::from_value(info)
            .map_err(|e| APIError::malformed(format!("completion info: {e}")))
    }

    fn byte_stream<Reader>(mut reader: Reader, progress: Option<ProgressFn>) -> ByteStream
    where
        Reader: AsyncRead + Send + Unpin + 'static,
    {
        Box::pin(async_stream::stream! {
            let mut sent: u64 = 0;
            loop {
                match Self::read_n(&mut reader, UPLOAD_CHUNK_SIZE).await {
                    Ok(buf) if buf.is_empty() => break,
                    Ok(buf) => {
                        sent += buf.len() as u64;
                        if let Some(progress) = &progress {
                            progress(sent);
                        }
                        yield Ok(buf);
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }

    async fn read_n<Reader>(reader: &mut Reader, bytes_to_read: usize) -> std::io::Result<Vec<u8>>
    where
        Reader: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; bytes_to_read];
        let mut filled = 0;

        while filled < bytes_to_read {
            let n = reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        buf.truncate(filled);
        Ok(buf)
    }
}
