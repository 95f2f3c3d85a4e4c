use crate::client::authenticator::Session;
use crate::client::gpclient::GPhotosClient;
use crate::client::models::{Page, Photo};
use crate::errors::{APIError, Result};
use crate::remote::payloads::{
    EditCreatedDate, EditDescription, GetPhotoDetails, GetPhotoInfo, ListPhotos, TrashPhotos,
};
use crate::remote::rpc::Batch;
use crate::remote::upload::ProgressFn;
use chrono::{DateTime, Utc};
use log::info;
use std::path::Path;
use tokio::io::AsyncRead;

impl GPhotosClient {
    /// Fetches one page of the library, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn fetch_photo_list(
        &self,
        session: &Session,
        cursor: Option<&str>,
    ) -> Result<Page<Photo>> {
        self.remote_client
            .call(
                session,
                &ListPhotos {
                    cursor: cursor.map(str::to_owned),
                },
            )
            .await
    }

    /// Lists the whole library. Only stops once the service returns no cursor.
    ///
    /// # Errors
    ///
    /// Fails on the first page that fails.
    pub async fn fetch_all_photo_list(&self, session: &Session) -> Result<Vec<Photo>> {
        Self::collect_pages(|cursor| async move {
            self.fetch_photo_list(session, cursor.as_deref()).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn fetch_latest_photo(&self, session: &Session) -> Result<Option<Photo>> {
        let page = self.fetch_photo_list(session, None).await?;
        Ok(page.items.into_iter().next())
    }

    /// Fetches a photo with its full metadata. Dimensions and dates come from
    /// the info call, title, description and size from the details call; both
    /// travel in one request.
    ///
    /// # Errors
    ///
    /// Returns [`APIError::PhotoNotFound`] if the service has no such photo.
    pub async fn fetch_photo_by_id(&self, session: &Session, photo_id: &str) -> Result<Photo> {
        let details = GetPhotoDetails {
            photo_id: photo_id.to_owned(),
        };
        let info = GetPhotoInfo {
            photo_id: photo_id.to_owned(),
        };

        let mut results = self
            .remote_client
            .send_batch_execute(session, Batch::new().with(&details).with(&info))
            .await?;

        let mut photo = results
            .take::<GetPhotoInfo>()?
            .ok_or_else(|| APIError::PhotoNotFound(photo_id.to_owned()))?;

        if let Some(details) = results.take::<GetPhotoDetails>()? {
            photo.title = details.title;
            photo.description = details.description;
            photo.file_size = details.file_size;
        }
        Ok(photo)
    }

    /// Re-reads every field of `photo` from the service.
    ///
    /// # Errors
    ///
    /// See [`GPhotosClient::fetch_photo_by_id`].
    pub async fn refresh_photo(&self, session: &Session, photo: &Photo) -> Result<Photo> {
        self.fetch_photo_by_id(session, &photo.id).await
    }

    /// Moves the photo to the trash.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn remove_photo(&self, session: &Session, photo: &Photo) -> Result<()> {
        info!("Moving {} to the trash", photo.id);
        self.remote_client
            .call(
                session,
                &TrashPhotos {
                    photo_ids: vec![photo.id.clone()],
                },
            )
            .await
    }

    /// Sets the description and returns the photo as the service now sees it.
    ///
    /// # Errors
    ///
    /// Returns an error if the edit or the re-fetch fails.
    pub async fn modify_description(
        &self,
        session: &Session,
        photo: &Photo,
        description: &str,
    ) -> Result<Photo> {
        self.remote_client
            .call(
                session,
                &EditDescription {
                    photo_id: photo.id.clone(),
                    description: description.to_owned(),
                },
            )
            .await?;
        self.refresh_photo(session, photo).await
    }

    /// Moves the capture date to `created_at`, optionally with a timezone
    /// offset in seconds, and returns the re-fetched photo.
    ///
    /// The service applies a shift relative to the stored date, so `photo`
    /// must carry the current `created_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the edit or the re-fetch fails.
    pub async fn modify_created_date(
        &self,
        session: &Session,
        photo: &Photo,
        created_at: DateTime<Utc>,
        timezone_offset_seconds: Option<i32>,
    ) -> Result<Photo> {
        let delta_seconds = (created_at - photo.created_at).num_seconds();
        self.remote_client
            .call(
                session,
                &EditCreatedDate {
                    photo_id: photo.id.clone(),
                    timezone_offset_seconds,
                    delta_seconds,
                },
            )
            .await?;
        self.refresh_photo(session, photo).await
    }

    /// Uploads `size` bytes read from `reader`. An empty `filename` is replaced
    /// by the current time in milliseconds.
    ///
    /// Nothing is retried: a failed upload must be started again from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`APIError::UploadSession`] if no upload session could be
    /// opened, [`APIError::UploadFailed`] if the service did not finalize the
    /// upload, or any transport error.
    pub async fn upload<Reader>(
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
        self.remote_client
            .upload(session, reader, size, filename, progress)
            .await
    }

    /// Uploads a local file under its base name.
    ///
    /// # Errors
    ///
    /// Returns [`APIError::Io`] if the file cannot be opened, otherwise the
    /// errors of [`GPhotosClient::upload`].
    pub async fn upload_file(
        &self,
        session: &Session,
        path: impl AsRef<Path>,
        progress: Option<ProgressFn>,
    ) -> Result<Photo> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.upload(session, file, size, &filename, progress).await
    }
}
