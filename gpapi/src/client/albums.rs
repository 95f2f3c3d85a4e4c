use crate::client::authenticator::Session;
use crate::client::gpclient::GPhotosClient;
use crate::client::models::{Album, Page, Period, Photo};
use crate::errors::{APIError, Result};
use crate::remote::payloads::{
    AddToAlbum, AddToSharedAlbum, CreateAlbum, DeleteAlbum, ListAlbumPhotos, ListAlbums,
    RemoveFromAlbum,
};
use chrono::Utc;
use log::{debug, info, warn};

fn owned_ids(photo_ids: &[&str]) -> Vec<String> {
    photo_ids.iter().map(|id| (*id).to_owned()).collect()
}

impl GPhotosClient {
    /// Fetches one page of the album listing. `None` starts from the first page.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn fetch_album_list(
        &self,
        session: &Session,
        cursor: Option<&str>,
    ) -> Result<Page<Album>> {
        self.remote_client
            .call(
                session,
                &ListAlbums {
                    cursor: cursor.map(str::to_owned),
                },
            )
            .await
    }

    /// # Errors
    ///
    /// Fails on the first page that fails.
    pub async fn fetch_all_album_list(&self, session: &Session) -> Result<Vec<Album>> {
        Self::collect_pages(|cursor| async move {
            self.fetch_album_list(session, cursor.as_deref()).await
        })
        .await
    }

    /// Walks the album listing until an album whose title or id equals
    /// `title_or_id` shows up.
    ///
    /// # Errors
    ///
    /// Returns [`APIError::AlbumNotFound`] once every page has been seen
    /// without a match.
    pub async fn search_album(&self, session: &Session, title_or_id: &str) -> Result<Album> {
        let mut cursor: Option<String> = None;
        loop {
            let page = self.fetch_album_list(session, cursor.as_deref()).await?;
            if let Some(album) = page
                .items
                .into_iter()
                .find(|a| a.title == title_or_id || a.id == title_or_id)
            {
                return Ok(album);
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Err(APIError::AlbumNotFound(title_or_id.to_owned())),
            }
        }
    }

    /// Creates an empty album.
    ///
    /// The creation call must be seeded with an existing photo, so the latest
    /// photo of the library is used and removed again right after.
    ///
    /// # Errors
    ///
    /// Returns [`APIError::PhotoNotFound`] if the library has no photo to seed
    /// the album with, or any error of the underlying calls.
    pub async fn create_album(&self, session: &Session, title: &str) -> Result<Album> {
        let anchor = self
            .fetch_latest_photo(session)
            .await?
            .ok_or_else(|| APIError::PhotoNotFound("latest".to_owned()))?;

        let created = self
            .remote_client
            .call(
                session,
                &CreateAlbum {
                    title: title.to_owned(),
                    anchor_photo_id: anchor.id,
                },
            )
            .await?;
        info!("Created album {title} ({})", created.album_id);

        if !created.inserted_photo_ids.is_empty() {
            debug!(
                "Removing seed items {:?} from {}",
                created.inserted_photo_ids, created.album_id
            );
            self.remote_client
                .call(
                    session,
                    &RemoveFromAlbum {
                        photo_ids: created.inserted_photo_ids,
                    },
                )
                .await?;
        }

        let now = Utc::now();
        Ok(Album {
            id: created.album_id,
            title: title.to_owned(),
            period: Period { from: now, to: now },
            items_count: 0,
            is_shared: false,
        })
    }

    /// # Errors
    ///
    /// Returns any error of the search other than [`APIError::AlbumNotFound`],
    /// or any error of [`GPhotosClient::create_album`].
    pub async fn search_or_create_album(&self, session: &Session, title: &str) -> Result<Album> {
        match self.search_album(session, title).await {
            Err(APIError::AlbumNotFound(_)) => self.create_album(session, title).await,
            found => found,
        }
    }

    /// Adds photos to an album and returns the ids the service inserted.
    ///
    /// Unshared albums are tried with the plain add call first; if that fails
    /// the shared-album call is sent once. Albums known to be shared go
    /// straight to the shared call.
    ///
    /// # Errors
    ///
    /// Returns the error of the shared-album call when both attempts fail.
    pub async fn add_photos(
        &self,
        session: &Session,
        album: &Album,
        photo_ids: &[&str],
    ) -> Result<Vec<String>> {
        let shared = AddToSharedAlbum {
            album_id: album.id.clone(),
            photo_ids: owned_ids(photo_ids),
        };
        if album.is_shared {
            return self.remote_client.call(session, &shared).await;
        }

        let unshared = AddToAlbum {
            album_id: album.id.clone(),
            photo_ids: owned_ids(photo_ids),
        };
        match self.remote_client.call(session, &unshared).await {
            Ok(inserted) => Ok(inserted),
            Err(e) => {
                warn!("Adding to {} failed ({e}), retrying as a shared album", album.id);
                self.remote_client.call(session, &shared).await
            }
        }
    }

    /// # Errors
    ///
    /// See [`GPhotosClient::add_photos`].
    pub async fn add_photo(
        &self,
        session: &Session,
        album: &Album,
        photo: &Photo,
    ) -> Result<Vec<String>> {
        self.add_photos(session, album, &[photo.id.as_str()]).await
    }

    /// Removes album items by id. The photos themselves stay in the library.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn remove_from_album(&self, session: &Session, photo_ids: &[&str]) -> Result<()> {
        self.remote_client
            .call(
                session,
                &RemoveFromAlbum {
                    photo_ids: owned_ids(photo_ids),
                },
            )
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_album(&self, session: &Session, album: &Album) -> Result<()> {
        info!("Deleting album {}", album.id);
        self.remote_client
            .call(
                session,
                &DeleteAlbum {
                    album_id: album.id.clone(),
                },
            )
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn fetch_album_photo_list(
        &self,
        session: &Session,
        album: &Album,
        cursor: Option<&str>,
    ) -> Result<Page<Photo>> {
        self.remote_client
            .call(
                session,
                &ListAlbumPhotos {
                    album_id: album.id.clone(),
                    cursor: cursor.map(str::to_owned),
                },
            )
            .await
    }

    /// # Errors
    ///
    /// Fails on the first page that fails.
    pub async fn fetch_all_album_photo_list(
        &self,
        session: &Session,
        album: &Album,
    ) -> Result<Vec<Photo>> {
        Self::collect_pages(|cursor| async move {
            self.fetch_album_photo_list(session, album, cursor.as_deref())
                .await
        })
        .await
    }
}
