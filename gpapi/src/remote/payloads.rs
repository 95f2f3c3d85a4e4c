//! Typed descriptors for every opcode, plus the decoders for the positional
//! arrays the service answers with. Array indices do not leave this module.

use crate::client::models::{Album, MediaType, Page, Period, Photo};
use crate::consts::{
    ALBUM_INFO_KEY, ANIMATED_GIF_KEY, UPLOAD_PROTOCOL_VERSION, VIDEO_INFO_KEY,
};
use crate::errors::{APIError, Result};
use crate::remote::rpc::{Batchable, RpcCall, RpcId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_aux::prelude::*;
use serde_json::{Map, Value, json};

fn timestamp_ms(value: &Value) -> Option<DateTime<Utc>> {
    #[allow(clippy::cast_possible_truncation)]
    let ms = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp_millis(ms)
}

fn dimension(value: &Value) -> u32 {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or_default()
}

/// `null`, absent and empty cursors all mean "no more pages".
fn cursor(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// `[id, ..., {"72930366": [_, title, [fromMs, toMs], itemsCount, isShared]}]`
pub(crate) fn decode_album(data: &Value) -> Result<Album> {
    let fields = data
        .as_array()
        .ok_or_else(|| APIError::malformed("album entry is not an array"))?;

    let id = fields
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| APIError::malformed("album entry has no id"))?;

    let info = fields
        .last()
        .and_then(|v| v.get(ALBUM_INFO_KEY))
        .ok_or_else(|| APIError::malformed(format!("album {id} has no info block")))?;

    Ok(Album {
        id: id.to_owned(),
        title: info[1].as_str().unwrap_or_default().to_owned(),
        period: Period {
            from: timestamp_ms(&info[2][0]).unwrap_or_default(),
            to: timestamp_ms(&info[2][1]).unwrap_or_default(),
        },
        items_count: info[3].as_u64().unwrap_or_default(),
        is_shared: info[4].as_bool() == Some(true),
    })
}

/// `[id, [url, width, height], createdMs, _, _, uploadedMs, ..., extension]`
///
/// The trailing extension object marks videos (`76647426: [durationMs, _, w, h]`)
/// and animated GIFs (`139842850`).
pub(crate) fn decode_photo(data: &Value) -> Result<Photo> {
    let fields = data
        .as_array()
        .ok_or_else(|| APIError::malformed("photo entry is not an array"))?;

    let id = fields
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| APIError::malformed("photo entry has no id"))?;

    let extension = fields.last().filter(|v| v.is_object());
    let video = extension.and_then(|e| e.get(VIDEO_INFO_KEY));
    let media_type = match (video, extension) {
        (Some(_), _) => MediaType::Video,
        (None, Some(e)) if e.get(ANIMATED_GIF_KEY).is_some() => MediaType::AnimatedGif,
        _ => MediaType::Photo,
    };

    let media = &data[1];
    let (width, height, duration_ms) = match video {
        Some(v) => (dimension(&v[2]), dimension(&v[3]), v[0].as_u64()),
        None => (dimension(&media[1]), dimension(&media[2]), None),
    };

    Ok(Photo {
        id: id.to_owned(),
        media_type,
        created_at: timestamp_ms(&data[2]).unwrap_or_default(),
        uploaded_at: timestamp_ms(&data[5]).unwrap_or_default(),
        width,
        height,
        duration_ms,
        raw_url: media[0].as_str().unwrap_or_default().to_owned(),
        title: None,
        description: None,
        file_size: None,
    })
}

fn decode_photo_page(list: &Value, next: &Value) -> Result<Page<Photo>> {
    let Some(entries) = list.as_array() else {
        return Ok(Page::empty());
    };
    Ok(Page {
        items: entries.iter().map(decode_photo).collect::<Result<_>>()?,
        next_cursor: cursor(next),
    })
}

#[derive(Debug)]
pub(crate) struct ListAlbums {
    pub cursor: Option<String>,
}

impl RpcCall for ListAlbums {
    const ID: RpcId = RpcId::AlbumList;
    type Output = Page<Album>;

    fn args(&self) -> Value {
        json!([self.cursor, null, null, null, 1])
    }

    fn decode(payload: Value) -> Result<Self::Output> {
        let Some(entries) = payload[0].as_array() else {
            return Ok(Page::empty());
        };
        Ok(Page {
            items: entries.iter().map(decode_album).collect::<Result<_>>()?,
            next_cursor: cursor(&payload[1]),
        })
    }
}

impl Batchable for ListAlbums {}

#[derive(Debug)]
pub(crate) struct ListPhotos {
    pub cursor: Option<String>,
}

impl RpcCall for ListPhotos {
    const ID: RpcId = RpcId::PhotoList;
    type Output = Page<Photo>;

    fn args(&self) -> Value {
        json!([self.cursor, null, null, null, 1])
    }

    fn decode(payload: Value) -> Result<Self::Output> {
        decode_photo_page(&payload[0], &payload[1])
    }
}

impl Batchable for ListPhotos {}

#[derive(Debug)]
pub(crate) struct ListAlbumPhotos {
    pub album_id: String,
    pub cursor: Option<String>,
}

impl RpcCall for ListAlbumPhotos {
    const ID: RpcId = RpcId::AlbumPhotoList;
    type Output = Page<Photo>;

    fn args(&self) -> Value {
        json!([self.album_id, self.cursor, null, null, 0])
    }

    fn decode(payload: Value) -> Result<Self::Output> {
        decode_photo_page(&payload[1], &payload[2])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CreatedAlbum {
    pub album_id: String,
    pub inserted_photo_ids: Vec<String>,
}

/// Album creation needs at least one existing photo; the service inserts it
/// into the new album.
#[derive(Debug)]
pub(crate) struct CreateAlbum {
    pub title: String,
    pub anchor_photo_id: String,
}

impl RpcCall for CreateAlbum {
    const ID: RpcId = RpcId::CreateAlbum;
    type Output = CreatedAlbum;

    fn args(&self) -> Value {
        json!([[self.anchor_photo_id], null, self.title])
    }

    fn decode(payload: Value) -> Result<Self::Output> {
        let album_id = payload[0]
            .as_str()
            .ok_or_else(|| APIError::malformed("create album response has no album id"))?;
        Ok(CreatedAlbum {
            album_id: album_id.to_owned(),
            inserted_photo_ids: string_list(&payload[1]),
        })
    }
}

#[derive(Debug)]
pub(crate) struct AddToAlbum {
    pub album_id: String,
    pub photo_ids: Vec<String>,
}

impl RpcCall for AddToAlbum {
    const ID: RpcId = RpcId::AddToAlbum;
    type Output = Vec<String>;

    fn args(&self) -> Value {
        json!([self.photo_ids, self.album_id])
    }

    fn decode(payload: Value) -> Result<Self::Output> {
        Ok(string_list(&payload[1]))
    }
}

/// Shared albums take the photos wrapped in sharing metadata the client does
/// not model; the constant slots are reproduced as observed.
#[derive(Debug)]
pub(crate) struct AddToSharedAlbum {
    pub album_id: String,
    pub photo_ids: Vec<String>,
}

impl RpcCall for AddToSharedAlbum {
    const ID: RpcId = RpcId::AddToSharedAlbum;
    type Output = Vec<String>;

    fn args(&self) -> Value {
        json!([
            [self.album_id],
            [2, null, [[self.photo_ids]], null, null, [], []]
        ])
    }

    fn decode(payload: Value) -> Result<Self::Output> {
        Ok(string_list(&payload[1]))
    }
}

#[derive(Debug)]
pub(crate) struct DeleteAlbum {
    pub album_id: String,
}

impl RpcCall for DeleteAlbum {
    const ID: RpcId = RpcId::DeleteAlbum;
    const IGNORE_RESULT: bool = true;
    type Output = ();

    fn args(&self) -> Value {
        json!([[self.album_id], []])
    }

    fn decode(_: Value) -> Result<Self::Output> {
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct RemoveFromAlbum {
    pub photo_ids: Vec<String>,
}

impl RpcCall for RemoveFromAlbum {
    const ID: RpcId = RpcId::RemoveFromAlbum;
    const IGNORE_RESULT: bool = true;
    type Output = ();

    fn args(&self) -> Value {
        json!([self.photo_ids, []])
    }

    fn decode(_: Value) -> Result<Self::Output> {
        Ok(())
    }
}

impl Batchable for RemoveFromAlbum {}

#[derive(Debug)]
pub(crate) struct TrashPhotos {
    pub photo_ids: Vec<String>,
}

impl RpcCall for TrashPhotos {
    const ID: RpcId = RpcId::TrashPhotos;
    const IGNORE_RESULT: bool = true;
    type Output = ();

    fn args(&self) -> Value {
        json!([[], 1, self.photo_ids, 3, null, [], []])
    }

    fn decode(_: Value) -> Result<Self::Output> {
        Ok(())
    }
}

impl Batchable for TrashPhotos {}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct PhotoDetails {
    pub description: Option<String>,
    pub title: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug)]
pub(crate) struct GetPhotoDetails {
    pub photo_id: String,
}

impl RpcCall for GetPhotoDetails {
    const ID: RpcId = RpcId::PhotoDetails;
    type Output = Option<PhotoDetails>;

    /// `[[_, description, title, _, _, fileSize, ...]]`
    fn decode(payload: Value) -> Result<Self::Output> {
        let details = &payload[0];
        if !details.is_array() {
            return Ok(None);
        }
        Ok(Some(PhotoDetails {
            description: details[1].as_str().map(str::to_owned),
            title: details[2].as_str().map(str::to_owned),
            file_size: details[5].as_u64(),
        }))
    }

    fn args(&self) -> Value {
        json!([self.photo_id, 1])
    }
}

impl Batchable for GetPhotoDetails {}

#[derive(Debug)]
pub(crate) struct GetPhotoInfo {
    pub photo_id: String,
}

impl RpcCall for GetPhotoInfo {
    const ID: RpcId = RpcId::PhotoInfo;
    type Output = Option<Photo>;

    fn args(&self) -> Value {
        json!([self.photo_id, null, null, true])
    }

    fn decode(payload: Value) -> Result<Self::Output> {
        let info = &payload[0];
        if info.is_array() {
            decode_photo(info).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl Batchable for GetPhotoInfo {}

#[derive(Debug)]
pub(crate) struct EditDescription {
    pub photo_id: String,
    pub description: String,
}

impl RpcCall for EditDescription {
    const ID: RpcId = RpcId::EditDescription;
    const IGNORE_RESULT: bool = true;
    type Output = ();

    fn args(&self) -> Value {
        json!([null, self.description, self.photo_id])
    }

    fn decode(_: Value) -> Result<Self::Output> {
        Ok(())
    }
}

impl Batchable for EditDescription {}

/// Shifts the capture date by `delta_seconds` relative to its current value.
#[derive(Debug)]
pub(crate) struct EditCreatedDate {
    pub photo_id: String,
    pub timezone_offset_seconds: Option<i32>,
    pub delta_seconds: i64,
}

impl RpcCall for EditCreatedDate {
    const ID: RpcId = RpcId::EditCreatedDate;
    const IGNORE_RESULT: bool = true;
    type Output = ();

    fn args(&self) -> Value {
        json!([[[
            self.photo_id,
            null,
            self.timezone_offset_seconds,
            self.delta_seconds
        ]]])
    }

    fn decode(_: Value) -> Result<Self::Output> {
        Ok(())
    }
}

impl Batchable for EditCreatedDate {}

#[derive(Debug, Serialize)]
#[allow(non_snake_case)]
pub(crate) struct UploadSessionRequest {
    pub protocolVersion: &'static str,
    pub createSessionRequest: CreateSessionRequest,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest {
    pub fields: Vec<UploadField>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum UploadField {
    External(ExternalField),
    Inlined(InlinedField),
}

#[derive(Debug, Serialize)]
pub(crate) struct ExternalField {
    pub name: &'static str,
    pub filename: String,
    pub put: Map<String, Value>,
    pub size: u64,
}

#[derive(Debug, Serialize)]
#[allow(non_snake_case)]
pub(crate) struct InlinedField {
    pub name: &'static str,
    pub content: String,
    pub contentType: &'static str,
}

impl InlinedField {
    fn text(name: &'static str, content: impl Into<String>) -> UploadField {
        UploadField::Inlined(InlinedField {
            name,
            content: content.into(),
            contentType: "text/plain",
        })
    }
}

impl UploadSessionRequest {
    pub(crate) fn new(filename: String, size: u64, user_id: &str) -> Self {
        Self {
            protocolVersion: UPLOAD_PROTOCOL_VERSION,
            createSessionRequest: CreateSessionRequest {
                fields: vec![
                    UploadField::External(ExternalField {
                        name: "file",
                        filename,
                        put: Map::new(),
                        size,
                    }),
                    InlinedField::text("auto_create_album", "camera_sync.active"),
                    InlinedField::text("auto_downsize", "true"),
                    InlinedField::text("storage_policy", "use_manual_setting"),
                    InlinedField::text("disable_asbe_notification", "true"),
                    InlinedField::text("client", "photosweb"),
                    InlinedField::text("effective_id", user_id),
                    InlinedField::text("owner_name", user_id),
                ],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub(crate) struct UploadSessionResponse {
    pub sessionStatus: Option<UploadSessionStatus>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub(crate) struct UploadSessionStatus {
    pub state: Option<String>,
    #[serde(default)]
    pub externalFieldTransfers: Vec<ExternalFieldTransfer>,
    pub additionalInfo: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub(crate) struct ExternalFieldTransfer {
    pub putInfo: Option<PutInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PutInfo {
    pub url: String,
}

/// `customerSpecificInfo` of a finalized upload.
#[derive(Debug, Clone, Deserialize)]
#[allow(non_snake_case)]
pub(crate) struct UploadedMedia {
    pub photoMediaKey: String,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub timestamp: Option<i64>,
    pub kind: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub height: Option<u32>,
}

impl UploadedMedia {
    pub(crate) fn into_photo(self, uploaded_at: DateTime<Utc>) -> Photo {
        Photo {
            id: self.photoMediaKey,
            media_type: self
                .kind
                .as_deref()
                .map(MediaType::from_kind)
                .unwrap_or_default(),
            created_at: self
                .timestamp
                .and_then(|s| DateTime::from_timestamp(s, 0))
                .unwrap_or(uploaded_at),
            uploaded_at,
            width: self.width.unwrap_or_default(),
            height: self.height.unwrap_or_default(),
            duration_ms: None,
            raw_url: self.url.unwrap_or_default(),
            title: self.title,
            description: self.description,
            file_size: None,
        }
    }
}
