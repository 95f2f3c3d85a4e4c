pub(crate) const USER_AGENT: &str = "Mozilla/5.0 UploadGPhotos/0.1";
pub(crate) const PHOTOS_HOST: &str = "https://photos.google.com/";
pub(crate) const ACCOUNTS_HOST: &str = "https://accounts.google.com/";

pub(crate) const LANDING_ENDPOINT: &str = "";
pub(crate) const DATA_ENDPOINT: &str = "_/PhotosUi/data";
pub(crate) const MUTATE_ENDPOINT: &str = "_/PhotosUi/mutate";
pub(crate) const BATCH_EXECUTE_ENDPOINT: &str = "_/PhotosUi/data/batchexecute";
pub(crate) const UPLOAD_SESSION_ENDPOINT: &str = "_/upload/photos/resumable?authuser=0";

pub(crate) const SERVICE_LOGIN_ENDPOINT: &str = "ServiceLogin";
pub(crate) const MANAGE_ACCOUNT_ENDPOINT: &str = "ManageAccount";
pub(crate) const LOOKUP_ENDPOINT: &str = "signin/v1/lookup";
pub(crate) const PASSWORD_CHALLENGE_ENDPOINT: &str = "signin/challenge/sl/password";

pub(crate) const RESPONSE_PREAMBLE_LEN: usize = 4;
pub(crate) const BATCH_RESPONSE_TAG: &str = "wrb.fr";
pub(crate) const FORM_REQUEST_KEY: &str = "f.req";
pub(crate) const FORM_TOKEN_KEY: &str = "at";

pub(crate) const AUTH_TOKEN_KEY: &str = "SNlM0e";
pub(crate) const USER_ID_KEY: &str = "S06Grb";

pub(crate) const ALBUM_INFO_KEY: &str = "72930366";
pub(crate) const VIDEO_INFO_KEY: &str = "76647426";
pub(crate) const ANIMATED_GIF_KEY: &str = "139842850";

pub(crate) const UPLOAD_PROTOCOL_VERSION: &str = "0.8";
pub(crate) const UPLOAD_START_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";
pub(crate) const UPLOAD_FINALIZED_STATE: &str = "FINALIZED";
pub(crate) const UPLOAD_ADDITIONAL_INFO_KEY: &str = "uploader_service.GoogleRupioAdditionalInfo";
pub(crate) const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

pub(crate) const APP_DIR_NAME: &str = "upload-gphotos";
pub(crate) const COOKIE_FILE_NAME: &str = "cookies.json";
