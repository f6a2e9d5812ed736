//! Application constants

/// Maximum multipart body for thumbnail uploads (10 MB)
pub const MAX_THUMBNAIL_UPLOAD_SIZE: usize = 10 << 20;

/// Maximum multipart body for video uploads (1 GB)
pub const MAX_VIDEO_UPLOAD_SIZE: usize = 1 << 30;

/// Presigned URL expiry time in seconds (1 hour)
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;

/// Port used when PORT is unset
pub const DEFAULT_PORT: u16 = 8091;

/// Local asset directory used when ASSETS_ROOT is unset
pub const DEFAULT_ASSETS_ROOT: &str = "./assets";

pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Number of random bytes behind every generated asset name
pub const ASSET_ID_BYTES: usize = 32;

/// Issuer expected on access tokens
pub const TOKEN_ISSUER: &str = "tubely-access";

/// Object key prefix for thumbnails stored in the bucket
pub const THUMBNAIL_KEY_PREFIX: &str = "thumbnails";
