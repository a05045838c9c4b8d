use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Identifier of a freshly stored avatar.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GuidResponse {
    #[schema(example = "6f1c2b1e-8a53-4f4e-9a3e-0d6c1f0e2b7a")]
    pub guid: String,
}

/// Time-limited read URL for an avatar.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UrlResponse {
    #[schema(example = "https://avatars.example.com/blobs/avatars/6f1c...?expires=1700000000&signature=ab12...")]
    pub url: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsernameQuery {
    /// Owner whose avatar to look up.
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchRequest {
    /// Usernames to resolve. Duplicates and blanks are ignored.
    #[schema(example = json!(["alice", "bob"]))]
    pub usernames: Vec<String>,
}

/// Username to URL, containing only users that have an avatar.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"alice": "https://avatars.example.com/blobs/avatars/6f1c..."}))]
pub struct AvatarUrls(pub BTreeMap<String, String>);

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadFromUrlRequest {
    /// `http` or `https` URL of the image.
    #[schema(example = "https://example.com/me.png")]
    pub url: String,
}

/// Query string of a signed local blob link.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BlobLinkQuery {
    /// Unix timestamp after which the link is rejected.
    pub expires: Option<i64>,
    pub signature: Option<String>,
}
