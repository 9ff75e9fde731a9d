use serde::{Deserialize, Serialize};

/// Role assigned to a logged-in user by the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

/// The logged-in user record
///
/// Populated once at login from the remote API's `/login` response and cleared
/// at logout. Views receive this object explicitly instead of reading shared
/// browser-style storage, so the session has a single load/clear lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "profileImage", default)]
    pub profile_image: String,
}
