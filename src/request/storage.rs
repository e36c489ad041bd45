use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBucketRequest {
    /// Name of the bucket
    pub name: String,
    /// Location of the bucket, same as the functions location
    pub location: String,
}
