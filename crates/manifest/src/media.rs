//! Manifest media types

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST_V2: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const DOCKER_MANIFEST_V1: &str = "application/vnd.docker.distribution.manifest.v1+json";
pub const DOCKER_MANIFEST_V1_SIGNED: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";
pub const OCI_MANIFEST_V1: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX_V1: &str = "application/vnd.oci.image.index.v1+json";

/// Every manifest type we can interpret, most preferred first
pub const ACCEPTED: [&str; 6] = [
    DOCKER_MANIFEST_V2,
    OCI_MANIFEST_V1,
    DOCKER_MANIFEST_LIST_V2,
    OCI_INDEX_V1,
    DOCKER_MANIFEST_V1_SIGNED,
    DOCKER_MANIFEST_V1,
];

/// Value for the `Accept` header of manifest requests
#[must_use]
pub fn accept_header() -> String {
    ACCEPTED.join(", ")
}

/// Strip parameters such as `; charset=utf-8` from a content type
#[must_use]
pub fn essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

#[must_use]
pub fn is_index(media_type: &str) -> bool {
    matches!(essence(media_type), DOCKER_MANIFEST_LIST_V2 | OCI_INDEX_V1)
}

#[must_use]
pub fn is_schema1(media_type: &str) -> bool {
    matches!(
        essence(media_type),
        DOCKER_MANIFEST_V1 | DOCKER_MANIFEST_V1_SIGNED
    )
}
