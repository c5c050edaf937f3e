use serde_json::Value;

/// Shared surface of the typed views an [`ApiResult`](super::ApiResult) is
/// built from.
pub trait ResponseComponent {
    /// The wrapped value as plain JSON (binary content becomes `null`).
    fn to_value(&self) -> Value;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True only for downloaded file content.
    fn binary(&self) -> bool {
        false
    }
}
