use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use uuid::Uuid;

use crate::discover::Orientation;

/// Derive a fresh storage key for an asset.
///
/// Keys never depend on the record, the filename, or any previously derived key, so re-uploading
/// never overwrites an asset that might still be referenced somewhere.
pub(crate) fn derive(orientation: Option<Orientation>, extension: &str) -> String {
    let token = URL_SAFE_NO_PAD.encode(Uuid::new_v4().into_bytes());

    match orientation {
        Some(orientation) => format!("{}/{}{}", orientation.as_str(), token, extension),
        None => format!("{token}{extension}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::discover::Orientation;

    #[test]
    fn key_is_token_plus_extension() {
        let key = super::derive(None, ".png");

        assert_eq!(key.len(), 22 + ".png".len());
        assert!(key.ends_with(".png"));
        assert!(!key.contains('/'));
        assert!(!key.contains('='));
    }

    #[test]
    fn key_carries_orientation_prefix() {
        for orientation in [
            Orientation::Landscape,
            Orientation::Portrait,
            Orientation::Other,
        ] {
            let key = super::derive(Some(orientation), ".mp4");

            let expected_prefix = format!("{}/", orientation.as_str());
            assert!(key.starts_with(&expected_prefix), "{key}");
            assert!(key.ends_with(".mp4"));
            assert_eq!(key.len(), expected_prefix.len() + 22 + ".mp4".len());
        }
    }

    #[test]
    fn keys_do_not_repeat() {
        let mut seen = HashSet::new();

        for _ in 0..10_000 {
            assert!(seen.insert(super::derive(None, ".mp4")));
        }
    }
}
