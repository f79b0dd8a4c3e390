use serde::{Deserialize, Serialize};

/// Construction time settings of a [`DrawStorage`](crate::DrawStorage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DrawStorageOptions {
    /// Share draw commands between buckets and bind every bucket's geometry
    /// and textures as arrays. When disabled every bucket gets its own
    /// commands and binds only its own resources.
    pub bindless: bool,
    /// Skip the visibility pass, keeping last frame's culling results. Handy
    /// to inspect culling from a different camera.
    pub freeze_visibility: bool,
}

impl Default for DrawStorageOptions {
    fn default() -> Self {
        Self {
            bindless: true,
            freeze_visibility: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::DrawStorageOptions;

    #[test]
    fn missing_fields_use_defaults() {
        let options: DrawStorageOptions = serde_json::from_str(r#"{ "freeze_visibility": true }"#).unwrap();
        assert_eq!(
            options,
            DrawStorageOptions {
                bindless: true,
                freeze_visibility: true,
            }
        );
    }

    #[test]
    fn serializes_every_field() {
        let json = serde_json::to_value(DrawStorageOptions::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "bindless": true, "freeze_visibility": false }));
    }
}
