use serde::{Deserialize, Serialize};

/// A single advertisement as pushed to streaming clients.
///
/// Wire form is `{"id": 1, "image": "...", "url": "..."}`. Values are never
/// mutated after they leave the catalog; fan-out clones them per mailbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: i64,
    /// Image to render for the ad.
    #[serde(rename = "image")]
    pub image_ref: String,
    /// Where a click on the ad should navigate.
    #[serde(rename = "url")]
    pub target_url: String,
}

impl Advertisement {
    pub fn new(id: i64, image_ref: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            id,
            image_ref: image_ref.into(),
            target_url: target_url.into(),
        }
    }

    /// Serialize to the JSON text frame sent over the socket.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names() {
        let ad = Advertisement::new(1, "img1", "url1");
        let json: serde_json::Value = serde_json::from_str(&ad.to_wire().unwrap()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["image"], "img1");
        assert_eq!(json["url"], "url1");
        assert!(json.get("image_ref").is_none());
    }

    #[test]
    fn parses_wire_form() {
        let ad: Advertisement =
            serde_json::from_str(r#"{"id":2,"image":"img2","url":"https://example.com/"}"#)
                .unwrap();
        assert_eq!(ad, Advertisement::new(2, "img2", "https://example.com/"));
    }
}
