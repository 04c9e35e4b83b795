use serde::{Serialize, Serializer};
use url::Url;

/// Persisted product document. Field order here is the on-disk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    pub product_id: String,
    /// Not present on source pages; kept for schema stability.
    pub name: String,
    pub description: String,
    pub specs: Specs,
    pub bom: Vec<PartEntry>,
    pub assets: Assets,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Specs {
    #[serde(serialize_with = "int_or_empty")]
    pub hp: Option<i64>,
    pub voltage: String,
    pub rpm: String,
    pub frame: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartEntry {
    pub part_number: String,
    pub description: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assets {
    pub manual: Option<String>,
    pub cad: Option<String>,
    pub image: Option<String>,
}

/// Everything the field extractors produced for one product page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFields {
    pub product_id: String,
    pub description: Option<String>,
    pub frame: Option<String>,
    pub rpm: Option<String>,
    pub voltage: Option<String>,
    pub hp: Option<i64>,
    pub manual_url: Option<Url>,
    pub image_url: Option<Url>,
}

/// Where a product's assets go. `None` means the page had no link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetPaths {
    pub manual: Option<String>,
    pub image: Option<String>,
}

impl ProductRecord {
    /// Merge extracted pieces. Cannot fail: absent values become empty.
    pub fn assemble(fields: ProductFields, bom: Vec<PartEntry>, assets: AssetPaths) -> Self {
        ProductRecord {
            product_id: fields.product_id,
            name: String::new(),
            description: fields.description.unwrap_or_default(),
            specs: Specs {
                hp: fields.hp,
                voltage: fields.voltage.unwrap_or_default(),
                rpm: fields.rpm.unwrap_or_default(),
                frame: fields.frame.unwrap_or_default(),
            },
            bom,
            assets: Assets {
                manual: assets.manual,
                cad: None,
                image: assets.image,
            },
        }
    }
}

fn int_or_empty<S: Serializer>(value: &Option<i64>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(n) => s.serialize_i64(*n),
        None => s.serialize_str(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_values_default_to_empty() {
        let fields = ProductFields {
            product_id: "M3546".into(),
            ..Default::default()
        };
        let record = ProductRecord::assemble(fields, vec![], AssetPaths::default());
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "product_id": "M3546",
                "name": "",
                "description": "",
                "specs": {"hp": "", "voltage": "", "rpm": "", "frame": ""},
                "bom": [],
                "assets": {"manual": null, "cad": null, "image": null}
            })
        );
    }

    #[test]
    fn full_record_keeps_schema_order() {
        let fields = ProductFields {
            product_id: "EM3546T".into(),
            description: Some("5HP motor".into()),
            frame: Some("184T".into()),
            rpm: Some("1750".into()),
            voltage: Some("230/460".into()),
            hp: Some(5),
            manual_url: None,
            image_url: None,
        };
        let bom = vec![PartEntry {
            part_number: "XY-1".into(),
            description: "Fan".into(),
            quantity: 2,
        }];
        let assets = AssetPaths {
            manual: Some("output/assets/EM3546T/manual.pdf".into()),
            image: None,
        };
        let text = serde_json::to_string(&ProductRecord::assemble(fields, bom, assets)).unwrap();
        assert_eq!(
            text,
            r#"{"product_id":"EM3546T","name":"","description":"5HP motor","specs":{"hp":5,"voltage":"230/460","rpm":"1750","frame":"184T"},"bom":[{"part_number":"XY-1","description":"Fan","quantity":2}],"assets":{"manual":"output/assets/EM3546T/manual.pdf","cad":null,"image":null}}"#
        );
    }
}
