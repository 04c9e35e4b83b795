pub mod normalize;
pub mod parts;

use tracing::{error, warn};
use url::Url;

use crate::dom::{self, Locator, RenderedPage};
use crate::error::{Result, ScrapeError};
use crate::record::ProductFields;
use crate::session;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ProductId,
    Description,
    Frame,
    Rpm,
    Voltage,
    Hp,
    ManualUrl,
    ImageUrl,
}

impl Field {
    /// Extraction order on a product page.
    pub const ORDER: [Field; 8] = [
        Field::ProductId,
        Field::Description,
        Field::Frame,
        Field::Rpm,
        Field::Voltage,
        Field::Hp,
        Field::ManualUrl,
        Field::ImageUrl,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::ProductId => "product_id",
            Field::Description => "description",
            Field::Frame => "frame",
            Field::Rpm => "rpm",
            Field::Voltage => "voltage",
            Field::Hp => "hp",
            Field::ManualUrl => "manual",
            Field::ImageUrl => "image",
        }
    }

    fn locator(self) -> Locator {
        match self {
            Field::ProductId => Locator::css(".page-title h1"),
            Field::Description => Locator::css(".product-description"),
            Field::Frame => Locator::span_after_containing("Frame"),
            Field::Rpm => Locator::span_after_exact("Speed"),
            Field::Voltage => Locator::span_after_containing("Voltage"),
            Field::Hp => Locator::span_after_containing("Output"),
            Field::ManualUrl => Locator::css("#infoPacket"),
            Field::ImageUrl => Locator::css(".product-image"),
        }
    }

    fn normalize(self) -> Normalize {
        match self {
            Field::ProductId | Field::Description | Field::Frame => Normalize::Trim,
            Field::Rpm => Normalize::StripUnit("rpm"),
            Field::Voltage => Normalize::Voltage,
            Field::Hp => Normalize::Horsepower,
            Field::ManualUrl => Normalize::Link("href"),
            Field::ImageUrl => Normalize::Link("src"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    Trim,
    StripUnit(&'static str),
    Voltage,
    Horsepower,
    /// Read the attribute and resolve it against the site's base URL.
    Link(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(i64),
    Link(Url),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub field: Field,
    pub locator: Locator,
    pub normalize: Normalize,
    /// A failed required field aborts the product.
    pub required: bool,
}

/// One spec per field, in extraction order. The product id is always
/// required since it keys the record.
pub fn field_table(settings: &Settings) -> Vec<FieldSpec> {
    Field::ORDER
        .iter()
        .map(|&field| FieldSpec {
            field,
            locator: field.locator(),
            normalize: field.normalize(),
            required: field == Field::ProductId || settings.is_required(field.key()),
        })
        .collect()
}

/// Locate one element and normalize its value.
pub fn extract(page: &RenderedPage, spec: &FieldSpec, base: &Url) -> Result<FieldValue> {
    let key = spec.field.key();
    let el = page
        .locate(&spec.locator)?
        .ok_or_else(|| ScrapeError::extraction(key, format!("no element for {:?}", spec.locator)))?;

    match spec.normalize {
        Normalize::Trim => Ok(FieldValue::Text(dom::inner_text(el).trim().to_string())),
        Normalize::StripUnit(unit) => Ok(FieldValue::Text(normalize::strip_unit(
            &dom::inner_text(el),
            unit,
        ))),
        Normalize::Voltage => Ok(FieldValue::Text(normalize::voltage(&dom::inner_text(el)))),
        Normalize::Horsepower => {
            let raw = dom::inner_text(el);
            normalize::horsepower(&raw)
                .map(FieldValue::Number)
                .ok_or_else(|| ScrapeError::extraction(key, format!("not a rating: {raw:?}")))
        }
        Normalize::Link(attr) => {
            let href = dom::attribute(el, attr)
                .filter(|h| !h.trim().is_empty())
                .ok_or_else(|| ScrapeError::extraction(key, format!("element has no {attr}")))?;
            session::resolve(base, href)
                .map(FieldValue::Link)
                .map_err(|e| ScrapeError::extraction(key, format!("bad link {href:?}: {e}")))
        }
    }
}

/// Run every spec in order. A failed required field ends extraction with
/// its error; a failed optional field is logged and left empty.
pub fn extract_fields(page: &RenderedPage, table: &[FieldSpec], base: &Url) -> Result<ProductFields> {
    let mut fields = ProductFields::default();

    for spec in table {
        let value = match extract(page, spec, base) {
            Ok(v) => v,
            Err(e) if spec.required => {
                error!("Required field missing on {}: {}", page.url(), e);
                return Err(e);
            }
            Err(e) => {
                warn!("Optional field skipped on {}: {}", page.url(), e);
                continue;
            }
        };

        match (spec.field, value) {
            (Field::ProductId, FieldValue::Text(id)) => {
                if id.is_empty() {
                    let e = ScrapeError::extraction(spec.field.key(), "empty product id");
                    error!("Required field missing on {}: {}", page.url(), e);
                    return Err(e);
                }
                fields.product_id = id;
            }
            (Field::Description, FieldValue::Text(t)) => fields.description = Some(t),
            (Field::Frame, FieldValue::Text(t)) => fields.frame = Some(t),
            (Field::Rpm, FieldValue::Text(t)) => fields.rpm = Some(t),
            (Field::Voltage, FieldValue::Text(t)) => fields.voltage = Some(t),
            (Field::Hp, FieldValue::Number(n)) => fields.hp = Some(n),
            (Field::ManualUrl, FieldValue::Link(u)) => fields.manual_url = Some(u),
            (Field::ImageUrl, FieldValue::Link(u)) => fields.image_url = Some(u),
            (field, value) => warn!("Unexpected value {:?} for {:?}", value, field),
        }
    }

    Ok(fields)
}
