//! Destination key construction.
//!
//! Keys must be reproducible from the same inputs on every run: that is what
//! makes a second migration skip everything.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::config::{BRAND_MEDIA_SEGMENT, PRODUCT_MEDIA_SEGMENT};

/// Where a file lands under its brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    /// Brand-level media (`<brand>/scrolling_brand_media/<file>`)
    BrandMedia,
    /// Product media (`<brand>/scrolling_product_media/<product>/<file>`)
    ProductMedia,
}

impl MediaCategory {
    /// Storage path segment.
    pub fn segment(&self) -> &'static str {
        match self {
            MediaCategory::BrandMedia => BRAND_MEDIA_SEGMENT,
            MediaCategory::ProductMedia => PRODUCT_MEDIA_SEGMENT,
        }
    }

    /// Label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            MediaCategory::BrandMedia => "brand_media",
            MediaCategory::ProductMedia => "product_media",
        }
    }
}

/// Makes one path component safe for a storage key.
///
/// NFKD-decomposes and drops non-ASCII (so accents disappear), turns each
/// whitespace character into `_`, and strips anything outside
/// `[A-Za-z0-9._-]`.
///
/// ```
/// use brand_harvest::sanitize_key_component;
///
/// assert_eq!(sanitize_key_component("Café Olé 2"), "Cafe_Ole_2");
/// assert_eq!(sanitize_key_component("Linen & Co."), "Linen__Co.");
/// ```
pub fn sanitize_key_component(component: &str) -> String {
    component
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// Builds the destination key for a file.
///
/// Returns `None` when a component sanitizes to nothing, or when product
/// media has no product.
pub fn destination_key(
    brand: &str,
    category: MediaCategory,
    product: Option<&str>,
    file_name: &str,
) -> Option<String> {
    let brand = non_empty(sanitize_key_component(brand))?;
    let file = non_empty(sanitize_key_component(file_name))?;
    if file.chars().all(|c| c == '.') {
        return None;
    }
    match category {
        MediaCategory::BrandMedia => Some(format!("{}/{}/{}", brand, category.segment(), file)),
        MediaCategory::ProductMedia => {
            let product = non_empty(sanitize_key_component(product?))?;
            Some(format!(
                "{}/{}/{}/{}",
                brand,
                category.segment(),
                product,
                file
            ))
        }
    }
}

/// Storage folder holding a product's media.
pub fn product_folder_key(brand: &str, product: &str) -> Option<String> {
    let brand = non_empty(sanitize_key_component(brand))?;
    let product = non_empty(sanitize_key_component(product))?;
    Some(format!("{}/{}/{}", brand, PRODUCT_MEDIA_SEGMENT, product))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() || s == "." || s == ".." {
        None
    } else {
        Some(s)
    }
}
