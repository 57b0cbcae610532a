//! Parsing of the `sku,qty|sku,qty|...` strings stored on orders.

use std::collections::BTreeMap;

use tracing::warn;

/// SKU to quantity. `None` means the segment carried no usable quantity,
/// which is not the same as a quantity of zero.
pub type SkuQuantity = BTreeMap<String, Option<i64>>;

const SEGMENT_DELIMITER: char = '|';
const FIELD_DELIMITER: char = ',';

/// Parse an order's SKU string. Empty or absent input gives an empty map.
///
/// Empty segments (`A,2||B,3`, trailing `|`) are dropped. A repeated SKU keeps
/// the quantity of its last segment.
pub fn parse_sku_string(input: Option<&str>) -> SkuQuantity {
    let mut skus = SkuQuantity::new();

    let Some(input) = input else {
        return skus;
    };

    for segment in input.split(SEGMENT_DELIMITER) {
        if segment.is_empty() {
            continue;
        }

        let mut fields = segment.split(FIELD_DELIMITER);
        let sku = fields.next().unwrap_or_default();
        let quantity = fields.next().and_then(|raw| parse_quantity(sku, raw));

        skus.insert(sku.to_string(), quantity);
    }

    skus
}

fn parse_quantity(sku: &str, raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.parse::<i64>() {
        Ok(qty) => Some(qty),
        Err(_) => {
            warn!("Ignoring non-numeric quantity {:?} for SKU {}", raw, sku);
            None
        }
    }
}
