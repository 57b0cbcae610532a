//! # Coupon Evaluation
//!
//! Turns a coupon record into customer-facing text and a discount amount, and
//! checks whether a coupon applies to a SKU or a cart.
//!
//! `req_skus` and `coupon_source` are `|`-separated lists. For
//! "Buy 1 Get 1 Free" coupons each required SKU is a delimited pattern such as
//! `/^VITA-/i`, and an entry that is not a usable pattern is compared as a
//! literal SKU; for every other type it is a literal SKU.
//!
//! A Buy 1 Get 1 Free discount on a single price is always zero: pricing the
//! free item needs the basket contents, which [`discount_on_price`] does not
//! receive.

use std::collections::BTreeMap;
use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::warn;

use crate::db::AppDb;
use crate::error::ReportResult;
use crate::models::Coupon;

/// Shipping charge waived by a free-shipping coupon.
pub const DEFAULT_SHIPPING: f64 = 4.99;

const LIST_DELIMITER: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiscountType {
    #[serde(rename = "Percent Discount")]
    PercentDiscount,
    #[serde(rename = "Free Shipping")]
    FreeShipping,
    #[serde(rename = "Shipping Discount")]
    ShippingDiscount,
    #[serde(rename = "Buy 1 Get 1 Free")]
    BuyOneGetOneFree,
    #[serde(rename = "Flat Discount")]
    FlatDiscount,
}

impl DiscountType {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Percent Discount" => Some(Self::PercentDiscount),
            "Free Shipping" => Some(Self::FreeShipping),
            "Shipping Discount" => Some(Self::ShippingDiscount),
            "Buy 1 Get 1 Free" => Some(Self::BuyOneGetOneFree),
            "Flat Discount" => Some(Self::FlatDiscount),
            _ => None,
        }
    }
}

impl Coupon {
    pub fn kind(&self) -> Option<DiscountType> {
        DiscountType::from_label(&self.discount_type)
    }

    fn has_required_skus(&self) -> bool {
        !self.req_skus.is_empty()
    }
}

/// A coupon applied to a price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountQuote {
    /// Formatted discount amount, e.g. `"12.50"`.
    pub discount: String,
    #[serde(rename = "type")]
    pub discount_type: String,
    pub free_shipping: bool,
    pub value: f64,
    pub description: String,
    pub response: Option<String>,
}

/// Look a coupon up by code. An empty code or unknown coupon gives `None`.
pub async fn find_coupon(pool: &AppDb, coupon_code: &str) -> ReportResult<Option<Coupon>> {
    if coupon_code.is_empty() {
        return Ok(None);
    }

    let coupon = sqlx::query_as(
        r#"
        SELECT
            coupon_id, coupon_code, description, value::float8 AS value,
            discount_type, req_skus, can_recur, count, expiration, active,
            is_giftcard, coupon_source, order_type, crm_class
        FROM coupons
        WHERE coupon_code = $1
        "#,
    )
    .bind(coupon_code)
    .fetch_optional(pool)
    .await?;

    Ok(coupon)
}

/// A code is valid when a coupon with exactly that code exists.
pub fn is_valid(coupon: Option<&Coupon>, coupon_code: &str) -> bool {
    coupon.is_some_and(|c| c.coupon_code == coupon_code)
}

/// Customer-facing text for a coupon. A non-empty `custom_message` replaces
/// the default text with its placeholders filled in.
pub fn description(coupon: &Coupon, custom_message: Option<&str>) -> Option<String> {
    let kind = coupon.kind()?;
    let code = &coupon.coupon_code;

    let mut discount = None;
    let mut percent = None;

    let text = match kind {
        DiscountType::PercentDiscount => {
            let pct = format_percent(coupon.value);
            let text = if coupon.has_required_skus() {
                coupon.description.clone()
            } else {
                format!("Save {}% with your promo code: {}", pct, code)
            };
            percent = Some(pct);
            text
        }
        DiscountType::FreeShipping => {
            format!("You'll receive free shipping with your promo code: {}", code)
        }
        DiscountType::ShippingDiscount => {
            let amount = format_money(coupon.value);
            let text = format!("Save ${} off shipping with your promo code: {}", amount, code);
            discount = Some(amount);
            text
        }
        DiscountType::BuyOneGetOneFree => coupon.description.clone(),
        DiscountType::FlatDiscount => {
            let amount = format_money(coupon.value);
            let text = if coupon.has_required_skus() {
                coupon.description.clone()
            } else {
                format!(
                    "Save ${} off the total order with your promo code: {}",
                    amount, code
                )
            };
            discount = Some(amount);
            text
        }
    };

    Some(match custom_message.filter(|m| !m.is_empty()) {
        Some(template) => fill_template(template, code, discount.as_deref(), percent.as_deref()),
        None => text,
    })
}

/// Apply a coupon to a price in dollars. A zero price gives `None`.
pub fn discount_on_price(
    coupon: &Coupon,
    price_in_dollars: f64,
    custom_message: Option<&str>,
) -> Option<DiscountQuote> {
    if price_in_dollars == 0.0 {
        return None;
    }

    let code = &coupon.coupon_code;
    let mut free_shipping = false;
    let mut percent = None;

    let (discount, response) = match coupon.kind() {
        Some(DiscountType::PercentDiscount) => {
            let amount = round_cents(price_in_dollars * coupon.value);
            let pct = format_percent(coupon.value);
            let response = format!("Save {}% with your promo code: {}", pct, code);
            percent = Some(pct);
            (format_money(amount), Some(response))
        }
        Some(DiscountType::FreeShipping) => {
            free_shipping = true;
            (
                format_money(DEFAULT_SHIPPING),
                Some(format!(
                    "You'll receive free shipping with your promo code: {}",
                    code
                )),
            )
        }
        Some(DiscountType::ShippingDiscount) => {
            let amount = format_money(coupon.value);
            let response = format!("Save ${} off shipping with your promo code: {}", amount, code);
            (amount, Some(response))
        }
        Some(DiscountType::BuyOneGetOneFree) => {
            (format_money(0.0), Some(coupon.description.clone()))
        }
        Some(DiscountType::FlatDiscount) => {
            let amount = format_money(coupon.value);
            let response = format!(
                "Save ${} off the total order with your promo code: {}",
                amount, code
            );
            (amount, Some(response))
        }
        None => {
            warn!("Coupon {} has unknown type {:?}", code, coupon.discount_type);
            (format_money(0.0), None)
        }
    };

    let response = match custom_message.filter(|m| !m.is_empty()) {
        Some(template) => Some(fill_template(template, code, Some(&discount), percent.as_deref())),
        None => response,
    };

    Some(DiscountQuote {
        discount,
        discount_type: coupon.discount_type.clone(),
        free_shipping,
        value: coupon.value,
        description: coupon.description.clone(),
        response,
    })
}

/// Whether the coupon may be used from `source` (e.g. a site or campaign name).
pub fn is_type(coupon: &Coupon, source: &str) -> bool {
    coupon
        .coupon_source
        .split(LIST_DELIMITER)
        .any(|allowed| allowed == source)
}

/// Whether the coupon's required SKUs allow it on `sku`.
pub fn applies_to_sku(coupon: &Coupon, sku: &str) -> bool {
    if !coupon.has_required_skus() {
        return true;
    }

    let pattern_match = coupon.kind() == Some(DiscountType::BuyOneGetOneFree);
    coupon.req_skus.split(LIST_DELIMITER).any(|required| {
        let matches_pattern = pattern_match
            && !required.is_empty()
            && SkuPattern::parse(required).is_some_and(|p| p.is_match(sku));
        matches_pattern || required == sku
    })
}

/// Whether a cart (SKU to quantity) satisfies a coupon's SKU requirements.
///
/// Buy 1 Get 1 Free needs at least two matching items for some pattern; every
/// other type needs one required SKU present in the cart.
pub fn requirements_met(
    cart: &BTreeMap<String, i64>,
    req_skus: &str,
    discount_type: Option<DiscountType>,
) -> bool {
    if req_skus.is_empty() {
        return true;
    }

    req_skus
        .split(LIST_DELIMITER)
        .filter(|required| !required.is_empty())
        .any(|required| {
            if discount_type == Some(DiscountType::BuyOneGetOneFree) {
                match SkuPattern::parse(required) {
                    Some(pattern) => count_matching(cart, &pattern) > 1,
                    None => false,
                }
            } else {
                cart.contains_key(required)
            }
        })
}

/// Total quantity of cart items whose SKU matches `pattern`.
pub fn count_matching_items(cart: &BTreeMap<String, i64>, pattern: &str) -> i64 {
    SkuPattern::parse(pattern)
        .map(|p| count_matching(cart, &p))
        .unwrap_or(0)
}

fn count_matching(cart: &BTreeMap<String, i64>, pattern: &SkuPattern) -> i64 {
    cart.iter()
        .filter(|(sku, _)| pattern.is_match(sku))
        .map(|(_, qty)| *qty)
        .sum()
}

/// A delimited SKU pattern, `/body/flags`. Supported flags: `i`, `m`, `s`, `x`.
#[derive(Debug, Clone)]
pub struct SkuPattern {
    regex: Regex,
}

impl SkuPattern {
    pub fn parse(delimited: &str) -> Option<Self> {
        let mut chars = delimited.chars();
        let open = chars.next()?;
        let close = match open {
            '(' => ')',
            '{' => '}',
            '[' => ']',
            '<' => '>',
            c if c.is_alphanumeric() || c == '\\' || c.is_whitespace() => {
                warn!("SKU pattern {:?} has no delimiter", delimited);
                return None;
            }
            c => c,
        };

        let rest = &delimited[open.len_utf8()..];
        let Some(end) = rest.rfind(close) else {
            warn!("SKU pattern {:?} is not closed", delimited);
            return None;
        };
        let (body, flags) = (&rest[..end], &rest[end + close.len_utf8()..]);

        let mut builder = RegexBuilder::new(body);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    warn!("Unsupported flag {:?} in SKU pattern {:?}", other, delimited);
                    return None;
                }
            };
        }

        match builder.build() {
            Ok(regex) => Some(Self { regex }),
            Err(e) => {
                warn!("Invalid SKU pattern {:?}: {}", delimited, e);
                None
            }
        }
    }

    pub fn is_match(&self, sku: &str) -> bool {
        self.regex.is_match(sku)
    }
}

impl fmt::Display for SkuPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.regex.as_str())
    }
}

fn fill_template(
    template: &str,
    coupon_code: &str,
    discount: Option<&str>,
    percent: Option<&str>,
) -> String {
    let mut text = template.replace("{coupon_code}", coupon_code);
    if let Some(discount) = discount {
        text = text.replace("{discount}", discount);
    }
    if let Some(percent) = percent {
        text = text.replace("{percent_val}", percent);
    }
    text
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Two decimals with thousands separators: `1234.5` → `"1,234.50"`.
pub fn format_money(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

/// A fractional rate as a percentage without trailing zeros: `0.15` → `"15"`.
fn format_percent(rate: f64) -> String {
    let pct = format!("{:.4}", rate * 100.0);
    match pct.trim_end_matches('0').trim_end_matches('.') {
        "" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(code: &str, kind: &str, value: f64, req_skus: &str) -> Coupon {
        Coupon {
            coupon_id: 1,
            coupon_code: code.into(),
            description: "Buy one bottle, get one free".into(),
            value,
            discount_type: kind.into(),
            req_skus: req_skus.into(),
            can_recur: false,
            count: 0,
            expiration: None,
            active: true,
            is_giftcard: false,
            coupon_source: "web|phone".into(),
            order_type: None,
            crm_class: None,
        }
    }

    fn cart(items: &[(&str, i64)]) -> BTreeMap<String, i64> {
        items.iter().map(|(s, q)| (s.to_string(), *q)).collect()
    }

    #[test]
    fn test_descriptions_by_type() {
        assert_eq!(
            description(&coupon("SAVE15", "Percent Discount", 0.15, ""), None).unwrap(),
            "Save 15% with your promo code: SAVE15"
        );
        assert_eq!(
            description(&coupon("SHIP", "Free Shipping", 0.0, ""), None).unwrap(),
            "You'll receive free shipping with your promo code: SHIP"
        );
        assert_eq!(
            description(&coupon("SHIP2", "Shipping Discount", 2.5, ""), None).unwrap(),
            "Save $2.50 off shipping with your promo code: SHIP2"
        );
        assert_eq!(
            description(&coupon("FLAT", "Flat Discount", 1500.0, ""), None).unwrap(),
            "Save $1,500.00 off the total order with your promo code: FLAT"
        );
        assert_eq!(
            description(&coupon("FLAT", "Flat Discount", 5.0, "SKU1"), None).unwrap(),
            "Buy one bottle, get one free"
        );
        assert!(description(&coupon("X", "Mystery", 1.0, ""), None).is_none());
    }

    #[test]
    fn test_custom_message_placeholders() {
        let c = coupon("SAVE12", "Percent Discount", 0.125, "");
        assert_eq!(
            description(&c, Some("Use {coupon_code} for {percent_val}% off")).unwrap(),
            "Use SAVE12 for 12.5% off"
        );

        let quote = discount_on_price(&c, 80.0, Some("{coupon_code}: ${discount} off")).unwrap();
        assert_eq!(quote.response.as_deref(), Some("SAVE12: $10.00 off"));
    }

    #[test]
    fn test_discount_on_price() {
        assert!(discount_on_price(&coupon("P", "Percent Discount", 0.2, ""), 0.0, None).is_none());

        let percent = discount_on_price(&coupon("P", "Percent Discount", 0.2, ""), 49.99, None).unwrap();
        assert_eq!(percent.discount, "10.00");
        assert!(!percent.free_shipping);

        let shipping = discount_on_price(&coupon("S", "Free Shipping", 0.0, ""), 30.0, None).unwrap();
        assert_eq!(shipping.discount, "4.99");
        assert!(shipping.free_shipping);

        let b1g1 = discount_on_price(&coupon("B", "Buy 1 Get 1 Free", 0.0, ""), 30.0, None).unwrap();
        assert_eq!(b1g1.discount, "0.00");
        assert_eq!(b1g1.response.as_deref(), Some("Buy one bottle, get one free"));
    }

    #[test]
    fn test_validity_and_sources() {
        let c = coupon("SAVE15", "Percent Discount", 0.15, "");
        assert!(is_valid(Some(&c), "SAVE15"));
        assert!(!is_valid(Some(&c), "save15"));
        assert!(!is_valid(None, "SAVE15"));

        assert!(is_type(&c, "phone"));
        assert!(!is_type(&c, "mail"));
    }

    #[test]
    fn test_applies_to_sku() {
        assert!(applies_to_sku(&coupon("A", "Flat Discount", 5.0, ""), "ANY"));
        assert!(applies_to_sku(&coupon("A", "Flat Discount", 5.0, "SKU1|SKU2"), "SKU2"));
        assert!(!applies_to_sku(&coupon("A", "Flat Discount", 5.0, "SKU1|SKU2"), "SKU3"));

        let b1g1 = coupon("B", "Buy 1 Get 1 Free", 0.0, "/^vita-/i|");
        assert!(applies_to_sku(&b1g1, "VITA-30"));
        assert!(!applies_to_sku(&b1g1, "MINERAL-30"));

        let literal = coupon("B", "Buy 1 Get 1 Free", 0.0, "SKU1|/^vita-/i");
        assert!(applies_to_sku(&literal, "SKU1"));
        assert!(applies_to_sku(&literal, "VITA-60"));
        assert!(!applies_to_sku(&literal, "SKU2"));
    }

    #[test]
    fn test_requirements_met() {
        let basket = cart(&[("VITA-30", 1), ("VITA-60", 1), ("FISH-OIL", 1)]);

        assert!(requirements_met(&basket, "", None));
        assert!(requirements_met(&basket, "|FISH-OIL", Some(DiscountType::FlatDiscount)));
        assert!(!requirements_met(&basket, "KRILL", Some(DiscountType::FlatDiscount)));

        let b1g1 = Some(DiscountType::BuyOneGetOneFree);
        assert!(requirements_met(&basket, "/^VITA-/", b1g1));
        assert!(!requirements_met(&basket, "/^FISH/", b1g1));
        assert!(requirements_met(&cart(&[("FISH-OIL", 2)]), "/^FISH/", b1g1));
    }

    #[test]
    fn test_count_matching_items() {
        let basket = cart(&[("VITA-30", 2), ("VITA-60", 3), ("FISH-OIL", 1)]);
        assert_eq!(count_matching_items(&basket, "/VITA/"), 5);
        assert_eq!(count_matching_items(&basket, "#oil$#i"), 1);
        assert_eq!(count_matching_items(&basket, "no-delimiters"), 0);
        assert_eq!(count_matching_items(&basket, "/unclosed"), 0);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(4.99), "4.99");
        assert_eq!(format_money(1234567.891), "1,234,567.89");
        assert_eq!(format_money(-12.5), "-12.50");
    }
}
