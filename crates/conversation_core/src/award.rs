//! Parsers that turn free-text form responses into award detail fields.
//!
//! Field lists look like `Market: wm-us, Vendor: 123, Brand: Acme`. Each prefix has its own
//! rename table; unknown keys and fragments without a value are dropped.

use shared::domain::{AwardDetails, LineItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardField {
    Market,
    VendorNumber,
    Brand,
    AwardType,
    FreightTerms,
    AwardLength,
    CostIndex,
    PricingMethod,
    VolumeCommitment,
    Rofr,
    AutoRenewal,
}

impl AwardField {
    fn assign(self, details: &mut AwardDetails, value: &str) {
        let text = || Some(value.to_string());
        let flag = || Some(value == "Yes");
        match self {
            AwardField::Market => details.market = text(),
            AwardField::VendorNumber => details.vendor_number = text(),
            AwardField::Brand => details.brand = text(),
            AwardField::AwardType => details.award_type = text(),
            AwardField::FreightTerms => details.freight_terms = text(),
            AwardField::AwardLength => details.award_length = text(),
            AwardField::CostIndex => details.cost_index = text(),
            AwardField::PricingMethod => details.pricing_method = text(),
            AwardField::VolumeCommitment => details.volume_commitment = flag(),
            AwardField::Rofr => details.rofr = flag(),
            AwardField::AutoRenewal => details.auto_renewal = flag(),
        }
    }
}

#[derive(Debug)]
pub struct FieldTable {
    pub prefix: &'static str,
    pub renames: &'static [(&'static str, AwardField)],
}

pub const BASICS: FieldTable = FieldTable {
    prefix: "Market: ",
    renames: &[
        ("Market", AwardField::Market),
        ("Vendor", AwardField::VendorNumber),
        ("Brand", AwardField::Brand),
    ],
};

pub const TERMS: FieldTable = FieldTable {
    prefix: "Type: ",
    renames: &[
        ("Type", AwardField::AwardType),
        ("Freight", AwardField::FreightTerms),
        ("Length", AwardField::AwardLength),
        ("Index", AwardField::CostIndex),
        ("Pricing", AwardField::PricingMethod),
    ],
};

pub const CLAUSES: FieldTable = FieldTable {
    prefix: "Commitment: ",
    renames: &[
        ("Commitment", AwardField::VolumeCommitment),
        ("ROFR", AwardField::Rofr),
        ("Auto-Renewal", AwardField::AutoRenewal),
    ],
};

pub const ALL_TABLES: [&FieldTable; 3] = [&BASICS, &TERMS, &CLAUSES];

impl FieldTable {
    pub fn matches(&self, response: &str) -> bool {
        response.starts_with(self.prefix)
    }

    pub fn parse(&self, response: &str) -> AwardDetails {
        parse_field_list(response, &[self])
    }

    fn lookup(&self, key: &str) -> Option<AwardField> {
        self.renames
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, field)| *field)
    }
}

/// Parses `Key: Value` fragments against the first table that knows each key.
pub fn parse_field_list(response: &str, tables: &[&FieldTable]) -> AwardDetails {
    let mut details = AwardDetails::default();
    for (key, value) in response.split(", ").filter_map(|part| part.split_once(": ")) {
        let key = key.trim();
        if let Some(field) = tables.iter().find_map(|table| table.lookup(key)) {
            field.assign(&mut details, value.trim());
        }
    }
    details
}

/// Parses `upc,itemNumber,description,quantity,dc` lines. Lines missing a UPC or an item
/// number are dropped.
pub fn parse_line_items(text: &str) -> Vec<LineItem> {
    text.lines().filter_map(parse_line_item).collect()
}

fn parse_line_item(line: &str) -> Option<LineItem> {
    let mut fields = line.trim().split(',');
    let mut next = || fields.next().map(str::trim).unwrap_or_default().to_string();
    let item = LineItem {
        upc: next(),
        item_number: next(),
        description: next(),
        quantity: next(),
        dc: next(),
    };
    (!item.upc.is_empty() && !item.item_number.is_empty()).then_some(item)
}

/// True when every non-blank line has exactly five comma-separated fields and at least one
/// line yields an item.
pub fn looks_like_item_list(text: &str) -> bool {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty()).peekable();
    if lines.peek().is_none() {
        return false;
    }
    lines.all(|line| line.split(',').count() == 5) && !parse_line_items(text).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basics_populate_exactly_three_fields() {
        let details = BASICS.parse("Market: wm-us, Vendor: 123456, Brand: NatureWell");
        assert_eq!(
            details,
            AwardDetails {
                market: Some("wm-us".into()),
                vendor_number: Some("123456".into()),
                brand: Some("NatureWell".into()),
                ..AwardDetails::default()
            }
        );

        let json = serde_json::to_value(&details).expect("json");
        let mut keys = json
            .as_object()
            .expect("object")
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["brand", "market", "vendorNumber"]);
    }

    #[test]
    fn unknown_keys_and_bare_fragments_are_dropped() {
        let details = TERMS.parse("Type: Standard, Color: Blue, Freight, Pricing: Fixed");
        assert_eq!(details.award_type.as_deref(), Some("Standard"));
        assert_eq!(details.pricing_method.as_deref(), Some("Fixed"));
        assert_eq!(details.freight_terms, None);
        assert_eq!(details.market, None);
    }

    #[test]
    fn clauses_coerce_yes_to_true_and_anything_else_to_false() {
        let details = CLAUSES.parse("Commitment: Yes, ROFR: No, Auto-Renewal: maybe");
        assert_eq!(details.volume_commitment, Some(true));
        assert_eq!(details.rofr, Some(false));
        assert_eq!(details.auto_renewal, Some(false));
    }

    #[test]
    fn parse_field_list_consults_every_table() {
        let details = parse_field_list("Brand: Acme, Index: 2.4, ROFR: Yes", &ALL_TABLES);
        assert_eq!(details.brand.as_deref(), Some("Acme"));
        assert_eq!(details.cost_index.as_deref(), Some("2.4"));
        assert_eq!(details.rofr, Some(true));
    }

    #[test]
    fn parses_item_lines_in_order() {
        let items = parse_line_items("111,SKU1,Widget,10,DC1\n222,SKU2,Gadget,5,DC2");
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            LineItem {
                upc: "111".into(),
                item_number: "SKU1".into(),
                description: "Widget".into(),
                quantity: "10".into(),
                dc: "DC1".into(),
            }
        );
        assert_eq!(items[1].upc, "222");
        assert_eq!(items[1].item_number, "SKU2");
        assert_eq!(items[1].description, "Gadget");
        assert_eq!(items[1].quantity, "5");
        assert_eq!(items[1].dc, "DC2");
    }

    #[test]
    fn drops_lines_missing_upc_or_item_number() {
        let items = parse_line_items("111,SKU1,Widget,10,DC1\n,,,,");
        assert_eq!(items.len(), 1);
        assert!(parse_line_items("333,,Thing,1,DC9").is_empty());
    }

    #[test]
    fn detects_item_lists() {
        assert!(looks_like_item_list("111,SKU1,Widget,10,DC1\n222,SKU2,Gadget,5,DC2"));
        assert!(!looks_like_item_list("Market: wm-us, Vendor: 1, Brand: A"));
        assert!(!looks_like_item_list(",,,,"));
        assert!(!looks_like_item_list(""));
    }
}
