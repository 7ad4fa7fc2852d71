//! Wire dictionary for book messages.
//!
//! A [`BookFields`] value names every field the writer produces and the
//! listeners consume. It is passed explicitly (usually behind an `Arc`) so
//! two books on different feeds can use different dictionaries in one
//! process.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Name and numeric tag of one wire field. A fid of zero means "match by
/// name only".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub fid: u16,
}

impl FieldDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, fid: u16) -> Self {
        Self {
            name: name.into(),
            fid,
        }
    }

    /// Fid match when both sides carry one, name match otherwise.
    #[must_use]
    pub fn matches(&self, name: &str, fid: u16) -> bool {
        if self.fid != 0 && fid != 0 {
            self.fid == fid
        } else {
            self.name == name
        }
    }
}

/// Every field used by book messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookFields {
    pub msg_type: FieldDescriptor,
    pub msg_status: FieldDescriptor,
    pub seq_num: FieldDescriptor,
    pub symbol: FieldDescriptor,
    pub part_id: FieldDescriptor,
    pub src_time: FieldDescriptor,
    pub book_time: FieldDescriptor,
    pub num_levels: FieldDescriptor,
    pub price_levels: FieldDescriptor,
    pub pl_price: FieldDescriptor,
    pub pl_side: FieldDescriptor,
    pub pl_action: FieldDescriptor,
    pub pl_size: FieldDescriptor,
    pub pl_size_change: FieldDescriptor,
    pub pl_time: FieldDescriptor,
    pub pl_num_entries: FieldDescriptor,
    pub pl_num_attach: FieldDescriptor,
    pub pl_entries: FieldDescriptor,
    pub pl_order_type: FieldDescriptor,
    pub entry_id: FieldDescriptor,
    pub entry_action: FieldDescriptor,
    pub entry_size: FieldDescriptor,
    pub entry_time: FieldDescriptor,
    pub entry_status: FieldDescriptor,
    pub book_type: FieldDescriptor,
}

impl Default for BookFields {
    fn default() -> Self {
        Self {
            msg_type: FieldDescriptor::new("MdMsgType", 1),
            msg_status: FieldDescriptor::new("MdMsgStatus", 2),
            seq_num: FieldDescriptor::new("MdSeqNum", 10),
            symbol: FieldDescriptor::new("wIssueSymbol", 305),
            part_id: FieldDescriptor::new("wPartId", 306),
            src_time: FieldDescriptor::new("wSrcTime", 465),
            book_time: FieldDescriptor::new("wBookTime", 681),
            num_levels: FieldDescriptor::new("wNumLevels", 651),
            price_levels: FieldDescriptor::new("wPriceLevels", 699),
            pl_price: FieldDescriptor::new("wPlPrice", 653),
            pl_side: FieldDescriptor::new("wPlSide", 655),
            pl_action: FieldDescriptor::new("wPlAction", 654),
            pl_size: FieldDescriptor::new("wPlSize", 656),
            pl_size_change: FieldDescriptor::new("wPlSizeChange", 657),
            pl_time: FieldDescriptor::new("wPlTime", 658),
            pl_num_entries: FieldDescriptor::new("wPlNumEntries", 659),
            pl_num_attach: FieldDescriptor::new("wPlNumAttach", 660),
            pl_entries: FieldDescriptor::new("wPlEntries", 661),
            pl_order_type: FieldDescriptor::new("wPlOrderType", 662),
            entry_id: FieldDescriptor::new("wEntryId", 671),
            entry_action: FieldDescriptor::new("wEntryAction", 672),
            entry_size: FieldDescriptor::new("wEntrySize", 673),
            entry_time: FieldDescriptor::new("wEntryTime", 674),
            entry_status: FieldDescriptor::new("wEntryStatus", 675),
            book_type: FieldDescriptor::new("wBookType", 682),
        }
    }
}

impl BookFields {
    /// Load a dictionary from JSON. Fields missing from the document keep
    /// their built-in name and fid.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_matches_by_fid_then_name() {
        let desc = FieldDescriptor::new("wPlPrice", 653);
        assert!(desc.matches("anything", 653));
        assert!(!desc.matches("wPlPrice", 654));
        assert!(desc.matches("wPlPrice", 0));

        let by_name = FieldDescriptor::new("wPlPrice", 0);
        assert!(by_name.matches("wPlPrice", 653));
        assert!(!by_name.matches("wPlSize", 656));
    }

    #[test]
    fn default_dictionary_has_unique_fids() {
        let fields = BookFields::default();
        let json = serde_json::to_value(&fields).unwrap();
        let mut fids: Vec<u64> = json
            .as_object()
            .unwrap()
            .values()
            .map(|v| v["fid"].as_u64().unwrap())
            .collect();
        let total = fids.len();
        fids.sort_unstable();
        fids.dedup();
        assert_eq!(fids.len(), total);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let fields =
            BookFields::from_json(r#"{"symbol":{"name":"Sym","fid":55}}"#).unwrap();
        assert_eq!(fields.symbol, FieldDescriptor::new("Sym", 55));
        assert_eq!(fields.pl_price, BookFields::default().pl_price);
    }

    #[test]
    fn bad_json_is_a_serialization_error() {
        let err = BookFields::from_json("{").unwrap_err();
        assert!(format!("{err}").starts_with("DC_ERR_901"));
    }
}
