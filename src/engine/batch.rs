use crate::model::TransactionRecord;

/// A storefront-reported failure. No record is kept for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPurchase {
    pub transaction_id: String,
    pub product_id: String,
    pub error_description: Option<String>,
}

/// Outcome of reconciling one terminal storefront event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Purchased(TransactionRecord),
    Restored(TransactionRecord),
    Failed(FailedPurchase),
}

impl Resolved {
    pub fn transaction_id(&self) -> &str {
        match self {
            Self::Purchased(record) | Self::Restored(record) => &record.transaction_id,
            Self::Failed(failed) => &failed.transaction_id,
        }
    }

    pub fn product_id(&self) -> &str {
        match self {
            Self::Purchased(record) | Self::Restored(record) => record.product_id(),
            Self::Failed(failed) => &failed.product_id,
        }
    }

    /// The persisted record, for outcomes that need verification.
    pub fn record(&self) -> Option<&TransactionRecord> {
        match self {
            Self::Purchased(record) | Self::Restored(record) => Some(record),
            Self::Failed(_) => None,
        }
    }
}

/// Terminal outcomes of one storefront batch, in delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBatch {
    items: Vec<Resolved>,
}

impl ResolvedBatch {
    pub fn push(&mut self, item: Resolved) {
        self.items.push(item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolved> + '_ {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn purchased(&self) -> impl Iterator<Item = &TransactionRecord> + '_ {
        self.items.iter().filter_map(|item| match item {
            Resolved::Purchased(record) => Some(record),
            _ => None,
        })
    }

    pub fn restored(&self) -> impl Iterator<Item = &TransactionRecord> + '_ {
        self.items.iter().filter_map(|item| match item {
            Resolved::Restored(record) => Some(record),
            _ => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &FailedPurchase> + '_ {
        self.items.iter().filter_map(|item| match item {
            Resolved::Failed(failed) => Some(failed),
            _ => None,
        })
    }

    /// Purchased and restored records, the part that goes to verification.
    pub fn records(&self) -> impl Iterator<Item = &TransactionRecord> + '_ {
        self.items.iter().filter_map(Resolved::record)
    }
}
