//! Entries: one leg of a transaction, booked in one account.

use crate::commodity::COMMODITY;
use ledgergraph_storage::{EntitySchema, EntityTypeId, PropertyId, Value, ValueType};

/// Entity type of an entry.
pub const ENTRY: EntityTypeId = EntityTypeId::new(3);

/// Signed amount in minor units of the entry's commodity.
pub const AMOUNT: PropertyId = PropertyId::new(ENTRY, 0);
/// Free-form memo.
pub const MEMO: PropertyId = PropertyId::new(ENTRY, 1);
/// Whether the entry matched a bank statement.
pub const RECONCILED: PropertyId = PropertyId::new(ENTRY, 2);
/// Commodity of the amount; `Null` means the account's currency.
pub const COMMODITY_REF: PropertyId = PropertyId::new(ENTRY, 3);
/// The other leg of a transfer between two accounts.
pub const COUNTERPART: PropertyId = PropertyId::new(ENTRY, 4);

pub(crate) fn schema() -> EntitySchema {
    EntitySchema::new(ENTRY, "Entry")
        .scalar(AMOUNT, "amount", ValueType::Integer)
        .scalar_with_default(MEMO, "memo", ValueType::Text, Value::Null)
        .scalar(RECONCILED, "reconciled", ValueType::Bool)
        .reference(COMMODITY_REF, "commodity", COMMODITY)
        .reference(COUNTERPART, "counterpart", ENTRY)
}
