//! Accounts and their entries.

use crate::{commodity::COMMODITY, entry::ENTRY};
use ledgergraph_storage::{EntitySchema, EntityTypeId, PropertyId, ValueType};

/// Entity type of an account.
pub const ACCOUNT: EntityTypeId = EntityTypeId::new(2);

/// Account name, unique among its siblings by convention only.
pub const NAME: PropertyId = PropertyId::new(ACCOUNT, 0);
/// Currency the account is kept in.
pub const CURRENCY: PropertyId = PropertyId::new(ACCOUNT, 1);
/// Opening balance in minor units.
pub const OPENING_BALANCE: PropertyId = PropertyId::new(ACCOUNT, 2);
/// Closed accounts are kept for history but not offered for new entries.
pub const CLOSED: PropertyId = PropertyId::new(ACCOUNT, 3);
/// Entries booked against the account.
pub const ENTRIES: PropertyId = PropertyId::new(ACCOUNT, 4);
/// Child accounts.
pub const SUBACCOUNTS: PropertyId = PropertyId::new(ACCOUNT, 5);

pub(crate) fn schema() -> EntitySchema {
    EntitySchema::new(ACCOUNT, "Account")
        .scalar(NAME, "name", ValueType::Text)
        .reference(CURRENCY, "currency", COMMODITY)
        .scalar(OPENING_BALANCE, "opening_balance", ValueType::Integer)
        .scalar(CLOSED, "closed", ValueType::Bool)
        .list(ENTRIES, "entries", ENTRY)
        .list(SUBACCOUNTS, "subaccounts", ACCOUNT)
}
