//! The root of a finance file.

use crate::{account::ACCOUNT, commodity::COMMODITY};
use ledgergraph_storage::{EntitySchema, EntityTypeId, PropertyId, ValueType};

/// Entity type of the session root.
pub const SESSION: EntityTypeId = EntityTypeId::new(1);

/// Display name of the finance file.
pub const NAME: PropertyId = PropertyId::new(SESSION, 0);
/// Commodities (currencies, stocks) known to the file.
pub const COMMODITIES: PropertyId = PropertyId::new(SESSION, 1);
/// Top-level accounts.
pub const ACCOUNTS: PropertyId = PropertyId::new(SESSION, 2);

pub(crate) fn schema() -> EntitySchema {
    EntitySchema::new(SESSION, "Session")
        .scalar(NAME, "name", ValueType::Text)
        .list(COMMODITIES, "commodities", COMMODITY)
        .list(ACCOUNTS, "accounts", ACCOUNT)
}
