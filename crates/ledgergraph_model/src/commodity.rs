//! Currencies and securities.

use ledgergraph_storage::{EntitySchema, EntityTypeId, PropertyId, Value, ValueType};

/// Entity type of a commodity.
pub const COMMODITY: EntityTypeId = EntityTypeId::new(4);

/// Ticker or ISO 4217 code.
pub const SYMBOL: PropertyId = PropertyId::new(COMMODITY, 0);
/// Display name.
pub const NAME: PropertyId = PropertyId::new(COMMODITY, 1);
/// Number of decimal places between minor and major units.
pub const DECIMALS: PropertyId = PropertyId::new(COMMODITY, 2);

pub(crate) fn schema() -> EntitySchema {
    EntitySchema::new(COMMODITY, "Commodity")
        .scalar(SYMBOL, "symbol", ValueType::Text)
        .scalar(NAME, "name", ValueType::Text)
        .scalar_with_default(DECIMALS, "decimals", ValueType::Integer, Value::Integer(2))
}
