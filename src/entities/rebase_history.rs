//! `SeaORM` Entity for rebase_history table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Numeric columns are bounded by `rust_decimal`, which holds at most 28
/// integer digits; wider on-chain values are rejected before insert.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rebase_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Market oracle payload (fixed-point)
    #[sea_orm(column_type = "Decimal(Some((28, 0)))", nullable)]
    pub usd_price: Option<Decimal>,
    /// CPI oracle payload (fixed-point)
    #[sea_orm(column_type = "Decimal(Some((28, 0)))", nullable)]
    pub cpi_value: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((28, 0)))", nullable)]
    pub total_supply: Option<Decimal>,
    /// UTC, stored without offset
    pub date: Option<DateTime>,
    /// Supply direction versus the previous entry, NULL when unknown
    pub raised: Option<bool>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
