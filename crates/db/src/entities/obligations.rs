//! `SeaORM` Entity for obligations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "obligations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub budget_id: Uuid,
    pub appropriation_id: Uuid,
    pub fiscal_year_id: Uuid,
    pub line_item_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub expended: Decimal,
    pub obligation_date: Date,
    #[sea_orm(column_type = "Text", nullable)]
    pub bona_fide_need_override: Option<String>,
    pub active: bool,
    pub created_by: Uuid,
    pub created_at: DateTimeUtc,
    pub cancelled_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budgets::Entity",
        from = "Column::BudgetId",
        to = "super::budgets::Column::Id"
    )]
    Budgets,
    #[sea_orm(
        belongs_to = "super::appropriations::Entity",
        from = "Column::AppropriationId",
        to = "super::appropriations::Column::Id"
    )]
    Appropriations,
    #[sea_orm(has_many = "super::expenditures::Entity")]
    Expenditures,
}

impl Related<super::budgets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl Related<super::appropriations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appropriations.def()
    }
}

impl Related<super::expenditures::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenditures.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
