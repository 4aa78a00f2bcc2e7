//! Reservation entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub spot_id: String,
    pub user_id: String,

    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,

    /// Spot type at booking time
    pub unit_type: String,

    pub final_price: i64,

    /// Serialized `PriceBreakdown`
    pub price_breakdown: String,

    /// upcoming, active, completed, cancelled
    pub status: String,

    pub vehicle_plate: String,

    #[sea_orm(nullable)]
    pub vehicle_description: Option<String>,

    #[sea_orm(nullable)]
    pub payment_method: Option<String>,

    #[sea_orm(nullable)]
    pub payment_reference: Option<String>,

    #[sea_orm(nullable)]
    pub paid_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::parking_spot::Entity",
        from = "Column::SpotId",
        to = "super::parking_spot::Column::Id"
    )]
    ParkingSpot,
}

impl Related<super::parking_spot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ParkingSpot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
