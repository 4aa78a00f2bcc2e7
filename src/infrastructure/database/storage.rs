//! Database storage implementation using SeaORM

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};
use tracing::{debug, warn};

use super::entities::{parking_spot, reservation};
use crate::domain::{
    DomainError, DomainResult, Mutation, ParkingSpot, PaymentConfirmation, PersistenceAdapter,
    Reservation, ReservationStatus, TimeWindow, VehicleInfo,
};
use crate::shared::errors::InfraError;

/// Database storage implementation
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get database connection reference
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn db_err(e: sea_orm::DbErr) -> DomainError {
    InfraError::Database(e).into()
}

fn corrupt(e: DomainError) -> DomainError {
    DomainError::Persistence(format!("corrupt row: {}", e))
}

fn spot_model_to_domain(m: parking_spot::Model) -> DomainResult<ParkingSpot> {
    Ok(ParkingSpot {
        spot_type: m.spot_type.parse().map_err(corrupt)?,
        status: m.status.parse().map_err(corrupt)?,
        id: m.id,
        facility_id: m.facility_id,
        spot_number: m.spot_number,
    })
}

fn spot_to_active_model(spot: &ParkingSpot) -> parking_spot::ActiveModel {
    parking_spot::ActiveModel {
        id: Set(spot.id.clone()),
        facility_id: Set(spot.facility_id.clone()),
        spot_number: Set(spot.spot_number.clone()),
        spot_type: Set(spot.spot_type.as_str().to_string()),
        status: Set(spot.status.as_str().to_string()),
        updated_at: Set(Utc::now()),
    }
}

fn reservation_model_to_domain(m: reservation::Model) -> DomainResult<Reservation> {
    let price = serde_json::from_str(&m.price_breakdown).map_err(InfraError::from)?;
    let payment = match (m.payment_method, m.payment_reference, m.paid_at) {
        (Some(method), Some(reference), Some(paid_at)) => Some(PaymentConfirmation {
            method: method.parse().map_err(corrupt)?,
            reference,
            paid_at,
        }),
        _ => None,
    };

    Ok(Reservation {
        id: m.id,
        spot_id: m.spot_id,
        user_id: m.user_id,
        window: TimeWindow {
            start: m.start_time,
            end: m.end_time,
        },
        unit_type: m.unit_type.parse().map_err(corrupt)?,
        price,
        status: m.status.parse().map_err(corrupt)?,
        vehicle: VehicleInfo {
            plate: m.vehicle_plate,
            description: m.vehicle_description,
        },
        payment,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn reservation_to_active_model(r: &Reservation) -> DomainResult<reservation::ActiveModel> {
    let price_breakdown = serde_json::to_string(&r.price).map_err(InfraError::from)?;
    Ok(reservation::ActiveModel {
        id: Set(r.id.clone()),
        spot_id: Set(r.spot_id.clone()),
        user_id: Set(r.user_id.clone()),
        start_time: Set(r.window.start),
        end_time: Set(r.window.end),
        unit_type: Set(r.unit_type.as_str().to_string()),
        final_price: Set(r.final_price()),
        price_breakdown: Set(price_breakdown),
        status: Set(r.status.as_str().to_string()),
        vehicle_plate: Set(r.vehicle.plate.clone()),
        vehicle_description: Set(r.vehicle.description.clone()),
        payment_method: Set(r.payment.as_ref().map(|p| p.method.as_str().to_string())),
        payment_reference: Set(r.payment.as_ref().map(|p| p.reference.clone())),
        paid_at: Set(r.payment.as_ref().map(|p| p.paid_at)),
        created_at: Set(r.created_at),
        updated_at: Set(r.updated_at),
    })
}

fn models_to_domain(models: Vec<reservation::Model>) -> DomainResult<Vec<Reservation>> {
    models.into_iter().map(reservation_model_to_domain).collect()
}

async fn load_in_txn(txn: &DatabaseTransaction, id: &str) -> DomainResult<Option<Reservation>> {
    reservation::Entity::find_by_id(id.to_string())
        .one(txn)
        .await
        .map_err(db_err)?
        .map(reservation_model_to_domain)
        .transpose()
}

/// Apply one mutation inside `txn`.
async fn apply(txn: &DatabaseTransaction, mutation: Mutation) -> DomainResult<()> {
    match mutation {
        Mutation::UpsertSpot(spot) => {
            parking_spot::Entity::insert(spot_to_active_model(&spot))
                .on_conflict(
                    OnConflict::column(parking_spot::Column::Id)
                        .update_columns([
                            parking_spot::Column::FacilityId,
                            parking_spot::Column::SpotNumber,
                            parking_spot::Column::SpotType,
                            parking_spot::Column::Status,
                            parking_spot::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(txn)
                .await
                .map_err(db_err)?;
        }
        Mutation::InsertReservation(r) => {
            if let Some(stored) = load_in_txn(txn, &r.id).await? {
                if stored.same_booking(&r) {
                    debug!(reservation_id = %r.id, "Insert already applied");
                    return Ok(());
                }
                return Err(DomainError::StaleWrite(format!(
                    "reservation {} already exists",
                    r.id
                )));
            }
            reservation::Entity::insert(reservation_to_active_model(&r)?)
                .exec_without_returning(txn)
                .await
                .map_err(db_err)?;
        }
        Mutation::TransitionReservation {
            reservation: r,
            expected,
        } => {
            let result = reservation::Entity::update_many()
                .col_expr(
                    reservation::Column::Status,
                    Expr::value(r.status.as_str()),
                )
                .col_expr(reservation::Column::UpdatedAt, Expr::value(r.updated_at))
                .filter(reservation::Column::Id.eq(r.id.as_str()))
                .filter(reservation::Column::Status.eq(expected.as_str()))
                .exec(txn)
                .await
                .map_err(db_err)?;
            if result.rows_affected == 0 {
                let applied = load_in_txn(txn, &r.id)
                    .await?
                    .is_some_and(|stored| r.transition_applied(&stored));
                if applied {
                    debug!(reservation_id = %r.id, "Transition already applied");
                    return Ok(());
                }
                return Err(DomainError::StaleWrite(format!(
                    "reservation {} is no longer {}",
                    r.id, expected
                )));
            }
        }
        Mutation::RecordPayment {
            reservation_id,
            payment,
            updated_at,
        } => {
            let result = reservation::Entity::update_many()
                .col_expr(
                    reservation::Column::PaymentMethod,
                    Expr::value(payment.method.as_str()),
                )
                .col_expr(
                    reservation::Column::PaymentReference,
                    Expr::value(payment.reference.clone()),
                )
                .col_expr(reservation::Column::PaidAt, Expr::value(payment.paid_at))
                .col_expr(reservation::Column::UpdatedAt, Expr::value(updated_at))
                .filter(reservation::Column::Id.eq(reservation_id.as_str()))
                .filter(
                    Condition::any()
                        .add(reservation::Column::PaymentReference.is_null())
                        .add(reservation::Column::PaymentReference.eq(payment.reference.as_str())),
                )
                .exec(txn)
                .await
                .map_err(db_err)?;
            if result.rows_affected == 0 {
                let reason = match load_in_txn(txn, &reservation_id).await? {
                    Some(_) => "already carries another payment",
                    None => "does not exist",
                };
                return Err(DomainError::StaleWrite(format!(
                    "reservation {} {}",
                    reservation_id, reason
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl PersistenceAdapter for DatabaseStorage {
    async fn load_spot(&self, id: &str) -> DomainResult<Option<ParkingSpot>> {
        parking_spot::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(spot_model_to_domain)
            .transpose()
    }

    async fn list_spots(&self) -> DomainResult<Vec<ParkingSpot>> {
        let models = parking_spot::Entity::find()
            .order_by_asc(parking_spot::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models.into_iter().map(spot_model_to_domain).collect()
    }

    async fn load_reservation(&self, id: &str) -> DomainResult<Option<Reservation>> {
        reservation::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(reservation_model_to_domain)
            .transpose()
    }

    async fn list_reservations_for_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(user_id))
            .order_by_desc(reservation::Column::CreatedAt)
            .order_by_asc(reservation::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn list_live_reservations(&self) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.is_in([
                ReservationStatus::Upcoming.as_str(),
                ReservationStatus::Active.as_str(),
            ]))
            .order_by_asc(reservation::Column::StartTime)
            .order_by_asc(reservation::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn commit(&self, mutations: Vec<Mutation>) -> DomainResult<()> {
        let count = mutations.len();
        let txn = self.db.begin().await.map_err(db_err)?;

        for mutation in mutations {
            if let Err(err) = apply(&txn, mutation).await {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                return Err(err);
            }
        }

        txn.commit().await.map_err(db_err)?;
        debug!(mutations = count, "Database commit applied");
        Ok(())
    }

    async fn ping(&self) -> DomainResult<()> {
        self.db
            .execute(Statement::from_string(
                self.db.get_database_backend(),
                "SELECT 1".to_string(),
            ))
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
