use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{apply_derived_fields, DerivedFields};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UppfClaimStatus {
    #[default]
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "ready_to_submit")]
    ReadyToSubmit,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl UppfClaimStatus {
    /// Local lifecycle guard. Upstream transitions are not checked against it.
    pub fn can_transition_to(self, next: UppfClaimStatus) -> bool {
        use UppfClaimStatus::*;
        matches!(
            (self, next),
            (Draft, ReadyToSubmit)
                | (Draft, Cancelled)
                | (ReadyToSubmit, Draft)
                | (ReadyToSubmit, Submitted)
                | (ReadyToSubmit, UnderReview)
                | (ReadyToSubmit, Cancelled)
                | (UnderReview, ReadyToSubmit)
                | (Submitted, UnderReview)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (UnderReview, Approved)
                | (UnderReview, Rejected)
                | (Rejected, Draft)
                | (Approved, Paid)
        )
    }

    /// Submitted to NPA and not yet settled or rejected
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            UppfClaimStatus::Submitted | UppfClaimStatus::UnderReview | UppfClaimStatus::Approved
        )
    }
}

#[derive(Clone, Debug, PartialEq, Default, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "uppf_claims")]
#[serde(default, rename_all = "camelCase")]
#[schema(as = UppfClaimRecord)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub claim_number: String,
    pub window_id: String,
    pub delivery_id: Option<String>,
    pub dealer_id: String,
    pub route_id: String,
    pub depot_id: String,
    pub station_id: String,
    pub product_type: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub volume_litres: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub km_actual: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub km_threshold: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub tariff_per_litre_km: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub claim_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub approved_amount: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub paid_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub outstanding_amount: Decimal,
    pub status: UppfClaimStatus,
    pub submission_reference: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl DerivedFields for Model {
    fn calculate_fields(&mut self, _now: DateTime<Utc>) {
        let due = self.approved_amount.unwrap_or(self.claim_amount);
        self.outstanding_amount = (due - self.paid_amount).max(Decimal::ZERO);
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr> {
        let now = Utc::now();
        let mut active_model = self;

        if insert && active_model.id.is_not_set() {
            active_model.id = Set(Uuid::new_v4());
        }

        let mut active_model = apply_derived_fields(active_model, insert, now);
        if insert {
            active_model.created_at = Set(Some(now));
        }
        active_model.updated_at = Set(Some(now));
        Ok(active_model)
    }
}
