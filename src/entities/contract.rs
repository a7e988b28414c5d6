use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{apply_derived_fields, random_code, DerivedFields};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractType {
    #[default]
    #[sea_orm(string_value = "SUPPLY_AGREEMENT")]
    SupplyAgreement,
    #[sea_orm(string_value = "SERVICE_AGREEMENT")]
    ServiceAgreement,
    #[sea_orm(string_value = "PURCHASE_AGREEMENT")]
    PurchaseAgreement,
    #[sea_orm(string_value = "DISTRIBUTION_AGREEMENT")]
    DistributionAgreement,
    #[sea_orm(string_value = "TRANSPORTATION_AGREEMENT")]
    TransportationAgreement,
    #[sea_orm(string_value = "STORAGE_AGREEMENT")]
    StorageAgreement,
    #[sea_orm(string_value = "FRANCHISE_AGREEMENT")]
    FranchiseAgreement,
    #[sea_orm(string_value = "LEASE_AGREEMENT")]
    LeaseAgreement,
    #[sea_orm(string_value = "EMPLOYMENT_CONTRACT")]
    EmploymentContract,
    #[sea_orm(string_value = "CONSULTANCY_AGREEMENT")]
    ConsultancyAgreement,
    #[sea_orm(string_value = "NDA")]
    #[serde(rename = "NDA")]
    Nda,
    #[sea_orm(string_value = "SLA")]
    #[serde(rename = "SLA")]
    Sla,
}

impl ContractType {
    pub fn number_prefix(self) -> &'static str {
        match self {
            ContractType::SupplyAgreement => "SA",
            ContractType::ServiceAgreement => "SVC",
            ContractType::PurchaseAgreement => "PA",
            _ => "CON",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    #[default]
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "UNDER_REVIEW")]
    UnderReview,
    #[sea_orm(string_value = "PENDING_APPROVAL")]
    PendingApproval,
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "SUSPENDED")]
    Suspended,
    #[sea_orm(string_value = "TERMINATED")]
    Terminated,
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
    #[sea_orm(string_value = "RENEWED")]
    Renewed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenewalType {
    #[default]
    #[sea_orm(string_value = "MANUAL")]
    Manual,
    #[sea_orm(string_value = "AUTOMATIC")]
    Automatic,
    #[sea_orm(string_value = "MUTUAL_AGREEMENT")]
    MutualAgreement,
    #[sea_orm(string_value = "PERFORMANCE_BASED")]
    PerformanceBased,
}

/// Whole calendar months between two dates, ignoring the day of month
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

#[derive(Clone, Debug, PartialEq, Default, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "contracts")]
#[serde(default, rename_all = "camelCase")]
#[schema(as = Contract)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub tenant_id: String,
    pub contract_number: String,
    pub contract_title: String,
    pub contract_type: ContractType,
    pub status: ContractStatus,
    pub counterparty_name: String,
    pub counterparty_id: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub contract_value: Option<Decimal>,
    pub effective_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub duration_months: Option<i32>,
    pub renewable: bool,
    pub renewal_type: RenewalType,
    pub renewal_notice_days: i32,
    pub next_renewal_date: Option<NaiveDate>,
    pub contract_owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl DerivedFields for Model {
    fn calculate_fields(&mut self, now: DateTime<Utc>) {
        if let (Some(effective), Some(expiry)) = (self.effective_date, self.expiry_date) {
            self.duration_months = Some(months_between(effective, expiry));
        }

        if let (true, Some(expiry)) = (self.renewable, self.expiry_date) {
            // None when the notice period runs past chrono's date range
            self.next_renewal_date =
                expiry.checked_sub_signed(Duration::days(i64::from(self.renewal_notice_days)));
        }

        let today = now.date_naive();
        if self.status == ContractStatus::Active && self.expiry_date.is_some_and(|d| d < today) {
            self.status = ContractStatus::Expired;
        }

        if self.contract_number.is_empty() {
            self.contract_number = format!(
                "{}-{}-{}",
                self.contract_type.number_prefix(),
                now.year(),
                random_code(9)
            );
        }
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
