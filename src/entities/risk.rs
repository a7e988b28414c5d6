use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{apply_derived_fields, random_code, DerivedFields};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
    #[sea_orm(string_value = "OPERATIONAL")]
    Operational,
    #[sea_orm(string_value = "FINANCIAL")]
    Financial,
    #[sea_orm(string_value = "STRATEGIC")]
    Strategic,
    #[sea_orm(string_value = "COMPLIANCE")]
    Compliance,
    #[sea_orm(string_value = "REPUTATIONAL")]
    Reputational,
    #[sea_orm(string_value = "ENVIRONMENTAL")]
    Environmental,
    #[sea_orm(string_value = "SAFETY")]
    Safety,
    #[sea_orm(string_value = "CYBER_SECURITY")]
    CyberSecurity,
    #[sea_orm(string_value = "MARKET")]
    Market,
    #[sea_orm(string_value = "CREDIT")]
    Credit,
    #[sea_orm(string_value = "LIQUIDITY")]
    Liquidity,
    #[sea_orm(string_value = "FOREIGN_EXCHANGE")]
    ForeignExchange,
}

impl RiskCategory {
    /// Prefix used in generated risk codes
    pub fn code_prefix(self) -> &'static str {
        match self {
            RiskCategory::Operational => "OPR",
            RiskCategory::Financial => "FIN",
            RiskCategory::Strategic => "STR",
            RiskCategory::Compliance => "COM",
            RiskCategory::Reputational => "REP",
            RiskCategory::Environmental => "ENV",
            RiskCategory::Safety => "SAF",
            RiskCategory::CyberSecurity => "CYB",
            RiskCategory::Market => "MKT",
            RiskCategory::Credit => "CRD",
            RiskCategory::Liquidity => "LIQ",
            RiskCategory::ForeignExchange => "FEX",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    #[default]
    #[sea_orm(string_value = "IDENTIFIED")]
    Identified,
    #[sea_orm(string_value = "ASSESSED")]
    Assessed,
    #[sea_orm(string_value = "MITIGATED")]
    Mitigated,
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    #[sea_orm(string_value = "TRANSFERRED")]
    Transferred,
    #[sea_orm(string_value = "AVOIDED")]
    Avoided,
    #[sea_orm(string_value = "MONITORING")]
    Monitoring,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
    #[sea_orm(string_value = "ESCALATED")]
    Escalated,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLikelihood {
    #[default]
    #[sea_orm(string_value = "RARE")]
    Rare,
    #[sea_orm(string_value = "UNLIKELY")]
    Unlikely,
    #[sea_orm(string_value = "POSSIBLE")]
    Possible,
    #[sea_orm(string_value = "LIKELY")]
    Likely,
    #[sea_orm(string_value = "ALMOST_CERTAIN")]
    AlmostCertain,
}

impl RiskLikelihood {
    pub fn score(self) -> i32 {
        match self {
            RiskLikelihood::Rare => 1,
            RiskLikelihood::Unlikely => 2,
            RiskLikelihood::Possible => 3,
            RiskLikelihood::Likely => 4,
            RiskLikelihood::AlmostCertain => 5,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskImpact {
    #[default]
    #[sea_orm(string_value = "NEGLIGIBLE")]
    Negligible,
    #[sea_orm(string_value = "MINOR")]
    Minor,
    #[sea_orm(string_value = "MODERATE")]
    Moderate,
    #[sea_orm(string_value = "MAJOR")]
    Major,
    #[sea_orm(string_value = "CATASTROPHIC")]
    Catastrophic,
}

impl RiskImpact {
    pub fn score(self) -> i32 {
        match self {
            RiskImpact::Negligible => 1,
            RiskImpact::Minor => 2,
            RiskImpact::Moderate => 3,
            RiskImpact::Major => 4,
            RiskImpact::Catastrophic => 5,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    #[sea_orm(string_value = "LOW")]
    Low,
    #[sea_orm(string_value = "MEDIUM")]
    Medium,
    #[sea_orm(string_value = "HIGH")]
    High,
    #[sea_orm(string_value = "CRITICAL")]
    Critical,
}

impl RiskLevel {
    /// Buckets a likelihood × impact score: 1-4, 5-9, 10-16, 17-25
    pub fn from_score(score: i32) -> Self {
        match score {
            i32::MIN..=4 => RiskLevel::Low,
            5..=9 => RiskLevel::Medium,
            10..=16 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTrend {
    #[sea_orm(string_value = "INCREASING")]
    Increasing,
    #[default]
    #[sea_orm(string_value = "STABLE")]
    Stable,
    #[sea_orm(string_value = "DECREASING")]
    Decreasing,
    #[sea_orm(string_value = "VOLATILE")]
    Volatile,
}

/// Score and level for a likelihood/impact pair
pub fn assess(likelihood: RiskLikelihood, impact: RiskImpact) -> (i32, RiskLevel) {
    let score = likelihood.score() * impact.score();
    (score, RiskLevel::from_score(score))
}

/// Risk register entry
#[derive(Clone, Debug, PartialEq, Default, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "risks")]
#[serde(default, rename_all = "camelCase")]
#[schema(as = Risk)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub tenant_id: String,
    #[sea_orm(unique)]
    pub risk_code: String,
    pub risk_title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub risk_description: Option<String>,
    pub category: Option<RiskCategory>,
    pub status: RiskStatus,
    pub likelihood: RiskLikelihood,
    pub likelihood_score: i32,
    pub impact: RiskImpact,
    pub impact_score: i32,
    pub inherent_risk_score: i32,
    pub inherent_risk_level: RiskLevel,
    pub residual_likelihood: Option<RiskLikelihood>,
    pub residual_impact: Option<RiskImpact>,
    pub residual_risk_score: Option<i32>,
    pub residual_risk_level: Option<RiskLevel>,
    pub risk_appetite: Option<RiskLevel>,
    pub risk_trend: RiskTrend,
    /// Estimated loss in GHS
    #[schema(value_type = Option<f64>)]
    pub potential_loss_amount: Option<Decimal>,
    pub regulatory_body: Option<String>,
    pub risk_owner_id: Option<String>,
    pub risk_owner_name: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub mitigation_strategy: Option<String>,
    pub identification_date: Option<NaiveDate>,
    pub next_review_date: Option<NaiveDate>,
    pub is_critical: bool,
    pub requires_immediate_action: bool,
    pub board_reportable: bool,
    pub regulatory_reportable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl DerivedFields for Model {
    fn calculate_fields(&mut self, now: DateTime<Utc>) {
        self.likelihood_score = self.likelihood.score();
        self.impact_score = self.impact.score();
        let (score, level) = assess(self.likelihood, self.impact);
        self.inherent_risk_score = score;
        self.inherent_risk_level = level;

        if let (Some(likelihood), Some(impact)) = (self.residual_likelihood, self.residual_impact) {
            let (score, level) = assess(likelihood, impact);
            self.residual_risk_score = Some(score);
            self.residual_risk_level = Some(level);
        }

        self.is_critical = level == RiskLevel::Critical;
        self.requires_immediate_action = self.is_critical || level == RiskLevel::High;
        self.board_reportable = level >= RiskLevel::High;

        if self.risk_code.is_empty() {
            let prefix = self.category.map_or("RSK", RiskCategory::code_prefix);
            self.risk_code = format!("{}-{}-{}", prefix, now.year(), random_code(6));
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[rstest]
    #[case(RiskLikelihood::Rare, RiskImpact::Negligible, 1, RiskLevel::Low)]
    #[case(RiskLikelihood::Unlikely, RiskImpact::Minor, 4, RiskLevel::Low)]
    #[case(RiskLikelihood::Possible, RiskImpact::Moderate, 9, RiskLevel::Medium)]
    #[case(RiskLikelihood::Likely, RiskImpact::Major, 16, RiskLevel::High)]
    #[case(RiskLikelihood::AlmostCertain, RiskImpact::Major, 20, RiskLevel::Critical)]
    #[case(RiskLikelihood::AlmostCertain, RiskImpact::Catastrophic, 25, RiskLevel::Critical)]
    fn scores_and_buckets(
        #[case] likelihood: RiskLikelihood,
        #[case] impact: RiskImpact,
        #[case] score: i32,
        #[case] level: RiskLevel,
    ) {
        assert_eq!(assess(likelihood, impact), (score, level));
    }

    #[test]
    fn critical_risk_sets_flags_and_code() {
        let mut risk = Model {
            category: Some(RiskCategory::Safety),
            likelihood: RiskLikelihood::AlmostCertain,
            impact: RiskImpact::Catastrophic,
            ..Default::default()
        };
        risk.calculate_fields(at_2024());

        assert_eq!(risk.likelihood_score, 5);
        assert_eq!(risk.impact_score, 5);
        assert!(risk.is_critical);
        assert!(risk.requires_immediate_action);
        assert!(risk.board_reportable);
        assert!(risk.risk_code.starts_with("SAF-2024-"));
        assert_eq!(risk.risk_code.len(), "SAF-2024-".len() + 6);
    }

    #[test]
    fn high_risk_needs_action_but_is_not_critical() {
        let mut risk = Model {
            likelihood: RiskLikelihood::Likely,
            impact: RiskImpact::Moderate,
            ..Default::default()
        };
        risk.calculate_fields(at_2024());

        assert_eq!(risk.inherent_risk_level, RiskLevel::High);
        assert!(!risk.is_critical);
        assert!(risk.requires_immediate_action);
        assert!(risk.board_reportable);
        assert!(risk.risk_code.starts_with("RSK-2024-"));
    }

    #[test]
    fn residual_needs_both_inputs() {
        let mut risk = Model {
            residual_likelihood: Some(RiskLikelihood::Possible),
            ..Default::default()
        };
        risk.calculate_fields(at_2024());
        assert_eq!(risk.residual_risk_score, None);

        risk.residual_impact = Some(RiskImpact::Minor);
        risk.calculate_fields(at_2024());
        assert_eq!(risk.residual_risk_score, Some(6));
        assert_eq!(risk.residual_risk_level, Some(RiskLevel::Medium));
    }

    #[test]
    fn existing_code_is_kept() {
        let mut risk = Model {
            risk_code: "FIN-2023-ABC123".into(),
            category: Some(RiskCategory::Financial),
            ..Default::default()
        };
        risk.calculate_fields(at_2024());
        assert_eq!(risk.risk_code, "FIN-2023-ABC123");
    }

    #[test]
    fn payload_uses_camel_case_and_enum_names() {
        let risk: Model = serde_json::from_value(serde_json::json!({
            "riskTitle": "Tanker rollover on N1",
            "category": "SAFETY",
            "likelihood": "POSSIBLE",
            "impact": "MAJOR"
        }))
        .unwrap();

        assert_eq!(risk.likelihood, RiskLikelihood::Possible);
        assert_eq!(risk.status, RiskStatus::Identified);
        let wire = serde_json::to_value(&risk).unwrap();
        assert!(wire.get("id").is_none());
        assert_eq!(wire["riskTrend"], "STABLE");
    }
}
