use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{apply_derived_fields, DerivedFields};
use crate::ledger::amount::parse_leading_f64;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationType {
    #[sea_orm(string_value = "SYSTEM")]
    System,
    #[default]
    #[sea_orm(string_value = "TENANT")]
    Tenant,
    #[sea_orm(string_value = "MODULE")]
    Module,
    #[sea_orm(string_value = "USER")]
    User,
    #[sea_orm(string_value = "ENVIRONMENT")]
    Environment,
    #[sea_orm(string_value = "FEATURE_FLAG")]
    FeatureFlag,
    #[sea_orm(string_value = "BUSINESS_RULE")]
    BusinessRule,
    #[sea_orm(string_value = "INTEGRATION")]
    Integration,
}

impl ConfigurationType {
    /// Position in the SYSTEM > TENANT > MODULE > USER hierarchy
    pub fn inheritance_level(self) -> Option<i32> {
        match self {
            ConfigurationType::System => Some(0),
            ConfigurationType::Tenant => Some(1),
            ConfigurationType::Module => Some(2),
            ConfigurationType::User => Some(3),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationStatus {
    #[default]
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "INACTIVE")]
    Inactive,
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "PENDING_APPROVAL")]
    PendingApproval,
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationDataType {
    #[default]
    #[sea_orm(string_value = "STRING")]
    String,
    #[sea_orm(string_value = "NUMBER")]
    Number,
    #[sea_orm(string_value = "BOOLEAN")]
    Boolean,
    #[sea_orm(string_value = "JSON")]
    Json,
    #[sea_orm(string_value = "ARRAY")]
    Array,
    #[sea_orm(string_value = "DATE")]
    Date,
    #[sea_orm(string_value = "ENCRYPTED")]
    Encrypted,
}

/// A configuration key at one level of the inheritance hierarchy
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "configurations")]
#[serde(default, rename_all = "camelCase")]
#[schema(as = Configuration)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    /// Empty for system-wide keys
    pub tenant_id: Option<String>,
    #[sea_orm(column_name = "configuration_key")]
    pub key: String,
    #[sea_orm(column_name = "configuration_name")]
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub module: String,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub config_type: ConfigurationType,
    pub data_type: ConfigurationDataType,
    pub status: ConfigurationStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub value: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub default_value: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub previous_value: Option<String>,
    pub is_sensitive: bool,
    pub is_encrypted: bool,
    pub is_system_config: bool,
    pub is_active: bool,
    pub inheritance_level: i32,
    pub inherits_from_parent: bool,
    pub version: i32,
    pub change_frequency: i32,
    pub last_changed_date: Option<DateTime<Utc>>,
    pub effective_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            tenant_id: None,
            key: String::new(),
            name: String::new(),
            description: None,
            module: String::new(),
            config_type: ConfigurationType::default(),
            data_type: ConfigurationDataType::default(),
            status: ConfigurationStatus::default(),
            value: None,
            default_value: None,
            previous_value: None,
            is_sensitive: false,
            is_encrypted: false,
            is_system_config: false,
            is_active: true,
            inheritance_level: 0,
            inherits_from_parent: false,
            version: 1,
            change_frequency: 0,
            last_changed_date: None,
            effective_date: None,
            expiry_date: None,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl DerivedFields for Model {
    fn calculate_fields(&mut self, now: DateTime<Utc>) {
        if let Some(level) = self.config_type.inheritance_level() {
            self.inheritance_level = level;
        }
        self.is_system_config = self.config_type == ConfigurationType::System;

        if self.value != self.previous_value {
            self.change_frequency += 1;
            self.last_changed_date = Some(now);
            self.version += 1;
        }

        if self.effective_date.is_none() {
            self.effective_date = Some(now);
        }

        if self.is_sensitive && !self.is_encrypted && self.value.as_deref().is_some_and(|v| !v.is_empty()) {
            self.is_encrypted = true;
        }
    }
}

impl Model {
    /// The stored value, or the default when no value is set, parsed according
    /// to `data_type`. An empty stored value reads as null.
    pub fn effective_value(&self) -> Value {
        match self.value.as_deref().or(self.default_value.as_deref()) {
            Some(raw) if !raw.is_empty() => self.parse_value(raw),
            _ => Value::Null,
        }
    }

    fn parse_value(&self, raw: &str) -> Value {
        match self.data_type {
            ConfigurationDataType::Boolean => Value::Bool(raw.eq_ignore_ascii_case("true")),
            ConfigurationDataType::Number => parse_leading_f64(raw)
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::Null, Value::Number),
            ConfigurationDataType::Json => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            }
            ConfigurationDataType::Array => serde_json::from_str(raw).unwrap_or_else(|_| {
                Value::Array(raw.split(',').map(|s| Value::String(s.to_string())).collect())
            }),
            _ => Value::String(raw.to_string()),
        }
    }

    /// Active and inside its effective window at `at`
    pub fn is_effective(&self, at: DateTime<Utc>) -> bool {
        self.status == ConfigurationStatus::Active
            && self.is_active
            && self.effective_date.map_or(true, |from| from <= at)
            && self.expiry_date.map_or(true, |until| until > at)
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
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn hierarchy_levels() {
        for (kind, level) in [
            (ConfigurationType::System, 0),
            (ConfigurationType::Tenant, 1),
            (ConfigurationType::Module, 2),
            (ConfigurationType::User, 3),
        ] {
            let mut config = Model {
                config_type: kind,
                ..Default::default()
            };
            config.calculate_fields(now());
            assert_eq!(config.inheritance_level, level);
            assert_eq!(config.is_system_config, kind == ConfigurationType::System);
        }
    }

    #[test]
    fn other_types_keep_their_level() {
        let mut config = Model {
            config_type: ConfigurationType::FeatureFlag,
            inheritance_level: 2,
            ..Default::default()
        };
        config.calculate_fields(now());
        assert_eq!(config.inheritance_level, 2);
    }

    #[test]
    fn changed_value_bumps_version() {
        let mut config = Model {
            value: Some("0.15".into()),
            previous_value: Some("0.125".into()),
            version: 3,
            change_frequency: 4,
            ..Default::default()
        };
        config.calculate_fields(now());

        assert_eq!(config.version, 4);
        assert_eq!(config.change_frequency, 5);
        assert_eq!(config.last_changed_date, Some(now()));
    }

    #[test]
    fn unchanged_value_keeps_version() {
        let mut config = Model {
            value: Some("GHS".into()),
            previous_value: Some("GHS".into()),
            ..Default::default()
        };
        config.calculate_fields(now());
        assert_eq!(config.version, 1);
        assert_eq!(config.last_changed_date, None);
    }

    #[test]
    fn effective_date_defaults_once() {
        let earlier = now() - Duration::days(10);
        let mut config = Model {
            effective_date: Some(earlier),
            ..Default::default()
        };
        config.calculate_fields(now());
        assert_eq!(config.effective_date, Some(earlier));

        let mut fresh = Model::default();
        fresh.calculate_fields(now());
        assert_eq!(fresh.effective_date, Some(now()));
    }

    #[test]
    fn sensitive_value_is_flagged_encrypted() {
        let mut config = Model {
            is_sensitive: true,
            value: Some("s3cret".into()),
            ..Default::default()
        };
        config.calculate_fields(now());
        assert!(config.is_encrypted);

        let mut empty = Model {
            is_sensitive: true,
            ..Default::default()
        };
        empty.calculate_fields(now());
        assert!(!empty.is_encrypted);
    }

    #[test]
    fn effective_value_parses_by_type() {
        let typed = |data_type, value: &str| Model {
            data_type,
            value: Some(value.into()),
            ..Default::default()
        };

        assert_eq!(typed(ConfigurationDataType::Boolean, "TRUE").effective_value(), json!(true));
        assert_eq!(typed(ConfigurationDataType::Number, "12.5").effective_value(), json!(12.5));
        assert_eq!(
            typed(ConfigurationDataType::Json, r#"{"rate":0.15}"#).effective_value(),
            json!({"rate": 0.15})
        );
        assert_eq!(
            typed(ConfigurationDataType::Array, "PMS,AGO").effective_value(),
            json!(["PMS", "AGO"])
        );
        assert_eq!(typed(ConfigurationDataType::String, "en-GH").effective_value(), json!("en-GH"));
    }

    #[test]
    fn effective_value_falls_back_to_default() {
        let config = Model {
            data_type: ConfigurationDataType::Number,
            default_value: Some("30".into()),
            ..Default::default()
        };
        assert_eq!(config.effective_value(), json!(30.0));
        assert_eq!(Model::default().effective_value(), Value::Null);
    }

    #[test]
    fn empty_value_reads_as_null_even_with_default() {
        let config = Model {
            data_type: ConfigurationDataType::Number,
            value: Some(String::new()),
            default_value: Some("30".into()),
            ..Default::default()
        };
        assert_eq!(config.effective_value(), Value::Null);
    }

    #[test]
    fn numbers_read_their_leading_digits() {
        let number = |value: &str| Model {
            data_type: ConfigurationDataType::Number,
            value: Some(value.into()),
            ..Default::default()
        };
        assert_eq!(number("12.5 km").effective_value(), json!(12.5));
        assert_eq!(number(" 0.15").effective_value(), json!(0.15));
        assert_eq!(number("n/a").effective_value(), Value::Null);
        assert_eq!(number("1e400").effective_value(), Value::Null);
    }

    #[test]
    fn effectiveness_window() {
        let config = Model {
            effective_date: Some(now() - Duration::days(1)),
            expiry_date: Some(now() + Duration::days(1)),
            ..Default::default()
        };
        assert!(config.is_effective(now()));
        assert!(!config.is_effective(now() + Duration::days(2)));

        let archived = Model {
            status: ConfigurationStatus::Archived,
            ..Default::default()
        };
        assert!(!archived.is_effective(now()));
    }

    #[test]
    fn type_field_uses_reserved_name_on_the_wire() {
        let config: Model = serde_json::from_value(json!({"key": "vat.rate", "type": "SYSTEM"})).unwrap();
        assert_eq!(config.config_type, ConfigurationType::System);
        assert_eq!(config.version, 1);
        assert!(config.is_active);
    }
}
