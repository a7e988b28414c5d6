//! sea-orm entities for the governance registers and UPPF claims.
//!
//! The gateway does not own these tables. The entities exist for services
//! that embed them and for the payload shapes the governance routes accept.
//! Every entity computes its derived columns in one pure
//! [`DerivedFields::calculate_fields`] call, which `before_save` reuses.

use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::entity::prelude::*;
use sea_orm::Iterable;

pub mod configuration;
pub mod contract;
pub mod risk;
pub mod uppf_claim;

/// Columns computed from other columns at save time
pub trait DerivedFields {
    fn calculate_fields(&mut self, now: DateTime<Utc>);
}

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random uppercase base-36 suffix for generated document numbers
pub fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Runs `calculate_fields` against an active model.
///
/// Inserts fill unset columns from `Model::default()` and write every column.
/// Updates only write the columns whose value changed, and are skipped when
/// the active model is partial, since derived values would be computed from
/// defaults instead of the stored row.
pub(crate) fn apply_derived_fields<A>(mut active: A, insert: bool, now: DateTime<Utc>) -> A
where
    A: ActiveModelTrait,
    <A::Entity as EntityTrait>::Model: DerivedFields + Default,
{
    let columns: Vec<_> = <A::Entity as EntityTrait>::Column::iter().collect();

    if !insert && columns.iter().any(|col| active.get(*col).is_not_set()) {
        return active;
    }

    let mut model = <<A::Entity as EntityTrait>::Model as Default>::default();
    for col in &columns {
        if let Some(value) = active.get(*col).into_value() {
            model.set(*col, value);
        }
    }

    let before = model.clone();
    model.calculate_fields(now);

    for col in columns {
        let value = model.get(col);
        if (insert && active.get(col).is_not_set()) || value != before.get(col) {
            active.set(col, value);
        }
    }
    active
}
