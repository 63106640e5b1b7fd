use billing_common::{is_currency_code, Amount, Secret};
use chrono::Utc;
use serde::{Deserialize, Deserializer};

use crate::{billing_api::errors::ProjectApiError, db_types::Project};

/// A field in a partial update. `Absent` leaves the stored value alone, `Null` clears it.
///
/// Use with `#[serde(default)]` so that a missing key deserializes as `Absent`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

/// Partial update of a project's settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectUpdate {
    pub name: Patch<String>,
    pub description: Patch<String>,
    pub is_active: Patch<bool>,
    pub callback_currency: Patch<String>,
    pub limits_currency: Patch<String>,
    pub min_payment_amount: Patch<Amount>,
    pub max_payment_amount: Patch<Amount>,
    pub only_fixed_amounts: Patch<bool>,
    pub allow_dynamic_notify_urls: Patch<bool>,
    pub allow_dynamic_redirect_urls: Patch<bool>,
    pub secret_key: Patch<Secret<String>>,
}

fn required<T: Clone>(field: &str, patch: &Patch<T>, target: &mut T) -> Result<(), ProjectApiError> {
    match patch {
        Patch::Absent => Ok(()),
        Patch::Null => Err(ProjectApiError::InvalidUpdate(format!("{field} cannot be null"))),
        Patch::Value(v) => {
            *target = v.clone();
            Ok(())
        },
    }
}

fn currency(field: &str, patch: &Patch<String>, target: &mut String) -> Result<(), ProjectApiError> {
    if let Patch::Value(code) = patch {
        if !is_currency_code(code) {
            return Err(ProjectApiError::InvalidUpdate(format!("{field} is not a currency code: {code}")));
        }
    }
    required(field, patch, target)
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_absent() &&
            self.description.is_absent() &&
            self.is_active.is_absent() &&
            self.callback_currency.is_absent() &&
            self.limits_currency.is_absent() &&
            self.min_payment_amount.is_absent() &&
            self.max_payment_amount.is_absent() &&
            self.only_fixed_amounts.is_absent() &&
            self.allow_dynamic_notify_urls.is_absent() &&
            self.allow_dynamic_redirect_urls.is_absent() &&
            self.secret_key.is_absent()
    }

    /// Currency codes the update introduces. They must exist in the catalog.
    pub fn currencies(&self) -> Vec<&str> {
        [&self.callback_currency, &self.limits_currency]
            .into_iter()
            .filter_map(|p| match p {
                Patch::Value(code) => Some(code.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Applies the update to a copy of `project`. Only `description` may be cleared.
    pub fn apply(&self, project: &Project) -> Result<Project, ProjectApiError> {
        let mut result = project.clone();
        if let Patch::Value(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ProjectApiError::InvalidUpdate("name cannot be empty".to_string()));
            }
        }
        required("name", &self.name, &mut result.name)?;
        match &self.description {
            Patch::Absent => {},
            Patch::Null => result.description = None,
            Patch::Value(d) => result.description = Some(d.clone()),
        }
        required("is_active", &self.is_active, &mut result.is_active)?;
        currency("callback_currency", &self.callback_currency, &mut result.callback_currency)?;
        currency("limits_currency", &self.limits_currency, &mut result.limits_currency)?;
        required("min_payment_amount", &self.min_payment_amount, &mut result.min_payment_amount)?;
        required("max_payment_amount", &self.max_payment_amount, &mut result.max_payment_amount)?;
        required("only_fixed_amounts", &self.only_fixed_amounts, &mut result.only_fixed_amounts)?;
        required("allow_dynamic_notify_urls", &self.allow_dynamic_notify_urls, &mut result.allow_dynamic_notify_urls)?;
        required(
            "allow_dynamic_redirect_urls",
            &self.allow_dynamic_redirect_urls,
            &mut result.allow_dynamic_redirect_urls,
        )?;
        required("secret_key", &self.secret_key, &mut result.secret_key)?;
        if result.min_payment_amount.cents() < 0 {
            return Err(ProjectApiError::InvalidUpdate("min_payment_amount cannot be negative".to_string()));
        }
        if result.min_payment_amount > result.max_payment_amount {
            return Err(ProjectApiError::InvalidUpdate(format!(
                "min_payment_amount ({}) is greater than max_payment_amount ({})",
                result.min_payment_amount, result.max_payment_amount
            )));
        }
        result.updated_at = Utc::now();
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::db_types::Merchant;

    fn project() -> Project {
        Project {
            id: "p1".into(),
            merchant: Merchant {
                id: "m1".into(),
                name: "Acme".into(),
                currency: "USD".into(),
                is_vat_enabled: false,
                is_commission_to_user_enabled: false,
            },
            name: "Shop".into(),
            description: Some("A shop".into()),
            is_active: true,
            secret_key: Secret::new("s3cret".to_string()),
            callback_currency: "USD".into(),
            limits_currency: "USD".into(),
            min_payment_amount: Amount::from_f64(10.0),
            max_payment_amount: Amount::from_f64(1000.0),
            only_fixed_amounts: false,
            allow_dynamic_notify_urls: false,
            allow_dynamic_redirect_urls: false,
            payment_methods: vec![],
            fixed_packages: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn absent_null_and_values() {
        let update: ProjectUpdate =
            serde_json::from_str(r#"{"description": null, "is_active": false, "max_payment_amount": 50}"#).unwrap();
        assert!(update.name.is_absent());
        assert_eq!(update.description, Patch::Null);
        assert!(!update.is_empty());
        let updated = update.apply(&project()).unwrap();
        assert_eq!(updated.name, "Shop");
        assert!(updated.description.is_none());
        assert!(!updated.is_active);
        assert_eq!(updated.max_payment_amount, Amount::from_f64(50.0));
    }

    #[test]
    fn required_fields_cannot_be_cleared() {
        let update: ProjectUpdate = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert!(matches!(update.apply(&project()), Err(ProjectApiError::InvalidUpdate(_))));
        let update: ProjectUpdate = serde_json::from_str(r#"{"limits_currency": "dollars"}"#).unwrap();
        assert!(matches!(update.apply(&project()), Err(ProjectApiError::InvalidUpdate(_))));
    }

    #[test]
    fn limits_must_be_ordered() {
        let update: ProjectUpdate = serde_json::from_str(r#"{"min_payment_amount": 2000}"#).unwrap();
        assert!(matches!(update.apply(&project()), Err(ProjectApiError::InvalidUpdate(_))));
    }

    #[test]
    fn empty_update() {
        let update: ProjectUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
        assert!(update.currencies().is_empty());
        let update: ProjectUpdate = serde_json::from_str(r#"{"callback_currency": "EUR"}"#).unwrap();
        assert_eq!(update.currencies(), vec!["EUR"]);
    }
}
