use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::identity::Role;
use crate::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub inventory: i32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
    pub username: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Customer
}

/// Demo catalog loaded by `storefront-cli db seed`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
    #[serde(default)]
    pub users: Vec<UserSeed>,
}

/// Load and validate a catalog seed file from YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<CatalogFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let catalog: CatalogFile =
        serde_yaml::from_str(&content).map_err(ConfigError::CatalogFileParse)?;

    validate_catalog(&catalog)?;

    Ok(catalog)
}

fn validate_catalog(catalog: &CatalogFile) -> Result<(), ConfigError> {
    let mut categories = HashSet::new();
    for category in &catalog.categories {
        if category.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name must be non-empty".to_string(),
            ));
        }
        if !categories.insert(category.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category: '{category}'"
            )));
        }
    }

    let mut seen_products = HashSet::new();
    for product in &catalog.products {
        if product.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "product name must be non-empty".to_string(),
            ));
        }
        if !seen_products.insert(product.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate product name: '{}'",
                product.name
            )));
        }
        if product.price.is_sign_negative() {
            return Err(ConfigError::Validation(format!(
                "product '{}' has negative price {}",
                product.name, product.price
            )));
        }
        if product.inventory < 0 {
            return Err(ConfigError::Validation(format!(
                "product '{}' has negative inventory {}",
                product.name, product.inventory
            )));
        }
        if let Some(unknown) = product
            .categories
            .iter()
            .find(|c| !categories.contains(c.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "product '{}' references unknown category '{unknown}'",
                product.name
            )));
        }
    }

    let mut seen_users = HashSet::new();
    for user in &catalog.users {
        if user.username.trim().is_empty() {
            return Err(ConfigError::Validation(
                "username must be non-empty".to_string(),
            ));
        }
        if !seen_users.insert(user.username.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate username: '{}'",
                user.username
            )));
        }
    }

    Ok(())
}
