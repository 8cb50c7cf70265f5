//! Field limits and validators for project, version and account data.
//!
//! Lengths are counted in characters, not bytes. Limits mirror the column
//! widths in the persistence schema.

use crate::error::ValidationError;

pub const TITLE_MAX: usize = 50;
pub const SLUG_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 200;
pub const BODY_MAX: usize = 2000;
pub const CATEGORY_COUNT_MAX: usize = 8;
pub const CATEGORY_MAX: usize = 32;

pub const VERSION_TITLE_MAX: usize = 50;
pub const VERSION_DESCRIPTION_MAX: usize = 2000;
pub const VERSION_CODE_MAX: usize = 32;
pub const GAME_VERSION_COUNT_MAX: usize = 32;
pub const LINK_MAX: usize = 512;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const PASSWORD_MIN: usize = 8;
pub const BIO_MAX: usize = 200;

fn required(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    bounded(field, value, max)
}

fn bounded(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    required("title", title, TITLE_MAX)
}

/// Slugs are lower-case ASCII letters, digits, `-` and `_`.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    required("slug", slug, SLUG_MAX)?;
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidCharacters {
            field: "slug",
            reason: "only lower-case letters, digits, '-' and '_' are allowed",
        });
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    bounded("description", description, DESCRIPTION_MAX)
}

pub fn validate_body(body: &str) -> Result<(), ValidationError> {
    bounded("body", body, BODY_MAX)
}

pub fn validate_categories(categories: &[String]) -> Result<(), ValidationError> {
    if categories.len() > CATEGORY_COUNT_MAX {
        return Err(ValidationError::TooLong {
            field: "category",
            max: CATEGORY_COUNT_MAX,
            actual: categories.len(),
        });
    }
    categories
        .iter()
        .try_for_each(|c| required("category", c, CATEGORY_MAX))
}

pub fn validate_version_title(title: &str) -> Result<(), ValidationError> {
    required("title", title, VERSION_TITLE_MAX)
}

pub fn validate_version_description(description: &str) -> Result<(), ValidationError> {
    bounded("description", description, VERSION_DESCRIPTION_MAX)
}

pub fn validate_version_code(code: &str) -> Result<(), ValidationError> {
    required("version_code", code, VERSION_CODE_MAX)
}

pub fn validate_supports(supports: &[String]) -> Result<(), ValidationError> {
    if supports.is_empty() {
        return Err(ValidationError::Empty { field: "supports" });
    }
    if supports.len() > GAME_VERSION_COUNT_MAX {
        return Err(ValidationError::TooLong {
            field: "supports",
            max: GAME_VERSION_COUNT_MAX,
            actual: supports.len(),
        });
    }
    supports
        .iter()
        .try_for_each(|s| required("supports", s, VERSION_CODE_MAX))
}

pub fn validate_link(field: &'static str, link: &str) -> Result<(), ValidationError> {
    required(field, link, LINK_MAX)
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    required("username", username, USERNAME_MAX)?;
    if username.chars().count() < USERNAME_MIN {
        return Err(ValidationError::TooShort {
            field: "username",
            min: USERNAME_MIN,
        });
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidCharacters {
            field: "username",
            reason: "only letters, digits, '-' and '_' are allowed",
        });
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(ValidationError::TooShort {
            field: "password",
            min: PASSWORD_MIN,
        });
    }
    Ok(())
}

pub fn validate_bio(bio: &str) -> Result<(), ValidationError> {
    bounded("bio", bio, BIO_MAX)
}
