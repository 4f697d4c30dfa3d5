//! Shared validation helpers.
//!
//! Field rules live on the entity structs as `validator` attributes; this
//! module converts their failures into [`CoreError::Validation`]. Uids are
//! limited to 64 characters and names to 255 throughout.

use validator::Validate;

use crate::error::CoreError;

/// Run an entity's declared rules, naming the entity in the error.
pub fn validate_entity<E: Validate>(entity: &E, what: &str) -> Result<(), CoreError> {
    entity
        .validate()
        .map_err(|errors| CoreError::Validation(format!("{what}: {errors}")))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 1, max = 4))]
        name: String,
    }

    #[test]
    fn accepts_valid_input() {
        let named = Named { name: "ok".into() };
        assert!(validate_entity(&named, "named").is_ok());
    }

    #[test]
    fn rejects_empty_and_long_input() {
        let empty = Named { name: String::new() };
        assert_matches!(validate_entity(&empty, "named"), Err(CoreError::Validation(_)));

        let long = Named { name: "too long".into() };
        let err = validate_entity(&long, "named").unwrap_err();
        assert!(err.to_string().contains("named"));
    }
}
