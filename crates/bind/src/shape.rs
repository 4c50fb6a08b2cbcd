//! Projection of handler output through a declared response type.

use crate::coerce;
use crate::error::{BindingErrors, FieldError};
use crate::spec::{Source, TypeSpec};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeOptions {
    /// Leave record fields the output did not set out of the result instead of filling defaults.
    pub exclude_unset: bool,
}

/// Shapes `output` into `ty`: undeclared record fields are dropped, absent ones defaulted, and
/// every value must decode into its declared type and satisfy its field constraints.
///
/// ```
/// use micro_bind::spec::{FieldSpec, RecordSpec, TypeSpec};
/// use micro_bind::{ShapeOptions, shape};
/// use serde_json::json;
///
/// let user_out = RecordSpec::builder("UserOut")
///     .field(FieldSpec::new("username", TypeSpec::Str))
///     .field(FieldSpec::new("full_name", TypeSpec::Str).optional())
///     .build()
///     .unwrap();
///
/// let output = json!({"username": "john", "password": "secret"});
/// let shaped = shape(&TypeSpec::record(&user_out), &output, ShapeOptions::default()).unwrap();
/// assert_eq!(shaped, json!({"username": "john", "full_name": null}));
/// ```
///
/// # Errors
/// The problems found, reported as body errors with an empty parameter name.
pub fn shape(ty: &TypeSpec, output: &serde_json::Value, options: ShapeOptions) -> Result<serde_json::Value, BindingErrors> {
    let decoded = if options.exclude_unset { coerce::decode_set_fields(output, ty) } else { coerce::decode(output, ty) };
    match decoded {
        Ok(value) => Ok(value.to_json()),
        Err(issues) => {
            let errors = issues
                .into_iter()
                .map(|issue| {
                    let error = FieldError::whole(Source::Body, issue.kind, issue.message).with_path(issue.path);
                    match issue.input {
                        Some(input) => error.with_input(input),
                        None => error,
                    }
                })
                .collect();
            Err(BindingErrors::from_errors(errors).unwrap_or_else(|| unreachable!("decode failed without issues")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{FieldSpec, RecordSpec};
    use serde_json::json;
    use std::sync::Arc;

    fn item() -> Arc<RecordSpec> {
        RecordSpec::builder("Item")
            .field(FieldSpec::new("name", TypeSpec::Str))
            .field(FieldSpec::new("description", TypeSpec::Str).optional())
            .field(FieldSpec::new("price", TypeSpec::Float))
            .field(FieldSpec::new("tax", TypeSpec::Float).default(10.5))
            .field(FieldSpec::new("tags", TypeSpec::seq(TypeSpec::Str)).default(Vec::<String>::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn defaults_are_filled() {
        let shaped = shape(&TypeSpec::record(&item()), &json!({"name": "Foo", "price": 50.2}), ShapeOptions::default()).unwrap();
        assert_eq!(shaped, json!({"name": "Foo", "description": null, "price": 50.2, "tax": 10.5, "tags": []}));
    }

    #[test]
    fn exclude_unset_keeps_only_given_fields() {
        let options = ShapeOptions { exclude_unset: true };
        let shaped = shape(&TypeSpec::record(&item()), &json!({"name": "Foo", "price": 50.2}), options).unwrap();
        assert_eq!(shaped, json!({"name": "Foo", "price": 50.2}));
    }

    #[test]
    fn lists_and_dicts() {
        let ty = TypeSpec::seq(TypeSpec::record(&item()));
        let shaped = shape(&ty, &json!([{"name": "Foo", "price": 1}, {"name": "Bar", "price": 2, "tax": 1.0}]), ShapeOptions::default())
            .unwrap();
        assert_eq!(shaped[1]["tax"], json!(1.0));

        let ty = TypeSpec::map(TypeSpec::Str, TypeSpec::Float);
        assert_eq!(shape(&ty, &json!({"foo": 2.3}), ShapeOptions::default()).unwrap(), json!({"foo": 2.3}));
    }

    #[test]
    fn mismatches_are_reported() {
        let errors = shape(&TypeSpec::record(&item()), &json!({"price": "free"}), ShapeOptions::default()).unwrap_err();
        let locations: Vec<_> = errors.iter().map(FieldError::location).collect();
        assert_eq!(locations, vec![vec!["body", "name"], vec!["body", "price"]]);
    }
}
