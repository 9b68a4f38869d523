//! `impl_model!`: per-type accessor generation
//!
//! Expands to a `Model` impl whose `field` / `set_field` match on the
//! declared column names, so every by-name access resolves to a typed struct
//! field chosen at compile time.

/// Implement [`Model`](crate::model::Model) for a struct
///
/// Each column is written `field => ColumnSpec`; the column name is the field
/// name. The primary key field must be an `Option<i64>`.
///
/// ```
/// use ormx_core::{impl_model, ColumnSpec, Model};
///
/// #[derive(Debug, Clone, Default)]
/// struct Widget {
///     id: Option<i64>,
///     name: String,
///     price: f64,
/// }
///
/// impl_model! {
///     Widget {
///         table: "widget",
///         primary_key: id,
///         columns: {
///             name => ColumnSpec::new("varchar").length(255),
///             price => ColumnSpec::new("float"),
///         }
///     }
/// }
///
/// assert_eq!(Widget::metadata().columns.len(), 2);
/// ```
#[macro_export]
macro_rules! impl_model {
    (
        $ty:ident {
            table: $table:expr,
            primary_key: $pk:ident,
            columns: { $( $field:ident => $spec:expr ),+ $(,)? }
            $(, allow_schema_update: $allow:expr )?
            $(, relations: [ $( $rel:expr ),* $(,)? ] )?
            $(,)?
        }
    ) => {
        impl $crate::model::Model for $ty {
            fn metadata() -> $crate::schema::ModelMetadata {
                #[allow(unused_mut)]
                let mut meta = $crate::schema::ModelMetadata::new($table)
                    .primary_key(stringify!($pk))
                    $( .column($spec.named(stringify!($field))) )+;
                $( meta = meta.allow_schema_update($allow); )?
                $( $( meta = meta.relation($rel); )* )?
                meta
            }

            fn primary_key(&self) -> Option<i64> {
                self.$pk
            }

            fn set_primary_key(&mut self, pk: Option<i64>) {
                self.$pk = pk;
            }

            fn field(
                &self,
                name: &str,
            ) -> $crate::errors::Result<$crate::model::value::Value> {
                $(
                    if name == stringify!($field) {
                        return Ok($crate::model::value::IntoValue::into_value(
                            self.$field.clone(),
                        ));
                    }
                )+
                if name == stringify!($pk) {
                    return Ok($crate::model::value::IntoValue::into_value(self.$pk));
                }
                Err($crate::errors::OrmError::UnknownProperty {
                    property: name.to_string(),
                    model: std::any::type_name::<Self>().to_string(),
                })
            }

            fn set_field(
                &mut self,
                name: &str,
                value: $crate::model::value::Value,
            ) -> $crate::errors::Result<()> {
                $(
                    if name == stringify!($field) {
                        self.$field = $crate::model::value::FromValue::from_value(value, name)?;
                        return Ok(());
                    }
                )+
                if name == stringify!($pk) {
                    self.$pk = $crate::model::value::FromValue::from_value(value, name)?;
                    return Ok(());
                }
                Err($crate::errors::OrmError::UnknownProperty {
                    property: name.to_string(),
                    model: std::any::type_name::<Self>().to_string(),
                })
            }
        }
    };
}
