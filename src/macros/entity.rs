/// Declare a struct together with its [`FromRow`](crate::FromRow) and
/// [`Entity`](crate::Entity) implementations.
///
/// The `#[entity(...)]` header comes first; column names are the field names.
///
/// ```ignore
/// xplus::entity! {
///     #[entity(table = "repo", primary_key = id)]
///     #[derive(Debug, Clone, Default)]
///     pub struct Repo {
///         pub id: i64,
///         pub name: String,
///         pub parent_id: Option<i64>,
///     }
/// }
/// ```
///
/// Add `auto_increment = false` to the header when the caller supplies the key.
#[macro_export]
macro_rules! entity {
    (
        #[entity(table = $table:literal, primary_key = $pk:ident $(, auto_increment = $auto:literal)? $(,)?)]
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field : $ty, )*
        }

        impl $crate::FromRow for $name {
            fn from_row(row: &$crate::Row) -> ::std::result::Result<Self, $crate::PostgresError> {
                ::std::result::Result::Ok(Self {
                    $( $field: row.try_get(stringify!($field))?, )*
                })
            }
        }

        impl $crate::Entity for $name {
            fn table_name() -> &'static str {
                $table
            }

            fn primary_key() -> &'static str {
                stringify!($pk)
            }

            $(
                fn auto_increment() -> bool {
                    $auto
                }
            )?

            fn columns() -> &'static [&'static str] {
                &[$( stringify!($field) ),*]
            }

            fn values(&self) -> ::std::vec::Vec<$crate::sea_query::Value> {
                ::std::vec![$( $crate::sea_query::Value::from(::std::clone::Clone::clone(&self.$field)) ),*]
            }

            fn primary_key_value(&self) -> $crate::sea_query::Value {
                $crate::sea_query::Value::from(::std::clone::Clone::clone(&self.$pk))
            }
        }
    };
}
