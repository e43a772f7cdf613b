/// Implement [`Projection`](crate::Projection) with an explicit field table.
///
/// Each entry is `target` (same-named source field) or `target: source`. Values go
/// through `TryFrom`, and a failed conversion becomes `XplusError::Projection` naming the
/// target field. A target field left out of the table does not compile.
///
/// ```ignore
/// xplus::projection! {
///     impl Projection<Repo> for RepoSummary {
///         id,
///         title: name,
///     }
/// }
/// ```
#[macro_export]
macro_rules! projection {
    (
        impl Projection<$source:ty> for $target:ty {
            $( $field:ident $(: $from:ident)? ),* $(,)?
        }
    ) => {
        impl $crate::Projection<$source> for $target {
            fn project(entity: $source) -> ::std::result::Result<Self, $crate::XplusError> {
                ::std::result::Result::Ok(Self {
                    $( $field: $crate::projection!(@field entity, $field $(, $from)?), )*
                })
            }
        }
    };
    (@field $entity:ident, $field:ident) => {
        $crate::projection!(@field $entity, $field, $field)
    };
    (@field $entity:ident, $field:ident, $from:ident) => {
        ::std::convert::TryFrom::try_from($entity.$from).map_err(|e| {
            $crate::XplusError::Projection {
                field: stringify!($field),
                message: ::std::string::ToString::to_string(&e),
            }
        })?
    };
}
