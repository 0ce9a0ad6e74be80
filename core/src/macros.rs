/// Implements a basic `Debug` trait for types using their type name.
///
/// This macro generates a `Debug` implementation that simply prints the type name,
/// useful for types holding closures or trait objects that have no useful `Debug` output.
#[macro_export]
macro_rules! impl_debug {
    ($ty:ty) => {
        impl core::fmt::Debug for $ty {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(core::any::type_name::<Self>())
            }
        }
    };
}

/// Implements `From<$source>` for [`Dep`](crate::memo::Dep) by widening into one variant.
macro_rules! dep_from {
    ($variant:ident($target:ty): $($source:ty),*) => {
        $(
            impl From<$source> for $crate::memo::Dep {
                fn from(value: $source) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }
        )*
    };
}
